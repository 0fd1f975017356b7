//! `Packet`: the byte-buffer codec every message is built with.
//!
//! A packet is written front to back and read front to back. Nothing in
//! the buffer describes its own layout. The sender and receiver agree on
//! the order and types of the fields for each message kind, and the
//! leading tag byte tells the receiver which layout to expect.
//!
//! ## Encoding rules
//!
//! - Integers and floats: fixed width, big-endian (network byte order).
//! - `bool`: one byte, `0` or `1`.
//! - Strings and sequences (`String`, `Vec<T>`, `[T]`): a `u32` element
//!   count, then the elements.
//! - Fixed-size arrays (`[T; N]`): the `N` elements, no count.
//!
//! ## Validity
//!
//! Reading past the end of the buffer doesn't panic. It returns `None` and
//! flips the packet into an *invalid* state, which is sticky: every read
//! after that also returns `None`, so a message parser can read all its
//! fields with `?` and check the outcome once.

/// A growable byte buffer with a read cursor and a validity flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    data: Vec<u8>,
    read_pos: usize,
    is_valid: bool,
}

impl Packet {
    /// Creates an empty, valid packet.
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            read_pos: 0,
            is_valid: true,
        }
    }

    /// Appends raw bytes to the end of the packet.
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Empties the packet and resets the read cursor and validity flag.
    pub fn clear(&mut self) {
        self.data.clear();
        self.read_pos = 0;
        self.is_valid = true;
    }

    /// Skips `length` bytes of unread data.
    ///
    /// Skipping past the end is clamped to the end; it doesn't invalidate
    /// the packet, but any later read will.
    pub fn ignore_bytes(&mut self, length: usize) {
        self.read_pos = self.read_pos.saturating_add(length).min(self.data.len());
    }

    /// The bytes written so far.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of bytes in the packet.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left between the read cursor and the end.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.read_pos
    }

    /// Returns `true` once every byte has been read.
    pub fn end_of_packet(&self) -> bool {
        self.read_pos >= self.data.len()
    }

    /// Returns `false` once any read has run past the end of the data.
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Consumes the packet and returns its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Appends a value.
    ///
    /// Returns `&mut Self` so writes can be chained:
    /// `packet.write(&1u8).write("nick")`.
    pub fn write<T: Encode + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.encode(self);
        self
    }

    /// Extracts the next value of type `T`.
    ///
    /// Returns `None` (and invalidates the packet) if the data runs out.
    pub fn read<T: Decode>(&mut self) -> Option<T> {
        T::decode(self)
    }

    /// Borrows the next `length` unread bytes and advances the cursor.
    ///
    /// This is the single place that enforces bounds. Every `Decode`
    /// implementation goes through it (directly or via another `Decode`).
    pub fn take(&mut self, length: usize) -> Option<&[u8]> {
        if !self.is_valid {
            return None;
        }
        if length > self.remaining() {
            self.is_valid = false;
            return None;
        }
        let start = self.read_pos;
        self.read_pos += length;
        Some(&self.data[start..self.read_pos])
    }

    /// Marks the packet invalid. Used by decoders that find bytes that are
    /// present but meaningless (bad UTF-8, unknown enum discriminant).
    pub fn invalidate(&mut self) {
        self.is_valid = false;
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<u8>> for Packet {
    fn from(data: Vec<u8>) -> Self {
        Self {
            data,
            read_pos: 0,
            is_valid: true,
        }
    }
}

impl From<&[u8]> for Packet {
    fn from(data: &[u8]) -> Self {
        Self::from(data.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Encode / Decode
// ---------------------------------------------------------------------------

/// A value that can be appended to a [`Packet`].
pub trait Encode {
    fn encode(&self, packet: &mut Packet);
}

/// A value that can be extracted from a [`Packet`].
///
/// Implementations return `None` on failure and must leave the packet
/// invalid when they do.
pub trait Decode: Sized {
    fn decode(packet: &mut Packet) -> Option<Self>;
}

macro_rules! impl_number {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode(&self, packet: &mut Packet) {
                    packet.append(&self.to_be_bytes());
                }
            }

            impl Decode for $ty {
                fn decode(packet: &mut Packet) -> Option<Self> {
                    let bytes = packet.take(std::mem::size_of::<$ty>())?;
                    Some(<$ty>::from_be_bytes(bytes.try_into().ok()?))
                }
            }
        )*
    };
}

impl_number!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Encode for bool {
    fn encode(&self, packet: &mut Packet) {
        u8::from(*self).encode(packet);
    }
}

impl Decode for bool {
    fn decode(packet: &mut Packet) -> Option<Self> {
        u8::decode(packet).map(|byte| byte != 0)
    }
}

/// Writes a `u32` element count. Lengths beyond `u32::MAX` can't be
/// represented on the wire and are truncated to it.
fn encode_len(len: usize, packet: &mut Packet) {
    u32::try_from(len).unwrap_or(u32::MAX).encode(packet);
}

impl Encode for str {
    fn encode(&self, packet: &mut Packet) {
        encode_len(self.len(), packet);
        packet.append(self.as_bytes());
    }
}

impl Encode for String {
    fn encode(&self, packet: &mut Packet) {
        self.as_str().encode(packet);
    }
}

impl Decode for String {
    fn decode(packet: &mut Packet) -> Option<Self> {
        let len = u32::decode(packet)? as usize;
        let bytes = packet.take(len)?.to_vec();
        match String::from_utf8(bytes) {
            Ok(text) => Some(text),
            Err(_) => {
                packet.invalidate();
                None
            }
        }
    }
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, packet: &mut Packet) {
        encode_len(self.len(), packet);
        for item in self {
            item.encode(packet);
        }
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, packet: &mut Packet) {
        self.as_slice().encode(packet);
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(packet: &mut Packet) -> Option<Self> {
        let count = u32::decode(packet)? as usize;
        // A hostile count must not drive the allocation: every element
        // takes at least one byte, so `remaining` bounds the real length.
        let mut items = Vec::with_capacity(count.min(packet.remaining()));
        for _ in 0..count {
            items.push(T::decode(packet)?);
        }
        Some(items)
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode(&self, packet: &mut Packet) {
        for item in self {
            item.encode(packet);
        }
    }
}

impl<T: Decode, const N: usize> Decode for [T; N] {
    fn decode(packet: &mut Packet) -> Option<Self> {
        let mut items = Vec::with_capacity(N);
        for _ in 0..N {
            items.push(T::decode(packet)?);
        }
        items.try_into().ok()
    }
}

// =========================================================================
// Tests
// =========================================================================
