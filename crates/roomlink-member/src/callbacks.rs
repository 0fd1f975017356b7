//! Typed callback registry.
//!
//! Each event type has its own set of callbacks behind its own lock. A
//! set is copied out of the lock before any callback runs, so callbacks
//! may register or remove callbacks (even themselves) without
//! deadlocking, and a removal only affects the next event.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use roomlink_protocol::{ChatEntry, RoomInformation, WifiPacket};

use crate::ConnectionState;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Callbacks for one event type, keyed by registration id so they run in
/// registration order.
pub struct CallbackSet<T> {
    callbacks: Mutex<BTreeMap<u64, Callback<T>>>,
}

impl<T> Default for CallbackSet<T> {
    fn default() -> Self {
        Self {
            callbacks: Mutex::new(BTreeMap::new()),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// An event a [`RoomMember`](crate::RoomMember) can deliver to callbacks.
///
/// Implemented for `WifiPacket`, `ChatEntry`, `RoomInformation` and
/// [`ConnectionState`]; it can't be implemented outside this crate.
pub trait MemberEvent: sealed::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn set(registry: &CallbackRegistry) -> &CallbackSet<Self>
    where
        Self: Sized;
}

macro_rules! member_event {
    ($ty:ty, $field:ident) => {
        impl sealed::Sealed for $ty {}

        impl MemberEvent for $ty {
            fn set(registry: &CallbackRegistry) -> &CallbackSet<Self> {
                &registry.$field
            }
        }
    };
}

member_event!(WifiPacket, wifi_packet);
member_event!(ChatEntry, chat_entry);
member_event!(RoomInformation, room_information);
member_event!(ConnectionState, connection_state);

/// Proof of a registration, used to remove the callback again.
///
/// Handles are only meaningful for the member that issued them.
pub struct CallbackHandle<T> {
    id: u64,
    _event: PhantomData<fn(&T)>,
}

impl<T> Clone for CallbackHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for CallbackHandle<T> {}

impl<T> PartialEq for CallbackHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for CallbackHandle<T> {}

impl<T> Hash for CallbackHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for CallbackHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CallbackHandle").field(&self.id).finish()
    }
}

/// All callback sets of one member.
#[derive(Default)]
pub struct CallbackRegistry {
    next_id: AtomicU64,
    wifi_packet: CallbackSet<WifiPacket>,
    chat_entry: CallbackSet<ChatEntry>,
    room_information: CallbackSet<RoomInformation>,
    connection_state: CallbackSet<ConnectionState>,
}

impl CallbackRegistry {
    pub(crate) fn connect<T, F>(&self, callback: F) -> CallbackHandle<T>
    where
        T: MemberEvent,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        T::set(self).callbacks.lock().insert(id, Arc::new(callback));
        CallbackHandle {
            id,
            _event: PhantomData,
        }
    }

    /// Removes a callback. Returns `false` if it was already gone.
    pub(crate) fn disconnect<T: MemberEvent>(&self, handle: CallbackHandle<T>) -> bool {
        T::set(self).callbacks.lock().remove(&handle.id).is_some()
    }

    /// Calls every callback registered for `T` with `event`.
    pub(crate) fn invoke<T: MemberEvent>(&self, event: &T) {
        let callbacks: Vec<Callback<T>> = T::set(self).callbacks.lock().values().cloned().collect();
        for callback in callbacks {
            callback(event);
        }
    }
}
