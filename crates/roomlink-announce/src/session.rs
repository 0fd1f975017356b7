//! `AnnounceSession`: keeps a room's directory listing fresh.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use roomlink_room::Room;
use serde::{Deserialize, Serialize};

use crate::{AnnounceError, DirectoryBackend, RoomListing, RoomSnapshot};

/// Configuration for an announce session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnounceConfig {
    /// Time between two publishes.
    pub interval: Duration,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
        }
    }
}

/// A running announce loop. Dropping `_wake` ends it.
struct Announcer {
    _wake: mpsc::Sender<()>,
    listing: Arc<Mutex<Listing>>,
}

/// What one announce loop has put in the directory. Shared between the
/// loop and `stop`; whichever of them sees the other's move removes the
/// listing.
#[derive(Default)]
struct Listing {
    stopped: bool,
    /// GUID being published right now.
    in_flight: Option<String>,
    /// GUID of the last finished publish.
    published: Option<String>,
}

/// Publishes a room to a directory every [`AnnounceConfig::interval`]
/// while started, and looks up the directory's room list on request.
///
/// The room is only read; a closed room is skipped until it opens again.
pub struct AnnounceSession {
    room: Arc<Room>,
    backend: Arc<dyn DirectoryBackend>,
    config: AnnounceConfig,
    announcer: Mutex<Option<Announcer>>,
}

impl AnnounceSession {
    pub fn new(room: Arc<Room>, backend: Arc<dyn DirectoryBackend>, config: AnnounceConfig) -> Self {
        Self {
            room,
            backend,
            config,
            announcer: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &AnnounceConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.announcer.lock().is_some()
    }

    /// Starts the announce loop on its own thread. The first publish
    /// happens right away.
    ///
    /// # Errors
    /// - [`AnnounceError::AlreadyRunning`] if the loop is running.
    /// - [`AnnounceError::Spawn`] if the thread can't be started.
    pub fn start(&self) -> Result<(), AnnounceError> {
        let mut announcer = self.announcer.lock();
        if announcer.is_some() {
            return Err(AnnounceError::AlreadyRunning);
        }

        let (wake_tx, wake_rx) = mpsc::channel();
        let room = Arc::clone(&self.room);
        let backend = Arc::clone(&self.backend);
        let listing = Arc::new(Mutex::new(Listing::default()));
        let loop_listing = Arc::clone(&listing);
        let interval = self.config.interval;
        thread::Builder::new()
            .name("roomlink-announce".into())
            .spawn(move || announce_loop(&room, backend.as_ref(), &loop_listing, interval, &wake_rx))
            .map_err(AnnounceError::Spawn)?;

        *announcer = Some(Announcer {
            _wake: wake_tx,
            listing,
        });
        tracing::info!(interval_ms = interval.as_millis() as u64, "announce started");
        Ok(())
    }

    /// Stops the loop and removes the listing it published.
    ///
    /// The loop thread is not waited for; it notices the stop at its
    /// next wake-up, which `stop` triggers right away. If a publish is in
    /// flight, the loop removes that listing itself once the publish
    /// returns. A failed removal is logged.
    ///
    /// # Errors
    /// [`AnnounceError::NotRunning`] if the loop isn't running.
    pub fn stop(&self) -> Result<(), AnnounceError> {
        let Some(announcer) = self.announcer.lock().take() else {
            return Err(AnnounceError::NotRunning);
        };
        tracing::info!("announce stopped");

        let guid = {
            let mut listing = announcer.listing.lock();
            listing.stopped = true;
            if listing.in_flight.is_some() {
                None
            } else {
                listing.published.take()
            }
        };
        drop(announcer);
        let Some(guid) = guid else {
            return Ok(());
        };

        // reqwest's blocking client refuses to run on a tokio worker, and
        // `stop` may be called from one.
        let backend = Arc::clone(&self.backend);
        let deleted = thread::Builder::new()
            .name("roomlink-announce-delete".into())
            .spawn(move || remove_listing(backend.as_ref(), &guid));
        match deleted.map(thread::JoinHandle::join) {
            Ok(Ok(())) => {}
            Ok(Err(_)) => tracing::error!("listing removal panicked"),
            Err(e) => tracing::warn!(error = %e, "could not start listing removal"),
        }
        Ok(())
    }

    /// Fetches the directory's room list on a separate thread and hands
    /// it to `callback`, which runs there exactly once. A failed fetch
    /// yields an empty list.
    ///
    /// # Errors
    /// [`AnnounceError::Spawn`] if the thread can't be started; the
    /// callback is then never called.
    pub fn get_room_list<F>(&self, callback: F) -> Result<thread::JoinHandle<()>, AnnounceError>
    where
        F: FnOnce(Vec<RoomListing>) + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        thread::Builder::new()
            .name("roomlink-room-list".into())
            .spawn(move || {
                let rooms = backend.fetch_room_list().unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "could not fetch room list");
                    Vec::new()
                });
                callback(rooms);
            })
            .map_err(AnnounceError::Spawn)
    }
}

impl Drop for AnnounceSession {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}

fn remove_listing(backend: &dyn DirectoryBackend, guid: &str) {
    match backend.delete(guid) {
        Ok(()) => tracing::debug!(%guid, "listing removed"),
        Err(e) => tracing::warn!(%guid, error = %e, "could not remove listing"),
    }
}

fn announce_loop(
    room: &Room,
    backend: &dyn DirectoryBackend,
    listing: &Mutex<Listing>,
    interval: Duration,
    wake: &mpsc::Receiver<()>,
) {
    loop {
        if let Some(snapshot) = RoomSnapshot::capture(room) {
            {
                let mut listing = listing.lock();
                if listing.stopped {
                    return;
                }
                listing.in_flight = Some(snapshot.guid.clone());
            }
            match backend.publish(&snapshot) {
                Ok(()) => tracing::debug!(guid = %snapshot.guid, "room announced"),
                Err(e) => tracing::warn!(guid = %snapshot.guid, error = %e, "announce failed"),
            }
            let stopped = {
                let mut listing = listing.lock();
                listing.in_flight = None;
                listing.published = Some(snapshot.guid.clone());
                listing.stopped
            };
            if stopped {
                // `stop` ran mid-publish and left the removal to us.
                remove_listing(backend, &snapshot.guid);
                return;
            }
        }

        match wake.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}
