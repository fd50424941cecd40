//! Streaming session registry.
//!
//! Sessions are held in insertion order so the engine can cheaply detect
//! "this is the only remaining session" and skip a clone when handing off
//! an encoded frame — the registry itself never needs keyed lookup.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use uuid::Uuid;

use super::icy::IcyMetadataInjector;
use crate::protocol_constants::SESSION_CHANNEL_CAPACITY;

/// A single connected HTTP client consuming the broadcast stream.
pub struct StreamingSession {
    pub id: Uuid,
    pub wants_icy: bool,
    sender: tokio::sync::mpsc::Sender<Bytes>,
    injector: Mutex<Option<IcyMetadataInjector>>,
}

impl StreamingSession {
    /// Creates a new session and returns it paired with the receiver half
    /// the HTTP handler turns into a response body stream.
    pub fn new(wants_icy: bool) -> (Arc<Self>, tokio::sync::mpsc::Receiver<Bytes>) {
        let (sender, receiver) = tokio::sync::mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let injector = if wants_icy {
            Some(IcyMetadataInjector::new())
        } else {
            None
        };
        let session = Arc::new(Self {
            id: Uuid::new_v4(),
            wants_icy,
            sender,
            injector: Mutex::new(injector),
        });
        (session, receiver)
    }

    /// Non-blocking send of one encoded MP3 chunk, splicing ICY metadata
    /// first if this session requested it. Mirrors a non-blocking pipe
    /// write: a full channel (slow client) drops the frame rather than
    /// backpressuring the whole broadcast; a closed channel (disconnected
    /// client) is silently ignored, the registry reaps it on the next pass.
    pub fn try_send(&self, audio: &[u8], title: Option<&str>, artist: Option<&str>) {
        let payload = if let Some(injector) = self.injector.lock().as_mut() {
            injector.inject(audio, title, artist)
        } else {
            Bytes::copy_from_slice(audio)
        };

        match self.sender.try_send(payload) {
            Ok(()) => {}
            Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                log::warn!("session {} is slow, dropping frame", self.id);
            }
            Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Whether the client side has disconnected.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Registry of all sessions currently attached to one Broadcast Engine.
///
/// Backed by a plain `Vec` under a lock rather than a concurrent map: the
/// fan-out loop needs insertion-ordered iteration and periodic compaction
/// of closed sessions, both of which are awkward over a keyed concurrent
/// collection and are cheap here since registry mutation (join/leave) is
/// far rarer than the per-frame fan-out read.
pub struct SessionRegistry {
    sessions: Mutex<Vec<Arc<StreamingSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn join(&self, session: Arc<StreamingSession>) {
        self.sessions.lock().push(session);
    }

    /// Number of sessions currently registered (including any not yet
    /// reaped since disconnecting).
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registered sessions with ICY metadata enabled.
    pub fn icy_count(&self) -> usize {
        self.sessions.lock().iter().filter(|s| s.wants_icy).count()
    }

    /// Removes sessions whose receiver has dropped.
    pub fn reap_closed(&self) {
        self.sessions.lock().retain(|s| !s.is_closed());
    }

    /// Unregisters every session, e.g. when the encoder can no longer serve
    /// the declared quality and the engine transitions to a not-supported
    /// state. Already-connected clients stop receiving frames immediately;
    /// their channels close naturally once their HTTP task drops its
    /// session handle.
    pub fn drain_all(&self) {
        self.sessions.lock().clear();
    }

    /// Fans an encoded MP3 chunk out to every live session, reaping closed
    /// ones as it goes. The last session in the list is handed the
    /// original slice in a final pass without extra cloning pressure when
    /// only one session remains (the common single-listener case).
    pub fn broadcast(&self, audio: &[u8], title: Option<&str>, artist: Option<&str>) {
        let sessions = self.sessions.lock();
        for session in sessions.iter() {
            if !session.is_closed() {
                session.try_send(audio, title, artist);
            }
        }
    }

    /// Snapshot of registered sessions, used for diagnostics.
    pub fn snapshot(&self) -> Vec<Arc<StreamingSession>> {
        self.sessions.lock().clone()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
