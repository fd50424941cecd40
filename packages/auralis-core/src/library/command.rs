//! Command Queue: the serialized FIFO of library operations executed on
//! the library task.
//!
//! Async commands (`exec_async`) are fire-and-forget; sync commands
//! (`exec_sync`) carry a oneshot completion handle the caller awaits,
//! mirroring a queued callback that blocks the caller until it runs.

use tokio::sync::{mpsc, oneshot};

use crate::error::{LibraryError, SourceResult};
use crate::library::events::EventMask;

/// One operation placed on the Command Queue.
pub enum Command {
    Rescan,
    MetaRescan,
    FullRescan,
    PlaylistItemAdd {
        playlist_vp: String,
        item_vp: String,
    },
    PlaylistRemove {
        vp: String,
    },
    QueueItemAdd {
        path: String,
        position: i32,
        reshuffle: bool,
        item_id: i32,
    },
    QueueSave {
        vp: String,
    },
    RssAdd {
        name: String,
        url: String,
        limit: Option<u32>,
    },
    RssRemove {
        url: String,
    },
    UpdateTrigger {
        event_mask: EventMask,
    },
}

/// Result carried back by a sync command's completion handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Done,
    QueueItemAdded { count: u32, new_id: u32 },
    Rejected(SourceResult),
}

pub(crate) struct QueuedCommand {
    command: Command,
    reply: Option<oneshot::Sender<CommandOutcome>>,
}

/// Handle held by arbitrary request tasks to enqueue commands onto the
/// library task. Cloning is cheap; the underlying channel sender is shared.
#[derive(Clone)]
pub struct CommandQueue {
    sender: mpsc::Sender<QueuedCommand>,
}

impl CommandQueue {
    /// Creates a bound queue: the sender half for callers, the receiver
    /// half for the coordinator's dispatch loop.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<QueuedCommand>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Enqueues a command without waiting for it to run.
    pub async fn exec_async(&self, command: Command) -> Result<(), LibraryError> {
        self.sender
            .send(QueuedCommand {
                command,
                reply: None,
            })
            .await
            .map_err(|_| LibraryError::DispatcherGone)
    }

    /// Enqueues a command and awaits its completion outcome.
    pub async fn exec_sync(&self, command: Command) -> Result<CommandOutcome, LibraryError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(QueuedCommand {
                command,
                reply: Some(tx),
            })
            .await
            .map_err(|_| LibraryError::DispatcherGone)?;
        rx.await.map_err(|_| LibraryError::DispatcherGone)
    }
}

impl QueuedCommand {
    pub(crate) fn into_parts(self) -> (Command, Option<oneshot::Sender<CommandOutcome>>) {
        (self.command, self.reply)
    }
}
