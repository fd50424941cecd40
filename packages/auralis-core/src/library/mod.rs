//! Library Coordinator: pluggable scan sources, a serialized command
//! queue, and update debouncing, all driven from a single dedicated task.

pub mod command;
pub mod coordinator;
pub mod debouncer;
pub mod events;
pub mod source;

pub use command::{Command, CommandOutcome, CommandQueue};
pub use coordinator::{Database, LibraryCoordinator, NullDatabase};
pub use debouncer::UpdateDebouncer;
pub use events::{EventMask, ListenerBus, LoggingListenerBus};
pub use source::{LibrarySource, RegisteredSource};
