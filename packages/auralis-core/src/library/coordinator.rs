//! Library Coordinator: owns the dedicated library task, dispatches
//! commands from the Command Queue, and sequences scans across the
//! registered library sources.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::mpsc;

use super::command::{Command, CommandOutcome, CommandQueue};
use super::debouncer::{ScanEventAccumulator, UpdateDebouncer};
use super::events::{EventMask, ListenerBus};
use super::source::RegisteredSource;
use crate::error::{LibraryError, SourceResult};
use crate::state::LibraryConfig;

/// Which scan flavor is running, used only to pick the right skeleton
/// branches (purge-cruft gating, full-wipe step); not exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanKind {
    Init,
    Rescan,
    MetaRescan,
    FullRescan,
}

/// Hooks into the database collaborator the coordinator needs for the scan
/// skeleton and full-rescan wipe. Kept as a narrow trait since the on-disk
/// schema itself is an external collaborator, not something this crate owns.
pub trait Database: Send + Sync {
    fn purge_cruft(&self, since_unix_millis: u64);
    fn post_scan_hook(&self);
    fn stop_playback(&self);
    fn clear_queue(&self);
    fn snapshot_rss_items(&self) -> Vec<(String, String, Option<u32>)>;
    fn purge_all_library_tables(&self);
    fn restore_rss_snapshot(&self, items: Vec<(String, String, Option<u32>)>);
    fn rss_add(&self, name: &str, url: &str, limit: Option<u32>) -> SourceResult;
    fn rss_remove(&self, url: &str) -> SourceResult;
}

/// A `Database` that does nothing, for the demonstration binary and tests:
/// a real embedder would back this with an actual on-disk schema, which is
/// explicitly out of scope for this crate.
#[derive(Default)]
pub struct NullDatabase;

impl Database for NullDatabase {
    fn purge_cruft(&self, _since_unix_millis: u64) {}
    fn post_scan_hook(&self) {}
    fn stop_playback(&self) {}
    fn clear_queue(&self) {}
    fn snapshot_rss_items(&self) -> Vec<(String, String, Option<u32>)> {
        Vec::new()
    }
    fn purge_all_library_tables(&self) {}
    fn restore_rss_snapshot(&self, _items: Vec<(String, String, Option<u32>)>) {}
    fn rss_add(&self, _name: &str, _url: &str, _limit: Option<u32>) -> SourceResult {
        SourceResult::Ok
    }
    fn rss_remove(&self, _url: &str) -> SourceResult {
        SourceResult::Ok
    }
}

/// Owns the library task. Construct with [`LibraryCoordinator::new`], then
/// spawn [`LibraryCoordinator::run`] exactly once via a
/// [`TaskSpawner`](crate::runtime::TaskSpawner).
/// All mutation reaches the coordinator through its [`CommandQueue`]; the
/// struct itself is `Send + Sync` so the queue handle can be cloned freely
/// across request tasks.
pub struct LibraryCoordinator {
    sources: SyncMutex<Vec<RegisteredSource>>,
    scanning: AtomicBool,
    command_queue: CommandQueue,
    command_rx: SyncMutex<Option<mpsc::Receiver<QueuedCommandHandle>>>,
    debouncer: UpdateDebouncer,
    scan_accumulator: ScanEventAccumulator,
    database: Arc<dyn Database>,
    config: LibraryConfig,
}

// `CommandQueue::new` returns `mpsc::Receiver<QueuedCommand>` where
// `QueuedCommand` is private to `command.rs`; re-export an alias here so
// the coordinator can name the receiver's item type without exposing the
// queue's internals further than necessary.
pub(super) use super::command::QueuedCommand as QueuedCommandHandle;

impl LibraryCoordinator {
    pub fn new(
        config: LibraryConfig,
        listeners: Arc<dyn ListenerBus>,
        database: Arc<dyn Database>,
    ) -> Arc<Self> {
        let (command_queue, command_rx) = CommandQueue::new(config.command_queue_capacity);
        let debouncer = UpdateDebouncer::new(
            Duration::from_millis(config.debounce_window_ms),
            listeners,
        );

        Arc::new(Self {
            sources: SyncMutex::new(Vec::new()),
            scanning: AtomicBool::new(false),
            command_queue,
            command_rx: SyncMutex::new(Some(command_rx)),
            debouncer,
            scan_accumulator: ScanEventAccumulator::default(),
            database,
            config,
        })
    }

    /// Handle callers use to enqueue commands; cloning is cheap.
    pub fn command_queue(&self) -> &CommandQueue {
        &self.command_queue
    }

    /// Registers a source, running its `init`/`register_events` immediately.
    /// Order of registration is preserved — scans and mutation fallthrough
    /// both iterate in registration order.
    pub fn register_source(&self, source: Box<dyn super::source::LibrarySource>) {
        let registered = RegisteredSource::initialize(source);
        self.sources.lock().push(registered);
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    /// Convenience wrappers over the command queue for the three public
    /// scan entry points named in the external interfaces.
    pub async fn rescan(&self) -> Result<(), LibraryError> {
        self.command_queue.exec_async(Command::Rescan).await
    }

    pub async fn metarescan(&self) -> Result<(), LibraryError> {
        self.command_queue.exec_async(Command::MetaRescan).await
    }

    pub async fn fullrescan(&self) -> Result<(), LibraryError> {
        self.command_queue.exec_async(Command::FullRescan).await
    }

    /// Subscribes to an RSS feed, named in the external interfaces.
    pub async fn rss_add(
        &self,
        name: String,
        url: String,
        limit: Option<u32>,
    ) -> Result<(), LibraryError> {
        self.command_queue
            .exec_async(Command::RssAdd { name, url, limit })
            .await
    }

    /// Unsubscribes an RSS feed by its URL, named in the external interfaces.
    pub async fn rss_remove(&self, url: String) -> Result<(), LibraryError> {
        self.command_queue
            .exec_async(Command::RssRemove { url })
            .await
    }

    /// Runs the initial scan directly, bypassing the command queue. Meant
    /// to be called once by the bootstrap sequence before the HTTP server
    /// starts accepting requests.
    pub async fn init_scan(&self) {
        self.run_scan_if_idle(ScanKind::Init).await;
    }

    /// Runs the dispatch loop: the single dedicated library task. Consumes
    /// the command receiver; calling this twice panics, matching the
    /// single-dedicated-task invariant.
    pub async fn run(self: Arc<Self>) {
        let mut receiver = self
            .command_rx
            .lock()
            .take()
            .expect("LibraryCoordinator::run called more than once");

        while let Some(queued) = receiver.recv().await {
            let (command, reply) = queued.into_parts();
            let outcome = self.dispatch(command).await;
            if let Some(reply) = reply {
                let _ = reply.send(outcome);
            }
        }
    }

    async fn dispatch(&self, command: Command) -> CommandOutcome {
        match command {
            Command::Rescan => self.run_scan_if_idle(ScanKind::Rescan).await,
            Command::MetaRescan => self.run_scan_if_idle(ScanKind::MetaRescan).await,
            Command::FullRescan => self.run_scan_if_idle(ScanKind::FullRescan).await,
            Command::PlaylistItemAdd {
                playlist_vp,
                item_vp,
            } => self.mutate_playlist_add(&playlist_vp, &item_vp).await,
            Command::PlaylistRemove { vp } => self.mutate_playlist_remove(&vp).await,
            Command::QueueItemAdd {
                path,
                position,
                reshuffle,
                item_id,
            } => self.mutate_queue_add(&path, position, reshuffle, item_id),
            Command::QueueSave { vp } => self.mutate_queue_save(&vp).await,
            Command::RssAdd { name, url, limit } => self.mutate_rss_add(&name, &url, limit),
            Command::RssRemove { url } => self.mutate_rss_remove(&url),
            Command::UpdateTrigger { event_mask } => {
                self.update_trigger(event_mask).await;
                CommandOutcome::Done
            }
        }
    }

    /// Accumulates an event and either folds it into the in-progress scan's
    /// accumulator (no timer armed) or (re)arms the 5-second debounce timer.
    async fn update_trigger(&self, mask: EventMask) {
        if self.is_scanning() {
            self.scan_accumulator.accumulate(mask);
        } else {
            self.debouncer.trigger(mask).await;
        }
    }

    /// No-op (per §4.4's exclusivity rule) if a scan is already running.
    async fn run_scan_if_idle(&self, kind: ScanKind) -> CommandOutcome {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("scan already in progress, ignoring request");
            return CommandOutcome::Rejected(SourceResult::Error);
        }

        self.update_trigger(EventMask::UPDATE).await;

        if kind == ScanKind::FullRescan {
            self.database.stop_playback();
            self.database.clear_queue();
            let rss_snapshot = self.database.snapshot_rss_items();
            self.database.purge_all_library_tables();
            self.database.restore_rss_snapshot(rss_snapshot);
        }

        let scan_started_millis = crate::utils::now_millis();
        let sources = self.sources.lock().len();
        info!("starting scan across {sources} registered sources");

        for index in 0..sources {
            let (name, disabled) = {
                let guard = self.sources.lock();
                let entry = &guard[index];
                (entry.source.name().to_string(), entry.disabled)
            };
            if disabled {
                continue;
            }
            let result = self.invoke_scan_method(index, kind);
            if !matches!(result, SourceResult::Ok) {
                error!("scan failed for source '{name}': {result:?}");
            }
        }

        let skip_purge = matches!(kind, ScanKind::Rescan | ScanKind::MetaRescan)
            && self.config.filescan_disable;
        if !skip_purge {
            self.database.purge_cruft(scan_started_millis);
            self.database.post_scan_hook();
        }

        self.scanning.store(false, Ordering::Release);

        let accumulated = self.scan_accumulator.take();
        self.debouncer
            .flush_now(EventMask::UPDATE | accumulated)
            .await;

        CommandOutcome::Done
    }

    fn invoke_scan_method(&self, index: usize, kind: ScanKind) -> SourceResult {
        let guard = self.sources.lock();
        let entry = &guard[index];
        match kind {
            ScanKind::Init => entry.source.initscan(),
            ScanKind::Rescan => entry.source.rescan(),
            ScanKind::MetaRescan => entry.source.metarescan(),
            ScanKind::FullRescan => entry.source.fullrescan(),
        }
    }

    async fn mutate_playlist_add(&self, playlist_vp: &str, item_vp: &str) -> CommandOutcome {
        if self.is_scanning() {
            return CommandOutcome::Rejected(SourceResult::Error);
        }
        let outcome = {
            let guard = self.sources.lock();
            let mut result = CommandOutcome::Rejected(SourceResult::PathInvalid);
            for entry in guard.iter() {
                if entry.disabled {
                    continue;
                }
                match entry.source.playlist_item_add(playlist_vp, item_vp) {
                    SourceResult::Ok => {
                        result = CommandOutcome::Done;
                        break;
                    }
                    SourceResult::PathInvalid => continue,
                    SourceResult::Error => {
                        result = CommandOutcome::Rejected(SourceResult::Error);
                        break;
                    }
                }
            }
            result
        };
        if matches!(outcome, CommandOutcome::Done) {
            self.debouncer.trigger(EventMask::STORED_PLAYLIST).await;
        }
        outcome
    }

    async fn mutate_playlist_remove(&self, vp: &str) -> CommandOutcome {
        if self.is_scanning() {
            return CommandOutcome::Rejected(SourceResult::Error);
        }
        let outcome = {
            let guard = self.sources.lock();
            let mut result = CommandOutcome::Rejected(SourceResult::PathInvalid);
            for entry in guard.iter() {
                if entry.disabled {
                    continue;
                }
                match entry.source.playlist_remove(vp) {
                    SourceResult::Ok => {
                        result = CommandOutcome::Done;
                        break;
                    }
                    SourceResult::PathInvalid => continue,
                    SourceResult::Error => {
                        result = CommandOutcome::Rejected(SourceResult::Error);
                        break;
                    }
                }
            }
            result
        };
        if matches!(outcome, CommandOutcome::Done) {
            self.debouncer.trigger(EventMask::STORED_PLAYLIST).await;
        }
        outcome
    }

    fn mutate_queue_add(
        &self,
        path: &str,
        position: i32,
        reshuffle: bool,
        item_id: i32,
    ) -> CommandOutcome {
        if self.is_scanning() {
            return CommandOutcome::Rejected(SourceResult::Error);
        }
        let guard = self.sources.lock();
        for entry in guard.iter() {
            if entry.disabled {
                continue;
            }
            match entry.source.queue_item_add(path, position, reshuffle, item_id) {
                Ok((count, new_id)) => {
                    return CommandOutcome::QueueItemAdded { count, new_id }
                }
                Err(SourceResult::PathInvalid) => continue,
                Err(other) => return CommandOutcome::Rejected(other),
            }
        }
        CommandOutcome::Rejected(SourceResult::PathInvalid)
    }

    async fn mutate_queue_save(&self, vp: &str) -> CommandOutcome {
        if self.is_scanning() {
            return CommandOutcome::Rejected(SourceResult::Error);
        }
        let outcome = {
            let guard = self.sources.lock();
            let mut result = CommandOutcome::Rejected(SourceResult::PathInvalid);
            for entry in guard.iter() {
                if entry.disabled {
                    continue;
                }
                match entry.source.queue_save(vp) {
                    SourceResult::Ok => {
                        result = CommandOutcome::Done;
                        break;
                    }
                    SourceResult::PathInvalid => continue,
                    SourceResult::Error => {
                        result = CommandOutcome::Rejected(SourceResult::Error);
                        break;
                    }
                }
            }
            result
        };
        if matches!(outcome, CommandOutcome::Done) {
            self.debouncer.trigger(EventMask::STORED_PLAYLIST).await;
        }
        outcome
    }

    fn mutate_rss_add(&self, name: &str, url: &str, limit: Option<u32>) -> CommandOutcome {
        match self.database.rss_add(name, url, limit) {
            SourceResult::Ok => CommandOutcome::Done,
            other => CommandOutcome::Rejected(other),
        }
    }

    fn mutate_rss_remove(&self, url: &str) -> CommandOutcome {
        match self.database.rss_remove(url) {
            SourceResult::Ok => CommandOutcome::Done,
            other => CommandOutcome::Rejected(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::events::LoggingListenerBus;
    use crate::library::source::LibrarySource;
    use std::sync::atomic::AtomicU32;

    struct CountingSource {
        scans: AtomicU32,
    }

    impl LibrarySource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }
        fn init(&self) -> SourceResult {
            SourceResult::Ok
        }
        fn initscan(&self) -> SourceResult {
            SourceResult::Ok
        }
        fn rescan(&self) -> SourceResult {
            self.scans.fetch_add(1, Ordering::SeqCst);
            SourceResult::Ok
        }
        fn metarescan(&self) -> SourceResult {
            SourceResult::Ok
        }
        fn fullrescan(&self) -> SourceResult {
            SourceResult::Ok
        }
    }

    fn test_coordinator() -> Arc<LibraryCoordinator> {
        let config = LibraryConfig::default();
        LibraryCoordinator::new(
            config,
            Arc::new(LoggingListenerBus),
            Arc::new(NullDatabase),
        )
    }

    #[tokio::test]
    async fn rescan_invokes_enabled_sources() {
        let coordinator = test_coordinator();
        coordinator.register_source(Box::new(CountingSource {
            scans: AtomicU32::new(0),
        }));

        tokio::spawn(coordinator.clone().run());
        coordinator
            .command_queue()
            .exec_sync(Command::Rescan)
            .await
            .expect("rescan completes");

        assert!(!coordinator.is_scanning());
    }

    #[tokio::test]
    async fn concurrent_rescan_is_rejected() {
        let coordinator = test_coordinator();
        coordinator.scanning.store(true, Ordering::SeqCst);

        let outcome = coordinator.run_scan_if_idle(ScanKind::Rescan).await;
        assert!(matches!(outcome, CommandOutcome::Rejected(_)));
    }

    #[tokio::test]
    async fn mutation_rejected_while_scanning() {
        let coordinator = test_coordinator();
        coordinator.scanning.store(true, Ordering::SeqCst);

        let outcome = coordinator.mutate_playlist_add("vp", "item").await;
        assert!(matches!(outcome, CommandOutcome::Rejected(_)));
    }

    /// A fake `Database` that records the wipe sequence and hands back a
    /// seeded RSS snapshot, for the full-rescan-preserves-RSS scenario.
    struct RecordingDatabase {
        rss_items: Vec<(String, String, Option<u32>)>,
        purged_all: AtomicBool,
        restored: SyncMutex<Vec<(String, String, Option<u32>)>>,
        stopped_playback: AtomicBool,
        cleared_queue: AtomicBool,
    }

    impl Database for RecordingDatabase {
        fn purge_cruft(&self, _since_unix_millis: u64) {}
        fn post_scan_hook(&self) {}
        fn stop_playback(&self) {
            self.stopped_playback.store(true, Ordering::SeqCst);
        }
        fn clear_queue(&self) {
            self.cleared_queue.store(true, Ordering::SeqCst);
        }
        fn snapshot_rss_items(&self) -> Vec<(String, String, Option<u32>)> {
            self.rss_items.clone()
        }
        fn purge_all_library_tables(&self) {
            self.purged_all.store(true, Ordering::SeqCst);
        }
        fn restore_rss_snapshot(&self, items: Vec<(String, String, Option<u32>)>) {
            *self.restored.lock() = items;
        }
        fn rss_add(&self, _name: &str, _url: &str, _limit: Option<u32>) -> SourceResult {
            SourceResult::Ok
        }
        fn rss_remove(&self, _url: &str) -> SourceResult {
            SourceResult::Ok
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fullrescan_preserves_rss_snapshot_and_notifies_once() {
        let bus = RecordingBusCounter::new();
        let database = Arc::new(RecordingDatabase {
            rss_items: vec![("rss-a".into(), "http://a".into(), None)],
            purged_all: AtomicBool::new(false),
            restored: SyncMutex::new(Vec::new()),
            stopped_playback: AtomicBool::new(false),
            cleared_queue: AtomicBool::new(false),
        });
        let config = LibraryConfig::default();
        let debounce_window_ms = config.debounce_window_ms;
        let coordinator = LibraryCoordinator::new(config, bus.clone(), database.clone());
        coordinator.register_source(Box::new(CountingSource {
            scans: AtomicU32::new(0),
        }));

        tokio::spawn(coordinator.clone().run());
        coordinator
            .command_queue()
            .exec_sync(Command::FullRescan)
            .await
            .expect("fullrescan completes");

        assert!(database.stopped_playback.load(Ordering::SeqCst));
        assert!(database.cleared_queue.load(Ordering::SeqCst));
        assert!(database.purged_all.load(Ordering::SeqCst));
        assert_eq!(database.restored.lock().len(), 1);
        assert_eq!(database.restored.lock()[0].0, "rss-a");
        assert!(!coordinator.is_scanning());

        // Scan completion flushes immediately rather than joining the next
        // debounce window, so the notification is already in by the time
        // `exec_sync` returns — no time needs to advance.
        assert_eq!(bus.notify_count.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(debounce_window_ms + 100)).await;
        tokio::task::yield_now().await;
        assert_eq!(bus.notify_count.load(Ordering::SeqCst), 1);
    }

    struct RecordingBusCounter {
        notify_count: AtomicU32,
        last_mask: SyncMutex<EventMask>,
    }

    impl RecordingBusCounter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                notify_count: AtomicU32::new(0),
                last_mask: SyncMutex::new(EventMask::NONE),
            })
        }
    }

    impl ListenerBus for RecordingBusCounter {
        fn notify(&self, mask: EventMask) {
            self.notify_count.fetch_add(1, Ordering::SeqCst);
            *self.last_mask.lock() = mask;
        }
    }

    struct PlaylistAcceptingSource;

    impl LibrarySource for PlaylistAcceptingSource {
        fn name(&self) -> &str {
            "playlist-accepting"
        }
        fn init(&self) -> SourceResult {
            SourceResult::Ok
        }
        fn initscan(&self) -> SourceResult {
            SourceResult::Ok
        }
        fn rescan(&self) -> SourceResult {
            SourceResult::Ok
        }
        fn metarescan(&self) -> SourceResult {
            SourceResult::Ok
        }
        fn fullrescan(&self) -> SourceResult {
            SourceResult::Ok
        }
        fn playlist_item_add(&self, _playlist_vp: &str, _item_vp: &str) -> SourceResult {
            SourceResult::Ok
        }
        fn playlist_remove(&self, _vp: &str) -> SourceResult {
            SourceResult::Ok
        }
        fn queue_save(&self, _vp: &str) -> SourceResult {
            SourceResult::Ok
        }
    }

    #[tokio::test(start_paused = true)]
    async fn successful_playlist_and_queue_mutations_trigger_stored_playlist_event() {
        let bus = RecordingBusCounter::new();
        let config = LibraryConfig::default();
        let debounce_window_ms = config.debounce_window_ms;
        let coordinator = LibraryCoordinator::new(config, bus.clone(), Arc::new(NullDatabase));
        coordinator.register_source(Box::new(PlaylistAcceptingSource));

        let outcome = coordinator.mutate_playlist_add("playlist", "item").await;
        assert!(matches!(outcome, CommandOutcome::Done));
        tokio::time::advance(Duration::from_millis(debounce_window_ms + 100)).await;
        tokio::task::yield_now().await;
        assert_eq!(bus.notify_count.load(Ordering::SeqCst), 1);
        assert!(bus.last_mask.lock().contains(EventMask::STORED_PLAYLIST));

        let outcome = coordinator.mutate_playlist_remove("playlist").await;
        assert!(matches!(outcome, CommandOutcome::Done));
        tokio::time::advance(Duration::from_millis(debounce_window_ms + 100)).await;
        tokio::task::yield_now().await;
        assert_eq!(bus.notify_count.load(Ordering::SeqCst), 2);
        assert!(bus.last_mask.lock().contains(EventMask::STORED_PLAYLIST));

        let outcome = coordinator.mutate_queue_save("queue").await;
        assert!(matches!(outcome, CommandOutcome::Done));
        tokio::time::advance(Duration::from_millis(debounce_window_ms + 100)).await;
        tokio::task::yield_now().await;
        assert_eq!(bus.notify_count.load(Ordering::SeqCst), 3);
        assert!(bus.last_mask.lock().contains(EventMask::STORED_PLAYLIST));
    }

    #[tokio::test]
    async fn rss_add_and_remove_dispatch_through_the_database_hook() {
        let coordinator = test_coordinator();

        let outcome = coordinator.mutate_rss_add("Feed", "http://feed.example/rss", Some(20));
        assert!(matches!(outcome, CommandOutcome::Done));

        let outcome = coordinator.mutate_rss_remove("http://feed.example/rss");
        assert!(matches!(outcome, CommandOutcome::Done));
    }

    #[tokio::test]
    async fn rss_add_convenience_method_round_trips_through_command_queue() {
        let coordinator = test_coordinator();
        tokio::spawn(coordinator.clone().run());

        coordinator
            .rss_add("Feed".into(), "http://feed.example/rss".into(), None)
            .await
            .expect("rss_add enqueued");
        coordinator
            .rss_remove("http://feed.example/rss".into())
            .await
            .expect("rss_remove enqueued");
    }
}
