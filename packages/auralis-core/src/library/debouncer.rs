//! Update Debouncer: coalesces bursts of database-change notifications
//! into a single listener event, five seconds after the last trigger.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

use super::events::{EventMask, ListenerBus};

/// `(counter, accumulated_event_mask)` — the deferred update state named in
/// the data model. The counter exists only to distinguish "timer armed" (>0)
/// from "idle" (0) when inspected by tests; firing always resets both.
struct DeferredState {
    counter: u32,
    mask: EventMask,
    generation: u64,
}

/// One-shot, re-armable debounce timer. `trigger()` accumulates an event
/// mask and (re)starts a `window` timer; when the timer elapses without a
/// further trigger, the accumulated mask is delivered to `listeners` and
/// the state resets to idle.
pub struct UpdateDebouncer {
    state: Arc<Mutex<DeferredState>>,
    window: Duration,
    listeners: Arc<dyn ListenerBus>,
}

impl UpdateDebouncer {
    pub fn new(window: Duration, listeners: Arc<dyn ListenerBus>) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeferredState {
                counter: 0,
                mask: EventMask::NONE,
                generation: 0,
            })),
            window,
            listeners,
        }
    }

    /// Accumulates `mask` and (re)arms the timer. Spawns a fresh delayed
    /// task each call; a stale task recognizes it has been superseded by
    /// comparing its captured generation against the current one when it
    /// wakes, and does nothing if another trigger arrived first.
    pub async fn trigger(&self, mask: EventMask) {
        let generation = {
            let mut state = self.state.lock().await;
            state.counter += 1;
            state.mask |= mask;
            state.generation += 1;
            state.generation
        };

        let state = self.state.clone();
        let listeners = self.listeners.clone();
        let window = self.window;
        tokio::spawn(async move {
            sleep(window).await;
            let mut guard = state.lock().await;
            if guard.generation != generation {
                return; // a newer trigger superseded this timer
            }
            let mask = guard.mask;
            guard.counter = 0;
            guard.mask = EventMask::NONE;
            drop(guard);
            listeners.notify(mask);
        });
    }

    /// True if the timer is currently armed (a trigger happened and its
    /// window has not yet elapsed).
    pub async fn is_armed(&self) -> bool {
        self.state.lock().await.counter > 0
    }

    /// Notifies `listeners` immediately with `mask` unioned against whatever
    /// is currently accumulated, bypassing the debounce window entirely.
    /// Bumping the generation first supersedes any in-flight delayed task,
    /// so a timer that was already armed does not also fire later with a
    /// stale, already-delivered mask. Used at scan completion, where §4.4
    /// requires the notification to flush immediately rather than join the
    /// next debounce window.
    pub async fn flush_now(&self, mask: EventMask) {
        let (mask, listeners) = {
            let mut state = self.state.lock().await;
            state.generation += 1;
            let combined = state.mask | mask;
            state.counter = 0;
            state.mask = EventMask::NONE;
            (combined, self.listeners.clone())
        };
        listeners.notify(mask);
    }
}

/// Scan-time accumulator: events posted during a scan must not arm the
/// debounce timer at all — scan completion flushes them directly. This is
/// a plain accumulator with no timer, used by the coordinator while
/// `scanning` is true.
#[derive(Default)]
pub struct ScanEventAccumulator {
    mask: std::sync::Mutex<EventMask>,
}

impl ScanEventAccumulator {
    pub fn accumulate(&self, mask: EventMask) {
        *self.mask.lock().unwrap() |= mask;
    }

    /// Drains and returns the accumulated mask, resetting to none.
    pub fn take(&self) -> EventMask {
        std::mem::take(&mut *self.mask.lock().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU8, Ordering};

    struct RecordingBus {
        notified_mask: AtomicU8,
        notify_count: AtomicU8,
    }

    impl RecordingBus {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                notified_mask: AtomicU8::new(0),
                notify_count: AtomicU8::new(0),
            })
        }
    }

    impl ListenerBus for RecordingBus {
        fn notify(&self, mask: EventMask) {
            self.notified_mask.store(mask_bits(mask), Ordering::SeqCst);
            self.notify_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn mask_bits(mask: EventMask) -> u8 {
        let mut bits = 0u8;
        if mask.contains(EventMask::PLAYER) {
            bits |= 1;
        }
        if mask.contains(EventMask::UPDATE) {
            bits |= 2;
        }
        if mask.contains(EventMask::DATABASE) {
            bits |= 4;
        }
        if mask.contains(EventMask::STORED_PLAYLIST) {
            bits |= 8;
        }
        bits
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_triggers_yields_single_notification() {
        let bus = RecordingBus::new();
        let debouncer = UpdateDebouncer::new(Duration::from_secs(5), bus.clone());

        for _ in 0..10 {
            debouncer.trigger(EventMask::DATABASE).await;
            tokio::time::advance(Duration::from_millis(200)).await;
        }

        assert_eq!(bus.notify_count.load(Ordering::SeqCst), 0);
        tokio::time::advance(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;

        assert_eq!(bus.notify_count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.notified_mask.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn accumulates_union_of_masks() {
        let bus = RecordingBus::new();
        let debouncer = UpdateDebouncer::new(Duration::from_secs(5), bus.clone());

        debouncer.trigger(EventMask::DATABASE).await;
        debouncer.trigger(EventMask::STORED_PLAYLIST).await;

        tokio::time::advance(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;

        assert_eq!(bus.notified_mask.load(Ordering::SeqCst), 4 | 8);
    }

    #[test]
    fn scan_accumulator_collects_without_timer() {
        let accumulator = ScanEventAccumulator::default();
        accumulator.accumulate(EventMask::UPDATE);
        accumulator.accumulate(EventMask::DATABASE);
        let drained = accumulator.take();
        assert!(drained.contains(EventMask::UPDATE));
        assert!(drained.contains(EventMask::DATABASE));
        assert!(accumulator.take().is_none());
    }
}
