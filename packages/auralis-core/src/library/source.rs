//! Library source descriptors: the pluggable scanners (local filesystem,
//! remote service, RSS feed, …) the coordinator iterates during a scan and
//! consults in order for mutation commands.

use crate::error::SourceResult;

/// One registered scanner.
///
/// Mandatory scan methods (`initscan`/`rescan`/`metarescan`/`fullrescan`)
/// must be present; a source missing one is a construction-time error, not
/// a runtime one (see [`super::coordinator::LibraryCoordinator::register_source`]).
/// The four mutation methods are optional: a source that doesn't support
/// playlists or the play queue simply returns `PathInvalid` and the
/// coordinator falls through to the next source.
pub trait LibrarySource: Send + Sync {
    /// Stable name used in logs and error messages.
    fn name(&self) -> &str;

    /// One-time setup. A failure here sets `disabled` and the source is
    /// skipped by every future scan, but remains in the registry.
    fn init(&self) -> SourceResult;

    fn deinit(&self) {}

    /// Registers this source's event callbacks with its backing service.
    /// A failure here also sets `disabled`, same as `init`.
    fn register_events(&self) -> SourceResult {
        SourceResult::Ok
    }

    fn initscan(&self) -> SourceResult;
    fn rescan(&self) -> SourceResult;
    fn metarescan(&self) -> SourceResult;
    fn fullrescan(&self) -> SourceResult;

    fn playlist_item_add(&self, _playlist_vp: &str, _item_vp: &str) -> SourceResult {
        SourceResult::PathInvalid
    }

    fn playlist_remove(&self, _vp: &str) -> SourceResult {
        SourceResult::PathInvalid
    }

    fn queue_item_add(
        &self,
        _path: &str,
        _position: i32,
        _reshuffle: bool,
        _item_id: i32,
    ) -> Result<(u32, u32), SourceResult> {
        Err(SourceResult::PathInvalid)
    }

    fn queue_save(&self, _vp: &str) -> SourceResult {
        SourceResult::PathInvalid
    }
}

/// Registry entry wrapping a [`LibrarySource`] with its runtime disabled
/// flag, set when `init` or `register_events` fails.
pub struct RegisteredSource {
    pub source: Box<dyn LibrarySource>,
    pub disabled: bool,
}

impl RegisteredSource {
    /// Constructs and runs `init`/`register_events`, setting `disabled` on
    /// the first failure per the component design.
    pub fn initialize(source: Box<dyn LibrarySource>) -> Self {
        let init_ok = matches!(source.init(), SourceResult::Ok);
        let events_ok = init_ok && matches!(source.register_events(), SourceResult::Ok);
        let disabled = !(init_ok && events_ok);
        if disabled {
            log::warn!("library source '{}' disabled during init", source.name());
        }
        Self { source, disabled }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSource {
        name: String,
        init_result: SourceResult,
    }

    impl LibrarySource for FakeSource {
        fn name(&self) -> &str {
            &self.name
        }
        fn init(&self) -> SourceResult {
            self.init_result
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
    }

    #[test]
    fn failed_init_disables_source() {
        let registered = RegisteredSource::initialize(Box::new(FakeSource {
            name: "broken".into(),
            init_result: SourceResult::Error,
        }));
        assert!(registered.disabled);
    }

    #[test]
    fn successful_init_enables_source() {
        let registered = RegisteredSource::initialize(Box::new(FakeSource {
            name: "local".into(),
            init_result: SourceResult::Ok,
        }));
        assert!(!registered.disabled);
    }
}
