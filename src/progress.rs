// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use crate::model::PodcastId;

/// Events emitted during syncs and sweeps for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A sweep is starting
    SweepStarted { total_podcasts: usize },

    /// Feed is being fetched
    FetchingFeed {
        /// None while importing, before the podcast exists
        podcast_id: Option<PodcastId>,
        url: String,
    },

    /// Feed has been reconciled against the catalog
    FeedReconciled {
        podcast_id: PodcastId,
        podcast_title: String,
        total_episodes: usize,
        new_episodes: usize,
    },

    /// A podcast finished syncing
    PodcastSynced {
        podcast_id: PodcastId,
        podcast_title: String,
        episodes_added: usize,
    },

    /// A podcast could not be synced
    PodcastFailed { podcast_id: PodcastId, error: String },

    /// Sweep finished; per-podcast failures are counted, not fatal
    SweepCompleted {
        succeeded: usize,
        failed: usize,
        episodes_added: usize,
    },
}

/// Trait for reporting progress events during synchronization.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingReporter {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressReporter for CountingReporter {
        fn report(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn noop_reporter_handles_all_events() {
        let reporter = NoopReporter;

        reporter.report(ProgressEvent::SweepStarted { total_podcasts: 3 });
        reporter.report(ProgressEvent::FetchingFeed {
            podcast_id: None,
            url: "https://example.com/feed.xml".to_string(),
        });
        reporter.report(ProgressEvent::FeedReconciled {
            podcast_id: 1,
            podcast_title: "Test Podcast".to_string(),
            total_episodes: 10,
            new_episodes: 5,
        });
        reporter.report(ProgressEvent::PodcastSynced {
            podcast_id: 1,
            podcast_title: "Test Podcast".to_string(),
            episodes_added: 5,
        });
        reporter.report(ProgressEvent::PodcastFailed {
            podcast_id: 2,
            error: "Connection timeout".to_string(),
        });
        reporter.report(ProgressEvent::SweepCompleted {
            succeeded: 2,
            failed: 1,
            episodes_added: 5,
        });
    }

    #[test]
    fn shared_reporter_is_usable_through_arc() {
        let reporter = Arc::new(CountingReporter::default());
        let shared: SharedProgressReporter = reporter.clone();

        shared.report(ProgressEvent::SweepStarted { total_podcasts: 0 });

        assert_eq!(reporter.events.lock().unwrap().len(), 1);
    }
}
