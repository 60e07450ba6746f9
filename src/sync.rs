// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use tracing::{debug, error, info, instrument, warn};

use crate::catalog::Catalog;
use crate::clock::{SharedClock, SystemClock};
use crate::error::SyncError;
use crate::feed::{FeedDocument, FeedSource};
use crate::model::{NewPodcast, PodcastId, PodcastMeta, SweepReport, SyncOutcome};
use crate::normalize::normalize;
use crate::progress::{NoopReporter, ProgressEvent, SharedProgressReporter};
use crate::reconcile::reconcile;

/// Drives feed ingestion for single podcasts, imports, and catalog-wide sweeps
pub struct SyncEngine<S, C> {
    source: S,
    catalog: C,
    clock: SharedClock,
    reporter: SharedProgressReporter,
}

impl<S: FeedSource, C: Catalog> SyncEngine<S, C> {
    pub fn new(source: S, catalog: C) -> Self {
        Self {
            source,
            catalog,
            clock: SystemClock::shared(),
            reporter: NoopReporter::shared(),
        }
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_reporter(mut self, reporter: SharedProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Sync one podcast, never failing the caller.
    ///
    /// A missing podcast or one without a feed URL is an expected outcome and
    /// yields `succeeded: false` without an error log. Any other failure is
    /// logged and folded into the outcome.
    pub async fn sync_podcast(&self, podcast_id: PodcastId) -> SyncOutcome {
        match self.try_sync_podcast(podcast_id).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_not_found() => {
                debug!(podcast_id, reason = %e, "nothing to sync");
                SyncOutcome::failure(podcast_id, e)
            }
            Err(e) => {
                error!(podcast_id, error = %e, "failed to sync podcast");
                self.reporter.report(ProgressEvent::PodcastFailed {
                    podcast_id,
                    error: e.to_string(),
                });
                SyncOutcome::failure(podcast_id, e)
            }
        }
    }

    /// Sync one podcast, returning the typed error on failure
    #[instrument(skip(self))]
    pub async fn try_sync_podcast(&self, podcast_id: PodcastId) -> Result<SyncOutcome, SyncError> {
        let podcast = self
            .catalog
            .get_podcast(podcast_id)
            .await?
            .ok_or(SyncError::PodcastNotFound(podcast_id))?;

        let feed_url = match podcast.feed_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => return Err(SyncError::NoFeedUrl(podcast_id)),
        };

        self.reporter.report(ProgressEvent::FetchingFeed {
            podcast_id: Some(podcast_id),
            url: feed_url.clone(),
        });
        let doc = self.source.fetch(&feed_url).await?;

        self.sync_with_document(podcast, &doc).await
    }

    /// Normalize, reconcile and persist one fetched document for a podcast.
    ///
    /// Shared by sync and import so both ingest with identical semantics.
    async fn sync_with_document(
        &self,
        mut podcast: PodcastMeta,
        doc: &FeedDocument,
    ) -> Result<SyncOutcome, SyncError> {
        let normalized = normalize(doc, podcast.artwork_url.as_deref());
        let now = self.clock.now();
        podcast.apply_feed(&normalized.podcast, now);

        // Read immediately before writing; the catalog's uniqueness guarantee
        // covers whatever a concurrent sync inserts in between.
        let existing = self.catalog.list_episode_audio_urls(podcast.id).await?;
        let plan = reconcile(podcast.id, &existing, normalized.episodes);

        self.reporter.report(ProgressEvent::FeedReconciled {
            podcast_id: podcast.id,
            podcast_title: podcast.title.clone(),
            total_episodes: plan.total_candidates,
            new_episodes: plan.to_insert.len(),
        });

        let results = self
            .catalog
            .commit_sync(&podcast, &plan.to_insert, now)
            .await?;

        let mut episodes_added = 0;
        let mut duplicates_skipped = 0;
        for result in results {
            match result {
                Ok(_) => episodes_added += 1,
                Err(e) if e.is_unique_violation() => {
                    debug!(podcast_id = podcast.id, error = %e, "episode already ingested");
                    duplicates_skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            podcast_id = podcast.id,
            title = %podcast.title,
            added = episodes_added,
            duplicates_skipped,
            "synced podcast"
        );
        self.reporter.report(ProgressEvent::PodcastSynced {
            podcast_id: podcast.id,
            podcast_title: podcast.title.clone(),
            episodes_added,
        });

        Ok(SyncOutcome::success(
            podcast.id,
            episodes_added,
            duplicates_skipped,
        ))
    }

    /// Sync every podcast that has a feed URL, one after another.
    ///
    /// A failing podcast is recorded in the report and the sweep moves on.
    /// Only failing to list the podcasts at all is returned as an error.
    #[instrument(skip(self))]
    pub async fn sync_all_podcasts(&self) -> Result<SweepReport, SyncError> {
        info!(at = %self.clock.now(), "starting catalog sweep");

        let podcasts = self
            .catalog
            .list_podcasts_with_feed()
            .await
            .inspect_err(|e| error!(error = %e, "catalog sweep aborted"))?;

        info!(count = podcasts.len(), "found podcasts to sync");
        self.reporter.report(ProgressEvent::SweepStarted {
            total_podcasts: podcasts.len(),
        });

        let mut report = SweepReport::default();
        for podcast in podcasts {
            let outcome = self.sync_podcast(podcast.id).await;
            if !outcome.succeeded {
                warn!(
                    podcast_id = podcast.id,
                    title = %podcast.title,
                    "podcast sync failed, continuing sweep"
                );
            }
            report.outcomes.push(outcome);
        }

        info!(
            at = %self.clock.now(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            added = report.episodes_added(),
            "completed catalog sweep"
        );
        self.reporter.report(ProgressEvent::SweepCompleted {
            succeeded: report.succeeded(),
            failed: report.failed(),
            episodes_added: report.episodes_added(),
        });

        Ok(report)
    }

    /// Create a podcast from a feed and ingest its episodes.
    ///
    /// Unlike a sweep, every failure here reaches the caller.
    #[instrument(skip(self))]
    pub async fn import_from_feed(&self, feed_url: &str) -> Result<PodcastId, SyncError> {
        self.try_import(feed_url)
            .await
            .inspect_err(|e| error!(feed_url, error = %e, "failed to import podcast"))
    }

    async fn try_import(&self, feed_url: &str) -> Result<PodcastId, SyncError> {
        self.reporter.report(ProgressEvent::FetchingFeed {
            podcast_id: None,
            url: feed_url.to_string(),
        });
        let doc = self.source.fetch(feed_url).await?;

        let seed = normalize(&doc, None).podcast;
        let podcast_id = self
            .catalog
            .create_podcast(&NewPodcast::from_feed(&seed, feed_url, self.clock.now()))
            .await?;
        info!(podcast_id, feed_url, "created podcast from feed");

        let podcast = self
            .catalog
            .get_podcast(podcast_id)
            .await?
            .ok_or(SyncError::PodcastNotFound(podcast_id))?;
        self.sync_with_document(podcast, &doc).await?;

        Ok(podcast_id)
    }
}
