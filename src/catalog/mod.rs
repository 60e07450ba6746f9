// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Durable storage of podcasts and episodes.
//!
//! A catalog must reject a second episode with the same audio URL for the
//! same podcast, reporting it per item as [`CatalogError::UniqueViolation`].
//! The sync engine relies on that as its last line of defence when two syncs
//! of the same podcast race.

mod memory;
mod sqlite;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CatalogError;
use crate::model::{EpisodeCandidate, EpisodeRecord, NewPodcast, PodcastId, PodcastMeta};

pub use memory::MemoryCatalog;
pub use sqlite::SqliteCatalog;

/// Outcome of inserting a single episode
pub type InsertResult = Result<EpisodeRecord, CatalogError>;

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_podcast(&self, id: PodcastId) -> Result<Option<PodcastMeta>, CatalogError>;

    /// All podcasts ordered by id
    async fn list_podcasts(&self) -> Result<Vec<PodcastMeta>, CatalogError>;

    /// Podcasts with a non-empty feed URL, ordered by id
    async fn list_podcasts_with_feed(&self) -> Result<Vec<PodcastMeta>, CatalogError>;

    async fn list_episode_audio_urls(
        &self,
        podcast_id: PodcastId,
    ) -> Result<HashSet<String>, CatalogError>;

    /// Episodes of a podcast, newest publish date first, undated last
    async fn list_episodes(&self, podcast_id: PodcastId)
    -> Result<Vec<EpisodeRecord>, CatalogError>;

    async fn create_podcast(&self, podcast: &NewPodcast) -> Result<PodcastId, CatalogError>;

    async fn upsert_podcast(&self, podcast: &PodcastMeta) -> Result<(), CatalogError>;

    /// Insert episodes in order.
    ///
    /// The outer error aborts the whole write; inner errors are per episode,
    /// most notably [`CatalogError::UniqueViolation`].
    async fn insert_episodes(
        &self,
        podcast_id: PodcastId,
        candidates: &[EpisodeCandidate],
        created_at: DateTime<Utc>,
    ) -> Result<Vec<InsertResult>, CatalogError>;

    /// Persist the updated podcast and its new episodes as one logical write
    async fn commit_sync(
        &self,
        podcast: &PodcastMeta,
        candidates: &[EpisodeCandidate],
        created_at: DateTime<Utc>,
    ) -> Result<Vec<InsertResult>, CatalogError> {
        self.upsert_podcast(podcast).await?;
        self.insert_episodes(podcast.id, candidates, created_at)
            .await
    }
}
