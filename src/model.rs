// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable catalog identifier of a podcast
pub type PodcastId = i64;

/// Catalog identifier of an episode
pub type EpisodeId = i64;

/// A podcast as stored in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodcastMeta {
    pub id: PodcastId,
    pub title: String,
    pub author: String,
    pub description: String,
    pub artwork_url: Option<String>,
    pub language: Option<String>,
    pub feed_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl PodcastMeta {
    /// Overwrite fields the feed supplied a non-empty value for and stamp the sync time.
    ///
    /// Absent or empty feed values never erase what the catalog already has.
    pub fn apply_feed(&mut self, feed: &FeedPodcastMeta, synced_at: DateTime<Utc>) {
        if let Some(title) = non_empty(&feed.title) {
            self.title = title.to_string();
        }
        if let Some(description) = non_empty(&feed.description) {
            self.description = description.to_string();
        }
        if let Some(artwork_url) = non_empty(&feed.artwork_url) {
            self.artwork_url = Some(artwork_url.to_string());
        }
        if let Some(language) = non_empty(&feed.language) {
            self.language = Some(language.to_string());
        }
        if !feed.author.trim().is_empty() {
            self.author = feed.author.clone();
        }
        self.last_synced_at = Some(synced_at);
    }

    pub fn has_feed_url(&self) -> bool {
        self.feed_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Podcast-level fields as read from a feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedPodcastMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub artwork_url: Option<String>,
    pub language: Option<String>,
    /// Podcast author, or the first item's author, or empty
    pub author: String,
}

/// Fields needed to create a podcast record on first import
#[derive(Debug, Clone, PartialEq)]
pub struct NewPodcast {
    pub title: String,
    pub author: String,
    pub description: String,
    pub artwork_url: Option<String>,
    pub language: Option<String>,
    pub feed_url: String,
    pub created_at: DateTime<Utc>,
}

impl NewPodcast {
    /// Seed a podcast from freshly normalized feed metadata
    pub fn from_feed(feed: &FeedPodcastMeta, feed_url: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            title: non_empty(&feed.title)
                .unwrap_or("Untitled Podcast")
                .to_string(),
            author: feed.author.clone(),
            description: feed.description.clone().unwrap_or_default(),
            artwork_url: feed.artwork_url.clone(),
            language: feed.language.clone(),
            feed_url: feed_url.to_string(),
            created_at,
        }
    }
}

/// An episode extracted from a feed during one sync run; not persisted as-is
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeCandidate {
    pub title: String,
    pub description: Option<String>,
    /// De-duplication key within a podcast
    pub audio_url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub episode_number: Option<u32>,
    pub season_number: Option<u32>,
    pub duration_seconds: Option<u32>,
    pub artwork_url: Option<String>,
}

/// A persisted episode. Never rewritten once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub id: EpisodeId,
    pub podcast_id: PodcastId,
    pub title: String,
    pub description: Option<String>,
    pub audio_url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub episode_number: Option<u32>,
    pub season_number: Option<u32>,
    pub duration_seconds: Option<u32>,
    pub artwork_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EpisodeRecord {
    pub fn from_candidate(
        id: EpisodeId,
        podcast_id: PodcastId,
        candidate: &EpisodeCandidate,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            podcast_id,
            title: candidate.title.clone(),
            description: candidate.description.clone(),
            audio_url: candidate.audio_url.clone(),
            published_at: candidate.published_at,
            episode_number: candidate.episode_number,
            season_number: candidate.season_number,
            duration_seconds: candidate.duration_seconds,
            artwork_url: candidate.artwork_url.clone(),
            created_at,
        }
    }
}

/// Result of syncing one podcast. Reported, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub podcast_id: PodcastId,
    pub episodes_added: usize,
    /// Inserts rejected by the catalog because the episode already existed
    pub duplicates_skipped: usize,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncOutcome {
    pub fn success(podcast_id: PodcastId, episodes_added: usize, duplicates_skipped: usize) -> Self {
        Self {
            podcast_id,
            episodes_added,
            duplicates_skipped,
            succeeded: true,
            error: None,
        }
    }

    pub fn failure(podcast_id: PodcastId, error: impl ToString) -> Self {
        Self {
            podcast_id,
            episodes_added: 0,
            duplicates_skipped: 0,
            succeeded: false,
            error: Some(error.to_string()),
        }
    }
}

/// Per-podcast outcomes of one catalog sweep, in sweep order
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub outcomes: Vec<SyncOutcome>,
}

impl SweepReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn episodes_added(&self) -> usize {
        self.outcomes.iter().map(|o| o.episodes_added).sum()
    }
}
