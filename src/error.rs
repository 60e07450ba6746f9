// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::PodcastId;

/// Errors that can occur when fetching or parsing feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to read feed file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse feed: {0}")]
    ParseFailed(#[from] rss::Error),

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Errors reported by a catalog backend
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Episode with audio URL {audio_url} already exists for podcast {podcast_id}")]
    UniqueViolation {
        podcast_id: PodcastId,
        audio_url: String,
    },

    #[error("Podcast {0} does not exist")]
    PodcastNotFound(PodcastId),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to apply migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl CatalogError {
    /// Whether this error only means the episode was ingested before
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, CatalogError::UniqueViolation { .. })
    }
}

/// Top-level errors for sync and import operations
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Podcast {0} not found")]
    PodcastNotFound(PodcastId),

    #[error("Podcast {0} has no feed URL configured")]
    NoFeedUrl(PodcastId),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl SyncError {
    /// NotFound-class errors are an expected outcome, not a failure worth alerting on
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SyncError::PodcastNotFound(_) | SyncError::NoFeedUrl(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_variants_are_classified() {
        assert!(SyncError::PodcastNotFound(1).is_not_found());
        assert!(SyncError::NoFeedUrl(1).is_not_found());
        assert!(!SyncError::Catalog(CatalogError::PodcastNotFound(1)).is_not_found());
    }

    #[test]
    fn unique_violation_is_detected() {
        let err = CatalogError::UniqueViolation {
            podcast_id: 3,
            audio_url: "https://example.com/a.mp3".to_string(),
        };
        assert!(err.is_unique_violation());
        assert!(!CatalogError::PodcastNotFound(3).is_unique_violation());
    }
}
