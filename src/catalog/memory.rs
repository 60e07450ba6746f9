// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::CatalogError;
use crate::model::{
    EpisodeCandidate, EpisodeId, EpisodeRecord, NewPodcast, PodcastId, PodcastMeta,
};

use super::{Catalog, InsertResult};

/// Catalog kept entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    podcasts: BTreeMap<PodcastId, PodcastMeta>,
    episodes: Vec<EpisodeRecord>,
    last_podcast_id: PodcastId,
    last_episode_id: EpisodeId,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn get_podcast(&self, id: PodcastId) -> Result<Option<PodcastMeta>, CatalogError> {
        Ok(self.state.lock().await.podcasts.get(&id).cloned())
    }

    async fn list_podcasts(&self) -> Result<Vec<PodcastMeta>, CatalogError> {
        Ok(self.state.lock().await.podcasts.values().cloned().collect())
    }

    async fn list_podcasts_with_feed(&self) -> Result<Vec<PodcastMeta>, CatalogError> {
        Ok(self
            .state
            .lock()
            .await
            .podcasts
            .values()
            .filter(|p| p.has_feed_url())
            .cloned()
            .collect())
    }

    async fn list_episode_audio_urls(
        &self,
        podcast_id: PodcastId,
    ) -> Result<HashSet<String>, CatalogError> {
        Ok(self
            .state
            .lock()
            .await
            .episodes
            .iter()
            .filter(|e| e.podcast_id == podcast_id)
            .map(|e| e.audio_url.clone())
            .collect())
    }

    async fn list_episodes(
        &self,
        podcast_id: PodcastId,
    ) -> Result<Vec<EpisodeRecord>, CatalogError> {
        let mut episodes: Vec<EpisodeRecord> = self
            .state
            .lock()
            .await
            .episodes
            .iter()
            .filter(|e| e.podcast_id == podcast_id)
            .cloned()
            .collect();
        episodes.sort_by(|a, b| {
            b.published_at
                .is_some()
                .cmp(&a.published_at.is_some())
                .then(b.published_at.cmp(&a.published_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(episodes)
    }

    async fn create_podcast(&self, podcast: &NewPodcast) -> Result<PodcastId, CatalogError> {
        let mut state = self.state.lock().await;
        state.last_podcast_id += 1;
        let id = state.last_podcast_id;
        state.podcasts.insert(
            id,
            PodcastMeta {
                id,
                title: podcast.title.clone(),
                author: podcast.author.clone(),
                description: podcast.description.clone(),
                artwork_url: podcast.artwork_url.clone(),
                language: podcast.language.clone(),
                feed_url: Some(podcast.feed_url.clone()),
                created_at: podcast.created_at,
                last_synced_at: None,
            },
        );
        Ok(id)
    }

    async fn upsert_podcast(&self, podcast: &PodcastMeta) -> Result<(), CatalogError> {
        let mut state = self.state.lock().await;
        state.last_podcast_id = state.last_podcast_id.max(podcast.id);
        state.podcasts.insert(podcast.id, podcast.clone());
        Ok(())
    }

    async fn insert_episodes(
        &self,
        podcast_id: PodcastId,
        candidates: &[EpisodeCandidate],
        created_at: DateTime<Utc>,
    ) -> Result<Vec<InsertResult>, CatalogError> {
        let mut state = self.state.lock().await;
        if !state.podcasts.contains_key(&podcast_id) {
            return Err(CatalogError::PodcastNotFound(podcast_id));
        }

        let mut results = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let duplicate = state
                .episodes
                .iter()
                .any(|e| e.podcast_id == podcast_id && e.audio_url == candidate.audio_url);
            if duplicate {
                results.push(Err(CatalogError::UniqueViolation {
                    podcast_id,
                    audio_url: candidate.audio_url.clone(),
                }));
                continue;
            }

            state.last_episode_id += 1;
            let record =
                EpisodeRecord::from_candidate(state.last_episode_id, podcast_id, candidate, created_at);
            state.episodes.push(record.clone());
            results.push(Ok(record));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_podcast(feed_url: &str) -> NewPodcast {
        NewPodcast {
            title: "Show".to_string(),
            author: String::new(),
            description: String::new(),
            artwork_url: None,
            language: None,
            feed_url: feed_url.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn candidate(audio_url: &str, published_day: Option<u32>) -> EpisodeCandidate {
        EpisodeCandidate {
            title: audio_url.to_string(),
            description: None,
            audio_url: audio_url.to_string(),
            published_at: published_day
                .map(|day| Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()),
            episode_number: None,
            season_number: None,
            duration_seconds: None,
            artwork_url: None,
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_audio_url_per_podcast() {
        let catalog = MemoryCatalog::new();
        let first = catalog.create_podcast(&new_podcast("https://a/feed")).await.unwrap();
        let second = catalog.create_podcast(&new_podcast("https://b/feed")).await.unwrap();
        let now = Utc::now();

        catalog
            .insert_episodes(first, &[candidate("https://x/1.mp3", None)], now)
            .await
            .unwrap();
        let results = catalog
            .insert_episodes(
                first,
                &[candidate("https://x/1.mp3", None), candidate("https://x/2.mp3", None)],
                now,
            )
            .await
            .unwrap();

        assert!(matches!(results[0], Err(CatalogError::UniqueViolation { .. })));
        assert!(results[1].is_ok());

        // Same URL under another podcast is fine
        let other = catalog
            .insert_episodes(second, &[candidate("https://x/1.mp3", None)], now)
            .await
            .unwrap();
        assert!(other[0].is_ok());
    }

    #[tokio::test]
    async fn insert_for_unknown_podcast_fails() {
        let catalog = MemoryCatalog::new();
        let result = catalog
            .insert_episodes(42, &[candidate("https://x/1.mp3", None)], Utc::now())
            .await;
        assert!(matches!(result, Err(CatalogError::PodcastNotFound(42))));
    }

    #[tokio::test]
    async fn list_with_feed_skips_unconfigured_podcasts() {
        let catalog = MemoryCatalog::new();
        let with_feed = catalog.create_podcast(&new_podcast("https://a/feed")).await.unwrap();
        let without = catalog.create_podcast(&new_podcast("https://b/feed")).await.unwrap();

        let mut podcast = catalog.get_podcast(without).await.unwrap().unwrap();
        podcast.feed_url = Some(String::new());
        catalog.upsert_podcast(&podcast).await.unwrap();

        let ids: Vec<_> = catalog
            .list_podcasts_with_feed()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![with_feed]);
        assert_eq!(catalog.list_podcasts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_episodes_orders_newest_first() {
        let catalog = MemoryCatalog::new();
        let id = catalog.create_podcast(&new_podcast("https://a/feed")).await.unwrap();

        catalog
            .insert_episodes(
                id,
                &[
                    candidate("https://x/old.mp3", Some(1)),
                    candidate("https://x/undated.mp3", None),
                    candidate("https://x/new.mp3", Some(20)),
                ],
                Utc::now(),
            )
            .await
            .unwrap();

        let urls: Vec<_> = catalog
            .list_episodes(id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.audio_url)
            .collect();
        assert_eq!(
            urls,
            vec!["https://x/new.mp3", "https://x/old.mp3", "https://x/undated.mp3"]
        );
    }
}
