// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;

use tracing::debug;

use crate::model::{EpisodeCandidate, PodcastId};

/// Plan for one sync run, indicating which candidates are genuinely new
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    /// Candidates to insert, in feed order
    pub to_insert: Vec<EpisodeCandidate>,
    /// Candidates whose audio URL is already in the catalog
    pub already_present: usize,
    /// Candidates repeating an audio URL seen earlier in the same feed
    pub repeated_in_feed: usize,
    /// Total number of candidates considered
    pub total_candidates: usize,
}

/// Decide which candidates are new for a podcast.
///
/// The audio URL is the de-duplication key. The working set grows as
/// candidates are accepted, so a URL repeated within one feed is only
/// accepted once. Feed order is preserved.
pub fn reconcile(
    podcast_id: PodcastId,
    existing_audio_urls: &HashSet<String>,
    candidates: Vec<EpisodeCandidate>,
) -> ReconcilePlan {
    let total_candidates = candidates.len();
    let mut seen: HashSet<String> = HashSet::new();
    let mut plan = ReconcilePlan {
        total_candidates,
        ..Default::default()
    };

    for candidate in candidates {
        if existing_audio_urls.contains(&candidate.audio_url) {
            plan.already_present += 1;
            continue;
        }
        if !seen.insert(candidate.audio_url.clone()) {
            plan.repeated_in_feed += 1;
            continue;
        }
        plan.to_insert.push(candidate);
    }

    debug!(
        podcast_id,
        total = total_candidates,
        new = plan.to_insert.len(),
        already_present = plan.already_present,
        repeated = plan.repeated_in_feed,
        "reconciled feed against catalog"
    );

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, audio_url: &str) -> EpisodeCandidate {
        EpisodeCandidate {
            title: title.to_string(),
            description: None,
            audio_url: audio_url.to_string(),
            published_at: None,
            episode_number: None,
            season_number: None,
            duration_seconds: None,
            artwork_url: None,
        }
    }

    #[test]
    fn everything_is_new_for_empty_catalog() {
        let plan = reconcile(
            1,
            &HashSet::new(),
            vec![
                candidate("Ep 1", "https://example.com/1.mp3"),
                candidate("Ep 2", "https://example.com/2.mp3"),
            ],
        );

        assert_eq!(plan.to_insert.len(), 2);
        assert_eq!(plan.already_present, 0);
        assert_eq!(plan.total_candidates, 2);
    }

    #[test]
    fn existing_urls_are_skipped() {
        let existing: HashSet<String> = ["https://example.com/1.mp3".to_string()].into();

        let plan = reconcile(
            1,
            &existing,
            vec![
                candidate("Ep 1", "https://example.com/1.mp3"),
                candidate("Ep 2", "https://example.com/2.mp3"),
            ],
        );

        assert_eq!(plan.to_insert.len(), 1);
        assert_eq!(plan.to_insert[0].title, "Ep 2");
        assert_eq!(plan.already_present, 1);
    }

    #[test]
    fn repeated_url_within_feed_is_accepted_once() {
        let plan = reconcile(
            1,
            &HashSet::new(),
            vec![
                candidate("First copy", "https://example.com/1.mp3"),
                candidate("Other", "https://example.com/2.mp3"),
                candidate("Second copy", "https://example.com/1.mp3"),
            ],
        );

        let titles: Vec<_> = plan.to_insert.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["First copy", "Other"]);
        assert_eq!(plan.repeated_in_feed, 1);
    }

    #[test]
    fn feed_order_is_preserved() {
        let plan = reconcile(
            1,
            &HashSet::new(),
            vec![
                candidate("Newest", "https://example.com/3.mp3"),
                candidate("Oldest", "https://example.com/1.mp3"),
                candidate("Middle", "https://example.com/2.mp3"),
            ],
        );

        let titles: Vec<_> = plan.to_insert.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Newest", "Oldest", "Middle"]);
    }

    #[test]
    fn accepted_urls_are_pairwise_distinct() {
        let existing: HashSet<String> = ["https://example.com/a.mp3".to_string()].into();
        let candidates = ["a", "b", "a", "c", "b", "d"]
            .iter()
            .map(|k| candidate(k, &format!("https://example.com/{k}.mp3")))
            .collect();

        let plan = reconcile(1, &existing, candidates);

        let urls: HashSet<_> = plan.to_insert.iter().map(|c| c.audio_url.clone()).collect();
        assert_eq!(urls.len(), plan.to_insert.len());
        assert!(!urls.contains("https://example.com/a.mp3"));
        assert_eq!(plan.to_insert.len(), 3);
    }
}
