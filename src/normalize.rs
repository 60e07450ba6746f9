// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::Utc;
use tracing::debug;
use url::Url;

use crate::extract::{extract_audio_url, extract_duration, extract_episode_numbers, extract_image_url};
use crate::feed::{FeedDocument, FeedItem};
use crate::model::{EpisodeCandidate, FeedPodcastMeta};

const UNTITLED_EPISODE: &str = "Untitled Episode";

/// A feed mapped onto catalog shapes
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFeed {
    pub podcast: FeedPodcastMeta,
    /// Ingestible episodes in feed order
    pub episodes: Vec<EpisodeCandidate>,
}

/// Map a fetched feed into podcast metadata and episode candidates.
///
/// Items without any resolvable audio URL are dropped. Episode artwork falls
/// back to the feed's artwork and then to `fallback_artwork_url`.
pub fn normalize(doc: &FeedDocument, fallback_artwork_url: Option<&str>) -> NormalizedFeed {
    let base = doc.source_url.as_ref();

    let podcast = FeedPodcastMeta {
        title: doc.title.as_deref().map(decode_text).filter(|t| !t.is_empty()),
        description: doc.description.clone(),
        artwork_url: doc
            .artwork_url
            .as_deref()
            .and_then(|url| resolve_media_url(url, base)),
        language: doc.language.clone(),
        author: doc
            .author
            .clone()
            .or_else(|| doc.items.first().and_then(|item| item.author.clone()))
            .unwrap_or_default(),
    };

    let episode_fallback_artwork = podcast
        .artwork_url
        .clone()
        .or_else(|| fallback_artwork_url.map(String::from));

    let episodes: Vec<EpisodeCandidate> = doc
        .items
        .iter()
        .filter_map(|item| normalize_item(item, base, episode_fallback_artwork.as_deref()))
        .collect();

    debug!(
        items = doc.items.len(),
        ingestible = episodes.len(),
        "normalized feed"
    );

    NormalizedFeed { podcast, episodes }
}

fn normalize_item(
    item: &FeedItem,
    base: Option<&Url>,
    fallback_artwork_url: Option<&str>,
) -> Option<EpisodeCandidate> {
    let Some(audio_url) = item_audio_url(item, base) else {
        debug!(title = ?item.title, "dropping feed item without audio");
        return None;
    };

    let title = item
        .title
        .as_deref()
        .map(decode_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED_EPISODE.to_string());

    let (title_episode, title_season) = extract_episode_numbers(&title);

    let notes = item.description.as_deref().or(item.content.as_deref());

    let duration_seconds = item
        .duration
        .as_deref()
        .and_then(parse_structured_duration)
        .or_else(|| notes.and_then(extract_duration));

    let artwork_url = item
        .image_url
        .as_deref()
        .and_then(|url| resolve_media_url(url, base))
        .or_else(|| {
            [item.description.as_deref(), item.content.as_deref()]
                .into_iter()
                .flatten()
                .find_map(extract_image_url)
                .and_then(|url| resolve_media_url(&url, base))
        })
        .or_else(|| fallback_artwork_url.map(String::from));

    Some(EpisodeCandidate {
        title,
        description: item.description.clone().or_else(|| item.content.clone()),
        audio_url,
        published_at: item.pub_date.map(|dt| dt.with_timezone(&Utc)),
        episode_number: item.episode_number.or(title_episode),
        season_number: item.season_number.or(title_season),
        duration_seconds,
        artwork_url,
    })
}

/// Structured enclosure first, then a heuristic scan of content and description
fn item_audio_url(item: &FeedItem, base: Option<&Url>) -> Option<String> {
    if let Some(url) = item
        .enclosure_url
        .as_deref()
        .and_then(|url| resolve_media_url(url, base))
    {
        return Some(url);
    }

    [item.content.as_deref(), item.description.as_deref()]
        .into_iter()
        .flatten()
        .find_map(extract_audio_url)
        .and_then(|url| resolve_media_url(&url, base))
}

/// iTunes durations are either plain seconds or clock notation
fn parse_structured_duration(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse().ok();
    }
    extract_duration(raw)
}

/// Decode entities, trim, and make relative URLs absolute against the feed location
fn resolve_media_url(raw: &str, base: Option<&Url>) -> Option<String> {
    let decoded = html_escape::decode_html_entities(raw.trim());
    if decoded.is_empty() {
        return None;
    }

    match Url::parse(&decoded) {
        Ok(url) => Some(url.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => base
            .and_then(|base| base.join(&decoded).ok())
            .map(|url| url.to_string()),
        Err(_) => Some(decoded.into_owned()),
    }
}

fn decode_text(raw: &str) -> String {
    html_escape::decode_html_entities(raw.trim()).into_owned()
}
