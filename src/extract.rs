// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Heuristic metadata extraction from free-form episode text.
//!
//! Every function here is total: a missing or unparsable match yields `None`,
//! never an error. When several matches exist only the leftmost one counts.

use once_cell::sync::Lazy;
use regex::Regex;

static SEASON_EPISODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)s(\d+)e(\d+)").expect("season/episode marker regex should compile")
});
static EPISODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)episode\s+(\d+)").expect("episode phrase regex should compile")
});
static EP_ABBREVIATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bep\.\s*(\d+)").expect("episode abbreviation regex should compile")
});
static VERBOSE_SEASON_EPISODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)season\s+(\d+)\s+episode\s+(\d+)")
        .expect("verbose season/episode regex should compile")
});

static HMS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+):(\d+):(\d+)").expect("H:MM:SS regex should compile"));
static MS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+):(\d+)").expect("M:SS regex should compile"));
static SECONDS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:seconds?|secs?)\b").expect("seconds regex should compile")
});

static IMG_SRC_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["']"#).expect("img src regex should compile")
});
static AUDIO_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>]+\.(?:mp3|m4a|wav|ogg|aac)\b"#)
        .expect("audio URL regex should compile")
});
static ENCLOSURE_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<enclosure[^>]+url=["']([^"']+)["']"#)
        .expect("enclosure URL regex should compile")
});

/// Infer `(episode_number, season_number)` from an episode title.
///
/// Patterns are tried from most to least structured and the first one that
/// yields valid numbers wins:
/// 1. `S01E05` markers give both numbers
/// 2. a standalone `Episode 5` gives the episode only
/// 3. `Ep. 5` gives the episode only
/// 4. `Season 1 Episode 5` gives both numbers
///
/// An `Episode N` that is part of a `Season M Episode N` phrase is not
/// standalone, so the verbose form still yields the season.
pub fn extract_episode_numbers(title: &str) -> (Option<u32>, Option<u32>) {
    season_episode_marker(title)
        .or_else(|| standalone_episode(title).map(|episode| (Some(episode), None)))
        .or_else(|| abbreviated_episode(title).map(|episode| (Some(episode), None)))
        .or_else(|| verbose_season_episode(title))
        .unwrap_or((None, None))
}

fn season_episode_marker(title: &str) -> Option<(Option<u32>, Option<u32>)> {
    let caps = SEASON_EPISODE_PATTERN.captures(title)?;
    let season = parse_number(&caps[1])?;
    let episode = parse_number(&caps[2])?;
    Some((Some(episode), Some(season)))
}

fn standalone_episode(title: &str) -> Option<u32> {
    let caps = EPISODE_PATTERN.captures(title)?;
    let phrase = caps.get(0)?;
    let inside_verbose = VERBOSE_SEASON_EPISODE_PATTERN
        .find_iter(title)
        .any(|verbose| verbose.start() <= phrase.start() && phrase.end() <= verbose.end());
    if inside_verbose {
        return None;
    }
    parse_number(&caps[1])
}

fn abbreviated_episode(title: &str) -> Option<u32> {
    let caps = EP_ABBREVIATION_PATTERN.captures(title)?;
    parse_number(&caps[1])
}

fn verbose_season_episode(title: &str) -> Option<(Option<u32>, Option<u32>)> {
    let caps = VERBOSE_SEASON_EPISODE_PATTERN.captures(title)?;
    let season = parse_number(&caps[1])?;
    let episode = parse_number(&caps[2])?;
    Some((Some(episode), Some(season)))
}

/// Infer a duration in seconds from free text.
///
/// Tries `H:MM:SS`, then `M:SS`, then `<n> seconds`. Values that overflow are no match.
pub fn extract_duration(text: &str) -> Option<u32> {
    if let Some(caps) = HMS_PATTERN.captures(text) {
        let hours = parse_number(&caps[1])?;
        let minutes = parse_number(&caps[2])?;
        let seconds = parse_number(&caps[3])?;
        return hours
            .checked_mul(3600)?
            .checked_add(minutes.checked_mul(60)?)?
            .checked_add(seconds);
    }

    if let Some(caps) = MS_PATTERN.captures(text) {
        let minutes = parse_number(&caps[1])?;
        let seconds = parse_number(&caps[2])?;
        return minutes.checked_mul(60)?.checked_add(seconds);
    }

    SECONDS_PATTERN
        .captures(text)
        .and_then(|caps| parse_number(&caps[1]))
}

/// First `<img src="...">` reference in embedded markup
pub fn extract_image_url(text: &str) -> Option<String> {
    IMG_SRC_PATTERN
        .captures(text)
        .map(|caps| decode_url(&caps[1]))
        .filter(|url| !url.is_empty())
}

/// First URL pointing at a known audio file type, else the first `<enclosure url="...">`
pub fn extract_audio_url(text: &str) -> Option<String> {
    if let Some(found) = AUDIO_URL_PATTERN.find(text) {
        return Some(decode_url(found.as_str()));
    }

    ENCLOSURE_URL_PATTERN
        .captures(text)
        .map(|caps| decode_url(&caps[1]))
        .filter(|url| !url.is_empty())
}

fn parse_number(digits: &str) -> Option<u32> {
    digits.parse().ok()
}

/// Markup-embedded URLs usually carry `&amp;` and friends
fn decode_url(raw: &str) -> String {
    html_escape::decode_html_entities(raw.trim()).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_episode_marker_wins_over_looser_patterns() {
        assert_eq!(
            extract_episode_numbers("S01E05 — Something"),
            (Some(5), Some(1))
        );
        assert_eq!(
            extract_episode_numbers("s2e10: Episode 99 recap"),
            (Some(10), Some(2))
        );
    }

    #[test]
    fn episode_phrase_gives_episode_only() {
        assert_eq!(
            extract_episode_numbers("Episode 42: The Answer"),
            (Some(42), None)
        );
        assert_eq!(extract_episode_numbers("the EPISODE 7 special"), (Some(7), None));
    }

    #[test]
    fn abbreviated_phrase_gives_episode_only() {
        assert_eq!(extract_episode_numbers("Ep. 12 - Guests"), (Some(12), None));
        assert_eq!(extract_episode_numbers("ep.3"), (Some(3), None));
    }

    #[test]
    fn verbose_phrase_gives_both_numbers() {
        assert_eq!(
            extract_episode_numbers("Season 3 Episode 4: Finale"),
            (Some(4), Some(3))
        );
    }

    #[test]
    fn standalone_episode_still_preferred_outside_verbose_phrase() {
        assert_eq!(
            extract_episode_numbers("Episode 8 (Season 2 Episode 1 rerun)"),
            (Some(8), None)
        );
    }

    #[test]
    fn no_numbers_in_title() {
        assert_eq!(extract_episode_numbers("A chat about 5 things"), (None, None));
        assert_eq!(extract_episode_numbers(""), (None, None));
    }

    #[test]
    fn overflowing_numbers_are_no_match() {
        assert_eq!(
            extract_episode_numbers("Episode 99999999999999999999"),
            (None, None)
        );
        assert_eq!(
            extract_episode_numbers("S99999999999E01 then Ep. 4"),
            (Some(4), None)
        );
    }

    #[test]
    fn duration_formats() {
        assert_eq!(extract_duration("1:02:03"), Some(3723));
        assert_eq!(extract_duration("45:10"), Some(2710));
        assert_eq!(extract_duration("90 seconds"), Some(90));
        assert_eq!(extract_duration("runs 300secs"), Some(300));
        assert_eq!(extract_duration("no duration here"), None);
    }

    #[test]
    fn duration_uses_leftmost_match() {
        assert_eq!(extract_duration("Length 10:00, intro at 0:30"), Some(600));
    }

    #[test]
    fn duration_overflow_is_no_match() {
        assert_eq!(extract_duration("99999999999:00:00"), None);
    }

    #[test]
    fn image_url_from_markup() {
        let html = r#"<p>Hi</p><img class="cover" src="https://example.com/a.jpg?w=1&amp;h=2"><img src='https://example.com/b.jpg'>"#;
        assert_eq!(
            extract_image_url(html),
            Some("https://example.com/a.jpg?w=1&h=2".to_string())
        );
        assert_eq!(extract_image_url("no images"), None);
    }

    #[test]
    fn audio_url_by_extension() {
        let text = "Listen at https://cdn.example.com/show/EP1.MP3 or https://cdn.example.com/ep1.ogg";
        assert_eq!(
            extract_audio_url(text),
            Some("https://cdn.example.com/show/EP1.MP3".to_string())
        );
    }

    #[test]
    fn audio_url_falls_back_to_enclosure_markup() {
        let text = r#"<enclosure type="audio/mpeg" url="https://example.com/stream?id=5"/>"#;
        assert_eq!(
            extract_audio_url(text),
            Some("https://example.com/stream?id=5".to_string())
        );
        assert_eq!(extract_audio_url("https://example.com/page.html"), None);
    }
}
