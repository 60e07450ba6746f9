// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset};
use tracing::debug;
use url::Url;

use crate::error::FeedError;

/// A fetched feed reduced to the fields ingestion cares about.
///
/// Every field is optional: feeds in the wild omit almost anything, and the
/// normalizer decides what to do about gaps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedDocument {
    pub title: Option<String>,
    pub description: Option<String>,
    pub artwork_url: Option<String>,
    pub language: Option<String>,
    pub author: Option<String>,
    /// Where the document was fetched from; relative media URLs resolve against it
    pub source_url: Option<Url>,
    pub items: Vec<FeedItem>,
}

/// One `<item>` of a feed, in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub description: Option<String>,
    /// `content:encoded` body, often full HTML show notes
    pub content: Option<String>,
    pub pub_date: Option<DateTime<FixedOffset>>,
    pub author: Option<String>,
    pub enclosure_url: Option<String>,
    pub duration: Option<String>,
    pub episode_number: Option<u32>,
    pub season_number: Option<u32>,
    pub image_url: Option<String>,
}

/// Parse feed bytes into a FeedDocument.
///
/// RSS 2.0 is read with its iTunes and Dublin Core extensions. Anything the RSS
/// reader rejects (Atom, RSS 1.0, JSON Feed) is retried with `feed-rs`; when that
/// fails too the original RSS error is returned.
pub fn parse_feed(xml_bytes: &[u8], source_url: Option<Url>) -> Result<FeedDocument, FeedError> {
    match rss::Channel::read_from(xml_bytes) {
        Ok(channel) => Ok(from_rss_channel(&channel, source_url)),
        Err(rss_err) => match feed_rs::parser::parse(xml_bytes) {
            Ok(feed) => {
                debug!(feed_type = ?feed.feed_type, "parsed non-RSS 2.0 feed");
                Ok(from_feed_rs(feed, source_url))
            }
            Err(e) => {
                debug!(error = %e, "fallback feed parser rejected document");
                Err(FeedError::ParseFailed(rss_err))
            }
        },
    }
}

fn from_rss_channel(channel: &rss::Channel, source_url: Option<Url>) -> FeedDocument {
    let itunes = channel.itunes_ext();

    let artwork_url = channel
        .image()
        .map(|img| img.url().to_string())
        .or_else(|| itunes.and_then(|ext| ext.image()).map(String::from));

    let author = itunes
        .and_then(|ext| ext.author().map(String::from))
        .or_else(|| channel.managing_editor().map(String::from));

    FeedDocument {
        title: non_empty(Some(channel.title())),
        description: non_empty(Some(channel.description())),
        artwork_url: non_empty(artwork_url.as_deref()),
        language: non_empty(channel.language()),
        author: non_empty(author.as_deref()),
        source_url,
        items: channel.items().iter().map(parse_item).collect(),
    }
}

fn from_feed_rs(feed: feed_rs::model::Feed, source_url: Option<Url>) -> FeedDocument {
    let artwork_url = feed.logo.as_ref().or(feed.icon.as_ref()).map(|img| img.uri.as_str());

    FeedDocument {
        title: non_empty(feed.title.as_ref().map(|t| t.content.as_str())),
        description: non_empty(feed.description.as_ref().map(|t| t.content.as_str())),
        artwork_url: non_empty(artwork_url),
        language: non_empty(feed.language.as_deref()),
        author: non_empty(feed.authors.first().map(|p| p.name.as_str())),
        source_url,
        items: feed.entries.iter().map(parse_entry).collect(),
    }
}

fn parse_entry(entry: &feed_rs::model::Entry) -> FeedItem {
    let duration = entry
        .media
        .iter()
        .find_map(|m| m.duration.or_else(|| m.content.iter().find_map(|c| c.duration)))
        .map(|d| d.as_secs().to_string());

    let image_url = entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.as_str())
        .next();

    FeedItem {
        title: non_empty(entry.title.as_ref().map(|t| t.content.as_str())),
        description: non_empty(entry.summary.as_ref().map(|t| t.content.as_str())),
        content: non_empty(entry.content.as_ref().and_then(|c| c.body.as_deref())),
        pub_date: entry.published.or(entry.updated).map(|d| d.fixed_offset()),
        author: non_empty(entry.authors.first().map(|p| p.name.as_str())),
        enclosure_url: non_empty(select_enclosure(entry).as_deref()),
        duration,
        episode_number: None,
        season_number: None,
        image_url: non_empty(image_url),
    }
}

/// Media link of an entry: `rel="enclosure"`, then out-of-line content, then any
/// audio/video link, then Media RSS content
fn select_enclosure(entry: &feed_rs::model::Entry) -> Option<String> {
    entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().is_some_and(|rel| rel.eq_ignore_ascii_case("enclosure")))
        .map(|l| l.href.clone())
        .or_else(|| {
            entry
                .content
                .as_ref()
                .and_then(|c| c.src.as_ref())
                .map(|l| l.href.clone())
        })
        .or_else(|| {
            entry
                .links
                .iter()
                .find(|l| {
                    l.media_type
                        .as_deref()
                        .is_some_and(|t| t.starts_with("audio/") || t.starts_with("video/"))
                })
                .map(|l| l.href.clone())
        })
        .or_else(|| {
            entry
                .media
                .iter()
                .flat_map(|m| m.content.iter())
                .find_map(|c| c.url.as_ref().map(|u| u.to_string()))
        })
}

fn parse_item(item: &rss::Item) -> FeedItem {
    let itunes = item.itunes_ext();

    let author = item
        .author()
        .map(String::from)
        .or_else(|| itunes.and_then(|ext| ext.author().map(String::from)))
        .or_else(|| {
            item.dublin_core_ext()
                .and_then(|dc| dc.creators().first().cloned())
        });

    let pub_date = item.pub_date().and_then(|date_str| {
        DateTime::parse_from_rfc2822(date_str.trim())
            .ok()
            .or_else(|| parse_relaxed_date(date_str.trim()))
    });

    FeedItem {
        title: non_empty(item.title()),
        description: non_empty(item.description()),
        content: non_empty(item.content()),
        pub_date,
        author: non_empty(author.as_deref()),
        enclosure_url: non_empty(item.enclosure().map(|e| e.url())),
        duration: non_empty(itunes.and_then(|ext| ext.duration())),
        episode_number: itunes.and_then(|ext| ext.episode().and_then(|e| e.trim().parse().ok())),
        season_number: itunes.and_then(|ext| ext.season().and_then(|s| s.trim().parse().ok())),
        image_url: non_empty(itunes.and_then(|ext| ext.image())),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Try to parse dates that don't strictly conform to RFC 2822
fn parse_relaxed_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    formats
        .iter()
        .find_map(|format| DateTime::parse_from_str(date_str, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(date_str).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Test Podcast</title>
    <description>A test podcast for unit testing</description>
    <link>https://example.com</link>
    <language>en-us</language>
    <itunes:author>Test Author</itunes:author>
    <itunes:image href="https://example.com/image.jpg"/>
    <item>
      <title>Episode 1</title>
      <description>First episode</description>
      <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
      <guid>ep1-guid</guid>
      <enclosure url="https://example.com/ep1.mp3" length="1234567" type="audio/mpeg"/>
      <itunes:duration>30:00</itunes:duration>
      <itunes:episode>1</itunes:episode>
      <itunes:season>1</itunes:season>
      <itunes:image href="https://example.com/ep1.jpg"/>
    </item>
    <item>
      <title>Episode 2</title>
      <content:encoded><![CDATA[<p>Notes</p>]]></content:encoded>
      <pubDate>2024-01-08T09:30:00+01:00</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parse_feed_extracts_channel_fields() {
        let source = Url::parse("https://example.com/feed.xml").unwrap();
        let doc = parse_feed(SAMPLE_FEED.as_bytes(), Some(source.clone())).unwrap();

        assert_eq!(doc.title.as_deref(), Some("Test Podcast"));
        assert_eq!(
            doc.description.as_deref(),
            Some("A test podcast for unit testing")
        );
        assert_eq!(doc.author.as_deref(), Some("Test Author"));
        assert_eq!(doc.language.as_deref(), Some("en-us"));
        assert_eq!(
            doc.artwork_url.as_deref(),
            Some("https://example.com/image.jpg")
        );
        assert_eq!(doc.source_url, Some(source));
    }

    #[test]
    fn parse_feed_keeps_items_in_document_order() {
        let doc = parse_feed(SAMPLE_FEED.as_bytes(), None).unwrap();

        assert_eq!(doc.items.len(), 2);
        let ep1 = &doc.items[0];
        assert_eq!(ep1.title.as_deref(), Some("Episode 1"));
        assert_eq!(
            ep1.enclosure_url.as_deref(),
            Some("https://example.com/ep1.mp3")
        );
        assert_eq!(ep1.duration.as_deref(), Some("30:00"));
        assert_eq!(ep1.episode_number, Some(1));
        assert_eq!(ep1.season_number, Some(1));
        assert_eq!(ep1.image_url.as_deref(), Some("https://example.com/ep1.jpg"));
        assert!(ep1.pub_date.is_some());
    }

    #[test]
    fn parse_feed_keeps_items_without_enclosure() {
        let doc = parse_feed(SAMPLE_FEED.as_bytes(), None).unwrap();

        let ep2 = &doc.items[1];
        assert!(ep2.enclosure_url.is_none());
        assert_eq!(ep2.content.as_deref(), Some("<p>Notes</p>"));
        assert!(ep2.description.is_none());
        assert!(ep2.duration.is_none());
    }

    #[test]
    fn parse_feed_accepts_relaxed_dates() {
        let doc = parse_feed(SAMPLE_FEED.as_bytes(), None).unwrap();
        let date = doc.items[1].pub_date.unwrap();
        assert_eq!(date.to_rfc3339(), "2024-01-08T09:30:00+01:00");
    }

    const ATOM_FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xml:lang="en">
  <title>Atom Podcast</title>
  <subtitle>Served as Atom</subtitle>
  <id>urn:uuid:atom-podcast</id>
  <updated>2024-02-01T10:00:00Z</updated>
  <logo>https://example.com/atom-cover.png</logo>
  <author><name>Atom Host</name></author>
  <entry>
    <title>S02E03 Pilot</title>
    <id>urn:uuid:entry-1</id>
    <updated>2024-02-01T10:00:00Z</updated>
    <published>2024-01-31T08:00:00Z</published>
    <summary>Runs 1:02:03</summary>
    <link rel="alternate" href="https://example.com/episodes/1"/>
    <link rel="enclosure" type="audio/mpeg" href="https://example.com/atom/1.mp3"/>
  </entry>
  <entry>
    <title>Bonus</title>
    <id>urn:uuid:entry-2</id>
    <updated>2024-02-02T10:00:00Z</updated>
    <content type="html">&lt;p&gt;Listen &lt;a href="https://cdn.example.com/bonus.m4a"&gt;here&lt;/a&gt;&lt;/p&gt;</content>
  </entry>
</feed>"#;

    #[test]
    fn parse_feed_reads_atom_feeds() {
        let doc = parse_feed(ATOM_FEED.as_bytes(), None).unwrap();

        assert_eq!(doc.title.as_deref(), Some("Atom Podcast"));
        assert_eq!(doc.description.as_deref(), Some("Served as Atom"));
        assert_eq!(doc.author.as_deref(), Some("Atom Host"));
        assert_eq!(
            doc.artwork_url.as_deref(),
            Some("https://example.com/atom-cover.png")
        );
        assert_eq!(doc.items.len(), 2);
    }

    #[test]
    fn atom_entry_maps_enclosure_summary_and_dates() {
        let doc = parse_feed(ATOM_FEED.as_bytes(), None).unwrap();

        let first = &doc.items[0];
        assert_eq!(first.title.as_deref(), Some("S02E03 Pilot"));
        assert_eq!(
            first.enclosure_url.as_deref(),
            Some("https://example.com/atom/1.mp3")
        );
        assert_eq!(first.description.as_deref(), Some("Runs 1:02:03"));
        assert_eq!(
            first.pub_date.unwrap().to_rfc3339(),
            "2024-01-31T08:00:00+00:00"
        );

        // No published date falls back to updated
        let bonus = &doc.items[1];
        assert!(bonus.enclosure_url.is_none());
        assert!(bonus.content.as_deref().unwrap().contains("bonus.m4a"));
        assert_eq!(
            bonus.pub_date.unwrap().to_rfc3339(),
            "2024-02-02T10:00:00+00:00"
        );
    }

    #[test]
    fn parse_feed_rejects_non_rss() {
        let result = parse_feed(b"<html><body>nope</body></html>", None);
        assert!(matches!(result, Err(FeedError::ParseFailed(_))));
    }
}
