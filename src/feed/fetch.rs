// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::parse::{FeedDocument, parse_feed};

/// Anything that can turn a feed location into a parsed document
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FeedDocument, FeedError>;
}

/// FeedSource backed by an HTTP client for URLs and the filesystem for paths
#[derive(Clone)]
pub struct HttpFeedSource<C> {
    client: C,
}

impl<C: HttpClient> HttpFeedSource<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: HttpClient> FeedSource for HttpFeedSource<C> {
    async fn fetch(&self, source: &str) -> Result<FeedDocument, FeedError> {
        if is_url(source) {
            let feed_url = Url::parse(source)?;
            let bytes = fetch_feed_bytes(&self.client, source).await?;
            debug!(url = source, bytes = bytes.len(), "fetched feed");
            parse_feed(&bytes, Some(feed_url))
        } else {
            let path = Path::new(source);
            let bytes = read_feed_file(path)?;
            parse_feed(&bytes, Some(file_path_to_url(path)?))
        }
    }
}

/// Fetch raw feed bytes from a URL (without parsing)
pub async fn fetch_feed_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes, FeedError> {
    let response = client
        .get(url)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status >= 400 {
        return Err(FeedError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    Ok(response.body)
}

/// Read raw feed bytes from a local file (without parsing)
pub fn read_feed_file(path: &Path) -> Result<Vec<u8>, FeedError> {
    std::fs::read(path).map_err(|e| FeedError::FileReadFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Construct a file:// URL for a local file path
fn file_path_to_url(path: &Path) -> Result<Url, FeedError> {
    let absolute = std::path::absolute(path).map_err(|e| FeedError::FileReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    match Url::from_file_path(&absolute) {
        Ok(url) => Ok(url),
        Err(()) => Ok(Url::parse(&format!("file://{}", absolute.display()))?),
    }
}

/// Determine if a string is a URL or a file path
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::http::HttpResponse;
    use tempfile::tempdir;

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Remote</title>
    <description>Remote feed</description>
    <item>
      <title>One</title>
      <enclosure url="https://example.com/one.mp3" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#;

    struct MockHttpClient {
        status: u16,
        body: &'static str,
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            Ok(HttpResponse {
                status: self.status,
                body: Bytes::from_static(self.body.as_bytes()),
            })
        }
    }

    #[test]
    fn is_url_detects_http() {
        assert!(is_url("http://example.com/feed.xml"));
        assert!(is_url("https://example.com/feed.xml"));
    }

    #[test]
    fn is_url_rejects_file_paths() {
        assert!(!is_url("/path/to/feed.xml"));
        assert!(!is_url("./feed.xml"));
        assert!(!is_url("feed.xml"));
    }

    #[tokio::test]
    async fn fetch_parses_remote_feed() {
        let source = HttpFeedSource::new(MockHttpClient {
            status: 200,
            body: FEED,
        });

        let doc = source.fetch("https://example.com/feed.xml").await.unwrap();

        assert_eq!(doc.title.as_deref(), Some("Remote"));
        assert_eq!(doc.items.len(), 1);
        assert_eq!(
            doc.source_url.map(|u| u.to_string()),
            Some("https://example.com/feed.xml".to_string())
        );
    }

    #[tokio::test]
    async fn fetch_reports_http_status() {
        let source = HttpFeedSource::new(MockHttpClient {
            status: 404,
            body: "Not Found",
        });

        let result = source.fetch("https://example.com/feed.xml").await;

        match result {
            Err(FeedError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_reads_local_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.xml");
        std::fs::write(&path, FEED).unwrap();

        let source = HttpFeedSource::new(MockHttpClient {
            status: 500,
            body: "",
        });
        let doc = source.fetch(path.to_str().unwrap()).await.unwrap();

        assert_eq!(doc.title.as_deref(), Some("Remote"));
        assert_eq!(doc.source_url.map(|u| u.scheme().to_string()).as_deref(), Some("file"));
    }

    #[tokio::test]
    async fn fetch_missing_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.xml");

        let source = HttpFeedSource::new(MockHttpClient {
            status: 200,
            body: "",
        });
        let result = source.fetch(path.to_str().unwrap()).await;

        assert!(matches!(result, Err(FeedError::FileReadFailed { .. })));
    }
}
