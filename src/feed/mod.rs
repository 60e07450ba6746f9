mod fetch;
mod parse;

pub use fetch::{FeedSource, HttpFeedSource, is_url};
pub use parse::{FeedDocument, FeedItem, parse_feed};
