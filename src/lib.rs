pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod extract;
pub mod feed;
pub mod http;
pub mod model;
pub mod normalize;
pub mod progress;
pub mod reconcile;
pub mod sync;

// Re-export main types for convenience
pub use catalog::{Catalog, InsertResult, MemoryCatalog, SqliteCatalog};
pub use clock::{Clock, FixedClock, SharedClock, SystemClock};
pub use error::{CatalogError, FeedError, SyncError};
pub use extract::{extract_audio_url, extract_duration, extract_episode_numbers, extract_image_url};
pub use feed::{FeedDocument, FeedItem, FeedSource, HttpFeedSource, is_url, parse_feed};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use model::{
    EpisodeCandidate, EpisodeId, EpisodeRecord, FeedPodcastMeta, NewPodcast, PodcastId,
    PodcastMeta, SweepReport, SyncOutcome,
};
pub use normalize::{NormalizedFeed, normalize};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use reconcile::{ReconcilePlan, reconcile};
pub use sync::SyncEngine;
