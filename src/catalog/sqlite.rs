// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, instrument};

use crate::error::CatalogError;
use crate::model::{EpisodeCandidate, EpisodeRecord, NewPodcast, PodcastId, PodcastMeta};

use super::{Catalog, InsertResult};

const PODCAST_COLUMNS: &str = "id, title, author, description, artwork_url, language, feed_url, created_at, last_synced_at";
const EPISODE_COLUMNS: &str = "id, podcast_id, title, description, audio_url, published_at, episode_number, season_number, duration_seconds, artwork_url, created_at";

/// Catalog stored in a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    /// Open (creating if needed) the database and bring its schema up to date
    pub async fn connect(database_url: &str) -> Result<Self, CatalogError> {
        let in_memory = is_memory_url(database_url);
        let mut options =
            SqliteConnectOptions::from_str(&prepare_sqlite_url(database_url))?.create_if_missing(true);
        if !in_memory {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Full);
        }

        // Every connection to :memory: is its own database, so pin a single one.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_options.connect_with(options).await?;
        let catalog = Self { pool };
        catalog.run_migrations().await?;
        Ok(catalog)
    }

    pub async fn run_migrations(&self) -> Result<(), CatalogError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn is_memory_url(url: &str) -> bool {
    url.starts_with("sqlite::memory") || url.contains("mode=memory")
}

/// Expand a leading `~/` in a file-backed SQLite URL and make sure the parent
/// directory exists. In-memory URLs pass through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return url.to_string();
    };
    if is_memory_url(url) {
        return url.to_string();
    }

    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent()
        && !parent.as_os_str().is_empty()
    {
        let _ = std::fs::create_dir_all(parent);
    }

    match query_part {
        Some(q) => format!("sqlite://{expanded_path}?{q}"),
        None => format!("sqlite://{expanded_path}"),
    }
}

fn podcast_from_row(row: &SqliteRow) -> Result<PodcastMeta, sqlx::Error> {
    Ok(PodcastMeta {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        description: row.try_get("description")?,
        artwork_url: row.try_get("artwork_url")?,
        language: row.try_get("language")?,
        feed_url: row.try_get("feed_url")?,
        created_at: row.try_get("created_at")?,
        last_synced_at: row.try_get("last_synced_at")?,
    })
}

fn episode_from_row(row: &SqliteRow) -> Result<EpisodeRecord, sqlx::Error> {
    Ok(EpisodeRecord {
        id: row.try_get("id")?,
        podcast_id: row.try_get("podcast_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        audio_url: row.try_get("audio_url")?,
        published_at: row.try_get("published_at")?,
        episode_number: to_u32(row.try_get("episode_number")?),
        season_number: to_u32(row.try_get("season_number")?),
        duration_seconds: to_u32(row.try_get("duration_seconds")?),
        artwork_url: row.try_get("artwork_url")?,
        created_at: row.try_get("created_at")?,
    })
}

fn to_u32(value: Option<i64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

async fn upsert_podcast_in(
    conn: &mut SqliteConnection,
    podcast: &PodcastMeta,
) -> Result<(), CatalogError> {
    sqlx::query(
        "INSERT INTO podcasts (id, title, author, description, artwork_url, language, feed_url, created_at, last_synced_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET \
            title = excluded.title, \
            author = excluded.author, \
            description = excluded.description, \
            artwork_url = excluded.artwork_url, \
            language = excluded.language, \
            feed_url = excluded.feed_url, \
            last_synced_at = excluded.last_synced_at",
    )
    .bind(podcast.id)
    .bind(&podcast.title)
    .bind(&podcast.author)
    .bind(&podcast.description)
    .bind(&podcast.artwork_url)
    .bind(&podcast.language)
    .bind(&podcast.feed_url)
    .bind(podcast.created_at)
    .bind(podcast.last_synced_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_episodes_in(
    conn: &mut SqliteConnection,
    podcast_id: PodcastId,
    candidates: &[EpisodeCandidate],
    created_at: DateTime<Utc>,
) -> Result<Vec<InsertResult>, CatalogError> {
    let mut results = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        // A constraint failure only aborts this statement, not the transaction.
        let inserted = sqlx::query(
            "INSERT INTO episodes (podcast_id, title, description, audio_url, published_at, episode_number, season_number, duration_seconds, artwork_url, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(podcast_id)
        .bind(&candidate.title)
        .bind(&candidate.description)
        .bind(&candidate.audio_url)
        .bind(candidate.published_at)
        .bind(candidate.episode_number.map(i64::from))
        .bind(candidate.season_number.map(i64::from))
        .bind(candidate.duration_seconds.map(i64::from))
        .bind(&candidate.artwork_url)
        .bind(created_at)
        .fetch_one(&mut *conn)
        .await;

        match inserted {
            Ok(row) => {
                let id: i64 = row.try_get("id")?;
                results.push(Ok(EpisodeRecord::from_candidate(
                    id, podcast_id, candidate, created_at,
                )));
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!(podcast_id, audio_url = %candidate.audio_url, "episode already stored");
                results.push(Err(CatalogError::UniqueViolation {
                    podcast_id,
                    audio_url: candidate.audio_url.clone(),
                }));
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
                return Err(CatalogError::PodcastNotFound(podcast_id));
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(results)
}

#[async_trait]
impl Catalog for SqliteCatalog {
    #[instrument(skip(self))]
    async fn get_podcast(&self, id: PodcastId) -> Result<Option<PodcastMeta>, CatalogError> {
        let row = sqlx::query(&format!("SELECT {PODCAST_COLUMNS} FROM podcasts WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(podcast_from_row).transpose()?)
    }

    #[instrument(skip_all)]
    async fn list_podcasts(&self) -> Result<Vec<PodcastMeta>, CatalogError> {
        let rows = sqlx::query(&format!("SELECT {PODCAST_COLUMNS} FROM podcasts ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(podcast_from_row).collect::<Result<_, _>>()?)
    }

    #[instrument(skip_all)]
    async fn list_podcasts_with_feed(&self) -> Result<Vec<PodcastMeta>, CatalogError> {
        let rows = sqlx::query(&format!(
            "SELECT {PODCAST_COLUMNS} FROM podcasts \
             WHERE feed_url IS NOT NULL AND TRIM(feed_url) <> '' ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(podcast_from_row).collect::<Result<_, _>>()?)
    }

    #[instrument(skip(self))]
    async fn list_episode_audio_urls(
        &self,
        podcast_id: PodcastId,
    ) -> Result<HashSet<String>, CatalogError> {
        let urls: Vec<String> =
            sqlx::query_scalar("SELECT audio_url FROM episodes WHERE podcast_id = ?")
                .bind(podcast_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(urls.into_iter().collect())
    }

    #[instrument(skip(self))]
    async fn list_episodes(
        &self,
        podcast_id: PodcastId,
    ) -> Result<Vec<EpisodeRecord>, CatalogError> {
        let rows = sqlx::query(&format!(
            "SELECT {EPISODE_COLUMNS} FROM episodes WHERE podcast_id = ? \
             ORDER BY published_at IS NULL, published_at DESC, id DESC"
        ))
        .bind(podcast_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(episode_from_row).collect::<Result<_, _>>()?)
    }

    #[instrument(skip_all)]
    async fn create_podcast(&self, podcast: &NewPodcast) -> Result<PodcastId, CatalogError> {
        let id: i64 = sqlx::query(
            "INSERT INTO podcasts (title, author, description, artwork_url, language, feed_url, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&podcast.title)
        .bind(&podcast.author)
        .bind(&podcast.description)
        .bind(&podcast.artwork_url)
        .bind(&podcast.language)
        .bind(&podcast.feed_url)
        .bind(podcast.created_at)
        .fetch_one(&self.pool)
        .await?
        .try_get("id")?;
        Ok(id)
    }

    #[instrument(skip_all, fields(podcast_id = podcast.id))]
    async fn upsert_podcast(&self, podcast: &PodcastMeta) -> Result<(), CatalogError> {
        let mut conn = self.pool.acquire().await?;
        upsert_podcast_in(&mut conn, podcast).await
    }

    #[instrument(skip(self, candidates, created_at), fields(count = candidates.len()))]
    async fn insert_episodes(
        &self,
        podcast_id: PodcastId,
        candidates: &[EpisodeCandidate],
        created_at: DateTime<Utc>,
    ) -> Result<Vec<InsertResult>, CatalogError> {
        let mut tx = self.pool.begin().await?;
        let results = insert_episodes_in(&mut tx, podcast_id, candidates, created_at).await?;
        tx.commit().await?;
        Ok(results)
    }

    #[instrument(skip_all, fields(podcast_id = podcast.id, count = candidates.len()))]
    async fn commit_sync(
        &self,
        podcast: &PodcastMeta,
        candidates: &[EpisodeCandidate],
        created_at: DateTime<Utc>,
    ) -> Result<Vec<InsertResult>, CatalogError> {
        let mut tx = self.pool.begin().await?;
        upsert_podcast_in(&mut tx, podcast).await?;
        let results = insert_episodes_in(&mut tx, podcast.id, candidates, created_at).await?;
        tx.commit().await?;
        Ok(results)
    }
}
