//!
//! src/persistent.rs  Andrew Belles  Sept 12th, 2025
//!
//! Defines module for persisting ingested chart tracks.
//! One sqlite table, append only, keyed by (chart, artist, title)
//! at the application layer
//!

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use sqlx::{sqlite::SqlitePoolOptions, sqlite::SqliteConnectOptions, Pool, Row, Sqlite, SqliteConnection, Transaction};

use crate::dates;
use crate::errors::CrawlerError;
use crate::types::{ChartInfo, ChartTrack, InsertOutcome, StoredTrack};

pub struct Persistent {
    pool: Pool<Sqlite>
}

impl Persistent {

    async fn ensure_schema(pool: &Pool<Sqlite>) -> Result<(), CrawlerError> {
        // ensure that schema exists
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS chart_tracks (
              id                  INTEGER PRIMARY KEY AUTOINCREMENT,
              chart_name          TEXT NOT NULL,
              chart_date_created  TEXT,
              chart_image         TEXT,
              artist              TEXT NOT NULL,
              title               TEXT NOT NULL,
              source_url          TEXT NOT NULL,
              genre               TEXT NOT NULL,
              label               TEXT NOT NULL,
              label_img           TEXT,
              artwork             TEXT,
              release_dt          TEXT NOT NULL DEFAULT '',
              release_str         TEXT NOT NULL DEFAULT 'NONE',
              is_duplicate        INTEGER NOT NULL DEFAULT 0,
              created_at          INTEGER NOT NULL
            );
            "
        ).execute(pool).await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chart_tracks_key ON chart_tracks(
                chart_name, artist, title);"
        ).execute(pool).await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chart_tracks_pair ON chart_tracks(artist, title);"
        ).execute(pool).await?;

        Ok(())
    }

    /// sqlite creates the file but not its directory
    fn ensure_parent_dir(database_url: &str) -> Result<(), CrawlerError> {
        let path = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        let path = path.split('?').next().unwrap_or(path);
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    pub async fn init(database_url: &str) -> Result<Self, CrawlerError> {
        let is_memory = database_url.starts_with("sqlite::memory:");
        if !is_memory {
            Self::ensure_parent_dir(database_url)?;
        }

        let mut opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true);

        // WAL is file-only; don't set it for in-memory
        if !is_memory {
            opts = opts.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                       .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        }

        // every in-memory connection is its own database
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(if is_memory {1} else {4})
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        // Always create schema right away
        Self::ensure_schema(&pool).await?;

        Ok(Self { pool })
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    pub async fn chart_exists(&self, chart_name: &str) -> Result<bool, CrawlerError> {
        let hit: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM chart_tracks WHERE chart_name = ?1 LIMIT 1;"
        )
        .bind(chart_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(hit.is_some())
    }

    /// Triple check, duplicate-flag check and insert on an open transaction.
    /// The duplicate flag is decided against rows of other charts and never
    /// revisited
    async fn insert_in(
        conn: &mut SqliteConnection,
        chart: &ChartInfo,
        track: &ChartTrack,
        label_img: &str
    ) -> Result<InsertOutcome, CrawlerError> {
        let present: Option<i64> = sqlx::query_scalar(
            r"
            SELECT 1 FROM chart_tracks
             WHERE chart_name = ?1 AND artist = ?2 AND title = ?3
             LIMIT 1;
            "
        )
        .bind(&chart.name)
        .bind(&track.artist)
        .bind(&track.title)
        .fetch_optional(&mut *conn)
        .await?;

        if present.is_some() {
            return Ok(InsertOutcome::AlreadyPresent);
        }

        let elsewhere: Option<i64> = sqlx::query_scalar(
            r"
            SELECT 1 FROM chart_tracks
             WHERE artist = ?1 AND title = ?2 AND chart_name != ?3
             LIMIT 1;
            "
        )
        .bind(&track.artist)
        .bind(&track.title)
        .bind(&chart.name)
        .fetch_optional(&mut *conn)
        .await?;
        let is_duplicate = elsewhere.is_some();

        let label_img = if label_img.is_empty() { None } else { Some(label_img) };

        sqlx::query(
            r"
            INSERT INTO chart_tracks (
                chart_name, chart_date_created, chart_image, artist, title,
                source_url, genre, label, label_img, artwork, release_dt,
                release_str, is_duplicate, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14);
            "
        )
        .bind(&chart.name)
        .bind(chart.meta.created.as_ref())
        .bind(chart.meta.image.as_ref())
        .bind(&track.artist)
        .bind(&track.title)
        .bind(&chart.source_url)
        .bind(&track.genre)
        .bind(&track.label)
        .bind(label_img)
        .bind(track.artwork.as_ref())
        .bind(dates::to_iso(track.release_dt))
        .bind(&track.release_str)
        .bind(i32::from(is_duplicate))
        .bind(Self::now())
        .execute(&mut *conn)
        .await?;

        Ok(InsertOutcome::Added { is_duplicate })
    }

    /// Opens the transaction one chart's tracks are committed under
    pub async fn begin_chart(&self) -> Result<ChartSnapshot<'static>, CrawlerError> {
        Ok(ChartSnapshot { tx: self.pool.begin().await? })
    }

    pub async fn count_tracks(&self) -> Result<i64, CrawlerError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM chart_tracks;")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Labels that already carry an image, for warming the label cache.
    /// Latest row wins when a label was stored with different images
    pub async fn label_images(&self) -> Result<HashMap<String, String>, CrawlerError> {
        let rows = sqlx::query(
            r"
            SELECT label, label_img
              FROM chart_tracks
             WHERE label_img IS NOT NULL AND label_img != ''
             ORDER BY id ASC;
            "
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter()
            .map(|r| (r.get::<String, _>("label"), r.get::<String, _>("label_img")))
            .collect())
    }

    /// Every committed row in insertion order
    pub async fn all_tracks(&self) -> Result<Vec<StoredTrack>, CrawlerError> {
        let rows = sqlx::query(
            r"
            SELECT chart_name, chart_date_created, chart_image, artist, title,
                   source_url, genre, label, label_img, artwork, release_dt,
                   release_str, is_duplicate, created_at
              FROM chart_tracks
             ORDER BY id ASC;
            "
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| {
            let release_dt: String = r.get("release_dt");
            StoredTrack {
                chart_name: r.get("chart_name"),
                chart_date_created: r.get("chart_date_created"),
                chart_image: r.get("chart_image"),
                artist: r.get("artist"),
                title: r.get("title"),
                source_url: r.get("source_url"),
                genre: r.get("genre"),
                label: r.get("label"),
                label_img: r.get("label_img"),
                artwork: r.get("artwork"),
                release_dt: dates::from_iso(&release_dt),
                release_str: r.get("release_str"),
                is_duplicate: r.get::<i64, _>("is_duplicate") == 1,
                created_at: r.get("created_at"),
            }
        }).collect())
    }
}

/// A chart's inserts, committed together or not at all. Dropping it
/// without `commit` rolls every row back, so a failed chart is never left
/// half stored and skipped by later runs
pub struct ChartSnapshot<'c> {
    tx: Transaction<'c, Sqlite>
}

impl ChartSnapshot<'_> {
    pub async fn insert_track(
        &mut self,
        chart: &ChartInfo,
        track: &ChartTrack,
        label_img: &str
    ) -> Result<InsertOutcome, CrawlerError> {
        Persistent::insert_in(&mut self.tx, chart, track, label_img).await
    }

    pub async fn commit(self) -> Result<(), CrawlerError> {
        self.tx.commit().await?;
        Ok(())
    }
}
