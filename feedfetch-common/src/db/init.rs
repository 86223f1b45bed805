//! Catalog database initialization
//!
//! Opens (or creates) the SQLite catalog and makes sure every table exists.
//! Table creation is idempotent and runs on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Open the catalog database at `db_path`, creating file and schema if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Connection-scoped PRAGMAs go on the options so every pooled
    // connection gets them
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(5000));

    // Writes are serialized through one writer task; a handful of
    // connections covers the bootstrap reads alongside it.
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_catalog_schema(&pool).await?;

    Ok(pool)
}

/// Create all catalog tables (idempotent)
pub async fn create_catalog_schema(pool: &SqlitePool) -> Result<()> {
    create_genres_table(pool).await?;
    create_artists_table(pool).await?;
    create_podcasts_table(pool).await?;
    create_podcast_genres_table(pool).await?;

    info!("Catalog tables initialized (genres, artists, podcasts, podcast_genres)");
    Ok(())
}

pub async fn create_genres_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS genres (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_artists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artists (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            itunes_id INTEGER UNIQUE,
            itunes_view_url TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_artists_name ON artists(name)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_podcasts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS podcasts (
            guid TEXT PRIMARY KEY,
            itunes_id INTEGER NOT NULL UNIQUE,
            title TEXT NOT NULL,
            censored_title TEXT NOT NULL,
            feed_url TEXT,
            release_date TEXT,
            country TEXT,
            content_advisory_rating TEXT,
            itunes_view_url TEXT,
            artwork_url_30 TEXT,
            artwork_url_60 TEXT,
            artwork_url_100 TEXT,
            artwork_url_600 TEXT,
            artist_id TEXT REFERENCES artists(guid),
            primary_genre_id TEXT REFERENCES genres(guid),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_podcasts_title ON podcasts(title)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_podcast_genres_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS podcast_genres (
            podcast_id TEXT NOT NULL REFERENCES podcasts(guid) ON DELETE CASCADE,
            genre_id TEXT NOT NULL REFERENCES genres(guid) ON DELETE CASCADE,
            PRIMARY KEY (podcast_id, genre_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
