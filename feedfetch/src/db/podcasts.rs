//! Podcast rows

use super::artists::resolve_artist;
use super::genres::{link_podcast_genres, resolve_genre};
use super::sql_id;
use crate::models::LookupResult;
use feedfetch_common::Result;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

/// iTunes ids of every stored podcast
pub async fn load_known_ids(pool: &SqlitePool) -> Result<Vec<u64>> {
    let ids: Vec<i64> = sqlx::query_scalar("SELECT itunes_id FROM podcasts")
        .fetch_all(pool)
        .await?;

    Ok(ids.into_iter().filter_map(|id| u64::try_from(id).ok()).collect())
}

pub async fn podcast_exists(conn: &mut SqliteConnection, itunes_id: u64) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM podcasts WHERE itunes_id = ?")
        .bind(sql_id(itunes_id)?)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(found.is_some())
}

/// Insert one lookup result with its artist and genres
///
/// Returns `false` when a podcast with the same iTunes id is already stored;
/// nothing is written in that case.
pub async fn insert_podcast(conn: &mut SqliteConnection, result: &LookupResult) -> Result<bool> {
    if podcast_exists(conn, result.itunes_id).await? {
        return Ok(false);
    }

    let artist_id = match result.artist_name.trim() {
        "" => None,
        name => Some(
            resolve_artist(
                conn,
                name,
                result.artist_itunes_id,
                result.artist_view_url.as_deref(),
            )
            .await?,
        ),
    };

    let primary_genre_id = match result.primary_genre.as_deref() {
        Some(name) => Some(resolve_genre(conn, name).await?),
        None => None,
    };

    let guid = Uuid::new_v4();
    let inserted = sqlx::query(
        r#"
        INSERT INTO podcasts (
            guid, itunes_id, title, censored_title, feed_url, release_date, country,
            content_advisory_rating, itunes_view_url, artwork_url_30, artwork_url_60,
            artwork_url_100, artwork_url_600, artist_id, primary_genre_id, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(itunes_id) DO NOTHING
        "#,
    )
    .bind(guid.to_string())
    .bind(sql_id(result.itunes_id)?)
    .bind(&result.title)
    .bind(&result.censored_title)
    .bind(&result.feed_url)
    .bind(&result.release_date)
    .bind(&result.country)
    .bind(&result.content_advisory_rating)
    .bind(&result.itunes_view_url)
    .bind(&result.artwork_url_30)
    .bind(&result.artwork_url_60)
    .bind(&result.artwork_url_100)
    .bind(&result.artwork_url_600)
    .bind(artist_id.map(|id| id.to_string()))
    .bind(primary_genre_id.map(|id| id.to_string()))
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if inserted == 0 {
        return Ok(false);
    }

    link_podcast_genres(conn, guid, &result.genres).await?;
    Ok(true)
}
