//! Genre resolution

use feedfetch_common::{Error, Result};
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Return the guid of genre `name`, creating the row if needed
pub async fn resolve_genre(conn: &mut SqliteConnection, name: &str) -> Result<Uuid> {
    sqlx::query("INSERT INTO genres (guid, name) VALUES (?, ?) ON CONFLICT(name) DO NOTHING")
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .execute(&mut *conn)
        .await?;

    let guid: String = sqlx::query_scalar("SELECT guid FROM genres WHERE name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

    parse_guid(&guid)
}

/// Link a podcast to each named genre
pub async fn link_podcast_genres(
    conn: &mut SqliteConnection,
    podcast_id: Uuid,
    genres: &[String],
) -> Result<()> {
    for name in genres {
        let genre_id = resolve_genre(conn, name).await?;

        sqlx::query("INSERT OR IGNORE INTO podcast_genres (podcast_id, genre_id) VALUES (?, ?)")
            .bind(podcast_id.to_string())
            .bind(genre_id.to_string())
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

pub(crate) fn parse_guid(guid: &str) -> Result<Uuid> {
    Uuid::parse_str(guid).map_err(|e| Error::Internal(format!("Invalid guid {guid}: {e}")))
}
