//! Artist resolution
//!
//! Artists are matched on their iTunes id when the lookup entry carries one,
//! otherwise on name among artists that have no iTunes id.

use super::genres::parse_guid;
use super::sql_id;
use feedfetch_common::Result;
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Return the guid of the matching artist, creating the row if needed
pub async fn resolve_artist(
    conn: &mut SqliteConnection,
    name: &str,
    itunes_id: Option<u64>,
    itunes_view_url: Option<&str>,
) -> Result<Uuid> {
    let itunes_id = itunes_id.map(sql_id).transpose()?;

    let existing: Option<String> = match itunes_id {
        Some(id) => {
            sqlx::query_scalar("SELECT guid FROM artists WHERE itunes_id = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?
        }
        None => {
            sqlx::query_scalar(
                "SELECT guid FROM artists WHERE name = ? AND itunes_id IS NULL LIMIT 1",
            )
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?
        }
    };

    if let Some(guid) = existing {
        return parse_guid(&guid);
    }

    let guid = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO artists (guid, name, itunes_id, itunes_view_url, created_at)
        VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
        "#,
    )
    .bind(guid.to_string())
    .bind(name)
    .bind(itunes_id)
    .bind(itunes_view_url)
    .execute(&mut *conn)
    .await?;

    tracing::trace!(artist = name, ?itunes_id, "Created artist");
    Ok(guid)
}
