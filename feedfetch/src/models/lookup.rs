//! iTunes lookup payloads
//!
//! `GET <base>?entity=podcast&id=<ids>` answers with
//! `{"resultCount": n, "results": [entry, ...]}`. Identifiers the API does
//! not know (or will not disclose) are silently left out of `results`.
//!
//! Entries are decoded one at a time, so a malformed entry only costs its
//! own identifier. `null` in any field reads as the field's empty value.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Lookup response envelope
///
/// `results` holds raw entries; decode them with [`LookupResponse::into_entries`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub result_count: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<serde_json::Value>,
}

impl LookupResponse {
    /// Decode every entry independently, in response order
    pub fn into_entries(self) -> Vec<Result<LookupEntry, EntryRejection>> {
        self.results.into_iter().map(LookupEntry::from_value).collect()
    }
}

/// One raw lookup entry, as returned by the API
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LookupEntry {
    #[serde(deserialize_with = "null_as_default")]
    pub wrapper_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub collection_id: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub collection_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub collection_censored_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub collection_view_url: String,
    pub artist_id: Option<u64>,
    #[serde(deserialize_with = "null_as_default")]
    pub artist_name: String,
    pub artist_view_url: Option<String>,
    pub feed_url: Option<String>,
    pub release_date: Option<String>,
    pub country: Option<String>,
    pub content_advisory_rating: Option<String>,
    pub primary_genre_name: Option<String>,
    #[serde(deserialize_with = "genre_names")]
    pub genres: Vec<String>,
    #[serde(rename = "artworkUrl30")]
    pub artwork_url_30: Option<String>,
    #[serde(rename = "artworkUrl60")]
    pub artwork_url_60: Option<String>,
    #[serde(rename = "artworkUrl100")]
    pub artwork_url_100: Option<String>,
    #[serde(rename = "artworkUrl600")]
    pub artwork_url_600: Option<String>,
}

impl LookupEntry {
    /// Decode one raw entry
    ///
    /// On failure the collection id is recovered from the raw value when it
    /// is readable, so the identifier can still be accounted for.
    pub fn from_value(value: serde_json::Value) -> Result<Self, EntryRejection> {
        let collection_id = value
            .get("collectionId")
            .and_then(serde_json::Value::as_u64)
            .filter(|id| *id != 0);

        serde_json::from_value(value).map_err(|e| EntryRejection::Malformed {
            collection_id,
            message: e.to_string(),
        })
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Genre names, skipping `null` items
fn genre_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let names: Option<Vec<Option<String>>> = Option::deserialize(deserializer)?;
    Ok(names.unwrap_or_default().into_iter().flatten().collect())
}

/// Parse a lookup response body
pub fn parse_lookup_response(body: &str) -> Result<LookupResponse, serde_json::Error> {
    serde_json::from_str(body)
}

/// Why an entry was not accepted into the result buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryRejection {
    #[error("entry {0} has an empty title")]
    EmptyTitle(u64),

    #[error("entry has no collection id")]
    MissingId,

    #[error("malformed entry (collection id {collection_id:?}): {message}")]
    Malformed {
        collection_id: Option<u64>,
        message: String,
    },
}

impl EntryRejection {
    /// Identifier the rejected entry belongs to, when known
    pub fn collection_id(&self) -> Option<u64> {
        match self {
            Self::EmptyTitle(id) => Some(*id),
            Self::Malformed { collection_id, .. } => *collection_id,
            Self::MissingId => None,
        }
    }
}

/// A validated catalog entry, ready for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResult {
    pub itunes_id: u64,
    pub title: String,
    pub censored_title: String,
    pub artist_name: String,
    pub artist_itunes_id: Option<u64>,
    pub artist_view_url: Option<String>,
    pub feed_url: Option<String>,
    pub itunes_view_url: Option<String>,
    pub release_date: Option<String>,
    pub country: Option<String>,
    pub content_advisory_rating: Option<String>,
    pub primary_genre: Option<String>,
    pub genres: Vec<String>,
    pub artwork_url_30: Option<String>,
    pub artwork_url_60: Option<String>,
    pub artwork_url_100: Option<String>,
    pub artwork_url_600: Option<String>,
}

impl TryFrom<LookupEntry> for LookupResult {
    type Error = EntryRejection;

    /// Validate an entry
    ///
    /// - whitespace-only titles are rejected
    /// - an empty censored title inherits the title
    fn try_from(entry: LookupEntry) -> Result<Self, Self::Error> {
        if entry.collection_id == 0 {
            return Err(EntryRejection::MissingId);
        }

        let title = entry.collection_name.trim().to_string();
        if title.is_empty() {
            return Err(EntryRejection::EmptyTitle(entry.collection_id));
        }

        let censored_title = match entry.collection_censored_name.trim() {
            "" => title.clone(),
            censored => censored.to_string(),
        };

        Ok(Self {
            itunes_id: entry.collection_id,
            title,
            censored_title,
            artist_name: entry.artist_name,
            artist_itunes_id: entry.artist_id.filter(|id| *id != 0),
            artist_view_url: non_empty(entry.artist_view_url),
            feed_url: non_empty(entry.feed_url),
            itunes_view_url: non_empty(Some(entry.collection_view_url)),
            release_date: non_empty(entry.release_date),
            country: non_empty(entry.country),
            content_advisory_rating: non_empty(entry.content_advisory_rating),
            primary_genre: non_empty(entry.primary_genre_name),
            genres: entry
                .genres
                .into_iter()
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect(),
            artwork_url_30: non_empty(entry.artwork_url_30),
            artwork_url_60: non_empty(entry.artwork_url_60),
            artwork_url_100: non_empty(entry.artwork_url_100),
            artwork_url_600: non_empty(entry.artwork_url_600),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
