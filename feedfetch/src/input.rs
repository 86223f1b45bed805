//! Identifier list input
//!
//! One entry per line, either a bare numeric id or a catalog URL whose last
//! path segment is `id<digits>`:
//!
//! ```text
//! 1200361736
//! https://podcasts.apple.com/us/podcast/the-daily/id1200361736?uo=4
//! ```
//!
//! Blank lines and `#` comments are ignored. Other lines are logged and
//! skipped.

use feedfetch_common::Result;
use std::collections::HashSet;
use std::path::Path;

/// Extract the identifier from one line
pub fn parse_identifier(line: &str) -> Option<u64> {
    let line = line.trim();
    if let Ok(id) = line.parse::<u64>() {
        return Some(id);
    }

    let path = line.split(['?', '#']).next().unwrap_or_default();
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let digits = segment.strip_prefix("id")?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Parse a whole list, keeping the first occurrence of each identifier
pub fn parse_identifier_list(text: &str) -> Vec<u64> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    let mut duplicates = 0usize;

    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        match parse_identifier(trimmed) {
            Some(id) if seen.insert(id) => ids.push(id),
            Some(_) => duplicates += 1,
            None => tracing::warn!(line = index + 1, content = trimmed, "Skipping unparsable line"),
        }
    }

    if duplicates > 0 {
        tracing::debug!(duplicates, "Dropped duplicate identifiers");
    }
    ids
}

/// Read and parse the identifier file
pub async fn load_identifier_file(path: &Path) -> Result<Vec<u64>> {
    let text = tokio::fs::read_to_string(path).await?;
    let ids = parse_identifier_list(&text);

    tracing::info!(path = %path.display(), identifiers = ids.len(), "Loaded identifier list");
    Ok(ids)
}
