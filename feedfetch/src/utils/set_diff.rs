//! Left set-difference helpers

use std::collections::HashSet;
use std::hash::Hash;

/// Values of `a` that do not occur in `b`
///
/// Membership is existence-only: every occurrence of a value found in `b`
/// is removed, other duplicates survive, and `a`'s order is kept.
pub fn left_diff<T>(a: &[T], b: &[T]) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    left_diff_by_key(a, b, |item| item.clone())
}

/// Items of `a` whose value does not match the key of any item in `b`
///
/// `key_of` maps the subtracted side onto `a`'s element type, so a batch of
/// identifiers can be diffed against returned entries directly.
pub fn left_diff_by_key<T, U, F>(a: &[T], b: &[U], key_of: F) -> Vec<T>
where
    T: Eq + Hash + Clone,
    F: Fn(&U) -> T,
{
    let present: HashSet<T> = b.iter().map(key_of).collect();

    a.iter()
        .filter(|item| !present.contains(*item))
        .cloned()
        .collect()
}
