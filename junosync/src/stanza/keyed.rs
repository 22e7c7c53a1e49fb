//! Helpers for repeated sub-blocks identified by a key tuple.

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::{BuildError, BuildErrorKind, ParseError};
use crate::stanza::FieldPath;

/// Reject a list whose elements do not have unique keys.
///
/// The error points at the second occurrence: `<attr>[<index>]`.
pub fn reject_duplicate_keys<T, K, F>(
    items: &[T],
    attr: &'static str,
    key: F,
) -> Result<(), BuildError>
where
    K: Eq + Hash + Debug,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let k = key(item);
        if seen.contains(&k) {
            return Err(BuildError::new(
                FieldPath::of(attr).index(index),
                BuildErrorKind::DuplicateKey {
                    key: format!("{:?}", k),
                },
            ));
        }
        seen.insert(k);
    }
    Ok(())
}

/// Locate the element with the given key, appending a new one if absent.
///
/// New elements go to the end, so list order follows first appearance in
/// the device output.
pub fn entry_by_key<'a, T, P, N>(items: &'a mut Vec<T>, matches: P, create: N) -> (usize, &'a mut T)
where
    P: Fn(&T) -> bool,
    N: FnOnce() -> T,
{
    let index = match items.iter().position(|item| matches(item)) {
        Some(index) => index,
        None => {
            items.push(create());
            items.len() - 1
        }
    };
    (index, &mut items[index])
}

/// Apply a line to a keyed element, tagging errors with its index.
pub fn with_entry<T, F>(index: usize, entry: &mut T, apply: F) -> Result<(), ParseError>
where
    F: FnOnce(&mut T) -> Result<(), ParseError>,
{
    apply(entry).map_err(|e| e.at_index(index))
}
