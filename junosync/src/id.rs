//! Resource identifiers.
//!
//! An identifier is the resource's key fields joined with [`ID_SEPARATOR`].
//! Key fields are validated at build time so the separator never appears
//! inside one, which makes [`decompose`] the exact inverse of [`compose`].

use crate::error::{BuildError, BuildErrorKind, IdError};
use crate::stanza::FieldPath;

/// Reserved token joining key fields.
pub const ID_SEPARATOR: &str = "_-_";

/// Join key fields into an identifier.
pub fn compose<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(ID_SEPARATOR)
}

/// Split an identifier into exactly `expected` key fields.
///
/// `shape` describes the expected format in the error, e.g.
/// `"<routing_instance>_-_<version>"`.
pub fn decompose(id: &str, expected: usize, shape: &'static str) -> Result<Vec<String>, IdError> {
    let parts: Vec<String> = id.split(ID_SEPARATOR).map(str::to_string).collect();
    if id.is_empty() || parts.len() != expected || parts.iter().any(String::is_empty) {
        return Err(IdError::BadFormat {
            id: id.to_string(),
            shape,
        });
    }
    Ok(parts)
}

/// Convert decomposed parts into a fixed-size array of key fields.
pub fn into_parts<const N: usize>(
    parts: Vec<String>,
    shape: &'static str,
) -> Result<[String; N], IdError> {
    <[String; N]>::try_from(parts).map_err(|parts| IdError::BadFormat {
        id: compose(&parts),
        shape,
    })
}

/// Validate a key field: it must be set and must not contain the separator.
pub fn check_key_part(value: &str, attr: &'static str) -> Result<(), BuildError> {
    if value.is_empty() {
        return Err(BuildError::new(FieldPath::of(attr), BuildErrorKind::Missing));
    }
    if value.contains(ID_SEPARATOR) {
        return Err(BuildError::new(
            FieldPath::of(attr),
            BuildErrorKind::Invalid(format!("must not contain '{}'", ID_SEPARATOR)),
        ));
    }
    Ok(())
}
