//! Resource definitions.
//!
//! A [`Resource`] is one kind of configuration stanza the engine can manage.
//! It bundles everything the engine needs to know about that stanza: how to
//! address it, how to render a model into `set` statements, how to rebuild a
//! model from `| display set relative` output, and which statements remove
//! it. The engine is generic over this trait and never inspects concrete
//! types; [`AnyResource`] is the closed set of kinds for callers that select
//! one at runtime (for example by type name on import).
//!
//! # Adding a resource
//!
//! Implement [`Resource`] for a `Default + Clone` model struct, build its
//! statements with [`SetLines`](crate::stanza::SetLines) under
//! [`Resource::stanza`], parse with a [`LineTable`](crate::stanza::LineTable)
//! and add a variant to [`ResourceKind`] and [`AnyResource`].

mod kind;
pub mod kinds;

pub use kind::{AnyResource, ResourceKind};

use std::fmt;

use crate::error::{BuildError, IdError, ParseError};
use crate::id::{compose, decompose};
use crate::stanza::FieldPath;
use crate::stanza::lines::{delete_line, show_relative, statement_lines};

/// External stanza a resource depends on.
///
/// The engine checks every reference before taking the configuration lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// A routing instance; `default` always exists.
    RoutingInstance(String),
}

/// Capability set of one managed stanza kind.
pub trait Resource: Clone + Default + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Kind tag of this resource.
    const KIND: ResourceKind;

    /// Number of key fields in the identifier.
    const ID_PARTS: usize;

    /// Identifier format, shown when an import ID cannot be decomposed.
    const ID_SHAPE: &'static str;

    /// Key fields.
    type Key: Clone + fmt::Debug + Send + Sync;

    /// Key of this model.
    fn key(&self) -> Self::Key;

    /// Empty model with only the key fields set.
    fn with_key(key: &Self::Key) -> Self;

    /// Key fields as identifier parts.
    fn id_parts(key: &Self::Key) -> Vec<String>;

    /// Key from identifier parts; validates positional enums.
    fn key_from_parts(parts: Vec<String>) -> Result<Self::Key, IdError>;

    /// Configuration path of the stanza, e.g. `services proxy profile "p1"`.
    fn stanza(key: &Self::Key) -> String;

    /// Render the model into `set` statements.
    ///
    /// Must be pure. Fails on the first invalid field without emitting anything.
    fn build(&self) -> Result<Vec<String>, BuildError>;

    /// Apply one statement body, relative to [`Resource::stanza`].
    fn parse_line(&mut self, line: &str) -> Result<(), ParseError>;

    /// Field a relative statement body configures, used to attach a locator
    /// to a statement the device rejected.
    fn locate(&self, _line: &str) -> Option<FieldPath> {
        None
    }

    /// Whether a relative statement body belongs to this resource.
    ///
    /// Stanzas that contain other resources' sub-trees filter them out here.
    fn in_scope(_key: &Self::Key, _line: &str) -> bool {
        true
    }

    /// Command that shows this stanza as relative `set` statements.
    fn show_command(key: &Self::Key) -> String {
        show_relative(&Self::stanza(key))
    }

    /// Statements removing the stanza.
    fn delete_lines(key: &Self::Key) -> Vec<String> {
        vec![delete_line(&Self::stanza(key))]
    }

    /// Statements clearing managed fields before an update re-applies them.
    fn clear_lines(&self) -> Vec<String> {
        Self::delete_lines(&self.key())
    }

    /// External stanzas that must exist before this one is written.
    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    /// Statements leaving a disabled placeholder after delete, if the kind has one.
    fn placeholder_lines(_key: &Self::Key) -> Option<Vec<String>> {
        None
    }

    /// Whether existing relative statements are only a disabled placeholder.
    ///
    /// A placeholder counts as absent on create and is cleared first.
    fn is_placeholder(_lines: &[&str]) -> bool {
        false
    }

    /// Statement bodies of `output` that belong to this resource.
    fn scoped_lines<'a>(key: &Self::Key, output: &'a str) -> Vec<&'a str> {
        statement_lines(output)
            .into_iter()
            .filter(|line| Self::in_scope(key, line))
            .collect()
    }

    /// Identifier of the resource with this key.
    fn id_of(key: &Self::Key) -> String {
        compose(&Self::id_parts(key))
    }

    /// Identifier of this model.
    fn identifier(&self) -> String {
        Self::id_of(&self.key())
    }

    /// Key from an identifier string.
    fn key_from_id(id: &str) -> Result<Self::Key, IdError> {
        Self::key_from_parts(decompose(id, Self::ID_PARTS, Self::ID_SHAPE)?)
    }

    /// Rebuild a model from `| display set relative` output.
    ///
    /// Returns `None` when the output holds no statement for this resource,
    /// or only its disabled placeholder.
    fn from_config(key: &Self::Key, output: &str) -> Result<Option<Self>, ParseError> {
        let lines = Self::scoped_lines(key, output);
        if lines.is_empty() || Self::is_placeholder(&lines) {
            return Ok(None);
        }

        let mut model = Self::with_key(key);
        for line in lines {
            model.parse_line(line)?;
        }
        Ok(Some(model))
    }
}
