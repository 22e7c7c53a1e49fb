//! Error types for junosync.
//!
//! Errors are layered the same way the engine is: the [`Session`] reports
//! [`SessionError`]s, line builders report [`BuildError`]s, line parsers report
//! [`ParseError`]s and identifier decomposition reports [`IdError`]s. The
//! orchestrator wraps all of them in [`Error`], which also tells the caller
//! whether the device was mutated before the failure.
//!
//! [`Session`]: crate::session::Session

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::resource::ResourceKind;
use crate::stanza::FieldPath;

/// Main error type for junosync operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The desired model is invalid; raised before any I/O.
    #[error("Validation error: {0}")]
    Validation(#[from] BuildError),

    /// A pre-condition on an external stanza failed; nothing was sent to the device.
    #[error("Pre-check failed for {kind} '{id}': {message}")]
    Precheck {
        kind: ResourceKind,
        id: String,
        message: String,
    },

    /// The target stanza already exists on the device.
    #[error("{kind} '{id}' already exists")]
    Duplicate { kind: ResourceKind, id: String },

    /// The session rejected a staged statement. The change-set was rolled back.
    #[error("Failed to apply configuration for {kind} '{id}'{}: {source}", at_path(.path))]
    Apply {
        kind: ResourceKind,
        id: String,
        path: Option<FieldPath>,
        #[source]
        source: SessionError,
    },

    /// The device rejected the change-set at commit. It was rolled back.
    #[error("Commit failed for {kind} '{id}': {source}")]
    Commit {
        kind: ResourceKind,
        id: String,
        #[source]
        source: SessionError,
    },

    /// Commit succeeded but the stanza is absent afterwards.
    #[error("{kind} '{id}' not found after commit")]
    NotFoundAfterCommit { kind: ResourceKind, id: String },

    /// Commit succeeded but the post-commit verification itself failed.
    #[error("{kind} '{id}' was committed but could not be verified: {source}")]
    AppliedButUnverified {
        kind: ResourceKind,
        id: String,
        #[source]
        source: Box<Error>,
    },

    /// The stanza does not exist on the device.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: ResourceKind, id: String },

    /// Unknown resource type name.
    #[error("Unknown resource type '{name}'")]
    UnknownKind { name: String },

    /// Identifier could not be decomposed into key fields.
    #[error("Bad ID: {0}")]
    BadId(#[from] IdError),

    /// Device output could not be decoded into a model.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Session-level failure outside of apply/commit.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

fn at_path(path: &Option<FieldPath>) -> String {
    match path {
        Some(path) => format!(" at {}", path),
        None => String::new(),
    }
}

/// Where a failed operation left the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    /// Committed and verified.
    Applied,
    /// Nothing was committed; the device is unchanged.
    RolledBack,
    /// Committed, but the post-commit check failed. The device was mutated.
    AppliedButUnverified,
}

impl Error {
    /// Field locator of the offending input, when one is known.
    pub fn field_path(&self) -> Option<&FieldPath> {
        match self {
            Error::Validation(e) => Some(&e.path),
            Error::Parse(e) => Some(&e.path),
            Error::Apply { path, .. } => path.as_ref(),
            _ => None,
        }
    }

    /// Terminal state of the write transaction that produced this error.
    ///
    /// Returns `None` for read-side errors.
    pub fn terminal_state(&self) -> Option<TerminalState> {
        match self {
            Error::NotFoundAfterCommit { .. } | Error::AppliedButUnverified { .. } => {
                Some(TerminalState::AppliedButUnverified)
            }
            Error::Validation(_)
            | Error::Precheck { .. }
            | Error::Duplicate { .. }
            | Error::Apply { .. }
            | Error::Commit { .. } => Some(TerminalState::RolledBack),
            _ => None,
        }
    }

    /// Whether the device configuration was changed before the failure.
    ///
    /// Callers should not retry these automatically.
    pub fn is_device_mutated(&self) -> bool {
        self.terminal_state() == Some(TerminalState::AppliedButUnverified)
    }
}

/// Errors reported by a [`Session`](crate::session::Session) implementation.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A command returned an error.
    #[error("Command '{command}' failed: {message}")]
    Command { command: String, message: String },

    /// A staged statement was rejected.
    #[error("Statement rejected: '{line}': {message}")]
    Rejected { line: String, message: String },

    /// The configuration database is locked by someone else.
    #[error("Configuration database locked: {message}")]
    Locked { message: String },

    /// An operation needing the configuration lock ran without it.
    #[error("Configuration database is not locked by this session")]
    NotLocked,

    /// The device refused to commit.
    #[error("Commit refused: {message}")]
    CommitFailed { message: String },

    /// The session was closed.
    #[error("Session closed")]
    Closed,

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SessionError {
    /// The statement the device rejected, if this is a rejection.
    pub fn rejected_line(&self) -> Option<&str> {
        match self {
            SessionError::Rejected { line, .. } => Some(line),
            _ => None,
        }
    }
}

/// Build-time failure, attached to the offending field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{path}: {kind}")]
pub struct BuildError {
    /// Locator of the field that caused the failure.
    pub path: FieldPath,
    /// What went wrong.
    pub kind: BuildErrorKind,
}

impl BuildError {
    pub fn new(path: FieldPath, kind: BuildErrorKind) -> Self {
        Self { path, kind }
    }

    /// Error on the sub-block itself, e.g. a missing required block.
    pub fn at_root(kind: BuildErrorKind) -> Self {
        Self::new(FieldPath::root(), kind)
    }

    /// Prepend an attribute to the locator.
    pub fn under(mut self, attr: &'static str) -> Self {
        self.path = self.path.prepend_attr(attr);
        self
    }

    /// Prepend a list index to the locator.
    pub fn at_index(mut self, index: usize) -> Self {
        self.path = self.path.prepend_index(index);
        self
    }
}

/// Categories of build-time failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildErrorKind {
    /// Field must be set.
    #[error("must be set")]
    Missing,

    /// Field cannot be set together with a sibling.
    #[error("conflicts with '{other}'")]
    Conflict { other: &'static str },

    /// Field requires a sibling to be set.
    #[error("requires '{required}' to be set")]
    Requires { required: &'static str },

    /// Field is not legal for the value of a discriminator.
    #[error("not allowed when {discriminator} = {value:?}")]
    NotAllowed {
        discriminator: &'static str,
        value: String,
    },

    /// Two elements of a keyed list share the same key.
    #[error("duplicate entry with key {key}")]
    DuplicateKey { key: String },

    /// Value is not acceptable.
    #[error("{0}")]
    Invalid(String),
}

/// Failure decoding a configuration line into a model field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{path}: {kind}")]
pub struct ParseError {
    /// Locator of the field being decoded.
    pub path: FieldPath,
    /// What went wrong.
    pub kind: ParseErrorKind,
}

impl ParseError {
    /// Error at the root; callers prepend segments as it bubbles up.
    pub fn new(kind: ParseErrorKind) -> Self {
        Self {
            path: FieldPath::root(),
            kind,
        }
    }

    /// Prepend an attribute to the locator.
    pub fn under(mut self, attr: &'static str) -> Self {
        self.path = self.path.prepend_attr(attr);
        self
    }

    /// Prepend a list index to the locator.
    pub fn at_index(mut self, index: usize) -> Self {
        self.path = self.path.prepend_index(index);
        self
    }
}

/// Categories of parse failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Integer field with a malformed value.
    #[error("invalid number '{value}'")]
    InvalidNumber { value: String },

    /// Enumerated field with an unknown value.
    #[error("invalid value '{value}', expected one of {expected}")]
    InvalidValue {
        value: String,
        expected: &'static str,
    },

    /// A keyed line is missing its key.
    #[error("missing key in '{line}'")]
    MissingKey { line: String },

    /// A quoted value never closes.
    #[error("unterminated quoted string '{value}'")]
    UnterminatedQuote { value: String },
}

/// Identifier decomposition failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// Wrong number of separator-delimited parts.
    #[error("can't decompose '{id}', expected format '{shape}'")]
    BadFormat { id: String, shape: &'static str },

    /// A positional enum part has an unknown value.
    #[error("invalid {part} '{value}' in ID, expected one of {allowed}")]
    InvalidPart {
        part: &'static str,
        value: String,
        allowed: &'static str,
    },
}

/// Result type alias using junosync's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        let err = Error::NotFoundAfterCommit {
            kind: ResourceKind::ServicesProxyProfile,
            id: "p1".to_string(),
        };
        assert_eq!(err.terminal_state(), Some(TerminalState::AppliedButUnverified));
        assert!(err.is_device_mutated());

        let err = Error::Commit {
            kind: ResourceKind::ServicesProxyProfile,
            id: "p1".to_string(),
            source: SessionError::CommitFailed {
                message: "boom".to_string(),
            },
        };
        assert_eq!(err.terminal_state(), Some(TerminalState::RolledBack));
        assert!(!err.is_device_mutated());

        let err = Error::NotFound {
            kind: ResourceKind::ServicesProxyProfile,
            id: "p1".to_string(),
        };
        assert_eq!(err.terminal_state(), None);
    }

    #[test]
    fn test_field_path_is_kept() {
        let err: Error = BuildError::new(
            FieldPath::of("rule").index(1).attr("name"),
            BuildErrorKind::DuplicateKey {
                key: "r1".to_string(),
            },
        )
        .into();
        assert_eq!(err.field_path().unwrap().to_string(), "rule[1].name");
        assert_eq!(
            err.to_string(),
            "Validation error: rule[1].name: duplicate entry with key r1"
        );
    }

    #[test]
    fn test_parse_error_nesting() {
        let err = ParseError::new(ParseErrorKind::InvalidNumber {
            value: "x".to_string(),
        })
        .under("pool")
        .under("then")
        .at_index(2)
        .under("rule");
        assert_eq!(err.path.to_string(), "rule[2].then.pool");
    }

    #[test]
    fn test_apply_error_display() {
        let err = Error::Apply {
            kind: ResourceKind::InterfacePhysical,
            id: "ge-0/0/0".to_string(),
            path: Some(FieldPath::of("mtu")),
            source: SessionError::Rejected {
                line: "set interfaces ge-0/0/0 mtu 99999".to_string(),
                message: "value out of range".to_string(),
            },
        };
        assert!(err.to_string().contains(" at mtu: "));
    }
}
