//! Builder and settings for the engine.

use serde::{Deserialize, Serialize};

use super::Engine;
use super::gate::ReadGate;

/// What a delete leaves behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Remove the stanza.
    #[default]
    Remove,
    /// Leave the kind's disabled placeholder, for kinds that have one.
    LeavePlaceholder,
}

/// Engine settings, loadable from a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub delete_policy: DeletePolicy,
    /// Read the stanza back after every create and update.
    pub verify_after_commit: bool,
    /// Prepended to every commit comment.
    pub comment_prefix: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delete_policy: DeletePolicy::Remove,
            verify_after_commit: true,
            comment_prefix: None,
        }
    }
}

/// Builder for constructing an [`Engine`].
///
/// # Example
///
/// ```rust
/// use junosync::engine::{DeletePolicy, EngineBuilder};
///
/// let engine = EngineBuilder::new()
///     .delete_policy(DeletePolicy::LeavePlaceholder)
///     .comment_prefix("netops")
///     .build();
/// assert!(engine.config().verify_after_commit);
/// ```
#[derive(Debug, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    gate: Option<ReadGate>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from loaded settings.
    pub fn from_config(config: EngineConfig) -> Self {
        Self { config, gate: None }
    }

    /// Set what deletes leave behind (default: remove).
    pub fn delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.config.delete_policy = policy;
        self
    }

    /// Enable or disable the post-commit read-back (default: enabled).
    pub fn verify_after_commit(mut self, verify: bool) -> Self {
        self.config.verify_after_commit = verify;
        self
    }

    /// Set a prefix for commit comments.
    pub fn comment_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.comment_prefix = Some(prefix.into());
        self
    }

    /// Share a read gate with other engines using the same connection.
    pub fn read_gate(mut self, gate: ReadGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Build the engine.
    pub fn build(self) -> Engine {
        Engine {
            config: self.config,
            gate: self.gate.unwrap_or_default(),
        }
    }
}
