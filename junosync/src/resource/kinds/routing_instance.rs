//! Routing instance existence probe.
//!
//! Routing instances are not managed here; other resources only need to know
//! whether one exists before writing under it.

use crate::stanza::lines::{quote, show_relative, statement_lines};

/// The master instance. It always exists and has no stanza.
pub const DEFAULT_INSTANCE: &str = "default";

/// Command listing the instance's configuration.
pub fn show_command(name: &str) -> String {
    show_relative(&format!("routing-instances {}", quote(name)))
}

/// Whether `show_command` output proves the instance exists.
pub fn exists_in(output: &str) -> bool {
    !statement_lines(output).is_empty()
}
