//! Concrete resource kinds.

mod dhcp_relay;
mod interface_physical;
mod nat_source;
mod proxy_profile;
pub mod routing_instance;

pub use dhcp_relay::{DhcpRelay, DhcpRelayKey, DhcpVersion, ServerMatchAddress, ServerMatchDuid};
pub use interface_physical::{EtherOpts, InterfacePhysical, ParentEtherOpts};
pub use nat_source::{NatContext, NatMatch, NatRule, NatSourceRuleSet, NatThen};
pub use proxy_profile::ProxyProfile;

use crate::error::{BuildError, BuildErrorKind};
use crate::stanza::FieldPath;

/// Reject a keyword field whose value is not one of `allowed`.
fn check_keyword(value: &str, allowed: &[&str], path: FieldPath) -> Result<(), BuildError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(BuildError::new(
            path,
            BuildErrorKind::Invalid(format!(
                "'{}' is not one of {}",
                value,
                allowed.join(", ")
            )),
        ))
    }
}

/// Fail with `Conflict` at `path` when both flags are set.
fn check_conflict(
    set: bool,
    other_set: bool,
    path: FieldPath,
    other: &'static str,
) -> Result<(), BuildError> {
    if set && other_set {
        Err(BuildError::new(
            path,
            BuildErrorKind::Conflict { other },
        ))
    } else {
        Ok(())
    }
}
