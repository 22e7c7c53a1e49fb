//! Closed set of supported resource kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Resource;
use super::kinds::{DhcpRelay, InterfacePhysical, NatSourceRuleSet, ProxyProfile};
use crate::error::{BuildError, Error};

/// Supported resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// `junos_services_proxy_profile`
    ServicesProxyProfile,
    /// `junos_interface_physical`
    InterfacePhysical,
    /// `junos_forwardingoptions_dhcprelay`
    ForwardingOptionsDhcpRelay,
    /// `junos_security_nat_source`
    SecurityNatSource,
}

impl ResourceKind {
    /// Every supported kind.
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::ServicesProxyProfile,
        ResourceKind::InterfacePhysical,
        ResourceKind::ForwardingOptionsDhcpRelay,
        ResourceKind::SecurityNatSource,
    ];

    /// Type name used in state files and import commands.
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceKind::ServicesProxyProfile => "junos_services_proxy_profile",
            ResourceKind::InterfacePhysical => "junos_interface_physical",
            ResourceKind::ForwardingOptionsDhcpRelay => "junos_forwardingoptions_dhcprelay",
            ResourceKind::SecurityNatSource => "junos_security_nat_source",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.type_name() == s)
            .ok_or_else(|| Error::UnknownKind {
                name: s.to_string(),
            })
    }
}

/// A model of any supported kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnyResource {
    #[serde(rename = "junos_services_proxy_profile")]
    ServicesProxyProfile(ProxyProfile),
    #[serde(rename = "junos_interface_physical")]
    InterfacePhysical(InterfacePhysical),
    #[serde(rename = "junos_forwardingoptions_dhcprelay")]
    ForwardingOptionsDhcpRelay(DhcpRelay),
    #[serde(rename = "junos_security_nat_source")]
    SecurityNatSource(NatSourceRuleSet),
}

impl AnyResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            AnyResource::ServicesProxyProfile(_) => ResourceKind::ServicesProxyProfile,
            AnyResource::InterfacePhysical(_) => ResourceKind::InterfacePhysical,
            AnyResource::ForwardingOptionsDhcpRelay(_) => ResourceKind::ForwardingOptionsDhcpRelay,
            AnyResource::SecurityNatSource(_) => ResourceKind::SecurityNatSource,
        }
    }

    pub fn identifier(&self) -> String {
        match self {
            AnyResource::ServicesProxyProfile(m) => m.identifier(),
            AnyResource::InterfacePhysical(m) => m.identifier(),
            AnyResource::ForwardingOptionsDhcpRelay(m) => m.identifier(),
            AnyResource::SecurityNatSource(m) => m.identifier(),
        }
    }

    /// Render the wrapped model into `set` statements.
    pub fn build(&self) -> Result<Vec<String>, BuildError> {
        match self {
            AnyResource::ServicesProxyProfile(m) => m.build(),
            AnyResource::InterfacePhysical(m) => m.build(),
            AnyResource::ForwardingOptionsDhcpRelay(m) => m.build(),
            AnyResource::SecurityNatSource(m) => m.build(),
        }
    }
}

impl From<ProxyProfile> for AnyResource {
    fn from(m: ProxyProfile) -> Self {
        AnyResource::ServicesProxyProfile(m)
    }
}

impl From<InterfacePhysical> for AnyResource {
    fn from(m: InterfacePhysical) -> Self {
        AnyResource::InterfacePhysical(m)
    }
}

impl From<DhcpRelay> for AnyResource {
    fn from(m: DhcpRelay) -> Self {
        AnyResource::ForwardingOptionsDhcpRelay(m)
    }
}

impl From<NatSourceRuleSet> for AnyResource {
    fn from(m: NatSourceRuleSet) -> Self {
        AnyResource::SecurityNatSource(m)
    }
}
