//! `forwarding-options dhcp-relay` stanza, per routing instance and version.
//!
//! The v4 stanza is the parent of the v6 one (`dhcp-relay dhcpv6`), and both
//! hold groups and server groups managed as their own resources. Only the
//! global options below are owned here, so deletes and updates touch them leaf
//! by leaf instead of removing the stanza.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::routing_instance::DEFAULT_INSTANCE;
use super::{check_conflict, check_keyword};
use crate::error::{BuildError, BuildErrorKind, IdError, ParseError, ParseErrorKind};
use crate::id::{check_key_part, into_parts};
use crate::resource::{Reference, Resource, ResourceKind};
use crate::stanza::keyed::{entry_by_key, reject_duplicate_keys, with_entry};
use crate::stanza::lines::{cut, decode_keyword, decode_num, delete_line, quote, split_token, tokens, unquote};
use crate::stanza::{FieldPath, LineTable, SetLines};

const SERVER_MATCH_ACTIONS: &[&str] = &["create-relay-entry", "forward-only"];
const DUID_COMPARES: &[&str] = &["equals", "starts"];
const DUID_VALUE_TYPES: &[&str] = &["ascii", "hexadecimal"];
const SNOOPED_CLIENTS: &[&str] = &[
    "all-interfaces",
    "configured-interfaces",
    "non-configured-interfaces",
];

/// Sub-trees of the stanza owned by other resources.
const FOREIGN_V4: &[&str] = &["dhcpv6", "group", "server-group", "dual-stack-group"];
const FOREIGN_V6: &[&str] = &["group", "server-group"];

/// Leaves owned by this resource.
const MANAGED_LEAVES: &[&str] = &[
    "active-server-group",
    "arp-inspection",
    "forward-only",
    "forward-snooped-clients",
    "no-snoop",
    "relay-agent-interface-id",
    "relay-agent-option-79",
    "relay-agent-remote-id",
    "remote-id-mismatch",
    "route-suppression",
    "server-match",
    "server-response-time",
    "source-ip-change",
];

/// DHCP protocol version the relay stanza applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DhcpVersion {
    #[default]
    V4,
    V6,
}

impl DhcpVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            DhcpVersion::V4 => "v4",
            DhcpVersion::V6 => "v6",
        }
    }
}

impl fmt::Display for DhcpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DhcpVersion {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v4" => Ok(DhcpVersion::V4),
            "v6" => Ok(DhcpVersion::V6),
            _ => Err(IdError::InvalidPart {
                part: "version",
                value: s.to_string(),
                allowed: "v4, v6",
            }),
        }
    }
}

/// Key of a [`DhcpRelay`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpRelayKey {
    pub routing_instance: String,
    pub version: DhcpVersion,
}

/// `server-match address <prefix> <action>` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMatchAddress {
    pub address: String,
    pub action: String,
}

/// `server-match duid <compare> <value-type> <value> <action>` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMatchDuid {
    pub compare: String,
    pub value_type: String,
    pub value: String,
    pub action: String,
}

fn default_instance() -> String {
    DEFAULT_INSTANCE.to_string()
}

/// Global DHCP relay options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpRelay {
    #[serde(default = "default_instance")]
    pub routing_instance: String,
    #[serde(default)]
    pub version: DhcpVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_server_group: Option<String>,
    #[serde(default)]
    pub active_server_group_allow_server_change: bool,
    /// v4 only.
    #[serde(default)]
    pub arp_inspection: bool,
    #[serde(default)]
    pub forward_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_only_routing_instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_snooped_clients: Option<String>,
    #[serde(default)]
    pub no_snoop: bool,
    /// v6 only.
    #[serde(default)]
    pub relay_agent_interface_id: bool,
    /// v6 only.
    #[serde(default)]
    pub relay_agent_option_79: bool,
    /// v6 only.
    #[serde(default)]
    pub relay_agent_remote_id: bool,
    #[serde(default)]
    pub remote_id_mismatch_disconnect: bool,
    /// v6 only.
    #[serde(default)]
    pub route_suppression_access: bool,
    #[serde(default)]
    pub route_suppression_access_internal: bool,
    /// v4 only.
    #[serde(default)]
    pub route_suppression_destination: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub server_match_address: Vec<ServerMatchAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_match_default_action: Option<String>,
    /// v6 only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub server_match_duid: Vec<ServerMatchDuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_response_time: Option<u32>,
    /// v4 only.
    #[serde(default)]
    pub source_ip_change: bool,
}

impl Default for DhcpRelay {
    fn default() -> Self {
        Self {
            routing_instance: default_instance(),
            version: DhcpVersion::default(),
            active_server_group: None,
            active_server_group_allow_server_change: false,
            arp_inspection: false,
            forward_only: false,
            forward_only_routing_instance: None,
            forward_snooped_clients: None,
            no_snoop: false,
            relay_agent_interface_id: false,
            relay_agent_option_79: false,
            relay_agent_remote_id: false,
            remote_id_mismatch_disconnect: false,
            route_suppression_access: false,
            route_suppression_access_internal: false,
            route_suppression_destination: false,
            server_match_address: Vec::new(),
            server_match_default_action: None,
            server_match_duid: Vec::new(),
            server_response_time: None,
            source_ip_change: false,
        }
    }
}

fn table() -> &'static LineTable<DhcpRelay> {
    static TABLE: OnceLock<LineTable<DhcpRelay>> = OnceLock::new();
    TABLE.get_or_init(|| {
        LineTable::<DhcpRelay>::new()
            .rule(
                "active-server-group allow-server-change",
                "active_server_group_allow_server_change",
                |m, _| {
                    m.active_server_group_allow_server_change = true;
                    Ok(())
                },
            )
            .rule("active-server-group", "active_server_group", |m, v| {
                m.active_server_group = Some(unquote(v)?);
                Ok(())
            })
            .rule("arp-inspection", "arp_inspection", |m, _| {
                m.arp_inspection = true;
                Ok(())
            })
            .rule(
                "forward-only routing-instance",
                "forward_only_routing_instance",
                |m, v| {
                    m.forward_only = true;
                    m.forward_only_routing_instance = Some(unquote(v)?);
                    Ok(())
                },
            )
            .rule("forward-only", "forward_only", |m, _| {
                m.forward_only = true;
                Ok(())
            })
            .rule("forward-snooped-clients", "forward_snooped_clients", |m, v| {
                m.forward_snooped_clients = Some(decode_keyword(
                    v,
                    SNOOPED_CLIENTS,
                    "all-interfaces, configured-interfaces, non-configured-interfaces",
                )?);
                Ok(())
            })
            .rule("no-snoop", "no_snoop", |m, _| {
                m.no_snoop = true;
                Ok(())
            })
            .rule("relay-agent-interface-id", "relay_agent_interface_id", |m, _| {
                m.relay_agent_interface_id = true;
                Ok(())
            })
            .rule("relay-agent-option-79", "relay_agent_option_79", |m, _| {
                m.relay_agent_option_79 = true;
                Ok(())
            })
            .rule("relay-agent-remote-id", "relay_agent_remote_id", |m, _| {
                m.relay_agent_remote_id = true;
                Ok(())
            })
            .rule(
                "remote-id-mismatch disconnect",
                "remote_id_mismatch_disconnect",
                |m, _| {
                    m.remote_id_mismatch_disconnect = true;
                    Ok(())
                },
            )
            .rule(
                "route-suppression access-internal",
                "route_suppression_access_internal",
                |m, _| {
                    m.route_suppression_access_internal = true;
                    Ok(())
                },
            )
            .rule("route-suppression access", "route_suppression_access", |m, _| {
                m.route_suppression_access = true;
                Ok(())
            })
            .rule(
                "route-suppression destination",
                "route_suppression_destination",
                |m, _| {
                    m.route_suppression_destination = true;
                    Ok(())
                },
            )
            .rule("server-match address", "server_match_address", |m, v| {
                let (address, action) = split_token(v)?;
                let (index, entry) = entry_by_key(
                    &mut m.server_match_address,
                    |e| e.address == address,
                    || ServerMatchAddress {
                        address: address.clone(),
                        ..Default::default()
                    },
                );
                with_entry(index, entry, |e| {
                    e.action = decode_keyword(action, SERVER_MATCH_ACTIONS, "create-relay-entry, forward-only")
                        .map_err(|err| err.under("action"))?;
                    Ok(())
                })
            })
            .rule(
                "server-match default-action",
                "server_match_default_action",
                |m, v| {
                    m.server_match_default_action = Some(decode_keyword(
                        v,
                        SERVER_MATCH_ACTIONS,
                        "create-relay-entry, forward-only",
                    )?);
                    Ok(())
                },
            )
            .rule("server-match duid", "server_match_duid", |m, v| {
                let parts = tokens(v)?;
                let [compare, value_type, value, action] = <[String; 4]>::try_from(parts)
                    .map_err(|_| ParseError::new(ParseErrorKind::MissingKey { line: v.to_string() }))?;
                let (index, entry) = entry_by_key(
                    &mut m.server_match_duid,
                    |e| e.compare == compare && e.value_type == value_type && e.value == value,
                    || ServerMatchDuid {
                        compare: compare.clone(),
                        value_type: value_type.clone(),
                        value: value.clone(),
                        ..Default::default()
                    },
                );
                with_entry(index, entry, |e| {
                    e.action = decode_keyword(&action, SERVER_MATCH_ACTIONS, "create-relay-entry, forward-only")
                        .map_err(|err| err.under("action"))?;
                    Ok(())
                })
            })
            .rule("server-response-time", "server_response_time", |m, v| {
                m.server_response_time = Some(decode_num(v)?);
                Ok(())
            })
            .rule("source-ip-change", "source_ip_change", |m, _| {
                m.source_ip_change = true;
                Ok(())
            })
    })
}

impl DhcpRelay {
    /// Attributes legal only for one version, and whether each is set.
    fn version_gated(&self) -> [(&'static str, DhcpVersion, bool); 8] {
        [
            ("arp_inspection", DhcpVersion::V4, self.arp_inspection),
            ("route_suppression_destination", DhcpVersion::V4, self.route_suppression_destination),
            ("source_ip_change", DhcpVersion::V4, self.source_ip_change),
            ("relay_agent_interface_id", DhcpVersion::V6, self.relay_agent_interface_id),
            ("relay_agent_option_79", DhcpVersion::V6, self.relay_agent_option_79),
            ("relay_agent_remote_id", DhcpVersion::V6, self.relay_agent_remote_id),
            ("route_suppression_access", DhcpVersion::V6, self.route_suppression_access),
            ("server_match_duid", DhcpVersion::V6, !self.server_match_duid.is_empty()),
        ]
    }

    fn validate(&self) -> Result<(), BuildError> {
        check_key_part(&self.routing_instance, "routing_instance")?;

        for (attr, only, set) in self.version_gated() {
            if set && self.version != only {
                return Err(BuildError::new(
                    FieldPath::of(attr),
                    BuildErrorKind::NotAllowed {
                        discriminator: "version",
                        value: self.version.to_string(),
                    },
                ));
            }
        }

        if self.active_server_group_allow_server_change && self.active_server_group.is_none() {
            return Err(BuildError::new(
                FieldPath::of("active_server_group_allow_server_change"),
                BuildErrorKind::Requires {
                    required: "active_server_group",
                },
            ));
        }
        if self.forward_only_routing_instance.is_some() && !self.forward_only {
            return Err(BuildError::new(
                FieldPath::of("forward_only_routing_instance"),
                BuildErrorKind::Requires {
                    required: "forward_only",
                },
            ));
        }
        if let Some(clients) = &self.forward_snooped_clients {
            check_keyword(clients, SNOOPED_CLIENTS, FieldPath::of("forward_snooped_clients"))?;
        }
        check_conflict(
            self.route_suppression_access_internal,
            self.route_suppression_access,
            FieldPath::of("route_suppression_access_internal"),
            "route_suppression_access",
        )?;
        check_conflict(
            self.route_suppression_access_internal,
            self.route_suppression_destination,
            FieldPath::of("route_suppression_access_internal"),
            "route_suppression_destination",
        )?;
        if let Some(action) = &self.server_match_default_action {
            check_keyword(
                action,
                SERVER_MATCH_ACTIONS,
                FieldPath::of("server_match_default_action"),
            )?;
        }

        reject_duplicate_keys(&self.server_match_address, "server_match_address", |e| {
            e.address.clone()
        })?;
        for (index, entry) in self.server_match_address.iter().enumerate() {
            let at = |attr| FieldPath::of("server_match_address").index(index).attr(attr);
            if entry.address.is_empty() {
                return Err(BuildError::new(at("address"), BuildErrorKind::Missing));
            }
            check_keyword(&entry.action, SERVER_MATCH_ACTIONS, at("action"))?;
        }

        reject_duplicate_keys(&self.server_match_duid, "server_match_duid", |e| {
            (e.compare.clone(), e.value_type.clone(), e.value.clone())
        })?;
        for (index, entry) in self.server_match_duid.iter().enumerate() {
            let at = |attr| FieldPath::of("server_match_duid").index(index).attr(attr);
            check_keyword(&entry.compare, DUID_COMPARES, at("compare"))?;
            check_keyword(&entry.value_type, DUID_VALUE_TYPES, at("value_type"))?;
            if entry.value.is_empty() {
                return Err(BuildError::new(at("value"), BuildErrorKind::Missing));
            }
            check_keyword(&entry.action, SERVER_MATCH_ACTIONS, at("action"))?;
        }
        Ok(())
    }
}

impl Resource for DhcpRelay {
    const KIND: ResourceKind = ResourceKind::ForwardingOptionsDhcpRelay;
    const ID_PARTS: usize = 2;
    const ID_SHAPE: &'static str = "<routing_instance>_-_<version>";

    type Key = DhcpRelayKey;

    fn key(&self) -> DhcpRelayKey {
        DhcpRelayKey {
            routing_instance: self.routing_instance.clone(),
            version: self.version,
        }
    }

    fn with_key(key: &DhcpRelayKey) -> Self {
        Self {
            routing_instance: key.routing_instance.clone(),
            version: key.version,
            ..Default::default()
        }
    }

    fn id_parts(key: &DhcpRelayKey) -> Vec<String> {
        vec![key.routing_instance.clone(), key.version.to_string()]
    }

    fn key_from_parts(parts: Vec<String>) -> Result<DhcpRelayKey, IdError> {
        let [routing_instance, version] = into_parts(parts, Self::ID_SHAPE)?;
        Ok(DhcpRelayKey {
            routing_instance,
            version: version.parse()?,
        })
    }

    fn stanza(key: &DhcpRelayKey) -> String {
        let mut stanza = String::new();
        if key.routing_instance != DEFAULT_INSTANCE {
            stanza.push_str(&format!("routing-instances {} ", quote(&key.routing_instance)));
        }
        stanza.push_str("forwarding-options dhcp-relay");
        if key.version == DhcpVersion::V6 {
            stanza.push_str(" dhcpv6");
        }
        stanza
    }

    fn build(&self) -> Result<Vec<String>, BuildError> {
        self.validate()?;

        let mut lines = SetLines::new(Self::stanza(&self.key()));
        lines.text("active-server-group", self.active_server_group.as_deref());
        lines.flag(
            self.active_server_group_allow_server_change,
            "active-server-group allow-server-change",
        );
        lines.flag(self.arp_inspection, "arp-inspection");
        match &self.forward_only_routing_instance {
            Some(instance) => lines.text("forward-only routing-instance", Some(instance.as_str())),
            None => lines.flag(self.forward_only, "forward-only"),
        }
        lines.value("forward-snooped-clients", self.forward_snooped_clients.as_deref());
        lines.flag(self.no_snoop, "no-snoop");
        lines.flag(self.relay_agent_interface_id, "relay-agent-interface-id");
        lines.flag(self.relay_agent_option_79, "relay-agent-option-79");
        lines.flag(self.relay_agent_remote_id, "relay-agent-remote-id");
        lines.flag(self.remote_id_mismatch_disconnect, "remote-id-mismatch disconnect");
        lines.flag(self.route_suppression_access, "route-suppression access");
        lines.flag(
            self.route_suppression_access_internal,
            "route-suppression access-internal",
        );
        lines.flag(self.route_suppression_destination, "route-suppression destination");
        for entry in &self.server_match_address {
            lines.push(format_args!(
                "server-match address {} {}",
                quote(&entry.address),
                entry.action
            ));
        }
        lines.value(
            "server-match default-action",
            self.server_match_default_action.as_deref(),
        );
        for entry in &self.server_match_duid {
            lines.push(format_args!(
                "server-match duid {} {} {} {}",
                entry.compare,
                entry.value_type,
                quote(&entry.value),
                entry.action
            ));
        }
        lines.value("server-response-time", self.server_response_time);
        lines.flag(self.source_ip_change, "source-ip-change");
        if lines.is_empty() {
            return Err(BuildError::at_root(BuildErrorKind::Invalid(
                "at least one option must be set".to_string(),
            )));
        }
        Ok(lines.into_lines())
    }

    fn parse_line(&mut self, line: &str) -> Result<(), ParseError> {
        table().apply(self, line).map(|_| ())
    }

    fn locate(&self, line: &str) -> Option<FieldPath> {
        table().locate(line).map(FieldPath::of)
    }

    fn in_scope(key: &DhcpRelayKey, line: &str) -> bool {
        let foreign = match key.version {
            DhcpVersion::V4 => FOREIGN_V4,
            DhcpVersion::V6 => FOREIGN_V6,
        };
        !foreign.iter().any(|prefix| cut(line, prefix).is_some())
    }

    fn delete_lines(key: &DhcpRelayKey) -> Vec<String> {
        let stanza = Self::stanza(key);
        MANAGED_LEAVES
            .iter()
            .map(|leaf| delete_line(&format!("{} {}", stanza, leaf)))
            .collect()
    }

    fn references(&self) -> Vec<Reference> {
        if self.routing_instance == DEFAULT_INSTANCE {
            Vec::new()
        } else {
            vec![Reference::RoutingInstance(self.routing_instance.clone())]
        }
    }
}
