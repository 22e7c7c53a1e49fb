//! `interfaces <name>` stanza for a physical or aggregate interface.
//!
//! Logical units other than `unit 0 family ethernet-switching` belong to other
//! resources and are filtered out of the stanza. Deleting a physical port can
//! leave it disabled with the description `NC` instead of removing it, and a
//! port in that state reads as absent.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::{check_conflict, check_keyword};
use crate::error::{BuildError, BuildErrorKind, IdError, ParseError};
use crate::id::{check_key_part, into_parts};
use crate::resource::{Resource, ResourceKind};
use crate::stanza::keyed::reject_duplicate_keys;
use crate::stanza::lines::{cut, decode_keyword, decode_num, delete_line, needs_quotes, quote, unquote};
use crate::stanza::{FieldPath, LineTable, SetLines};

const SWITCHING: &str = "unit 0 family ethernet-switching";
const PLACEHOLDER_DESCRIPTION: &str = "NC";

const LACP_MODES: &[&str] = &["active", "passive"];
const LACP_PERIODS: &[&str] = &["fast", "slow"];

/// Statements cleared before an update re-applies the model.
const MANAGED_LEAVES: &[&str] = &[
    "description",
    "disable",
    "mtu",
    "vlan-tagging",
    "native-vlan-id",
    "unit 0 family ethernet-switching interface-mode",
    "unit 0 family ethernet-switching port-mode",
    "unit 0 family ethernet-switching vlan",
    "ether-options",
    "aggregated-ether-options",
];

/// Physical interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfacePhysical {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub disable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(default)]
    pub vlan_tagging: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_native: Option<u16>,
    /// `interface-mode trunk` (ELS switches).
    #[serde(default)]
    pub trunk: bool,
    /// `port-mode trunk` (non-ELS switches).
    #[serde(default)]
    pub trunk_non_els: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vlan_members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ether_opts: Option<EtherOpts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_ether_opts: Option<ParentEtherOpts>,
}

/// `ether-options` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtherOpts {
    /// Aggregate this port into the named `ae` interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ae_8023ad: Option<String>,
    /// Make this port a child of the named `reth` interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redundant_parent: Option<String>,
    pub auto_negotiation: bool,
    pub no_auto_negotiation: bool,
    pub flow_control: bool,
    pub no_flow_control: bool,
    pub loopback: bool,
    pub no_loopback: bool,
}

impl EtherOpts {
    /// Whether no option of the block is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn validate(&self) -> Result<(), BuildError> {
        let at = |attr| FieldPath::of("ether_opts").attr(attr);
        if self.is_empty() {
            return Err(BuildError::new(
                FieldPath::of("ether_opts"),
                BuildErrorKind::Invalid("at least one option must be set".to_string()),
            ));
        }
        check_conflict(
            self.redundant_parent.is_some(),
            self.ae_8023ad.is_some(),
            at("redundant_parent"),
            "ae_8023ad",
        )?;
        check_conflict(
            self.no_auto_negotiation,
            self.auto_negotiation,
            at("no_auto_negotiation"),
            "auto_negotiation",
        )?;
        check_conflict(
            self.no_flow_control,
            self.flow_control,
            at("no_flow_control"),
            "flow_control",
        )?;
        check_conflict(self.no_loopback, self.loopback, at("no_loopback"), "loopback")
    }

    fn render(&self, lines: &mut SetLines) {
        lines.value("ether-options 802.3ad", self.ae_8023ad.as_deref());
        lines.value("ether-options redundant-parent", self.redundant_parent.as_deref());
        lines.flag(self.auto_negotiation, "ether-options auto-negotiation");
        lines.flag(self.no_auto_negotiation, "ether-options no-auto-negotiation");
        lines.flag(self.flow_control, "ether-options flow-control");
        lines.flag(self.no_flow_control, "ether-options no-flow-control");
        lines.flag(self.loopback, "ether-options loopback");
        lines.flag(self.no_loopback, "ether-options no-loopback");
    }
}

/// `aggregated-ether-options` block, only legal on `ae` and `reth` interfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParentEtherOpts {
    /// `active` or `passive`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lacp: Option<String>,
    /// `fast` or `slow`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lacp_periodic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_links: Option<u8>,
}

impl ParentEtherOpts {
    /// Whether no option of the block is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn validate(&self) -> Result<(), BuildError> {
        let at = |attr| FieldPath::of("parent_ether_opts").attr(attr);
        if self.is_empty() {
            return Err(BuildError::new(
                FieldPath::of("parent_ether_opts"),
                BuildErrorKind::Invalid("at least one option must be set".to_string()),
            ));
        }
        if let Some(mode) = &self.lacp {
            check_keyword(mode, LACP_MODES, at("lacp"))?;
        }
        if let Some(period) = &self.lacp_periodic {
            if self.lacp.is_none() {
                return Err(BuildError::new(
                    at("lacp_periodic"),
                    BuildErrorKind::Requires { required: "lacp" },
                ));
            }
            check_keyword(period, LACP_PERIODS, at("lacp_periodic"))?;
        }
        if self.minimum_links == Some(0) {
            return Err(BuildError::new(
                at("minimum_links"),
                BuildErrorKind::Invalid("must be at least 1".to_string()),
            ));
        }
        Ok(())
    }

    fn render(&self, lines: &mut SetLines) {
        lines.value("aggregated-ether-options lacp", self.lacp.as_deref());
        lines.value("aggregated-ether-options lacp periodic", self.lacp_periodic.as_deref());
        lines.value("aggregated-ether-options minimum-links", self.minimum_links);
    }
}

fn is_aggregate(name: &str) -> bool {
    name.starts_with("ae") || name.starts_with("reth")
}

fn table() -> &'static LineTable<InterfacePhysical> {
    static TABLE: OnceLock<LineTable<InterfacePhysical>> = OnceLock::new();
    TABLE.get_or_init(|| {
        LineTable::<InterfacePhysical>::new()
            .rule("description", "description", |m, v| {
                m.description = Some(unquote(v)?);
                Ok(())
            })
            .rule("disable", "disable", |m, _| {
                m.disable = true;
                Ok(())
            })
            .rule("mtu", "mtu", |m, v| {
                m.mtu = Some(decode_num(v)?);
                Ok(())
            })
            .rule("vlan-tagging", "vlan_tagging", |m, _| {
                m.vlan_tagging = true;
                Ok(())
            })
            .rule("native-vlan-id", "vlan_native", |m, v| {
                m.vlan_native = Some(decode_num(v)?);
                Ok(())
            })
            .rule(
                "unit 0 family ethernet-switching interface-mode trunk",
                "trunk",
                |m, _| {
                    m.trunk = true;
                    Ok(())
                },
            )
            .rule(
                "unit 0 family ethernet-switching port-mode trunk",
                "trunk_non_els",
                |m, _| {
                    m.trunk_non_els = true;
                    Ok(())
                },
            )
            .rule(
                "unit 0 family ethernet-switching vlan members",
                "vlan_members",
                |m, v| {
                    m.vlan_members.push(unquote(v)?);
                    Ok(())
                },
            )
            .rule("ether-options", "ether_opts", |m, v| {
                let mut opts = m.ether_opts.take().unwrap_or_default();
                ether_table().apply(&mut opts, v)?;
                m.ether_opts = (!opts.is_empty()).then_some(opts);
                Ok(())
            })
            .rule("aggregated-ether-options", "parent_ether_opts", |m, v| {
                let mut opts = m.parent_ether_opts.take().unwrap_or_default();
                parent_table().apply(&mut opts, v)?;
                m.parent_ether_opts = (!opts.is_empty()).then_some(opts);
                Ok(())
            })
    })
}

fn ether_table() -> &'static LineTable<EtherOpts> {
    static TABLE: OnceLock<LineTable<EtherOpts>> = OnceLock::new();
    TABLE.get_or_init(|| {
        LineTable::<EtherOpts>::new()
            .rule("802.3ad", "ae_8023ad", |m, v| {
                m.ae_8023ad = Some(unquote(v)?);
                Ok(())
            })
            .rule("redundant-parent", "redundant_parent", |m, v| {
                m.redundant_parent = Some(unquote(v)?);
                Ok(())
            })
            .rule("auto-negotiation", "auto_negotiation", |m, _| {
                m.auto_negotiation = true;
                Ok(())
            })
            .rule("no-auto-negotiation", "no_auto_negotiation", |m, _| {
                m.no_auto_negotiation = true;
                Ok(())
            })
            .rule("flow-control", "flow_control", |m, _| {
                m.flow_control = true;
                Ok(())
            })
            .rule("no-flow-control", "no_flow_control", |m, _| {
                m.no_flow_control = true;
                Ok(())
            })
            .rule("loopback", "loopback", |m, _| {
                m.loopback = true;
                Ok(())
            })
            .rule("no-loopback", "no_loopback", |m, _| {
                m.no_loopback = true;
                Ok(())
            })
    })
}

fn parent_table() -> &'static LineTable<ParentEtherOpts> {
    static TABLE: OnceLock<LineTable<ParentEtherOpts>> = OnceLock::new();
    TABLE.get_or_init(|| {
        LineTable::<ParentEtherOpts>::new()
            .rule("lacp periodic", "lacp_periodic", |m, v| {
                m.lacp_periodic = Some(decode_keyword(v, LACP_PERIODS, "fast, slow")?);
                Ok(())
            })
            .rule("lacp", "lacp", |m, v| {
                m.lacp = Some(decode_keyword(v, LACP_MODES, "active, passive")?);
                Ok(())
            })
            .rule("minimum-links", "minimum_links", |m, v| {
                m.minimum_links = Some(decode_num(v)?);
                Ok(())
            })
    })
}

impl InterfacePhysical {
    fn validate(&self) -> Result<(), BuildError> {
        check_key_part(&self.name, "name")?;
        if needs_quotes(&self.name) {
            return Err(BuildError::new(
                FieldPath::of("name"),
                BuildErrorKind::Invalid("interface names cannot contain spaces or quotes".to_string()),
            ));
        }
        if self.vlan_native.is_some() && !self.vlan_tagging {
            return Err(BuildError::new(
                FieldPath::of("vlan_native"),
                BuildErrorKind::Requires {
                    required: "vlan_tagging",
                },
            ));
        }
        check_conflict(
            self.trunk_non_els,
            self.trunk,
            FieldPath::of("trunk_non_els"),
            "trunk",
        )?;
        reject_duplicate_keys(&self.vlan_members, "vlan_members", String::clone)?;

        if let Some(opts) = &self.ether_opts {
            opts.validate()?;
        }
        if let Some(opts) = &self.parent_ether_opts {
            if !is_aggregate(&self.name) {
                return Err(BuildError::new(
                    FieldPath::of("parent_ether_opts"),
                    BuildErrorKind::NotAllowed {
                        discriminator: "name",
                        value: self.name.clone(),
                    },
                ));
            }
            opts.validate()?;
        }
        Ok(())
    }
}

impl Resource for InterfacePhysical {
    const KIND: ResourceKind = ResourceKind::InterfacePhysical;
    const ID_PARTS: usize = 1;
    const ID_SHAPE: &'static str = "<name>";

    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }

    fn with_key(key: &String) -> Self {
        Self {
            name: key.clone(),
            ..Default::default()
        }
    }

    fn id_parts(key: &String) -> Vec<String> {
        vec![key.clone()]
    }

    fn key_from_parts(parts: Vec<String>) -> Result<String, IdError> {
        let [name] = into_parts(parts, Self::ID_SHAPE)?;
        Ok(name)
    }

    fn stanza(key: &String) -> String {
        format!("interfaces {}", key)
    }

    fn build(&self) -> Result<Vec<String>, BuildError> {
        self.validate()?;

        let mut lines = SetLines::new(Self::stanza(&self.name));
        lines.text("description", self.description.as_deref());
        lines.flag(self.disable, "disable");
        lines.value("mtu", self.mtu);
        lines.flag(self.vlan_tagging, "vlan-tagging");
        lines.value("native-vlan-id", self.vlan_native);
        lines.flag(self.trunk, &format!("{} interface-mode trunk", SWITCHING));
        lines.flag(self.trunk_non_els, &format!("{} port-mode trunk", SWITCHING));
        for member in &self.vlan_members {
            lines.push(format_args!("{} vlan members {}", SWITCHING, quote(member)));
        }
        if let Some(opts) = &self.ether_opts {
            opts.render(&mut lines);
        }
        if let Some(opts) = &self.parent_ether_opts {
            opts.render(&mut lines);
        }
        Ok(lines.into_lines())
    }

    fn parse_line(&mut self, line: &str) -> Result<(), ParseError> {
        table().apply(self, line).map(|_| ())
    }

    fn locate(&self, line: &str) -> Option<FieldPath> {
        let attr = table().locate(line)?;
        let nested = match attr {
            "ether_opts" => cut(line, "ether-options").and_then(|rest| ether_table().locate(rest)),
            "parent_ether_opts" => cut(line, "aggregated-ether-options")
                .and_then(|rest| parent_table().locate(rest)),
            _ => None,
        };
        let path = FieldPath::of(attr);
        Some(match nested {
            Some(nested) => path.attr(nested),
            None => path,
        })
    }

    fn in_scope(_key: &String, line: &str) -> bool {
        cut(line, "unit").is_none() || cut(line, SWITCHING).is_some()
    }

    fn clear_lines(&self) -> Vec<String> {
        let stanza = Self::stanza(&self.name);
        MANAGED_LEAVES
            .iter()
            .map(|leaf| delete_line(&format!("{} {}", stanza, leaf)))
            .collect()
    }

    fn placeholder_lines(key: &String) -> Option<Vec<String>> {
        if is_aggregate(key) {
            return None;
        }
        let mut lines = SetLines::new(Self::stanza(key));
        lines.text("description", Some(PLACEHOLDER_DESCRIPTION));
        lines.push("disable");
        Some(lines.into_lines())
    }

    fn is_placeholder(lines: &[&str]) -> bool {
        let described = lines.iter().any(|line| {
            cut(line, "description")
                .is_some_and(|value| unquote(value).is_ok_and(|v| v == PLACEHOLDER_DESCRIPTION))
        });
        lines.len() == 2 && described && lines.contains(&"disable")
    }
}
