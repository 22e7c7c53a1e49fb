//! `security nat source rule-set` stanza.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::check_keyword;
use super::routing_instance::DEFAULT_INSTANCE;
use crate::error::{BuildError, BuildErrorKind, IdError, ParseError};
use crate::id::{check_key_part, into_parts};
use crate::resource::{Reference, Resource, ResourceKind};
use crate::stanza::keyed::{entry_by_key, reject_duplicate_keys, with_entry};
use crate::stanza::lines::{cut, decode_keyword, quote, split_token, unquote};
use crate::stanza::{FieldPath, LineTable, SetLines};

const CONTEXT_TYPES: &[&str] = &["interface", "routing-instance", "zone"];
const THEN_TYPES: &[&str] = &["interface", "off", "pool"];

/// Source NAT rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatSourceRuleSet {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub from: Option<NatContext>,
    #[serde(default)]
    pub to: Option<NatContext>,
    #[serde(default)]
    pub rule: Vec<NatRule>,
}

/// `from`/`to` context of a rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatContext {
    /// `interface`, `routing-instance` or `zone`.
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Vec<String>,
}

/// One rule of a rule set, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "match", default)]
    pub matching: Option<NatMatch>,
    #[serde(default)]
    pub then: Option<NatThen>,
}

/// Match criteria of a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NatMatch {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_address: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub destination_address: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub destination_port: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub protocol: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub application: Vec<String>,
}

/// Action of a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatThen {
    /// `interface`, `off` or `pool`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Pool name, only with `type = "pool"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
}

impl NatContext {
    fn validate(&self) -> Result<(), BuildError> {
        check_keyword(&self.kind, CONTEXT_TYPES, FieldPath::of("type"))?;
        if self.value.is_empty() {
            return Err(BuildError::new(FieldPath::of("value"), BuildErrorKind::Missing));
        }
        reject_duplicate_keys(&self.value, "value", String::clone)
    }

    fn render(&self, leaf: &str, lines: &mut SetLines) {
        for value in &self.value {
            lines.push(format_args!("{} {} {}", leaf, self.kind, quote(value)));
        }
    }

    fn parse(ctx: &mut Option<NatContext>, line: &str) -> Result<(), ParseError> {
        let (kind, value) = split_token(line)?;
        let kind = decode_keyword(&kind, CONTEXT_TYPES, "interface, routing-instance, zone")
            .map_err(|e| e.under("type"))?;
        let value = unquote(value).map_err(|e| e.under("value"))?;
        let ctx = ctx.get_or_insert_with(Default::default);
        ctx.kind = kind;
        ctx.value.push(value);
        Ok(())
    }
}

impl NatMatch {
    /// Whether no criterion is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn lists(&self) -> [(&'static str, &'static str, &Vec<String>); 5] {
        [
            ("source_address", "source-address", &self.source_address),
            ("destination_address", "destination-address", &self.destination_address),
            ("destination_port", "destination-port", &self.destination_port),
            ("protocol", "protocol", &self.protocol),
            ("application", "application", &self.application),
        ]
    }

    fn validate(&self) -> Result<(), BuildError> {
        if self.is_empty() {
            return Err(BuildError::at_root(BuildErrorKind::Invalid(
                "at least one match criterion must be set".to_string(),
            )));
        }
        for (attr, _, values) in self.lists() {
            reject_duplicate_keys(values, attr, String::clone)?;
        }
        Ok(())
    }

    fn render(&self, prefix: &str, lines: &mut SetLines) {
        for (_, leaf, values) in self.lists() {
            for value in values {
                lines.push(format_args!("{} match {} {}", prefix, leaf, quote(value)));
            }
        }
    }
}

impl NatThen {
    fn validate(&self) -> Result<(), BuildError> {
        check_keyword(&self.kind, THEN_TYPES, FieldPath::of("type"))?;
        match (self.kind.as_str(), &self.pool) {
            ("pool", None) => Err(BuildError::new(FieldPath::of("pool"), BuildErrorKind::Missing)),
            ("pool", Some(_)) => Ok(()),
            (kind, Some(_)) => Err(BuildError::new(
                FieldPath::of("pool"),
                BuildErrorKind::NotAllowed {
                    discriminator: "type",
                    value: kind.to_string(),
                },
            )),
            (_, None) => Ok(()),
        }
    }

    fn render(&self, prefix: &str, lines: &mut SetLines) {
        match &self.pool {
            Some(pool) => lines.push(format_args!("{} then source-nat pool {}", prefix, quote(pool))),
            None => lines.push(format_args!("{} then source-nat {}", prefix, self.kind)),
        }
    }
}

impl NatRule {
    fn validate(&self) -> Result<(), BuildError> {
        if self.name.is_empty() {
            return Err(BuildError::new(FieldPath::of("name"), BuildErrorKind::Missing));
        }
        let matching = self
            .matching
            .as_ref()
            .ok_or_else(|| BuildError::new(FieldPath::of("match"), BuildErrorKind::Missing))?;
        matching.validate().map_err(|e| e.under("match"))?;
        let then = self
            .then
            .as_ref()
            .ok_or_else(|| BuildError::new(FieldPath::of("then"), BuildErrorKind::Missing))?;
        then.validate().map_err(|e| e.under("then"))
    }

    fn render(&self, lines: &mut SetLines) {
        let prefix = format!("rule {}", quote(&self.name));
        if let Some(description) = &self.description {
            lines.push(format_args!("{} description {}", prefix, quote(description)));
        }
        if let Some(matching) = &self.matching {
            matching.render(&prefix, lines);
        }
        if let Some(then) = &self.then {
            then.render(&prefix, lines);
        }
    }
}

fn table() -> &'static LineTable<NatSourceRuleSet> {
    static TABLE: OnceLock<LineTable<NatSourceRuleSet>> = OnceLock::new();
    TABLE.get_or_init(|| {
        LineTable::<NatSourceRuleSet>::new()
            .rule("description", "description", |m, v| {
                m.description = Some(unquote(v)?);
                Ok(())
            })
            .rule("from", "from", |m, v| NatContext::parse(&mut m.from, v))
            .rule("to", "to", |m, v| NatContext::parse(&mut m.to, v))
            .rule("rule", "rule", |m, v| {
                let (name, rest) = split_token(v)?;
                let (index, rule) = entry_by_key(
                    &mut m.rule,
                    |r| r.name == name,
                    || NatRule {
                        name: name.clone(),
                        ..Default::default()
                    },
                );
                with_entry(index, rule, |r| rule_table().apply(r, rest).map(|_| ()))
            })
    })
}

fn rule_table() -> &'static LineTable<NatRule> {
    static TABLE: OnceLock<LineTable<NatRule>> = OnceLock::new();
    TABLE.get_or_init(|| {
        LineTable::<NatRule>::new()
            .rule("description", "description", |r, v| {
                r.description = Some(unquote(v)?);
                Ok(())
            })
            .rule("match", "match", |r, v| {
                let mut matching = r.matching.take().unwrap_or_default();
                match_table().apply(&mut matching, v)?;
                r.matching = (!matching.is_empty()).then_some(matching);
                Ok(())
            })
            .rule("then source-nat", "then", |r, v| {
                let then = r.then.get_or_insert_with(Default::default);
                then_table().apply(then, v).map(|_| ())
            })
    })
}

fn match_table() -> &'static LineTable<NatMatch> {
    static TABLE: OnceLock<LineTable<NatMatch>> = OnceLock::new();
    TABLE.get_or_init(|| {
        LineTable::<NatMatch>::new()
            .rule("source-address", "source_address", |m, v| {
                m.source_address.push(unquote(v)?);
                Ok(())
            })
            .rule("destination-address", "destination_address", |m, v| {
                m.destination_address.push(unquote(v)?);
                Ok(())
            })
            .rule("destination-port", "destination_port", |m, v| {
                m.destination_port.push(unquote(v)?);
                Ok(())
            })
            .rule("protocol", "protocol", |m, v| {
                m.protocol.push(unquote(v)?);
                Ok(())
            })
            .rule("application", "application", |m, v| {
                m.application.push(unquote(v)?);
                Ok(())
            })
    })
}

fn then_table() -> &'static LineTable<NatThen> {
    static TABLE: OnceLock<LineTable<NatThen>> = OnceLock::new();
    TABLE.get_or_init(|| {
        LineTable::<NatThen>::new()
            .rule("interface", "type", |t, _| {
                t.kind = "interface".to_string();
                t.pool = None;
                Ok(())
            })
            .rule("off", "type", |t, _| {
                t.kind = "off".to_string();
                t.pool = None;
                Ok(())
            })
            .rule("pool", "pool", |t, v| {
                t.kind = "pool".to_string();
                t.pool = Some(unquote(v)?);
                Ok(())
            })
    })
}

impl NatSourceRuleSet {
    fn validate(&self) -> Result<(), BuildError> {
        check_key_part(&self.name, "name")?;
        for (attr, ctx) in [("from", &self.from), ("to", &self.to)] {
            ctx.as_ref()
                .ok_or_else(|| BuildError::new(FieldPath::of(attr), BuildErrorKind::Missing))?
                .validate()
                .map_err(|e| e.under(attr))?;
        }
        if self.rule.is_empty() {
            return Err(BuildError::new(FieldPath::of("rule"), BuildErrorKind::Missing));
        }
        reject_duplicate_keys(&self.rule, "rule", |r| r.name.clone())?;
        for (index, rule) in self.rule.iter().enumerate() {
            rule.validate().map_err(|e| e.at_index(index).under("rule"))?;
        }
        Ok(())
    }
}

impl Resource for NatSourceRuleSet {
    const KIND: ResourceKind = ResourceKind::SecurityNatSource;
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
        format!("security nat source rule-set {}", quote(key))
    }

    fn build(&self) -> Result<Vec<String>, BuildError> {
        self.validate()?;

        let mut lines = SetLines::new(Self::stanza(&self.name));
        lines.text("description", self.description.as_deref());
        if let Some(from) = &self.from {
            from.render("from", &mut lines);
        }
        if let Some(to) = &self.to {
            to.render("to", &mut lines);
        }
        for rule in &self.rule {
            rule.render(&mut lines);
        }
        Ok(lines.into_lines())
    }

    fn parse_line(&mut self, line: &str) -> Result<(), ParseError> {
        table().apply(self, line).map(|_| ())
    }

    fn locate(&self, line: &str) -> Option<FieldPath> {
        let Some(rest) = cut(line, "rule") else {
            return table().locate(line).map(FieldPath::of);
        };
        let (name, rest) = split_token(rest).ok()?;
        let index = self.rule.iter().position(|r| r.name == name)?;
        let path = FieldPath::of("rule").index(index);
        let Some(attr) = rule_table().locate(rest) else {
            return Some(path);
        };
        let nested = match attr {
            "match" => cut(rest, "match").and_then(|r| match_table().locate(r)),
            "then" => cut(rest, "then source-nat").and_then(|r| then_table().locate(r)),
            _ => None,
        };
        let path = path.attr(attr);
        Some(match nested {
            Some(nested) => path.attr(nested),
            None => path,
        })
    }

    fn references(&self) -> Vec<Reference> {
        [&self.from, &self.to]
            .into_iter()
            .flatten()
            .filter(|ctx| ctx.kind == "routing-instance")
            .flat_map(|ctx| ctx.value.iter())
            .filter(|name| name.as_str() != DEFAULT_INSTANCE)
            .map(|name| Reference::RoutingInstance(name.clone()))
            .collect()
    }
}
