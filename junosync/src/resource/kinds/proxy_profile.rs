//! `services proxy profile` stanza.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, BuildErrorKind, IdError, ParseError};
use crate::id::{check_key_part, into_parts};
use crate::resource::{Resource, ResourceKind};
use crate::stanza::lines::{decode_num, quote, unquote};
use crate::stanza::{FieldPath, LineTable, SetLines};

/// HTTP proxy profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_http_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_http_port: Option<u16>,
}

fn table() -> &'static LineTable<ProxyProfile> {
    static TABLE: OnceLock<LineTable<ProxyProfile>> = OnceLock::new();
    TABLE.get_or_init(|| {
        LineTable::<ProxyProfile>::new()
            .rule("protocol http host", "protocol_http_host", |m, v| {
                m.protocol_http_host = Some(unquote(v)?);
                Ok(())
            })
            .rule("protocol http port", "protocol_http_port", |m, v| {
                m.protocol_http_port = Some(decode_num(v)?);
                Ok(())
            })
    })
}

impl Resource for ProxyProfile {
    const KIND: ResourceKind = ResourceKind::ServicesProxyProfile;
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
        format!("services proxy profile {}", quote(key))
    }

    fn build(&self) -> Result<Vec<String>, BuildError> {
        check_key_part(&self.name, "name")?;
        let host = self
            .protocol_http_host
            .as_deref()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| {
                BuildError::new(FieldPath::of("protocol_http_host"), BuildErrorKind::Missing)
            })?;

        let mut lines = SetLines::new(Self::stanza(&self.name));
        lines.text("protocol http host", Some(host));
        lines.value("protocol http port", self.protocol_http_port);
        Ok(lines.into_lines())
    }

    fn parse_line(&mut self, line: &str) -> Result<(), ParseError> {
        table().apply(self, line).map(|_| ())
    }

    fn locate(&self, line: &str) -> Option<FieldPath> {
        table().locate(line).map(FieldPath::of)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(host: Option<&str>, port: Option<u16>) -> ProxyProfile {
        ProxyProfile {
            name: "p1".to_string(),
            protocol_http_host: host.map(str::to_string),
            protocol_http_port: port,
        }
    }

    #[test]
    fn test_build_host_only() {
        let model = profile(Some("10.0.0.1"), None);
        assert_eq!(
            model.build().unwrap(),
            vec!["set services proxy profile \"p1\" protocol http host \"10.0.0.1\""]
        );
        assert_eq!(model.identifier(), "p1");
    }

    #[test]
    fn test_build_with_port() {
        let lines = profile(Some("proxy.example.net"), Some(3128)).build().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            "set services proxy profile \"p1\" protocol http port 3128"
        );
    }

    #[test]
    fn test_host_is_required() {
        let err = profile(None, Some(3128)).build().unwrap_err();
        assert_eq!(err.path.to_string(), "protocol_http_host");
        assert_eq!(err.kind, BuildErrorKind::Missing);
    }

    #[test]
    fn test_parse_device_output() {
        let output = "set protocol http host 10.0.0.1\nset protocol http port 3128\n";
        let model = ProxyProfile::from_config(&"p1".to_string(), output)
            .unwrap()
            .unwrap();
        assert_eq!(model, profile(Some("10.0.0.1"), Some(3128)));
    }

    #[test]
    fn test_parse_empty_output_is_absent() {
        assert!(ProxyProfile::from_config(&"p1".to_string(), "").unwrap().is_none());
    }

    #[test]
    fn test_parse_bad_port() {
        let mut model = ProxyProfile::default();
        let err = model.parse_line("protocol http port 99999").unwrap_err();
        assert_eq!(err.path.to_string(), "protocol_http_port");
    }

    #[test]
    fn test_locate() {
        let model = profile(Some("h"), None);
        assert_eq!(
            model.locate("protocol http port 0").unwrap().to_string(),
            "protocol_http_port"
        );
        assert!(model.locate("protocol ftp").is_none());
    }
}
