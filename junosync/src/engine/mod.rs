//! Lifecycle orchestrator.
//!
//! [`Engine`] sequences create, read, update and delete for any
//! [`Resource`] around one shared [`SessionHandle`]:
//!
//! - Writes validate and render the model first, then check external
//!   references, then take the device configuration lock through a
//!   [`WriteTransaction`]. Every failure after the lock discards the pending
//!   change-set before the error is returned. A commit that succeeded but
//!   cannot be verified afterwards is reported separately, because the device
//!   was mutated.
//! - Reads go through the engine's [`ReadGate`] so `show` commands on the
//!   shared connection never overlap. They do not take the device lock.
//!
//! # Example
//!
//! ```rust
//! use junosync::engine::Engine;
//! use junosync::resource::kinds::ProxyProfile;
//! use junosync::session::SessionHandle;
//! use junosync::session::memory::MemoryDevice;
//!
//! # async fn example() -> Result<(), junosync::Error> {
//! let device = MemoryDevice::new();
//! let session = SessionHandle::new(device.session());
//! let engine = Engine::new();
//!
//! let profile = ProxyProfile {
//!     name: "p1".to_string(),
//!     protocol_http_host: Some("10.0.0.1".to_string()),
//!     protocol_http_port: None,
//! };
//! let created = engine.create(&session, &profile).await?;
//! assert_eq!(created.value, profile);
//!
//! let read = engine.read::<ProxyProfile, _>(&session, &"p1".to_string()).await?;
//! assert_eq!(read, Some(profile));
//! # Ok(())
//! # }
//! ```

mod builder;
mod dispatch;
mod gate;
mod transaction;

pub use builder::{DeletePolicy, EngineBuilder, EngineConfig};
pub use gate::ReadGate;
pub use transaction::WriteTransaction;

use log::{debug, error, warn};

use crate::error::{BuildError, BuildErrorKind, Error, Result, SessionError};
use crate::resource::kinds::routing_instance::{self, DEFAULT_INSTANCE};
use crate::resource::{Reference, Resource, ResourceKind};
use crate::session::{Session, SessionHandle};
use crate::stanza::FieldPath;
use crate::stanza::lines::cut;

/// Value of a successful write, with the warnings the commit printed.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    /// Non-fatal commit diagnostics.
    pub warnings: Vec<String>,
}

impl<T> Outcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}

/// What the device holds under a resource's stanza.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Absent,
    Placeholder,
    Present,
}

/// Generic create/read/update/delete engine.
///
/// Cheap to clone; clones share the read gate.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    gate: ReadGate,
}

impl Default for Engine {
    fn default() -> Self {
        EngineBuilder::new().build()
    }
}

impl Engine {
    /// Engine with default settings and its own read gate.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn gate(&self) -> &ReadGate {
        &self.gate
    }

    /// Create the stanza for `model`.
    ///
    /// Fails with [`Error::Duplicate`] if the stanza already exists. A disabled
    /// placeholder counts as absent and is replaced.
    pub async fn create<R: Resource, S: Session + 'static>(
        &self,
        session: &SessionHandle<S>,
        model: &R,
    ) -> Result<Outcome<R>> {
        let id = model.identifier();
        debug!("create {} '{}'", R::KIND, id);

        let lines = render(model)?;
        self.check_references(session, model, &id).await?;

        let mut tx = WriteTransaction::begin(session).await?;
        if let Err(e) = self.stage_create(session, &mut tx, model, &id, &lines).await {
            discard(tx).await;
            return Err(e);
        }
        let warnings = self.commit::<R, S>(tx, &id, "create").await?;
        let value = self.verify(session, model, &id).await?;

        debug!("created {} '{}'", R::KIND, id);
        Ok(Outcome { value, warnings })
    }

    /// Read the stanza for `key`. Returns `None` when it is absent.
    pub async fn read<R: Resource, S: Session>(
        &self,
        session: &SessionHandle<S>,
        key: &R::Key,
    ) -> Result<Option<R>> {
        let _guard = self.gate.enter().await;
        let output = session.session().command(&R::show_command(key)).await?;
        let model = R::from_config(key, &output)?;
        if model.is_none() {
            debug!("{} '{}' is absent", R::KIND, R::id_of(key));
        }
        Ok(model)
    }

    /// Replace the managed fields of an existing stanza with `model`.
    pub async fn update<R: Resource, S: Session + 'static>(
        &self,
        session: &SessionHandle<S>,
        model: &R,
    ) -> Result<Outcome<R>> {
        let id = model.identifier();
        debug!("update {} '{}'", R::KIND, id);

        let lines = render(model)?;
        self.check_references(session, model, &id).await?;

        let mut tx = WriteTransaction::begin(session).await?;
        if let Err(e) = self.stage_update(session, &mut tx, model, &id, &lines).await {
            discard(tx).await;
            return Err(e);
        }
        let warnings = self.commit::<R, S>(tx, &id, "update").await?;
        let value = self.verify(session, model, &id).await?;

        debug!("updated {} '{}'", R::KIND, id);
        Ok(Outcome { value, warnings })
    }

    /// Delete the stanza for `key`.
    ///
    /// With [`DeletePolicy::LeavePlaceholder`], kinds that have a disabled
    /// placeholder are left in that state instead.
    pub async fn delete<R: Resource, S: Session + 'static>(
        &self,
        session: &SessionHandle<S>,
        key: &R::Key,
    ) -> Result<Outcome<()>> {
        let id = R::id_of(key);
        debug!("delete {} '{}'", R::KIND, id);

        let mut lines = R::delete_lines(key);
        if self.config.delete_policy == DeletePolicy::LeavePlaceholder {
            if let Some(placeholder) = R::placeholder_lines(key) {
                debug!("leaving placeholder for {} '{}'", R::KIND, id);
                lines.extend(placeholder);
            }
        }

        let mut tx = WriteTransaction::begin(session).await?;
        if let Err(source) = tx.apply(&lines).await {
            discard(tx).await;
            return Err(Error::Apply {
                kind: R::KIND,
                id,
                path: None,
                source,
            });
        }
        let warnings = self.commit::<R, S>(tx, &id, "delete").await?;

        debug!("deleted {} '{}'", R::KIND, id);
        Ok(Outcome {
            value: (),
            warnings,
        })
    }

    /// Read a stanza by identifier. Absence is an error here.
    pub async fn import<R: Resource, S: Session>(
        &self,
        session: &SessionHandle<S>,
        id: &str,
    ) -> Result<R> {
        debug!("import {} '{}'", R::KIND, id);
        let key = R::key_from_id(id)?;
        self.read::<R, S>(session, &key)
            .await?
            .ok_or_else(|| Error::NotFound {
                kind: R::KIND,
                id: id.to_string(),
            })
    }

    /// Whether the stanza for `key` exists. A disabled placeholder does not count.
    pub async fn exists<R: Resource, S: Session>(
        &self,
        session: &SessionHandle<S>,
        key: &R::Key,
    ) -> Result<bool> {
        Ok(self.presence::<R, S>(session, key).await? == Presence::Present)
    }

    async fn presence<R: Resource, S: Session>(
        &self,
        session: &SessionHandle<S>,
        key: &R::Key,
    ) -> Result<Presence> {
        let output = self.gate.command(session, &R::show_command(key)).await?;
        let lines = R::scoped_lines(key, &output);
        Ok(if lines.is_empty() {
            Presence::Absent
        } else if R::is_placeholder(&lines) {
            Presence::Placeholder
        } else {
            Presence::Present
        })
    }

    async fn check_references<R: Resource, S: Session>(
        &self,
        session: &SessionHandle<S>,
        model: &R,
        id: &str,
    ) -> Result<()> {
        for reference in model.references() {
            match reference {
                Reference::RoutingInstance(name) => {
                    if name == DEFAULT_INSTANCE {
                        continue;
                    }
                    let output = self
                        .gate
                        .command(session, &routing_instance::show_command(&name))
                        .await?;
                    if !routing_instance::exists_in(&output) {
                        return Err(Error::Precheck {
                            kind: R::KIND,
                            id: id.to_string(),
                            message: format!("routing instance '{}' doesn't exist", name),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    async fn stage_create<R: Resource, S: Session + 'static>(
        &self,
        session: &SessionHandle<S>,
        tx: &mut WriteTransaction<S>,
        model: &R,
        id: &str,
        lines: &[String],
    ) -> Result<()> {
        let key = model.key();
        match self.presence::<R, S>(session, &key).await? {
            Presence::Present => {
                return Err(Error::Duplicate {
                    kind: R::KIND,
                    id: id.to_string(),
                });
            }
            Presence::Placeholder => {
                debug!("{} '{}' is a disabled placeholder, clearing it", R::KIND, id);
                tx.apply(&R::delete_lines(&key))
                    .await
                    .map_err(|e| apply_error(model, id, e))?;
            }
            Presence::Absent => {}
        }
        tx.apply(lines).await.map_err(|e| apply_error(model, id, e))
    }

    async fn stage_update<R: Resource, S: Session + 'static>(
        &self,
        session: &SessionHandle<S>,
        tx: &mut WriteTransaction<S>,
        model: &R,
        id: &str,
        lines: &[String],
    ) -> Result<()> {
        if self.presence::<R, S>(session, &model.key()).await? != Presence::Present {
            return Err(Error::NotFound {
                kind: R::KIND,
                id: id.to_string(),
            });
        }
        tx.apply(&model.clear_lines())
            .await
            .map_err(|e| apply_error(model, id, e))?;
        tx.apply(lines).await.map_err(|e| apply_error(model, id, e))
    }

    async fn commit<R: Resource, S: Session + 'static>(
        &self,
        tx: WriteTransaction<S>,
        id: &str,
        action: &str,
    ) -> Result<Vec<String>> {
        let comment = self.comment(action, R::KIND);
        let warnings = tx.commit(&comment).await.map_err(|source| Error::Commit {
            kind: R::KIND,
            id: id.to_string(),
            source,
        })?;
        for warning in &warnings {
            warn!("commit warning for {} '{}': {}", R::KIND, id, warning);
        }
        Ok(warnings)
    }

    /// Read the stanza back after a commit.
    async fn verify<R: Resource, S: Session>(
        &self,
        session: &SessionHandle<S>,
        model: &R,
        id: &str,
    ) -> Result<R> {
        if !self.config.verify_after_commit {
            return Ok(model.clone());
        }

        let unverified = |source: Error| Error::AppliedButUnverified {
            kind: R::KIND,
            id: id.to_string(),
            source: Box::new(source),
        };
        let key = model.key();
        let output = self
            .gate
            .command(session, &R::show_command(&key))
            .await
            .map_err(|e| unverified(e.into()))?;
        match R::from_config(&key, &output) {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(Error::NotFoundAfterCommit {
                kind: R::KIND,
                id: id.to_string(),
            }),
            Err(e) => Err(unverified(e.into())),
        }
    }

    fn comment(&self, action: &str, kind: ResourceKind) -> String {
        match &self.config.comment_prefix {
            Some(prefix) => format!("{}: {} resource {}", prefix, action, kind),
            None => format!("{} resource {}", action, kind),
        }
    }
}

/// Build statements, refusing a model that renders to nothing.
///
/// An empty change-set would commit nothing and then read back as absent.
fn render<R: Resource>(model: &R) -> Result<Vec<String>> {
    let lines = model.build()?;
    if lines.is_empty() {
        return Err(BuildError::at_root(BuildErrorKind::Invalid(
            "nothing to configure".to_string(),
        ))
        .into());
    }
    Ok(lines)
}

/// Roll back, logging rather than returning a failure to do so.
async fn discard<S: Session + 'static>(tx: WriteTransaction<S>) {
    if let Err(e) = tx.rollback().await {
        error!("failed to discard change-set: {}", e);
    }
}

fn apply_error<R: Resource>(model: &R, id: &str, source: SessionError) -> Error {
    let path = source
        .rejected_line()
        .and_then(|line| locate_rejected(model, line));
    Error::Apply {
        kind: R::KIND,
        id: id.to_string(),
        path,
        source,
    }
}

/// Field a rejected `set` statement came from.
fn locate_rejected<R: Resource>(model: &R, line: &str) -> Option<FieldPath> {
    let body = line.trim().strip_prefix("set ")?;
    let rest = cut(body, &R::stanza(&model.key()))?;
    model.locate(rest)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::error::{IdError, SessionResult, TerminalState};
    use crate::resource::kinds::{
        DhcpRelay, DhcpVersion, InterfacePhysical, NatContext, NatMatch, NatRule,
        NatSourceRuleSet, NatThen, ProxyProfile,
    };
    use crate::session::memory::{MemoryDevice, MemorySession};

    fn setup() -> (Arc<MemoryDevice>, SessionHandle<MemorySession>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let device = MemoryDevice::new();
        let session = SessionHandle::new(device.session());
        (device, session)
    }

    fn proxy(name: &str, host: &str) -> ProxyProfile {
        ProxyProfile {
            name: name.to_string(),
            protocol_http_host: Some(host.to_string()),
            protocol_http_port: None,
        }
    }

    fn port(name: &str) -> InterfacePhysical {
        InterfacePhysical {
            name: name.to_string(),
            description: Some("uplink".to_string()),
            mtu: Some(1500),
            ..Default::default()
        }
    }

    fn rule_set() -> NatSourceRuleSet {
        NatSourceRuleSet {
            name: "rs1".to_string(),
            description: None,
            from: Some(NatContext {
                kind: "zone".to_string(),
                value: vec!["trust".to_string()],
            }),
            to: Some(NatContext {
                kind: "zone".to_string(),
                value: vec!["untrust".to_string()],
            }),
            rule: vec![NatRule {
                name: "r1".to_string(),
                description: Some("all hosts".to_string()),
                matching: Some(NatMatch {
                    source_address: vec!["10.0.0.0/8".to_string()],
                    ..Default::default()
                }),
                then: Some(NatThen {
                    kind: "interface".to_string(),
                    pool: None,
                }),
            }],
        }
    }

    #[tokio::test]
    async fn test_create_simple_leaf_resource() {
        let (device, session) = setup();
        let engine = Engine::new();
        let model = proxy("p1", "10.0.0.1");

        let outcome = engine.create(&session, &model).await.unwrap();

        assert_eq!(outcome.value, model);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.value.identifier(), "p1");
        assert_eq!(
            device.staged_statements(),
            vec!["set services proxy profile \"p1\" protocol http host \"10.0.0.1\""]
        );
        assert_eq!(
            device.running_config(),
            vec!["services proxy profile p1 protocol http host 10.0.0.1"]
        );
        assert_eq!(
            device.commits(),
            vec!["create resource junos_services_proxy_profile"]
        );
        assert!(!device.is_locked());
    }

    #[tokio::test]
    async fn test_round_trip_through_device() {
        let (device, session) = setup();
        device.load(&["set routing-instances ri1 instance-type virtual-router"]);
        let engine = Engine::new();

        let nat = rule_set();
        engine.create(&session, &nat).await.unwrap();
        let read = engine
            .read::<NatSourceRuleSet, _>(&session, &"rs1".to_string())
            .await
            .unwrap();
        assert_eq!(read, Some(nat));

        let mut relay = DhcpRelay {
            routing_instance: "ri1".to_string(),
            version: DhcpVersion::V6,
            relay_agent_option_79: true,
            server_response_time: Some(20),
            ..Default::default()
        };
        relay.active_server_group = Some("servers v6".to_string());
        engine.create(&session, &relay).await.unwrap();
        let read = engine
            .read::<DhcpRelay, _>(&session, &relay.key())
            .await
            .unwrap();
        assert_eq!(read, Some(relay));

        let mut iface = port("ge-0/0/0");
        iface.vlan_members = vec!["v10".to_string(), "v20".to_string()];
        iface.trunk = true;
        engine.create(&session, &iface).await.unwrap();
        let read = engine
            .read::<InterfacePhysical, _>(&session, &iface.name)
            .await
            .unwrap();
        assert_eq!(read, Some(iface));
    }

    #[tokio::test]
    async fn test_duplicate_create() {
        let (device, session) = setup();
        device.load(&["set services proxy profile p1 protocol http host 10.9.9.9"]);
        let engine = Engine::new();

        let err = engine
            .create(&session, &proxy("p1", "10.0.0.1"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Duplicate { .. }));
        assert_eq!(err.terminal_state(), Some(TerminalState::RolledBack));
        assert!(device.staged_statements().is_empty());
        assert!(device.commits().is_empty());
        assert!(!device.is_locked());
    }

    #[tokio::test]
    async fn test_validation_happens_before_io() {
        let (device, session) = setup();
        let engine = Engine::new();
        let mut model = port("ge-0/0/0");
        model.trunk = true;
        model.trunk_non_els = true;

        let err = engine.create(&session, &model).await.unwrap_err();

        match &err {
            Error::Validation(e) => {
                assert_eq!(e.kind, BuildErrorKind::Conflict { other: "trunk" });
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(err.field_path().unwrap().to_string(), "trunk_non_els");
        assert!(device.commands().is_empty());
        assert!(device.staged_statements().is_empty());
        assert!(!device.is_locked());
    }

    #[tokio::test]
    async fn test_version_gated_field_rejected() {
        let (device, session) = setup();
        let engine = Engine::new();
        let model = DhcpRelay {
            version: DhcpVersion::V4,
            relay_agent_option_79: true,
            ..Default::default()
        };

        let err = engine.create(&session, &model).await.unwrap_err();

        assert_eq!(err.field_path().unwrap().to_string(), "relay_agent_option_79");
        assert!(err.to_string().contains("version = \"v4\""));
        assert!(device.commands().is_empty());
    }

    #[tokio::test]
    async fn test_commit_failure_rolls_back() {
        let (device, session) = setup();
        device.load(&["set system host-name r1"]);
        let before = device.running_config();
        device.fail_next_commit("configuration check-out failed");
        let engine = Engine::new();

        let err = engine.create(&session, &rule_set()).await.unwrap_err();

        assert!(matches!(err, Error::Commit { .. }));
        assert!(!err.is_device_mutated());
        assert!(device.staged_statements().len() > 1);
        assert_eq!(device.running_config(), before);
        assert!(!device.is_locked());
        let read = engine
            .read::<NatSourceRuleSet, _>(&session, &"rs1".to_string())
            .await
            .unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn test_rejected_statement_carries_locator() {
        let (device, session) = setup();
        device.reject_statements_containing(" mtu ", "value is out of range");
        let engine = Engine::new();

        let err = engine.create(&session, &port("ge-0/0/0")).await.unwrap_err();

        match &err {
            Error::Apply { path, source, .. } => {
                assert_eq!(path.as_ref().unwrap().to_string(), "mtu");
                assert!(source.rejected_line().unwrap().ends_with("mtu 1500"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(device.running_config().is_empty());
        assert!(!device.is_locked());
    }

    #[tokio::test]
    async fn test_nested_rejection_locator() {
        let (device, session) = setup();
        device.reject_statements_containing("source-nat interface", "no interface in zone");
        let engine = Engine::new();

        let err = engine.create(&session, &rule_set()).await.unwrap_err();

        assert_eq!(err.field_path().unwrap().to_string(), "rule[0].then.type");
        assert!(!device.is_locked());
    }

    #[tokio::test]
    async fn test_not_found_after_commit() {
        let (device, session) = setup();
        device.drop_on_commit("services proxy profile p1");
        let engine = Engine::new();

        let err = engine
            .create(&session, &proxy("p1", "10.0.0.1"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFoundAfterCommit { .. }));
        assert!(err.is_device_mutated());
        assert_eq!(device.commits().len(), 1);
        assert!(!device.is_locked());
    }

    #[tokio::test]
    async fn test_verify_can_be_disabled() {
        let (device, session) = setup();
        device.drop_on_commit("services proxy profile p1");
        let engine = EngineBuilder::new().verify_after_commit(false).build();

        let model = proxy("p1", "10.0.0.1");
        let outcome = engine.create(&session, &model).await.unwrap();
        assert_eq!(outcome.value, model);
    }

    /// Session whose commands fail once a commit went through.
    struct FailsAfterCommit {
        inner: MemorySession,
        committed: AtomicBool,
    }

    impl Session for FailsAfterCommit {
        async fn command(&self, cmd: &str) -> SessionResult<String> {
            if self.committed.load(Ordering::SeqCst) {
                return Err(SessionError::Timeout(Duration::from_secs(30)));
            }
            self.inner.command(cmd).await
        }

        async fn config_set(&self, lines: &[String]) -> SessionResult<()> {
            self.inner.config_set(lines).await
        }

        async fn config_lock(&self) -> SessionResult<()> {
            self.inner.config_lock().await
        }

        async fn commit_conf(&self, comment: &str) -> SessionResult<Vec<String>> {
            let warnings = self.inner.commit_conf(comment).await?;
            self.committed.store(true, Ordering::SeqCst);
            Ok(warnings)
        }

        async fn config_clear(&self) -> SessionResult<()> {
            self.inner.config_clear().await
        }

        async fn close(&self) -> SessionResult<()> {
            self.inner.close().await
        }
    }

    #[tokio::test]
    async fn test_applied_but_unverified() {
        let device = MemoryDevice::new();
        let session = SessionHandle::new(FailsAfterCommit {
            inner: device.session(),
            committed: AtomicBool::new(false),
        });
        let engine = Engine::new();

        let err = engine
            .create(&session, &proxy("p1", "10.0.0.1"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AppliedButUnverified { .. }));
        assert!(err.is_device_mutated());
        assert_eq!(device.running_config().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_warnings_are_returned() {
        let (device, session) = setup();
        device.set_commit_warnings(&["statement has no effect"]);
        let engine = EngineBuilder::new().comment_prefix("ci").build();

        let outcome = engine
            .create(&session, &proxy("p1", "10.0.0.1"))
            .await
            .unwrap();

        assert_eq!(outcome.warnings, vec!["statement has no effect"]);
        assert_eq!(
            device.commits(),
            vec!["ci: create resource junos_services_proxy_profile"]
        );
    }

    #[tokio::test]
    async fn test_reads_are_serialised() {
        let device = MemoryDevice::with_command_delay(Duration::from_millis(20));
        device.load(&[
            "set services proxy profile p1 protocol http host 10.0.0.1",
            "set services proxy profile p2 protocol http host 10.0.0.2",
        ]);
        let session = SessionHandle::new(device.session());
        let engine = Engine::new();
        let other = engine.clone();

        let p1 = "p1".to_string();
        let p2 = "p2".to_string();
        let p3 = "p3".to_string();
        let (a, b, c) = tokio::join!(
            engine.read::<ProxyProfile, _>(&session, &p1),
            other.read::<ProxyProfile, _>(&session, &p2),
            engine.exists::<ProxyProfile, _>(&session, &p3),
        );

        assert_eq!(a.unwrap().unwrap().protocol_http_host.as_deref(), Some("10.0.0.1"));
        assert_eq!(b.unwrap().unwrap().protocol_http_host.as_deref(), Some("10.0.0.2"));
        assert!(!c.unwrap());
        assert_eq!(device.overlapping_commands(), 0);
    }

    #[tokio::test]
    async fn test_import() {
        let (device, session) = setup();
        device.load(&[
            "set forwarding-options dhcp-relay arp-inspection",
            "set forwarding-options dhcp-relay dhcpv6 relay-agent-remote-id",
        ]);
        let engine = Engine::new();

        let v4 = engine
            .import::<DhcpRelay, _>(&session, "default_-_v4")
            .await
            .unwrap();
        assert!(v4.arp_inspection);
        assert!(!v4.relay_agent_remote_id);

        let v6 = engine
            .import::<DhcpRelay, _>(&session, "default_-_v6")
            .await
            .unwrap();
        assert!(v6.relay_agent_remote_id);
        assert_eq!(v6.identifier(), "default_-_v6");

        let err = engine
            .import::<DhcpRelay, _>(&session, "default")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadId(IdError::BadFormat { .. })));

        let err = engine
            .import::<DhcpRelay, _>(&session, "default_-_v5")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadId(IdError::InvalidPart { .. })));

        let err = engine
            .import::<ProxyProfile, _>(&session, "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_read_command_failure() {
        let (device, session) = setup();
        device.fail_commands_containing("services proxy", "connection reset");
        let engine = Engine::new();

        let err = engine
            .read::<ProxyProfile, _>(&session, &"p1".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::Command { .. })));
        assert_eq!(err.terminal_state(), None);

        let err = engine
            .create(&session, &proxy("p1", "10.0.0.1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Session(_)));
        assert!(device.staged_statements().is_empty());
        assert!(!device.is_locked());
    }

    #[tokio::test]
    async fn test_update_replaces_managed_fields() {
        let (device, session) = setup();
        device.load(&["set interfaces ge-0/0/0 unit 100 family inet address 192.0.2.1/24"]);
        let engine = Engine::new();

        engine.create(&session, &port("ge-0/0/0")).await.unwrap();

        let mut desired = port("ge-0/0/0");
        desired.description = None;
        desired.mtu = Some(9192);
        desired.disable = true;
        let outcome = engine.update(&session, &desired).await.unwrap();
        assert_eq!(outcome.value, desired);

        let running = device.running_config();
        assert!(running.contains(&"interfaces ge-0/0/0 mtu 9192".to_string()));
        assert!(!running.iter().any(|l| l.contains("mtu 1500")));
        assert!(!running.iter().any(|l| l.contains("description")));
        assert!(running.contains(&"interfaces ge-0/0/0 unit 100 family inet address 192.0.2.1/24".to_string()));
        assert_eq!(device.commits().last().unwrap(), "update resource junos_interface_physical");
    }

    #[tokio::test]
    async fn test_update_missing_resource() {
        let (device, session) = setup();
        let engine = Engine::new();

        let err = engine
            .update(&session, &proxy("p1", "10.0.0.1"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound { .. }));
        assert!(device.staged_statements().is_empty());
        assert!(device.commits().is_empty());
        assert!(!device.is_locked());
    }

    #[tokio::test]
    async fn test_delete_policies() {
        let (device, session) = setup();
        let engine = Engine::new();
        let keep = EngineBuilder::new()
            .delete_policy(DeletePolicy::LeavePlaceholder)
            .build();

        engine.create(&session, &port("ge-0/0/1")).await.unwrap();
        keep.delete::<InterfacePhysical, _>(&session, &"ge-0/0/1".to_string())
            .await
            .unwrap();
        assert_eq!(
            device.running_config(),
            vec!["interfaces ge-0/0/1 description NC", "interfaces ge-0/0/1 disable"]
        );
        let key = "ge-0/0/1".to_string();
        assert!(!engine.exists::<InterfacePhysical, _>(&session, &key).await.unwrap());
        assert!(engine
            .read::<InterfacePhysical, _>(&session, &key)
            .await
            .unwrap()
            .is_none());

        // The placeholder counts as absent and is cleared first.
        engine.create(&session, &port("ge-0/0/1")).await.unwrap();
        assert!(device
            .staged_statements()
            .contains(&"delete interfaces ge-0/0/1".to_string()));
        assert!(!device.running_config().iter().any(|l| l.ends_with("disable")));

        engine
            .delete::<InterfacePhysical, _>(&session, &key)
            .await
            .unwrap();
        assert!(device.running_config().is_empty());
        assert_eq!(
            device.commits().last().unwrap(),
            "delete resource junos_interface_physical"
        );
    }

    #[tokio::test]
    async fn test_delete_keeps_sibling_version() {
        let (device, session) = setup();
        let engine = Engine::new();

        let v4 = DhcpRelay {
            arp_inspection: true,
            ..Default::default()
        };
        let v6 = DhcpRelay {
            version: DhcpVersion::V6,
            relay_agent_option_79: true,
            ..Default::default()
        };
        engine.create(&session, &v4).await.unwrap();
        engine.create(&session, &v6).await.unwrap();

        engine
            .delete::<DhcpRelay, _>(&session, &v4.key())
            .await
            .unwrap();

        assert!(!engine.exists::<DhcpRelay, _>(&session, &v4.key()).await.unwrap());
        assert_eq!(
            engine.read::<DhcpRelay, _>(&session, &v6.key()).await.unwrap(),
            Some(v6)
        );
        assert_eq!(
            device.running_config(),
            vec!["forwarding-options dhcp-relay dhcpv6 relay-agent-option-79"]
        );
    }

    #[tokio::test]
    async fn test_empty_model_rejected_before_io() {
        let (device, session) = setup();
        let engine = Engine::new();

        let err = engine
            .create(&session, &DhcpRelay::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!err.is_device_mutated());

        let bare = InterfacePhysical {
            name: "ge-0/0/4".to_string(),
            ..Default::default()
        };
        let err = engine.create(&session, &bare).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.field_path().unwrap().is_root());

        assert!(device.commands().is_empty());
        assert!(device.commits().is_empty());
        assert!(!device.is_locked());
    }

    #[tokio::test]
    async fn test_disabled_only_interface_is_not_a_placeholder() {
        let (device, session) = setup();
        device.load(&["set interfaces ge-0/0/6 disable"]);
        let engine = Engine::new();

        let key = "ge-0/0/6".to_string();
        assert!(engine.exists::<InterfacePhysical, _>(&session, &key).await.unwrap());
        let err = engine.create(&session, &port("ge-0/0/6")).await.unwrap_err();
        assert!(matches!(err, Error::Duplicate { .. }));
        assert_eq!(device.running_config(), vec!["interfaces ge-0/0/6 disable"]);

        let disabled = InterfacePhysical {
            name: "ge-0/0/5".to_string(),
            disable: true,
            ..Default::default()
        };
        let outcome = engine.create(&session, &disabled).await.unwrap();
        assert_eq!(outcome.value, disabled);
        assert!(engine
            .exists::<InterfacePhysical, _>(&session, &disabled.name)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_update_commit_failure_rolls_back() {
        let (device, session) = setup();
        let engine = Engine::new();
        engine.create(&session, &port("ge-0/0/2")).await.unwrap();
        let before = device.running_config();

        device.fail_next_commit("configuration check-out failed");
        let mut desired = port("ge-0/0/2");
        desired.mtu = Some(9192);
        let err = engine.update(&session, &desired).await.unwrap_err();

        assert!(matches!(err, Error::Commit { .. }));
        assert_eq!(err.terminal_state(), Some(TerminalState::RolledBack));
        assert_eq!(device.running_config(), before);
        assert!(!device.is_locked());
    }

    #[tokio::test]
    async fn test_rejected_delete_rolls_back() {
        let (device, session) = setup();
        let engine = EngineBuilder::new()
            .delete_policy(DeletePolicy::LeavePlaceholder)
            .build();
        engine.create(&session, &port("ge-0/0/2")).await.unwrap();
        let before = device.running_config();

        device.reject_statements_containing("description \"NC\"", "statement not allowed");
        let err = engine
            .delete::<InterfacePhysical, _>(&session, &"ge-0/0/2".to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Apply { path: None, .. }));
        assert_eq!(err.terminal_state(), Some(TerminalState::RolledBack));
        assert_eq!(device.running_config(), before);
        assert_eq!(device.commits().len(), 1);
        assert!(!device.is_locked());
    }

    #[tokio::test]
    async fn test_missing_routing_instance() {
        let (device, session) = setup();
        let engine = Engine::new();
        let model = DhcpRelay {
            routing_instance: "ri1".to_string(),
            forward_only: true,
            ..Default::default()
        };

        let err = engine.create(&session, &model).await.unwrap_err();
        assert!(matches!(err, Error::Precheck { .. }));
        assert!(err.to_string().contains("routing instance 'ri1'"));
        assert_eq!(device.commands().len(), 1);
        assert!(device.staged_statements().is_empty());
        assert!(!device.is_locked());

        device.load(&["set routing-instances ri1 instance-type virtual-router"]);
        engine.create(&session, &model).await.unwrap();
        assert!(device
            .running_config()
            .contains(&"routing-instances ri1 forwarding-options dhcp-relay forward-only".to_string()));
    }

    #[tokio::test]
    async fn test_lock_held_elsewhere() {
        let device = MemoryDevice::new();
        let other = device.session();
        other.config_lock().await.unwrap();
        let session = SessionHandle::new(device.session());
        let engine = Engine::new();

        let err = engine
            .create(&session, &proxy("p1", "10.0.0.1"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Session(SessionError::Locked { .. })));
        assert!(device.staged_statements().is_empty());
        assert!(device.is_locked());
    }

    #[tokio::test]
    async fn test_cancelled_create_discards_change_set() {
        let device = MemoryDevice::with_command_delay(Duration::from_millis(50));
        let session = SessionHandle::new(device.session());
        let engine = Engine::new();
        let model = proxy("p1", "10.0.0.1");

        let result =
            tokio::time::timeout(Duration::from_millis(10), engine.create(&session, &model)).await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!device.is_locked());
        assert!(device.running_config().is_empty());
    }
}
