//! In-memory device implementing [`Session`].
//!
//! [`MemoryDevice`] keeps a running configuration and a candidate
//! configuration as ordered sets of statement bodies (`set` stripped,
//! tokens rendered the way the device displays them). Any number of
//! [`MemorySession`]s can be opened on one device; they share the
//! configuration lock the way real sessions do.
//!
//! The device can be told to misbehave: reject statements, refuse the next
//! commit, silently drop statements at commit, fail `show` commands, or print
//! commit warnings. It also counts `command` calls that overlap in time,
//! which is how tests prove that reads are serialised.
//!
//! # Example
//!
//! ```rust
//! use junosync::session::memory::MemoryDevice;
//! use junosync::session::Session;
//!
//! # async fn example() -> Result<(), junosync::error::SessionError> {
//! let device = MemoryDevice::new();
//! device.load(&["set services proxy profile p1 protocol http host 10.0.0.1"]);
//!
//! let session = device.session();
//! let out = session
//!     .command("show configuration services proxy profile p1 | display set relative")
//!     .await?;
//! assert_eq!(out, "set protocol http host 10.0.0.1\n");
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use indexmap::IndexSet;
use log::debug;
use regex::Regex;

use super::Session;
use crate::error::{SessionError, SessionResult};
use crate::stanza::lines::normalize;

/// Mutable device state, guarded by one mutex.
#[derive(Debug, Default)]
struct DeviceState {
    running: IndexSet<String>,
    candidate: IndexSet<String>,
    lock_owner: Option<u64>,
    commits: Vec<String>,
    staged: Vec<String>,
    commands: Vec<String>,
    reject: Vec<(String, String)>,
    fail_commit: Option<String>,
    fail_commands: Vec<(String, String)>,
    drop_on_commit: Vec<String>,
    warnings: Vec<String>,
}

/// Simulated device shared by any number of [`MemorySession`]s.
#[derive(Debug)]
pub struct MemoryDevice {
    state: Mutex<DeviceState>,
    next_session: AtomicU64,
    in_flight: AtomicUsize,
    overlaps: AtomicUsize,
    command_delay: Duration,
    show_pattern: Regex,
}

impl MemoryDevice {
    /// Create an empty device.
    pub fn new() -> Arc<Self> {
        Self::with_command_delay(Duration::ZERO)
    }

    /// Create an empty device whose `command` calls take `delay` to answer.
    ///
    /// A non-zero delay makes unsynchronised concurrent commands overlap
    /// reliably.
    pub fn with_command_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(DeviceState::default()),
            next_session: AtomicU64::new(1),
            in_flight: AtomicUsize::new(0),
            overlaps: AtomicUsize::new(0),
            command_delay: delay,
            show_pattern: Regex::new(
                r"^show configuration(?: ([^|]*[^| ]))?(?: *\| *display set( relative)?)? *$",
            )
            .expect("Invalid regex pattern"),
        })
    }

    /// Open a new session on this device.
    pub fn session(self: &Arc<Self>) -> MemorySession {
        MemorySession {
            id: self.next_session.fetch_add(1, Ordering::SeqCst),
            device: Arc::clone(self),
            closed: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        // A panicking test thread must not hide the device from the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Load `set` statements straight into the running configuration.
    pub fn load(&self, statements: &[&str]) {
        let mut state = self.state();
        for statement in statements {
            let body = statement.trim();
            let body = body.strip_prefix("set ").unwrap_or(body);
            if let Ok(body) = normalize(body) {
                state.running.insert(body);
            }
        }
    }

    /// Running configuration, one statement body per entry.
    pub fn running_config(&self) -> Vec<String> {
        self.state().running.iter().cloned().collect()
    }

    /// Whether any session holds the configuration lock.
    pub fn is_locked(&self) -> bool {
        self.state().lock_owner.is_some()
    }

    /// Comments of every successful commit, oldest first.
    pub fn commits(&self) -> Vec<String> {
        self.state().commits.clone()
    }

    /// Every statement passed to `config_set`, in order, including rejected ones.
    pub fn staged_statements(&self) -> Vec<String> {
        self.state().staged.clone()
    }

    /// Every command passed to `command`, in order.
    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    /// Number of `command` calls that started while another was in flight.
    pub fn overlapping_commands(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// Reject any staged statement containing `pattern`.
    pub fn reject_statements_containing(&self, pattern: &str, message: &str) {
        self.state()
            .reject
            .push((pattern.to_string(), message.to_string()));
    }

    /// Refuse the next commit with `message`.
    pub fn fail_next_commit(&self, message: &str) {
        self.state().fail_commit = Some(message.to_string());
    }

    /// Fail any command containing `pattern`.
    pub fn fail_commands_containing(&self, pattern: &str, message: &str) {
        self.state()
            .fail_commands
            .push((pattern.to_string(), message.to_string()));
    }

    /// Silently discard statements under `stanza` at commit time.
    pub fn drop_on_commit(&self, stanza: &str) {
        let stanza = normalize(stanza).unwrap_or_else(|_| stanza.to_string());
        self.state().drop_on_commit.push(stanza);
    }

    /// Warnings printed by every successful commit.
    pub fn set_commit_warnings(&self, warnings: &[&str]) {
        self.state().warnings = warnings.iter().map(|w| w.to_string()).collect();
    }

    fn run_command(&self, cmd: &str) -> SessionResult<String> {
        let cmd = cmd.trim();
        let mut state = self.state();
        state.commands.push(cmd.to_string());

        if let Some((_, message)) = state.fail_commands.iter().find(|(p, _)| cmd.contains(p)) {
            return Err(SessionError::Command {
                command: cmd.to_string(),
                message: message.clone(),
            });
        }

        let caps = self
            .show_pattern
            .captures(cmd)
            .ok_or_else(|| SessionError::Command {
                command: cmd.to_string(),
                message: "syntax error".to_string(),
            })?;

        let path = match caps.get(1) {
            Some(m) => normalize(m.as_str()).map_err(|e| SessionError::Command {
                command: cmd.to_string(),
                message: e.to_string(),
            })?,
            None => String::new(),
        };
        let relative = caps.get(2).is_some();

        let mut out = String::new();
        for line in &state.running {
            let rest = if path.is_empty() {
                Some(line.as_str())
            } else {
                under(line, &path)
            };
            let Some(rest) = rest else { continue };
            let shown = if relative { rest } else { line.as_str() };
            if shown.is_empty() {
                continue;
            }
            out.push_str("set ");
            out.push_str(shown);
            out.push('\n');
        }
        Ok(out)
    }

    fn stage(&self, session: u64, lines: &[String]) -> SessionResult<()> {
        let mut state = self.state();
        if state.lock_owner != Some(session) {
            return Err(SessionError::NotLocked);
        }

        for line in lines {
            state.staged.push(line.clone());

            if let Some((_, message)) = state.reject.iter().find(|(p, _)| line.contains(p)) {
                return Err(SessionError::Rejected {
                    line: line.clone(),
                    message: message.clone(),
                });
            }

            let rejected = |message: &str| SessionError::Rejected {
                line: line.clone(),
                message: message.to_string(),
            };

            if let Some(body) = line.trim().strip_prefix("set ") {
                let body = normalize(body).map_err(|e| rejected(&e.to_string()))?;
                state.candidate.insert(body);
            } else if let Some(body) = line.trim().strip_prefix("delete ") {
                let body = normalize(body).map_err(|e| rejected(&e.to_string()))?;
                state.candidate.retain(|l| under(l, &body).is_none());
            } else {
                return Err(rejected("syntax error"));
            }
        }
        Ok(())
    }

    fn lock(&self, session: u64) -> SessionResult<()> {
        let mut state = self.state();
        match state.lock_owner {
            Some(owner) if owner == session => Ok(()),
            Some(owner) => Err(SessionError::Locked {
                message: format!("configuration database locked by session {}", owner),
            }),
            None => {
                state.lock_owner = Some(session);
                state.candidate = state.running.clone();
                Ok(())
            }
        }
    }

    fn commit(&self, session: u64, comment: &str) -> SessionResult<Vec<String>> {
        let mut state = self.state();
        if state.lock_owner != Some(session) {
            return Err(SessionError::NotLocked);
        }
        if let Some(message) = state.fail_commit.take() {
            return Err(SessionError::CommitFailed { message });
        }

        let dropped = state.drop_on_commit.clone();
        let mut committed = std::mem::take(&mut state.candidate);
        committed.retain(|l| !dropped.iter().any(|d| under(l, d).is_some()));

        state.running = committed;
        state.commits.push(comment.to_string());
        state.lock_owner = None;
        debug!("memory device: session {} committed ({})", session, comment);
        Ok(state.warnings.clone())
    }

    fn clear(&self, session: u64) {
        let mut state = self.state();
        if state.lock_owner == Some(session) {
            state.candidate = state.running.clone();
            state.lock_owner = None;
            debug!("memory device: session {} cleared candidate", session);
        }
    }
}

/// Remainder of `line` below `stanza`, on a token boundary.
fn under<'a>(line: &'a str, stanza: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(stanza)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix(' ')
    }
}

/// Decrements the in-flight counter even if the command future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Session on a [`MemoryDevice`].
#[derive(Debug)]
pub struct MemorySession {
    id: u64,
    device: Arc<MemoryDevice>,
    closed: AtomicBool,
}

impl MemorySession {
    /// Session number, as shown in lock conflicts.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The device this session talks to.
    pub fn device(&self) -> &Arc<MemoryDevice> {
        &self.device
    }

    fn check_open(&self) -> SessionResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Session for MemorySession {
    async fn command(&self, cmd: &str) -> SessionResult<String> {
        self.check_open()?;

        let device = &self.device;
        if device.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            device.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        let _in_flight = InFlight(&device.in_flight);

        if device.command_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(device.command_delay).await;
        }

        device.run_command(cmd)
    }

    async fn config_set(&self, lines: &[String]) -> SessionResult<()> {
        self.check_open()?;
        self.device.stage(self.id, lines)
    }

    async fn config_lock(&self) -> SessionResult<()> {
        self.check_open()?;
        self.device.lock(self.id)
    }

    async fn commit_conf(&self, comment: &str) -> SessionResult<Vec<String>> {
        self.check_open()?;
        self.device.commit(self.id, comment)
    }

    async fn config_clear(&self) -> SessionResult<()> {
        self.check_open()?;
        self.device.clear(self.id);
        Ok(())
    }

    async fn close(&self) -> SessionResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.device.clear(self.id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_show_relative_and_full() {
        let device = MemoryDevice::new();
        device.load(&[
            "set interfaces ge-0/0/0 description \"to core\"",
            "set interfaces ge-0/0/0 mtu 9000",
            "set interfaces ge-0/0/1 disable",
        ]);
        let session = device.session();

        let out = session
            .command("show configuration interfaces ge-0/0/0 | display set relative")
            .await
            .unwrap();
        assert_eq!(out, "set description \"to core\"\nset mtu 9000\n");

        let out = session
            .command("show configuration interfaces ge-0/0/1 | display set")
            .await
            .unwrap();
        assert_eq!(out, "set interfaces ge-0/0/1 disable\n");

        let out = session
            .command("show configuration interfaces ge-0/0/9 | display set relative")
            .await
            .unwrap();
        assert!(out.is_empty());

        assert!(session.command("show version").await.is_err());
    }

    #[tokio::test]
    async fn test_commit_applies_candidate() {
        let device = MemoryDevice::new();
        let session = device.session();

        session.config_lock().await.unwrap();
        assert!(device.is_locked());
        session
            .config_set(&lines(&[
                "set services proxy profile \"p1\" protocol http host \"10.0.0.1\"",
            ]))
            .await
            .unwrap();
        assert!(device.running_config().is_empty());

        let warnings = session.commit_conf("test").await.unwrap();
        assert!(warnings.is_empty());
        assert!(!device.is_locked());
        assert_eq!(
            device.running_config(),
            vec!["services proxy profile p1 protocol http host 10.0.0.1"]
        );
        assert_eq!(device.commits(), vec!["test"]);
    }

    #[tokio::test]
    async fn test_delete_removes_subtree() {
        let device = MemoryDevice::new();
        device.load(&[
            "set interfaces ge-0/0/0 mtu 9000",
            "set interfaces ge-0/0/0 disable",
            "set interfaces ge-0/0/00 disable",
        ]);
        let session = device.session();
        session.config_lock().await.unwrap();
        session
            .config_set(&lines(&["delete interfaces ge-0/0/0"]))
            .await
            .unwrap();
        session.commit_conf("delete").await.unwrap();
        assert_eq!(device.running_config(), vec!["interfaces ge-0/0/00 disable"]);
    }

    #[tokio::test]
    async fn test_clear_discards_candidate() {
        let device = MemoryDevice::new();
        let session = device.session();
        session.config_lock().await.unwrap();
        session
            .config_set(&lines(&["set interfaces ge-0/0/0 disable"]))
            .await
            .unwrap();
        session.config_clear().await.unwrap();
        assert!(!device.is_locked());

        // A later transaction starts from running, not the discarded candidate.
        session.config_lock().await.unwrap();
        session.commit_conf("empty").await.unwrap();
        assert!(device.running_config().is_empty());
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let device = MemoryDevice::new();
        let first = device.session();
        let second = device.session();

        first.config_lock().await.unwrap();
        let err = second.config_lock().await.unwrap_err();
        assert!(matches!(err, SessionError::Locked { .. }));

        let err = second
            .config_set(&lines(&["set system host-name x"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotLocked));

        first.close().await.unwrap();
        assert!(!device.is_locked());
        second.config_lock().await.unwrap();
        assert!(matches!(
            first.command("show configuration | display set").await,
            Err(SessionError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let device = MemoryDevice::new();
        device.reject_statements_containing("mtu 99999", "value out of range");
        device.fail_next_commit("commit check failed");
        let session = device.session();

        session.config_lock().await.unwrap();
        let err = session
            .config_set(&lines(&[
                "set interfaces ge-0/0/0 disable",
                "set interfaces ge-0/0/0 mtu 99999",
            ]))
            .await
            .unwrap_err();
        assert_eq!(err.rejected_line(), Some("set interfaces ge-0/0/0 mtu 99999"));

        let err = session.commit_conf("x").await.unwrap_err();
        assert!(matches!(err, SessionError::CommitFailed { .. }));
        assert!(device.is_locked());
        session.config_clear().await.unwrap();
        assert!(device.running_config().is_empty());
    }

    #[tokio::test]
    async fn test_drop_on_commit() {
        let device = MemoryDevice::new();
        device.drop_on_commit("services proxy profile \"p1\"");
        let session = device.session();
        session.config_lock().await.unwrap();
        session
            .config_set(&lines(&[
                "set services proxy profile \"p1\" protocol http host \"h\"",
                "set services proxy profile \"p2\" protocol http host \"h\"",
            ]))
            .await
            .unwrap();
        session.commit_conf("x").await.unwrap();
        assert_eq!(
            device.running_config(),
            vec!["services proxy profile p2 protocol http host h"]
        );
    }

    #[tokio::test]
    async fn test_overlap_detection() {
        let device = MemoryDevice::with_command_delay(Duration::from_millis(20));
        let a = device.session();
        let b = device.session();
        let cmd = "show configuration | display set";
        let (ra, rb) = tokio::join!(a.command(cmd), b.command(cmd));
        ra.unwrap();
        rb.unwrap();
        assert!(device.overlapping_commands() > 0);
    }
}
