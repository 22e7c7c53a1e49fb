//! Device session contract.
//!
//! A [`Session`] is an already-authenticated connection to a device. This
//! crate never opens one itself: callers provide an implementation backed by
//! whatever transport they use, and the engine only consumes the contract
//! below. [`memory::MemorySession`] is an in-process implementation used by
//! tests and demos.
//!
//! # Contract
//!
//! - `command` runs an operational command and returns its raw text.
//! - `config_lock` takes the device-wide configuration lock.
//! - `config_set` stages statements in the pending change-set.
//! - `commit_conf` commits the change-set and releases the lock. Warnings
//!   returned with a successful commit are diagnostics, not errors.
//! - `config_clear` discards the change-set and releases the lock. It must be
//!   safe to call when nothing is staged.

pub mod memory;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::SessionResult;

/// Connection to one device.
///
/// Methods take `&self`: a session is a shared connection handle, and the
/// engine serialises access to it with the device lock and a
/// [`ReadGate`](crate::engine::ReadGate).
pub trait Session: Send + Sync {
    /// Run a command and return its output.
    fn command(&self, cmd: &str) -> impl Future<Output = SessionResult<String>> + Send;

    /// Stage statements in the pending change-set, in order.
    fn config_set(&self, lines: &[String]) -> impl Future<Output = SessionResult<()>> + Send;

    /// Acquire the device configuration lock.
    fn config_lock(&self) -> impl Future<Output = SessionResult<()>> + Send;

    /// Commit the pending change-set and release the lock.
    ///
    /// Returns the warnings the device printed.
    fn commit_conf(&self, comment: &str) -> impl Future<Output = SessionResult<Vec<String>>> + Send;

    /// Discard the pending change-set and release the lock.
    fn config_clear(&self) -> impl Future<Output = SessionResult<()>> + Send;

    /// Close the session.
    fn close(&self) -> impl Future<Output = SessionResult<()>> + Send;
}

/// Shared owner of a session, passed by reference into every engine call.
///
/// Cloning is cheap. The engine keeps a clone while a write transaction is
/// open so a cancelled call can still roll back.
pub struct SessionHandle<S> {
    session: Arc<S>,
}

impl<S: Session> SessionHandle<S> {
    pub fn new(session: S) -> Self {
        Self {
            session: Arc::new(session),
        }
    }

    /// The underlying session.
    pub fn session(&self) -> &S {
        &self.session
    }

    /// Close the underlying session.
    pub async fn close(&self) -> SessionResult<()> {
        self.session.close().await
    }
}

impl<S> Clone for SessionHandle<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
        }
    }
}

impl<S> fmt::Debug for SessionHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("refs", &Arc::strong_count(&self.session))
            .finish()
    }
}
