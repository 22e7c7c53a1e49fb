//! Serialisation of `show` commands on a shared connection.

use std::fmt;
use std::sync::Arc;

use log::trace;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::SessionResult;
use crate::session::{Session, SessionHandle};

/// Mutex every read-side command on one connection goes through.
///
/// Concurrent `show` commands on one connection interleave their output, so
/// reads must never overlap. The gate is independent from the device
/// configuration lock: reads do not take that lock, and writes only pass
/// through the gate for their existence checks.
///
/// Clones share the same mutex. Give every engine that uses one connection a
/// clone of the same gate.
#[derive(Clone, Default)]
pub struct ReadGate {
    inner: Arc<Mutex<()>>,
}

impl ReadGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of the connection.
    pub async fn enter(&self) -> MutexGuard<'_, ()> {
        let guard = self.inner.lock().await;
        trace!("read gate entered");
        guard
    }

    /// Run one command while holding the gate.
    pub async fn command<S: Session>(
        &self,
        session: &SessionHandle<S>,
        cmd: &str,
    ) -> SessionResult<String> {
        let _guard = self.enter().await;
        session.session().command(cmd).await
    }

    /// Whether two gates share the same mutex.
    pub fn same_as(&self, other: &ReadGate) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ReadGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadGate")
            .field("busy", &self.inner.try_lock().is_err())
            .finish()
    }
}
