//! RAII guard around one locked change-set.

use log::{debug, error, warn};

use crate::error::SessionResult;
use crate::session::{Session, SessionHandle};

/// A change-set staged under the device configuration lock.
///
/// Created by [`begin`](Self::begin), which takes the lock. Consumed by
/// [`commit`](Self::commit) or [`rollback`](Self::rollback), both of which
/// release it. If the guard is dropped while still open (the operation's
/// future was cancelled, or a caller returned early), the pending change-set
/// is discarded by a task spawned on the current tokio runtime.
pub struct WriteTransaction<S: Session + 'static> {
    session: SessionHandle<S>,
    staged: usize,
    finished: bool,
}

impl<S: Session + 'static> WriteTransaction<S> {
    /// Acquire the configuration lock.
    ///
    /// The guard exists while the lock request is in flight, so cancelling
    /// this future after the device granted the lock still releases it.
    pub async fn begin(session: &SessionHandle<S>) -> SessionResult<Self> {
        let mut tx = Self {
            session: session.clone(),
            staged: 0,
            finished: false,
        };
        if let Err(e) = session.session().config_lock().await {
            // Never granted; nothing to release.
            tx.finished = true;
            return Err(e);
        }
        debug!("configuration locked");
        Ok(tx)
    }

    /// Stage statements, in order.
    pub async fn apply(&mut self, lines: &[String]) -> SessionResult<()> {
        if lines.is_empty() {
            return Ok(());
        }
        debug!("staging {} statement(s)", lines.len());
        self.session.session().config_set(lines).await?;
        self.staged += lines.len();
        Ok(())
    }

    /// Number of statements staged so far.
    pub fn staged(&self) -> usize {
        self.staged
    }

    /// Commit the change-set.
    ///
    /// On failure the change-set is discarded before the error is returned.
    pub async fn commit(mut self, comment: &str) -> SessionResult<Vec<String>> {
        debug!("committing {} statement(s): {}", self.staged, comment);
        match self.session.session().commit_conf(comment).await {
            Ok(warnings) => {
                self.finished = true;
                Ok(warnings)
            }
            Err(e) => {
                self.finished = true;
                if let Err(clear) = self.session.session().config_clear().await {
                    error!("failed to discard change-set after commit error: {}", clear);
                }
                Err(e)
            }
        }
    }

    /// Discard the change-set and release the lock.
    pub async fn rollback(mut self) -> SessionResult<()> {
        debug!("discarding {} staged statement(s)", self.staged);
        self.finished = true;
        self.session.session().config_clear().await
    }
}

impl<S: Session + 'static> Drop for WriteTransaction<S> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!("write transaction dropped while open, discarding change-set");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let session = self.session.clone();
                handle.spawn(async move {
                    if let Err(e) = session.session().config_clear().await {
                        error!("failed to discard abandoned change-set: {}", e);
                    }
                });
            }
            Err(_) => {
                error!("no tokio runtime to discard abandoned change-set; the device may stay locked");
            }
        }
    }
}
