//! Deployment lock.
//!
//! Two deploys of the same stack must not overlap. A lock object in the
//! artifact bucket records who is deploying; expired locks are taken over.
//! A held lock is refreshed in the background while the deploy runs, so a
//! stack wait longer than the expiry does not let a second deploy in.

mod info;
mod s3;

pub use info::{generate_holder_id, LockInfo, LOCK_EXPIRY_SECS, LOCK_REFRESH_SECS};
pub use s3::S3LockStore;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{LockError, Result, ShipError};

/// Raw storage for the lock object.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Reads the lock object, if present.
    async fn read(&self) -> Result<Option<String>>;

    /// Writes the lock object only if none exists.
    ///
    /// Returns `false` when another writer got there first.
    async fn create(&self, content: &str) -> Result<bool>;

    /// Overwrites the lock object.
    async fn write(&self, content: &str) -> Result<()>;

    /// Deletes the lock object.
    async fn remove(&self) -> Result<()>;

    /// Returns a human-readable location for log messages.
    fn location(&self) -> String;
}

/// Acquires and releases the deployment lock of one stack.
pub struct DeployLock {
    /// Lock storage.
    store: Box<dyn LockStore>,
}

impl std::fmt::Debug for DeployLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployLock")
            .field("location", &self.store.location())
            .finish()
    }
}

impl DeployLock {
    /// Creates a lock over the given storage.
    #[must_use]
    pub fn new(store: Box<dyn LockStore>) -> Self {
        Self { store }
    }

    /// Returns the current lock, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be read or parsed.
    pub async fn current(&self) -> Result<Option<LockInfo>> {
        self.store
            .read()
            .await?
            .map(|content| parse_lock(&content))
            .transpose()
    }

    /// Acquires the lock.
    ///
    /// The lock object is created conditionally, so of two deploys racing
    /// for a free lock only one wins.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::LockedByOther`] if a live lock is held by someone
    /// else, or a backend error.
    pub async fn acquire(&self, holder: &str, stack_name: &str) -> Result<LockInfo> {
        if let Some(existing) = self.current().await? {
            if !existing.is_expired() {
                return Err(locked_by(existing));
            }
            warn!("Expired lock held by {} found, taking over", existing.holder);
            self.store.remove().await?;
        }

        let holder_id = if holder.is_empty() {
            generate_holder_id()
        } else {
            holder.to_string()
        };

        let lock_info = LockInfo::new(&holder_id, stack_name);

        if !self.store.create(&serialize_lock(&lock_info)?).await? {
            return Err(match self.current().await? {
                Some(winner) => locked_by(winner),
                None => ShipError::Lock(LockError::backend(format!(
                    "Lock at {} changed during acquisition",
                    self.store.location()
                ))),
            });
        }

        info!(
            "Acquired deploy lock {} at {} (expires in {}s)",
            lock_info.lock_id,
            self.store.location(),
            LOCK_EXPIRY_SECS
        );

        Ok(lock_info)
    }

    /// Extends a held lock by a full expiry period.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Lost`] if the lock was removed or replaced by
    /// another holder, or a backend error.
    pub async fn refresh(&self, lock: &mut LockInfo) -> Result<()> {
        let still_ours = matches!(
            self.current().await?,
            Some(existing) if existing.lock_id == lock.lock_id
        );
        if !still_ours {
            return Err(ShipError::Lock(LockError::Lost {
                lock_id: lock.lock_id.clone(),
            }));
        }

        lock.refresh();
        self.store.write(&serialize_lock(lock)?).await?;
        debug!("Refreshed deploy lock {} until {}", lock.lock_id, lock.expires_at);
        Ok(())
    }

    /// Releases the lock if it is still ours.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be read or deleted.
    pub async fn release(&self, lock: &LockInfo) -> Result<()> {
        match self.current().await? {
            Some(existing) if existing.lock_id == lock.lock_id => {
                self.store.remove().await?;
                info!("Released deploy lock {}", lock.lock_id);
            }
            Some(existing) => {
                debug!(
                    "Lock ID mismatch: expected {}, found {}",
                    lock.lock_id, existing.lock_id
                );
            }
            None => debug!("Lock {} already gone", lock.lock_id),
        }

        Ok(())
    }
}

/// Keeps a held lock alive until stopped.
///
/// Dropping the heartbeat stops it as well.
#[derive(Debug)]
pub struct LockHeartbeat {
    /// Background refresh task.
    handle: JoinHandle<()>,
}

impl LockHeartbeat {
    /// Starts refreshing `lock` every `interval`.
    ///
    /// The task stops on the first failed refresh; the lock then expires on
    /// its own.
    #[must_use]
    pub fn start(deploy_lock: Arc<DeployLock>, mut lock: LockInfo, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if let Err(e) = deploy_lock.refresh(&mut lock).await {
                    error!("Stopped refreshing deploy lock: {e}");
                    break;
                }
            }
        });

        Self { handle }
    }

    /// Stops refreshing.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for LockHeartbeat {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn locked_by(existing: LockInfo) -> ShipError {
    ShipError::Lock(LockError::LockedByOther {
        holder: existing.holder,
        since: existing.acquired_at.to_rfc3339(),
    })
}

fn serialize_lock(lock: &LockInfo) -> Result<String> {
    serde_json::to_string_pretty(lock).map_err(|e| {
        ShipError::Lock(LockError::backend(format!("Failed to serialize lock: {e}")))
    })
}

fn parse_lock(content: &str) -> Result<LockInfo> {
    serde_json::from_str(content).map_err(|e| {
        ShipError::Lock(LockError::Corrupted {
            message: format!("Failed to parse lock: {e}"),
        })
    })
}
