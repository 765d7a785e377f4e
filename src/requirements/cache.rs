//! Live handle to the package database.
//!
//! [`PackageCache`] holds the latest [`CacheSnapshot`] read from the
//! backend. Readers take a cheap `Arc` of the current snapshot and never
//! block on the install worker; the worker swaps in a fresh snapshot
//! whenever it reloads. A reader may therefore see state that's about to
//! change under a running transaction, and must re-validate after the
//! completion notification if it cares.

use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::ReloadRetrySettings;
use crate::error::{Result, UmakeError};

use super::backend::{LoadError, PackageBackend};
use super::status::CacheSnapshot;

/// How reloads are retried while another process holds the database lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound for the exponential backoff.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        ReloadRetrySettings::default().into()
    }
}

impl From<ReloadRetrySettings> for RetryPolicy {
    fn from(settings: ReloadRetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

/// Load a snapshot, backing off while the database is locked.
pub fn load_with_retry(backend: &dyn PackageBackend, policy: &RetryPolicy) -> Result<CacheSnapshot> {
    let mut attempt = 1;
    loop {
        match backend.load() {
            Ok(snapshot) => {
                debug!(
                    "Package cache loaded: {} packages, native arch {}",
                    snapshot.len(),
                    snapshot.native_arch()
                );
                return Ok(snapshot);
            }
            Err(LoadError::Busy(reason)) if attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "Package database busy ({}), retrying in {:?} (attempt {}/{})",
                    reason, delay, attempt, policy.max_attempts
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(LoadError::Busy(_)) => return Err(UmakeError::DatabaseBusy { attempts: attempt }),
            Err(LoadError::Failed(message)) => {
                return Err(UmakeError::DatabaseUnavailable { message })
            }
        }
    }
}

/// Shared, reloadable view of the package database.
pub struct PackageCache {
    backend: Arc<dyn PackageBackend>,
    policy: RetryPolicy,
    snapshot: RwLock<Arc<CacheSnapshot>>,
}

impl PackageCache {
    /// Open the cache by loading an initial snapshot.
    pub fn open(backend: Arc<dyn PackageBackend>, policy: RetryPolicy) -> Result<Self> {
        let snapshot = load_with_retry(backend.as_ref(), &policy)?;
        Ok(Self {
            backend,
            policy,
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Force a reload after the database changed out of band.
    pub fn reload(&self) -> Result<()> {
        let fresh = load_with_retry(self.backend.as_ref(), &self.policy)?;
        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(fresh);
        Ok(())
    }

    /// The backend this cache reads from.
    pub fn backend(&self) -> &Arc<dyn PackageBackend> {
        &self.backend
    }

    /// The reload retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}
