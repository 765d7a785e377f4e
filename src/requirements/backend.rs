//! The package manager seen from the requirements core.
//!
//! [`PackageBackend`] is the black-box boundary: it can read the package
//! database into a [`CacheSnapshot`], enable a foreign architecture, and
//! commit a set of staged install/upgrade actions while emitting progress
//! events. The production implementation is
//! [`AptBackend`](super::apt::AptBackend); tests use
//! [`MockBackend`](super::mock::MockBackend).

use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::error::Result;

use super::progress::CommitEvent;
use super::spec::PackageRef;
use super::status::CacheSnapshot;

/// Why a database load failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// Another process holds the database lock; retrying may succeed.
    #[error("package database is locked: {0}")]
    Busy(String),
    /// The database can't be read.
    #[error("{0}")]
    Failed(String),
}

/// What to do with a staged package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkAction {
    /// Package is installed but stale.
    Upgrade,
    /// Package isn't installed yet.
    Install,
}

impl fmt::Display for MarkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkAction::Upgrade => write!(f, "upgrade"),
            MarkAction::Install => write!(f, "install"),
        }
    }
}

/// A package staged for the next commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedPackage {
    pub package: PackageRef,
    pub action: MarkAction,
}

/// Every package staged for one commit, in bucket order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkPlan {
    marked: Vec<MarkedPackage>,
}

impl MarkPlan {
    /// Stage a package.
    pub fn mark(&mut self, package: PackageRef, action: MarkAction) {
        self.marked.push(MarkedPackage { package, action });
    }

    /// All staged packages.
    pub fn marked(&self) -> &[MarkedPackage] {
        &self.marked
    }

    /// Packages staged with a given action.
    pub fn with_action(&self, action: MarkAction) -> impl Iterator<Item = &PackageRef> {
        self.marked
            .iter()
            .filter(move |m| m.action == action)
            .map(|m| &m.package)
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }
}

/// Access to the system package manager.
///
/// Reads (`load`) must not require elevated rights. Mutations
/// (`enable_foreign_arch`, `commit`) are only ever called from the install
/// worker, one at a time, and write any subprocess output to `exchange`
/// rather than to the caller's stdio.
pub trait PackageBackend: Send + Sync {
    /// Read the current state of the package database.
    fn load(&self) -> std::result::Result<CacheSnapshot, LoadError>;

    /// Enable a foreign architecture and refresh the package lists.
    fn enable_foreign_arch(&self, arch: &str, exchange: &Path) -> Result<()>;

    /// Fetch and apply the staged actions.
    ///
    /// Progress is reported through `on_event`. Failure is returned as an
    /// error carrying the package manager's message.
    fn commit(
        &self,
        plan: &MarkPlan,
        exchange: &Path,
        on_event: &mut dyn FnMut(CommitEvent),
    ) -> Result<()>;
}
