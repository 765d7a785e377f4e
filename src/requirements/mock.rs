//! In-memory package backend for tests.
//!
//! [`MockBackend`] models just enough of a package database to drive the
//! requirements core end to end: installed/available/upgradable packages,
//! enabled architectures, lock contention, scripted commit progress and
//! commit failures. Every call is recorded so tests can assert what did
//! and didn't reach the package manager.
//!
//! # Example
//!
//! ```
//! use umake::requirements::backend::PackageBackend;
//! use umake::requirements::mock::MockBackend;
//!
//! let backend = MockBackend::new("amd64");
//! backend.add_installed("make");
//! backend.add_available("gcc-avr");
//!
//! let snapshot = backend.load().unwrap();
//! assert_eq!(snapshot.len(), 2);
//! assert!(!backend.has_mutations());
//! ```

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::error::{Result, UmakeError};

use super::backend::{LoadError, MarkAction, MarkPlan, PackageBackend};
use super::progress::{CommitEvent, FetchCounters};
use super::status::{CacheSnapshot, PackageRecord};

/// A call that reached the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Load,
    EnableForeignArch(String),
    /// Staged packages as `(database key, action)`.
    Commit(Vec<(String, MarkAction)>),
}

#[derive(Debug, Default)]
struct MockState {
    native_arch: String,
    foreign_archs: Vec<String>,
    packages: HashMap<String, PackageRecord>,
    busy_loads: u32,
    load_failure: Option<String>,
    commit_events: Option<Vec<CommitEvent>>,
    commit_failure: Option<String>,
    commit_output: Option<String>,
    commit_delay: Duration,
    foreign_arch_failure: Option<String>,
    load_count: usize,
    calls: Vec<BackendCall>,
}

/// Scriptable in-memory [`PackageBackend`].
#[derive(Debug)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    /// Empty database for a host architecture.
    pub fn new(native_arch: &str) -> Self {
        Self {
            state: Mutex::new(MockState {
                native_arch: native_arch.to_string(),
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn insert(&self, key: &str, installed: bool, upgradable: bool) {
        self.state().packages.insert(
            key.to_string(),
            PackageRecord {
                installed,
                upgradable,
            },
        );
    }

    /// Add an installed, current package. `key` is `name` or `name:arch`.
    pub fn add_installed(&self, key: &str) {
        self.insert(key, true, false);
    }

    /// Add a package that's known but not installed.
    pub fn add_available(&self, key: &str) {
        self.insert(key, false, false);
    }

    /// Add an installed package with a newer candidate.
    pub fn add_upgradable(&self, key: &str) {
        self.insert(key, true, true);
    }

    /// Enable a foreign architecture up front.
    pub fn add_foreign_arch(&self, arch: &str) {
        let mut state = self.state();
        if !state.foreign_archs.iter().any(|a| a == arch) {
            state.foreign_archs.push(arch.to_string());
        }
    }

    /// Make the next `count` loads fail as if the database were locked.
    pub fn fail_loads_busy(&self, count: u32) {
        self.state().busy_loads = count;
    }

    /// Make every load fail outright.
    pub fn fail_loads(&self, message: &str) {
        self.state().load_failure = Some(message.to_string());
    }

    /// Replace the default progress sequence emitted by `commit`.
    pub fn script_commit_events(&self, events: Vec<CommitEvent>) {
        self.state().commit_events = Some(events);
    }

    /// Make `commit` fail with `message` after emitting its progress.
    pub fn fail_commit(&self, message: &str) {
        self.state().commit_failure = Some(message.to_string());
    }

    /// Text the package manager "prints" into the exchange file on commit.
    pub fn write_commit_output(&self, text: &str) {
        self.state().commit_output = Some(text.to_string());
    }

    /// Sleep this long in the middle of each commit.
    pub fn set_commit_delay(&self, delay: Duration) {
        self.state().commit_delay = delay;
    }

    /// Make enabling a foreign architecture fail.
    pub fn fail_foreign_arch(&self, message: &str) {
        self.state().foreign_arch_failure = Some(message.to_string());
    }

    /// Number of `load` calls so far.
    pub fn load_count(&self) -> usize {
        self.state().load_count
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state().calls.clone()
    }

    /// Commits so far.
    pub fn commits(&self) -> Vec<Vec<(String, MarkAction)>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Commit(marked) => Some(marked),
                _ => None,
            })
            .collect()
    }

    /// Whether any mutating call reached the backend.
    pub fn has_mutations(&self) -> bool {
        self.calls()
            .iter()
            .any(|call| !matches!(call, BackendCall::Load))
    }

    /// Whether a package is installed right now.
    pub fn is_installed(&self, key: &str) -> bool {
        self.state()
            .packages
            .get(key)
            .is_some_and(|record| record.installed)
    }

    fn default_events() -> Vec<CommitEvent> {
        let fetch = |current_bytes, current_items| {
            CommitEvent::Fetch(FetchCounters {
                current_bytes,
                current_items,
                total_bytes: 2048,
                total_items: 2,
            })
        };
        vec![
            fetch(0, 0),
            fetch(1024, 1),
            fetch(2048, 2),
            CommitEvent::Apply { percent: 25.0 },
            CommitEvent::Apply { percent: 75.0 },
            CommitEvent::Apply { percent: 100.0 },
        ]
    }
}

fn key_arch(key: &str) -> Option<&str> {
    key.rsplit_once(':').map(|(_, arch)| arch)
}

impl PackageBackend for MockBackend {
    fn load(&self) -> std::result::Result<CacheSnapshot, LoadError> {
        let mut state = self.state();
        state.load_count += 1;
        state.calls.push(BackendCall::Load);

        if state.busy_loads > 0 {
            state.busy_loads -= 1;
            return Err(LoadError::Busy("mock lock held".to_string()));
        }
        if let Some(message) = &state.load_failure {
            return Err(LoadError::Failed(message.clone()));
        }

        let mut snapshot = CacheSnapshot::new(&state.native_arch);
        for arch in &state.foreign_archs {
            snapshot.add_foreign_arch(arch);
        }
        // Packages of disabled architectures are invisible, like in dpkg.
        for (key, record) in &state.packages {
            let visible = key_arch(key).is_none_or(|arch| snapshot.is_arch_enabled(arch));
            if visible {
                snapshot.insert(key, *record);
            }
        }
        Ok(snapshot)
    }

    fn enable_foreign_arch(&self, arch: &str, exchange: &Path) -> Result<()> {
        let failure = {
            let mut state = self.state();
            state
                .calls
                .push(BackendCall::EnableForeignArch(arch.to_string()));
            state.foreign_arch_failure.clone()
        };

        if let Some(message) = failure {
            append(exchange, &format!("dpkg: error: {}\n", message))?;
            return Err(UmakeError::ForeignArchFailed {
                arch: arch.to_string(),
                message,
            });
        }

        self.add_foreign_arch(arch);
        Ok(())
    }

    fn commit(
        &self,
        plan: &MarkPlan,
        exchange: &Path,
        on_event: &mut dyn FnMut(CommitEvent),
    ) -> Result<()> {
        let (events, delay, output, failure, native) = {
            let mut state = self.state();
            let marked = plan
                .marked()
                .iter()
                .map(|m| (m.package.normalized(&state.native_arch).to_string(), m.action))
                .collect();
            state.calls.push(BackendCall::Commit(marked));
            (
                state
                    .commit_events
                    .clone()
                    .unwrap_or_else(Self::default_events),
                state.commit_delay,
                state.commit_output.clone(),
                state.commit_failure.clone(),
                state.native_arch.clone(),
            )
        };

        let halfway = events.len() / 2;
        for (index, event) in events.into_iter().enumerate() {
            if index == halfway && !delay.is_zero() {
                thread::sleep(delay);
            }
            on_event(event);
        }

        if let Some(text) = output {
            append(exchange, &text)?;
        }
        if let Some(message) = failure {
            return Err(UmakeError::CommitFailed { message });
        }

        let mut state = self.state();
        for marked in plan.marked() {
            let key = marked.package.normalized(&native).to_string();
            state.packages.insert(
                key,
                PackageRecord {
                    installed: true,
                    upgradable: false,
                },
            );
        }
        Ok(())
    }
}

fn append(path: &Path, text: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    Ok(())
}
