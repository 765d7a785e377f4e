//! A single install/upgrade transaction.
//!
//! ```text
//! Idle -> Queued -> Evaluating -> Fetching -> Applying -> Done(success)
//!                      |  ^           |           |
//!                      +--+           +-----------+-----> Done(failure)
//! ```
//!
//! `Evaluating -> Evaluating` happens when a foreign architecture is
//! enabled and the cache reloaded. `Evaluating -> Done` covers the
//! already-up-to-date short circuit and marking failures. Any live state
//! can fail.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::error::{Result, UmakeError};

use super::backend::{MarkAction, MarkPlan};
use super::equivalence::EquivalenceResolver;
use super::evaluator::BucketEvaluator;
use super::progress::{Phase, ProgressReport};
use super::spec::{Bucket, Specifier};
use super::status::CacheSnapshot;

/// How a transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Queued,
    Evaluating,
    Fetching,
    Applying,
    Done(Outcome),
}

impl TransactionState {
    /// Whether moving to `next` is allowed.
    pub fn can_transition_to(&self, next: TransactionState) -> bool {
        use TransactionState::*;
        match (self, next) {
            (Done(_), _) => false,
            (Idle, Queued) => true,
            (_, Done(Outcome::Failure)) => *self != Idle,
            (Queued, Evaluating) => true,
            (Evaluating, Evaluating | Fetching | Applying | Done(Outcome::Success)) => true,
            (Fetching, Applying | Done(Outcome::Success)) => true,
            (Applying, Done(Outcome::Success)) => true,
            _ => false,
        }
    }

    /// Whether the transaction has finished.
    pub fn is_done(&self) -> bool {
        matches!(self, TransactionState::Done(_))
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Idle => write!(f, "idle"),
            TransactionState::Queued => write!(f, "queued"),
            TransactionState::Evaluating => write!(f, "evaluating"),
            TransactionState::Fetching => write!(f, "fetching"),
            TransactionState::Applying => write!(f, "applying"),
            TransactionState::Done(Outcome::Success) => write!(f, "done"),
            TransactionState::Done(Outcome::Failure) => write!(f, "failed"),
        }
    }
}

/// A state change the machine doesn't allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal transaction transition from {from} to {to}")]
pub struct IllegalTransition {
    pub from: TransactionState,
    pub to: TransactionState,
}

impl From<IllegalTransition> for UmakeError {
    fn from(e: IllegalTransition) -> Self {
        UmakeError::Other(e.into())
    }
}

/// Why a bucket couldn't be staged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkError {
    /// No alternative of an alternation can be installed.
    #[error("no alternative of '{specifier}' is available")]
    Unresolved { specifier: String },
    /// The package database doesn't know the package.
    #[error("package {package} not found")]
    NotFound { package: String },
}

impl From<MarkError> for UmakeError {
    fn from(e: MarkError) -> Self {
        let package = match &e {
            MarkError::Unresolved { specifier } => specifier.clone(),
            MarkError::NotFound { package } => package.clone(),
        };
        UmakeError::MarkFailed {
            package,
            message: e.to_string(),
        }
    }
}

/// Stage every package of a resolved bucket.
///
/// Installed-but-stale packages are upgraded, missing ones installed.
/// Packages that are already current, or stood in for by a local runtime,
/// are left alone.
pub fn mark(
    bucket: &Bucket,
    snapshot: &CacheSnapshot,
    equivalence: &EquivalenceResolver,
) -> std::result::Result<MarkPlan, MarkError> {
    let mut plan = MarkPlan::default();

    for specifier in bucket {
        let pkg = match specifier {
            Specifier::Package(pkg) => pkg.normalized(snapshot.native_arch()),
            Specifier::Alternatives(_) => {
                return Err(MarkError::Unresolved {
                    specifier: specifier.to_string(),
                })
            }
        };

        if equivalence.satisfies(&pkg) {
            continue;
        }

        let status = snapshot.status(&pkg);
        if !status.present {
            return Err(MarkError::NotFound {
                package: pkg.to_string(),
            });
        }
        if status.is_up_to_date() {
            continue;
        }

        let action = if status.is_installed() {
            MarkAction::Upgrade
        } else {
            MarkAction::Install
        };
        debug!("Marking {} for {}", pkg, action);
        plan.mark(pkg, action);
    }

    Ok(plan)
}

/// Foreign architectures the bucket needs that aren't enabled yet.
pub fn missing_foreign_archs(bucket: &Bucket, snapshot: &CacheSnapshot) -> Vec<String> {
    let native = snapshot.native_arch();
    bucket
        .iter()
        .filter_map(Specifier::as_package)
        .filter_map(|pkg| pkg.foreign_arch(native))
        .filter(|arch| !snapshot.is_arch_enabled(arch))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// One bucket's journey through the install worker.
#[derive(Debug, Clone)]
pub struct Transaction {
    id: u64,
    bucket: Bucket,
    state: TransactionState,
    touched_database: bool,
    history: Vec<TransactionState>,
}

impl Transaction {
    pub fn new(id: u64, bucket: Bucket) -> Self {
        Self {
            id,
            bucket,
            state: TransactionState::Idle,
            touched_database: false,
            history: vec![TransactionState::Idle],
        }
    }

    /// A transaction that has just entered the install queue.
    pub fn queued(id: u64, bucket: Bucket) -> Self {
        Self {
            id,
            bucket,
            state: TransactionState::Queued,
            touched_database: false,
            history: vec![TransactionState::Idle, TransactionState::Queued],
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The bucket, with alternations resolved as far as evaluation got.
    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    pub fn into_bucket(self) -> Bucket {
        self.bucket
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Every state visited, in order.
    pub fn history(&self) -> &[TransactionState] {
        &self.history
    }

    /// Whether the package manager was asked to change anything.
    pub fn touched_database(&self) -> bool {
        self.touched_database
    }

    /// Move to `next`, rejecting transitions the machine doesn't allow.
    pub fn advance(&mut self, next: TransactionState) -> std::result::Result<(), IllegalTransition> {
        if !self.state.can_transition_to(next) {
            return Err(IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        debug!("Transaction {}: {} -> {}", self.id, self.state, next);
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Mark the transaction failed, unless it already finished.
    pub fn fail(&mut self) {
        if !self.state.is_done() && self.state != TransactionState::Idle {
            let _ = self.advance(TransactionState::Done(Outcome::Failure));
        }
    }

    /// Evaluate, stage and commit the bucket.
    ///
    /// Package manager output goes to `exchange`. On error the transaction
    /// is left in the state it failed in; the caller calls [`fail`](Self::fail).
    pub fn run(
        &mut self,
        evaluator: &BucketEvaluator,
        exchange: &Path,
        on_progress: &mut dyn FnMut(ProgressReport),
    ) -> Result<()> {
        self.advance(TransactionState::Evaluating)?;
        let cache = evaluator.cache();

        let evaluation = evaluator.is_up_to_date(&self.bucket);
        self.bucket = evaluation.bucket;
        if evaluation.satisfied {
            info!("{} is already installed and up to date", self.bucket);
            self.advance(TransactionState::Done(Outcome::Success))?;
            return Ok(());
        }

        let archs = missing_foreign_archs(&self.bucket, &cache.snapshot());
        if !archs.is_empty() {
            for arch in &archs {
                info!("Enabling foreign architecture {}", arch);
                self.touched_database = true;
                cache.backend().enable_foreign_arch(arch, exchange)?;
            }
            cache.reload()?;
            self.advance(TransactionState::Evaluating)?;

            let evaluation = evaluator.is_up_to_date(&self.bucket);
            self.bucket = evaluation.bucket;
            if evaluation.satisfied {
                self.advance(TransactionState::Done(Outcome::Success))?;
                return Ok(());
            }
        }

        let plan = mark(&self.bucket, &cache.snapshot(), evaluator.equivalence())?;
        if plan.is_empty() {
            self.advance(TransactionState::Done(Outcome::Success))?;
            return Ok(());
        }

        info!("Installing {}", self.bucket);
        self.touched_database = true;
        let mut last_apply = None;
        let mut transition_error = None;
        let outcome = cache.backend().commit(&plan, exchange, &mut |event| {
            let next = match event.phase() {
                Phase::Fetching => TransactionState::Fetching,
                Phase::Applying => TransactionState::Applying,
            };
            if next != self.state {
                if let Err(e) = self.advance(next) {
                    debug!("Dropping out-of-order {} event: {}", event.phase(), e);
                    transition_error.get_or_insert(e);
                    return;
                }
            }
            let report = event.to_report();
            if report.phase == Phase::Applying {
                last_apply = Some(report.percent);
            }
            debug!(
                "{} {} update: {:.1}%",
                self.bucket, report.phase, report.percent
            );
            on_progress(report);
        });
        outcome?;
        if let Some(e) = transition_error {
            debug!("Transaction {} saw out-of-order progress: {}", self.id, e);
        }

        if last_apply.is_none_or(|percent| percent < 100.0) {
            if self.state != TransactionState::Applying {
                self.advance(TransactionState::Applying)?;
            }
            on_progress(ProgressReport::applying(100.0));
        }

        self.advance(TransactionState::Done(Outcome::Success))?;
        Ok(())
    }
}
