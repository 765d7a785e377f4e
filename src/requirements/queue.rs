//! The install queue.
//!
//! [`RequirementsService`] owns the package cache and a single worker
//! thread. Submitted buckets are processed one at a time in submission
//! order; every submission gets exactly one completion callback, even
//! when the service is shutting down or a transaction panics.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::config::RequirementsSettings;
use crate::error::{Result, UmakeError};

use super::apt::AptBackend;
use super::backend::PackageBackend;
use super::cache::{PackageCache, RetryPolicy};
use super::dispatcher::{
    panic_message, CompletionCallback, ExchangeFile, InstallResult, ResultDispatcher,
};
use super::equivalence::EquivalenceResolver;
use super::evaluator::BucketEvaluator;
use super::progress::{ProgressCallback, ProgressReport};
use super::spec::Bucket;
use super::transaction::Transaction;

/// Knobs for a [`RequirementsService`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Backoff while the package database is locked.
    pub retry: RetryPolicy,
    /// Where exchange files go. `None` means the system temp dir.
    pub exchange_dir: Option<PathBuf>,
}

impl From<&RequirementsSettings> for ServiceOptions {
    fn from(settings: &RequirementsSettings) -> Self {
        Self {
            retry: settings.reload_retry.into(),
            exchange_dir: settings.exchange_dir.clone(),
        }
    }
}

/// A queued bucket with its callbacks.
pub struct BucketTask {
    transaction: Transaction,
    on_progress: ProgressCallback,
    on_complete: CompletionCallback,
}

impl BucketTask {
    /// Complete the task without running it.
    fn reject(self, err: UmakeError) {
        let mut transaction = self.transaction;
        transaction.fail();
        let result = ResultDispatcher::build(transaction.into_bucket(), Err(err), None);
        ResultDispatcher::dispatch(result, None, self.on_complete);
    }
}

/// Background service installing package buckets.
pub struct RequirementsService {
    evaluator: BucketEvaluator,
    sender: Mutex<Option<Sender<BucketTask>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl RequirementsService {
    /// Open the package cache and start the install worker.
    pub fn start(
        backend: Arc<dyn PackageBackend>,
        equivalence: EquivalenceResolver,
        options: ServiceOptions,
    ) -> Result<Self> {
        let cache = PackageCache::open(backend, options.retry)?;
        let evaluator = BucketEvaluator::new(Arc::new(cache), Arc::new(equivalence));

        let (sender, receiver) = mpsc::channel();
        let worker_evaluator = evaluator.clone();
        let exchange_dir = options.exchange_dir;
        let worker = thread::Builder::new()
            .name("umake-install".to_string())
            .spawn(move || worker_loop(worker_evaluator, exchange_dir, receiver))?;

        Ok(Self {
            evaluator,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            next_id: AtomicU64::new(1),
        })
    }

    /// Start a service backed by apt and the local Java runtimes.
    pub fn from_settings(settings: &RequirementsSettings) -> Result<Self> {
        let backend = AptBackend::from_settings(settings)?;
        Self::start(
            Arc::new(backend),
            EquivalenceResolver::from_env(),
            ServiceOptions::from(settings),
        )
    }

    /// Read-only queries against the current package database.
    pub fn evaluator(&self) -> &BucketEvaluator {
        &self.evaluator
    }

    /// Queue `bucket` for installation.
    ///
    /// Returns whether anything appears to need doing. The bucket is queued
    /// either way, and `on_complete` is always called exactly once.
    pub fn submit<P, C>(&self, bucket: Bucket, on_progress: P, on_complete: C) -> bool
    where
        P: FnMut(ProgressReport) + Send + 'static,
        C: FnOnce(InstallResult) + Send + 'static,
    {
        // Alternations are resolved once, here.
        let evaluation = self.evaluator.is_up_to_date(&bucket);
        let needed = !evaluation.satisfied;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Queueing {} as transaction {} (needed: {})",
            evaluation.bucket, id, needed
        );

        let task = BucketTask {
            transaction: Transaction::queued(id, evaluation.bucket),
            on_progress: Box::new(on_progress),
            on_complete: Box::new(on_complete),
        };

        let rejected = {
            let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
            match sender.as_ref() {
                Some(sender) => sender.send(task).err().map(|mpsc::SendError(task)| task),
                None => Some(task),
            }
        };
        if let Some(task) = rejected {
            task.reject(UmakeError::ServiceStopped);
        }
        needed
    }

    /// Stop accepting work, finish what's queued and join the worker.
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        drop(sender);

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!("Install worker exited abnormally");
            }
        }
    }
}

impl Drop for RequirementsService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    evaluator: BucketEvaluator,
    exchange_dir: Option<PathBuf>,
    receiver: Receiver<BucketTask>,
) {
    for task in receiver {
        process(&evaluator, exchange_dir.as_deref(), task);
    }
    debug!("Install queue drained, worker stopping");
}

fn process(evaluator: &BucketEvaluator, exchange_dir: Option<&Path>, task: BucketTask) {
    let BucketTask {
        mut transaction,
        mut on_progress,
        on_complete,
    } = task;

    let exchange = match ExchangeFile::create(exchange_dir) {
        Ok(exchange) => exchange,
        Err(e) => {
            BucketTask {
                transaction,
                on_progress,
                on_complete,
            }
            .reject(e);
            return;
        }
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        transaction.run(evaluator, exchange.path(), &mut |report| on_progress(report))
    }))
    .unwrap_or_else(|payload| {
        Err(UmakeError::Other(anyhow::anyhow!(
            "install transaction panicked: {}",
            panic_message(&*payload)
        )))
    });
    if outcome.is_err() {
        transaction.fail();
    }

    if transaction.touched_database() {
        if let Err(e) = evaluator.cache().reload() {
            warn!("Can't reload package database after transaction: {}", e);
        }
    }
    info!(
        "Transaction {} for {} ended {}",
        transaction.id(),
        transaction.bucket(),
        transaction.state()
    );

    let result = ResultDispatcher::build(transaction.into_bucket(), outcome, Some(&exchange));
    ResultDispatcher::dispatch(result, Some(exchange), on_complete);
}
