//! Package requirement evaluation and installation.
//!
//! Frameworks declare what they need as buckets of package specifiers.
//! This module answers whether a bucket is installed, available or up to
//! date, and installs buckets through a single background worker that
//! talks to the package manager through a privileged helper.
//!
//! # Modules
//!
//! - [`spec`] - Package specifiers and buckets
//! - [`status`] - Package database snapshots
//! - [`cache`] - Live snapshot handle with busy-database retry
//! - [`equivalence`] - Local Java runtimes standing in for openjdk packages
//! - [`evaluator`] - Installed / available / up-to-date checks
//! - [`transaction`] - Per-bucket install state machine
//! - [`queue`] - The install worker and [`RequirementsService`]
//! - [`dispatcher`] - Completion results and exchange files
//! - [`backend`] - The package manager interface
//! - [`apt`] - dpkg/APT backend
//! - [`helper`] - Privileged helper process and its line protocol
//! - [`mock`] - In-memory backend for tests
//!
//! # Example
//!
//! ```
//! use std::sync::{mpsc, Arc};
//! use umake::requirements::equivalence::{EquivalenceResolver, StaticVersionProbe};
//! use umake::requirements::mock::MockBackend;
//! use umake::requirements::{Bucket, RequirementsService, ServiceOptions};
//!
//! let backend = Arc::new(MockBackend::new("amd64"));
//! backend.add_available("gcc-avr");
//!
//! let dir = tempfile::TempDir::new().unwrap();
//! let options = ServiceOptions {
//!     exchange_dir: Some(dir.path().to_path_buf()),
//!     ..ServiceOptions::default()
//! };
//! let resolver = EquivalenceResolver::new(Box::new(StaticVersionProbe::none()));
//! let service = RequirementsService::start(backend, resolver, options).unwrap();
//!
//! let (tx, rx) = mpsc::channel();
//! let bucket = Bucket::parse(["gcc-avr"]).unwrap();
//! assert!(service.submit(bucket, |_| {}, move |result| tx.send(result).unwrap()));
//! assert!(rx.recv().unwrap().is_success());
//! ```

pub mod apt;
pub mod backend;
pub mod cache;
pub mod dispatcher;
pub mod equivalence;
pub mod evaluator;
pub mod helper;
pub mod mock;
pub mod probe;
pub mod progress;
pub mod queue;
pub mod spec;
pub mod status;
pub mod transaction;

pub use backend::{LoadError, MarkAction, MarkPlan, PackageBackend};
pub use cache::{PackageCache, RetryPolicy};
pub use dispatcher::{CompletionCallback, InstallResult, ResultDispatcher};
pub use equivalence::EquivalenceResolver;
pub use evaluator::{BucketEvaluator, Evaluation};
pub use progress::{Phase, ProgressReport};
pub use queue::{RequirementsService, ServiceOptions};
pub use spec::{Bucket, PackageRef, Specifier};
pub use transaction::{Outcome, TransactionState};
