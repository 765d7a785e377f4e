//! umake - package requirements for developer frameworks.
//!
//! Frameworks installed by umake depend on system packages. This crate
//! decides whether a framework's package bucket is installed, available
//! and up to date, and installs or upgrades it through a single
//! background worker that drives the package manager in a privileged
//! helper process.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Configuration loading, merging and validation
//! - [`error`] - Error types and result aliases
//! - [`requirements`] - Bucket evaluation, install queue and package backends
//! - [`shell`] - External command execution
//! - [`ui`] - Terminal output and progress bars
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use umake::requirements::equivalence::{EquivalenceResolver, StaticVersionProbe};
//! use umake::requirements::mock::MockBackend;
//! use umake::requirements::{Bucket, BucketEvaluator, PackageCache, RetryPolicy};
//!
//! let backend = Arc::new(MockBackend::new("amd64"));
//! backend.add_installed("make");
//! backend.add_available("gcc-avr");
//!
//! let cache = PackageCache::open(backend, RetryPolicy::default()).unwrap();
//! let resolver = EquivalenceResolver::new(Box::new(StaticVersionProbe::none()));
//! let evaluator = BucketEvaluator::new(Arc::new(cache), Arc::new(resolver));
//!
//! let bucket = Bucket::parse(["make", "gcc-avr"]).unwrap();
//! assert!(!evaluator.is_installed(&bucket).satisfied);
//! assert!(evaluator.is_available(&bucket).satisfied);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod requirements;
pub mod shell;
pub mod ui;

pub use error::{Result, UmakeError};
