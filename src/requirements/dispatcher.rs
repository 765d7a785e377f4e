//! Completion delivery for install tasks.

use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use serde::Serialize;
use tempfile::TempPath;
use tracing::{debug, error, warn};

use crate::error::Result;

use super::spec::Bucket;

/// Final outcome of a submitted bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallResult {
    /// The bucket with alternations resolved as far as the task got.
    pub bucket: Bucket,
    /// Human readable failure, `None` on success.
    pub error: Option<String>,
}

impl InstallResult {
    pub fn success(bucket: Bucket) -> Self {
        Self {
            bucket,
            error: None,
        }
    }

    pub fn failure(bucket: Bucket, error: impl Into<String>) -> Self {
        Self {
            bucket,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Callback receiving the result of a submitted bucket.
pub type CompletionCallback = Box<dyn FnOnce(InstallResult) + Send>;

/// Private file collecting package manager output for one task.
///
/// Created readable by the owner only; removed when dropped.
#[derive(Debug)]
pub struct ExchangeFile {
    path: TempPath,
}

impl ExchangeFile {
    /// Create a fresh exchange file in `dir`, or the system temp dir.
    pub fn create(dir: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("umake-exchange-").suffix(".log");
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Everything written so far. Unreadable content reads as empty.
    pub fn read(&self) -> String {
        match fs::read(&self.path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!("Can't read exchange file {}: {}", self.path.display(), e);
                String::new()
            }
        }
    }
}

/// Turns task outcomes into [`InstallResult`]s and hands them over.
pub struct ResultDispatcher;

impl ResultDispatcher {
    /// Build the result for a finished task.
    ///
    /// Failures carry whatever the package manager wrote to the exchange
    /// file.
    pub fn build(
        bucket: Bucket,
        outcome: Result<()>,
        exchange: Option<&ExchangeFile>,
    ) -> InstallResult {
        let err = match outcome {
            Ok(()) => return InstallResult::success(bucket),
            Err(err) => err,
        };

        let mut message = err.to_string();
        let output = exchange.map(ExchangeFile::read).unwrap_or_default();
        if !output.trim().is_empty() {
            message.push_str("\nSubprocess output: ");
            message.push_str(output.trim_end());
        }
        InstallResult::failure(bucket, message)
    }

    /// Deliver `result` to `callback`, then remove the exchange file.
    ///
    /// A panicking callback is contained. Returns whether the callback
    /// returned normally.
    pub fn dispatch(
        result: InstallResult,
        exchange: Option<ExchangeFile>,
        callback: CompletionCallback,
    ) -> bool {
        match &result.error {
            Some(message) => error!("Installation of {} failed: {}", result.bucket, message),
            None => debug!("Installation of {} finished", result.bucket),
        }

        let delivered = panic::catch_unwind(AssertUnwindSafe(move || callback(result)));
        drop(exchange);

        match delivered {
            Ok(()) => true,
            Err(payload) => {
                error!("Completion callback panicked: {}", panic_message(&*payload));
                false
            }
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
