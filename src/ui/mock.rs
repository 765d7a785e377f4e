//! Mock UI implementation for testing.
//!
//! `MockUI` implements the `UserInterface` trait and captures all
//! interactions for later assertion. Progress displays it hands out share
//! their record with the mock, so reports sent from the install worker
//! can be inspected afterwards.
//!
//! # Example
//!
//! ```
//! use umake::requirements::ProgressReport;
//! use umake::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! let mut progress = ui.start_progress("gcc-avr");
//! progress.reporter()(ProgressReport::applying(100.0));
//! progress.finish_success("Installed gcc-avr");
//!
//! let record = &ui.progress_records()[0];
//! assert_eq!(record.label, "gcc-avr");
//! assert_eq!(record.reports.len(), 1);
//! ```

use std::sync::{Arc, Mutex};

use crate::requirements::progress::{ProgressCallback, ProgressReport};

use super::{OutputMode, ProgressHandle, UserInterface};

/// Mock UI implementation for testing.
#[derive(Debug, Default)]
pub struct MockUI {
    mode: OutputMode,
    interactive: bool,
    messages: Vec<String>,
    successes: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    details: Vec<String>,
    headers: Vec<String>,
    checks: Vec<(String, bool)>,
    progress: Vec<Arc<Mutex<ProgressRecord>>>,
}

impl MockUI {
    /// Create a new MockUI with Normal output mode.
    pub fn new() -> Self {
        Self {
            mode: OutputMode::Normal,
            ..Default::default()
        }
    }

    /// Create a new MockUI with a specific output mode.
    pub fn with_mode(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Set whether this mock behaves as interactive.
    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Detail lines that the current output mode lets through.
    pub fn details(&self) -> &[String] {
        &self.details
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Captured check lines as `(label, passed)`.
    pub fn checks(&self) -> &[(String, bool)] {
        &self.checks
    }

    /// Snapshot of every progress display started so far.
    pub fn progress_records(&self) -> Vec<ProgressRecord> {
        self.progress
            .iter()
            .map(|r| r.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .collect()
    }

    /// Check if a specific message was shown.
    pub fn has_message(&self, msg: &str) -> bool {
        self.messages.iter().any(|m| m.contains(msg))
    }

    /// Check if a specific success was shown.
    pub fn has_success(&self, msg: &str) -> bool {
        self.successes.iter().any(|m| m.contains(msg))
    }

    /// Check if a specific error was shown.
    pub fn has_error(&self, msg: &str) -> bool {
        self.errors.iter().any(|m| m.contains(msg))
    }

    /// Check if a specific warning was shown.
    pub fn has_warning(&self, msg: &str) -> bool {
        self.warnings.iter().any(|m| m.contains(msg))
    }

    /// Clear all captured interactions.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.successes.clear();
        self.warnings.clear();
        self.errors.clear();
        self.details.clear();
        self.headers.clear();
        self.checks.clear();
        self.progress.clear();
    }
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn set_output_mode(&mut self, mode: OutputMode) {
        self.mode = mode;
    }

    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn success(&mut self, msg: &str) {
        self.successes.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn detail(&mut self, msg: &str) {
        if self.mode.shows_details() {
            self.details.push(msg.to_string());
        }
    }

    fn show_header(&mut self, title: &str) {
        self.headers.push(title.to_string());
    }

    fn show_check(&mut self, label: &str, passed: bool) {
        self.checks.push((label.to_string(), passed));
    }

    fn start_progress(&mut self, label: &str) -> Box<dyn ProgressHandle> {
        let record = Arc::new(Mutex::new(ProgressRecord {
            label: label.to_string(),
            ..Default::default()
        }));
        self.progress.push(Arc::clone(&record));
        Box::new(MockProgress { record })
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }
}

/// How a mock progress display ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Success,
    Error,
    Skipped,
}

/// Everything a mock progress display received.
#[derive(Debug, Clone, Default)]
pub struct ProgressRecord {
    pub label: String,
    pub reports: Vec<ProgressReport>,
    pub status: Option<ProgressStatus>,
    pub finish_message: Option<String>,
}

/// Progress handle recording into a shared [`ProgressRecord`].
#[derive(Debug)]
pub struct MockProgress {
    record: Arc<Mutex<ProgressRecord>>,
}

impl MockProgress {
    fn finish(&mut self, status: ProgressStatus, msg: &str) {
        let mut record = self.record.lock().unwrap_or_else(|e| e.into_inner());
        record.status = Some(status);
        record.finish_message = Some(msg.to_string());
    }
}

impl ProgressHandle for MockProgress {
    fn reporter(&self) -> ProgressCallback {
        let record = Arc::clone(&self.record);
        Box::new(move |report| {
            record
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .reports
                .push(report)
        })
    }

    fn finish_success(&mut self, msg: &str) {
        self.finish(ProgressStatus::Success, msg);
    }

    fn finish_error(&mut self, msg: &str) {
        self.finish(ProgressStatus::Error, msg);
    }

    fn finish_skipped(&mut self, msg: &str) {
        self.finish(ProgressStatus::Skipped, msg);
    }
}
