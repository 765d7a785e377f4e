//! Terminal user interface.
//!
//! This module provides:
//! - [`UserInterface`] trait for UI abstraction
//! - [`TerminalUI`] for terminal usage
//! - [`MockUI`] capturing output for tests
//! - Install progress bars
//!
//! # Example
//!
//! ```
//! use umake::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.show_header("Installing");
//! ui.success("Done!");
//! assert!(ui.has_success("Done!"));
//! ```

pub mod mock;
pub mod output;
pub mod progress;
pub mod terminal;
pub mod theme;

pub use mock::{MockProgress, MockUI, ProgressRecord, ProgressStatus};
pub use output::OutputMode;
pub use progress::{format_bytes, format_duration, InstallProgress};
pub use terminal::{create_ui, TerminalUI};
pub use theme::{should_use_colors, UmakeTheme};

use crate::requirements::progress::ProgressCallback;

/// Trait for user interface interactions.
///
/// This trait allows mocking the UI in tests.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Override the output mode.
    fn set_output_mode(&mut self, mode: OutputMode);

    /// Display a message to the user.
    fn message(&mut self, msg: &str);

    /// Display a success message.
    fn success(&mut self, msg: &str);

    /// Display a warning message.
    fn warning(&mut self, msg: &str);

    /// Display an error message.
    fn error(&mut self, msg: &str);

    /// Show a detail line; only `--verbose` output includes these.
    fn detail(&mut self, msg: &str);

    /// Show a header/banner.
    fn show_header(&mut self, title: &str);

    /// Show a labelled yes/no line.
    fn show_check(&mut self, label: &str, passed: bool);

    /// Start a progress display for an installation.
    fn start_progress(&mut self, label: &str) -> Box<dyn ProgressHandle>;

    /// Check if running in interactive mode.
    fn is_interactive(&self) -> bool;
}

/// Handle for a running progress display.
pub trait ProgressHandle {
    /// A callback feeding this display, to be handed to the install worker.
    fn reporter(&self) -> ProgressCallback;

    /// Mark the operation as successful.
    fn finish_success(&mut self, msg: &str);

    /// Mark the operation as failed.
    fn finish_error(&mut self, msg: &str);

    /// Mark as skipped.
    fn finish_skipped(&mut self, msg: &str);
}
