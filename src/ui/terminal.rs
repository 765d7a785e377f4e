//! Terminal UI.

use console::Term;
use std::io::Write;

use super::{
    should_use_colors, InstallProgress, OutputMode, ProgressHandle, UmakeTheme, UserInterface,
};

/// Terminal UI implementation.
///
/// Status goes to stdout. When not attached to a terminal, or when
/// `interactive` is off, progress bars are replaced by a final status line.
pub struct TerminalUI {
    term: Term,
    theme: UmakeTheme,
    mode: OutputMode,
    interactive: bool,
}

impl TerminalUI {
    pub fn new(mode: OutputMode, interactive: bool) -> Self {
        let theme = if should_use_colors() {
            UmakeTheme::new()
        } else {
            UmakeTheme::plain()
        };
        let term = Term::stdout();
        let interactive = interactive && term.is_term();

        Self {
            term,
            theme,
            mode,
            interactive,
        }
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn set_output_mode(&mut self, mode: OutputMode) {
        self.mode = mode;
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", msg).ok();
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_success(msg)).ok();
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_warning(msg)).ok();
        }
    }

    fn error(&mut self, msg: &str) {
        // Errors are never silenced and never mixed into machine-readable stdout.
        let stderr = Term::stderr();
        writeln!(&stderr, "{}", self.theme.format_error(msg)).ok();
    }

    fn detail(&mut self, msg: &str) {
        if self.mode.shows_details() {
            writeln!(self.term, "{}", self.theme.format_detail(msg)).ok();
        }
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_header(title)).ok();
        }
    }

    fn show_check(&mut self, label: &str, passed: bool) {
        if self.mode.shows_status() {
            writeln!(self.term, "  {}", self.theme.format_check(label, passed)).ok();
        }
    }

    fn start_progress(&mut self, label: &str) -> Box<dyn ProgressHandle> {
        if !self.mode.shows_status() {
            Box::new(InstallProgress::silent(label))
        } else if self.interactive && self.mode.shows_progress() {
            Box::new(InstallProgress::new(label, self.theme.clone()))
        } else {
            Box::new(InstallProgress::hidden(label, self.theme.clone()))
        }
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }
}

/// Create the UI for this process.
pub fn create_ui(interactive: bool, mode: OutputMode) -> Box<dyn UserInterface> {
    Box::new(TerminalUI::new(mode, interactive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_ui_output_mode() {
        let ui = TerminalUI::new(OutputMode::Quiet, false);
        assert_eq!(ui.output_mode(), OutputMode::Quiet);
    }

    #[test]
    fn create_ui_non_interactive() {
        let ui = create_ui(false, OutputMode::Normal);
        assert!(!ui.is_interactive());
    }

    #[test]
    fn create_ui_respects_mode() {
        let mut ui = create_ui(false, OutputMode::Silent);
        assert_eq!(ui.output_mode(), OutputMode::Silent);
        ui.set_output_mode(OutputMode::Verbose);
        assert_eq!(ui.output_mode(), OutputMode::Verbose);
    }

    #[test]
    fn non_interactive_progress_is_hidden() {
        let mut ui = TerminalUI::new(OutputMode::Silent, false);
        let mut progress = ui.start_progress("gcc-avr");
        let mut report = progress.reporter();
        report(crate::requirements::ProgressReport::applying(50.0));
        progress.finish_skipped("nothing to do");
    }
}
