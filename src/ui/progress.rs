//! Install progress display.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

use crate::requirements::progress::{ProgressCallback, ProgressReport};

use super::theme::UmakeTheme;
use super::ProgressHandle;

const BAR_TEMPLATE: &str = "{prefix:>9.magenta} [{bar:30.magenta/dim}] {pos:>3}% {msg}";

/// Progress bar for one bucket installation.
///
/// The bar is driven from the install worker through [`reporter`](ProgressHandle::reporter);
/// `indicatif` bars are shared handles, so updates land on the same bar.
pub struct InstallProgress {
    bar: ProgressBar,
    label: String,
    theme: UmakeTheme,
    print_status: bool,
    start_time: Instant,
}

impl InstallProgress {
    /// A visible bar labelled `label`.
    pub fn new(label: &str, theme: UmakeTheme) -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        bar.set_prefix("waiting");
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        Self::with_bar(bar, label, theme)
    }

    /// A bar that draws nothing; final status is still printed.
    pub fn hidden(label: &str, theme: UmakeTheme) -> Self {
        Self::with_bar(ProgressBar::hidden(), label, theme)
    }

    /// Draws nothing and prints nothing.
    pub fn silent(label: &str) -> Self {
        let mut progress = Self::hidden(label, UmakeTheme::plain());
        progress.print_status = false;
        progress
    }

    fn with_bar(bar: ProgressBar, label: &str, theme: UmakeTheme) -> Self {
        Self {
            bar,
            label: label.to_string(),
            theme,
            print_status: true,
            start_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    fn finish(&mut self, line: String) {
        if self.bar.is_hidden() {
            if self.print_status {
                println!("{}", line);
            }
        } else {
            let style = ProgressStyle::default_bar()
                .template("{msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            self.bar.set_style(style);
            self.bar.finish_with_message(line);
        }
    }
}

/// Push one report onto a bar.
pub fn render_report(bar: &ProgressBar, label: &str, report: &ProgressReport) {
    bar.set_prefix(report.phase.to_string());
    bar.set_position(report.percent.clamp(0.0, 100.0).round() as u64);
    match report.total_bytes {
        Some(total) if total > 0 => {
            bar.set_message(format!("{} ({})", label, format_bytes(total)))
        }
        _ => bar.set_message(label.to_string()),
    }
}

impl ProgressHandle for InstallProgress {
    fn reporter(&self) -> ProgressCallback {
        let bar = self.bar.clone();
        let label = self.label.clone();
        Box::new(move |report| render_report(&bar, &label, &report))
    }

    fn finish_success(&mut self, msg: &str) {
        let line = format!("{} ({})", msg, format_duration(self.elapsed()));
        let line = self.theme.format_success(&line);
        self.finish(line);
    }

    fn finish_error(&mut self, msg: &str) {
        let line = self.theme.format_error(msg);
        self.finish(line);
    }

    fn finish_skipped(&mut self, msg: &str) {
        let line = self.theme.format_skipped(msg);
        self.finish(line);
    }
}

/// Format a duration for display.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", d.as_millis())
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = secs / 60.0;
        format!("{:.1}m", mins)
    }
}

/// Format a download size (`1.5 MiB`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{:.1} {}", value, unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_milliseconds() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
    }

    #[test]
    fn format_duration_seconds() {
        assert_eq!(format_duration(Duration::from_secs_f64(5.3)), "5.3s");
    }

    #[test]
    fn format_duration_minutes() {
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }

    #[test]
    fn report_moves_the_bar() {
        let bar = ProgressBar::hidden();
        bar.set_length(100);
        render_report(&bar, "gcc-avr", &ProgressReport::fetching(42.4, 2048));
        assert_eq!(bar.position(), 42);
        assert_eq!(bar.prefix(), "fetching");
        assert_eq!(bar.message(), "gcc-avr (2.0 KiB)");

        render_report(&bar, "gcc-avr", &ProgressReport::applying(150.0));
        assert_eq!(bar.position(), 100);
        assert_eq!(bar.message(), "gcc-avr");
    }

    #[test]
    fn reporter_drives_shared_bar() {
        let progress = InstallProgress::hidden("avr", UmakeTheme::plain());
        let mut report = progress.reporter();
        report(ProgressReport::applying(60.0));
        assert_eq!(progress.bar.position(), 60);
    }

    #[test]
    fn silent_progress_still_tracks_position() {
        let mut progress = InstallProgress::silent("avr");
        progress.reporter()(ProgressReport::fetching(10.0, 0));
        assert_eq!(progress.bar.position(), 10);
        progress.finish_skipped("skipped");
    }

    #[test]
    fn hidden_progress_finishes_without_panic() {
        let mut progress = InstallProgress::hidden("avr", UmakeTheme::plain());
        progress.finish_success("Installed avr");
        let mut progress = InstallProgress::hidden("avr", UmakeTheme::plain());
        progress.finish_error("Failed");
    }
}
