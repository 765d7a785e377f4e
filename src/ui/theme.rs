//! Visual theme and styling.

use console::Style;

/// umake's terminal theme.
#[derive(Debug, Clone)]
pub struct UmakeTheme {
    /// Success messages (green).
    pub success: Style,
    /// Warnings (orange).
    pub warning: Style,
    /// Errors (red bold).
    pub error: Style,
    /// Running operations and progress bars (magenta).
    pub info: Style,
    /// Secondary text.
    pub dim: Style,
    /// Emphasis.
    pub highlight: Style,
    /// Headers (magenta bold).
    pub header: Style,
    /// Labels in key-value listings.
    pub key: Style,
    /// Values in key-value listings.
    pub value: Style,
}

impl Default for UmakeTheme {
    fn default() -> Self {
        Self::new()
    }
}

impl UmakeTheme {
    pub fn new() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().color256(208),
            error: Style::new().red().bold(),
            info: Style::new().magenta(),
            dim: Style::new().dim(),
            highlight: Style::new().bold(),
            header: Style::new().bold().magenta(),
            key: Style::new().bold(),
            value: Style::new(),
        }
    }

    /// Theme without colors (for non-TTY or --no-color).
    pub fn plain() -> Self {
        Self {
            success: Style::new(),
            warning: Style::new(),
            error: Style::new(),
            info: Style::new(),
            dim: Style::new(),
            highlight: Style::new(),
            header: Style::new(),
            key: Style::new(),
            value: Style::new(),
        }
    }

    pub fn format_success(&self, msg: &str) -> String {
        format!("{}", self.success.apply_to(format!("✓ {}", msg)))
    }

    pub fn format_warning(&self, msg: &str) -> String {
        format!("{}", self.warning.apply_to(format!("⚠ {}", msg)))
    }

    pub fn format_error(&self, msg: &str) -> String {
        format!("{}", self.error.apply_to(format!("✗ {}", msg)))
    }

    pub fn format_skipped(&self, msg: &str) -> String {
        format!("{}", self.dim.apply_to(format!("○ {}", msg)))
    }

    pub fn format_detail(&self, msg: &str) -> String {
        format!("{}", self.dim.apply_to(format!("  {}", msg)))
    }

    /// A check mark or cross for a yes/no answer.
    pub fn format_check(&self, label: &str, passed: bool) -> String {
        if passed {
            format!(
                "{} {}",
                self.success.apply_to("✓"),
                self.key.apply_to(label)
            )
        } else {
            format!("{} {}", self.error.apply_to("✗"), self.key.apply_to(label))
        }
    }

    pub fn format_header(&self, title: &str) -> String {
        format!(
            "{} {}",
            self.header.apply_to("◆"),
            self.highlight.apply_to(title)
        )
    }
}

/// Whether colors should be enabled.
pub fn should_use_colors() -> bool {
    // https://no-color.org/
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    console::Term::stdout().is_term()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_formats_success() {
        let msg = UmakeTheme::plain().format_success("Installed");
        assert_eq!(msg, "✓ Installed");
    }

    #[test]
    fn theme_formats_warning() {
        let msg = UmakeTheme::plain().format_warning("Caution");
        assert!(msg.contains("⚠"));
        assert!(msg.contains("Caution"));
    }

    #[test]
    fn theme_formats_error() {
        let msg = UmakeTheme::plain().format_error("Failed");
        assert_eq!(msg, "✗ Failed");
    }

    #[test]
    fn theme_formats_skipped() {
        let msg = UmakeTheme::plain().format_skipped("Nothing to do");
        assert!(msg.starts_with("○"));
    }

    #[test]
    fn theme_formats_checks() {
        let theme = UmakeTheme::plain();
        assert_eq!(theme.format_check("installed", true), "✓ installed");
        assert_eq!(theme.format_check("up to date", false), "✗ up to date");
    }

    #[test]
    fn theme_formats_header() {
        let msg = UmakeTheme::plain().format_header("Installing");
        assert!(msg.contains("Installing"));
    }

    #[test]
    fn default_impl_matches_new() {
        let default = UmakeTheme::default();
        let new = UmakeTheme::new();
        assert_eq!(default.format_success("test"), new.format_success("test"));
    }
}
