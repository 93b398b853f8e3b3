//! Output formatter for human-readable and JSON output
//!
//! Ensures consistent output formatting across all commands.

use console::Style;
use jiff::Timestamp;
use serde::Serialize;

use super::OutputConfig;

/// Color theme for styled output
#[derive(Debug, Clone)]
struct Theme {
    /// Prefix (directory) names - blue + bold
    dir: Style,
    /// Object sizes - green
    size: Style,
    /// Timestamps - dim
    date: Style,
    /// Property keys (stat output) - cyan
    key: Style,
    success: Style,
    error: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            dir: Style::new().blue().bold(),
            size: Style::new().green(),
            date: Style::new().dim(),
            key: Style::new().cyan(),
            success: Style::new().green(),
            error: Style::new().red(),
        }
    }
}

impl Theme {
    /// Returns a theme with no styling (for no-color mode)
    fn plain() -> Self {
        Self {
            dir: Style::new(),
            size: Style::new(),
            date: Style::new(),
            key: Style::new(),
            success: Style::new(),
            error: Style::new(),
        }
    }
}

/// Formatter for CLI output
///
/// When JSON mode is enabled, all output is strict JSON without colors.
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
    theme: Theme,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        let theme = if config.no_color || config.json {
            Theme::plain()
        } else {
            Theme::default()
        };
        Self { config, theme }
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    pub fn style_dir(&self, text: &str) -> String {
        self.theme.dir.apply_to(text).to_string()
    }

    pub fn style_size(&self, text: &str) -> String {
        self.theme.size.apply_to(text).to_string()
    }

    pub fn style_date(&self, text: &str) -> String {
        self.theme.date.apply_to(text).to_string()
    }

    pub fn style_key(&self, text: &str) -> String {
        self.theme.key.apply_to(text).to_string()
    }

    /// Human-readable binary size, e.g. `1.50 KiB`
    pub fn format_size(&self, bytes: u64) -> String {
        humansize::format_size(bytes, humansize::BINARY)
    }

    /// UTC timestamp, or a placeholder of the same width when unknown
    pub fn format_timestamp(&self, ts: Option<Timestamp>) -> String {
        match ts {
            Some(ts) => ts.strftime("%Y-%m-%d %H:%M:%S UTC").to_string(),
            None => format!("{:<23}", "-"),
        }
    }

    /// Output a success message; silent in JSON and quiet modes
    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }

        let checkmark = self.theme.success.apply_to("✓");
        println!("{checkmark} {message}");
    }

    /// Output an error message
    ///
    /// Errors are always printed, even in quiet mode.
    pub fn error(&self, message: &str) {
        if self.config.json {
            let error = serde_json::json!({
                "error": message
            });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&error).unwrap_or_else(|_| message.to_string())
            );
        } else {
            let cross = self.theme.error.apply_to("✗");
            eprintln!("{cross} {message}");
        }
    }

    /// Output JSON directly
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    /// Print a line of text (respects quiet mode)
    pub fn println(&self, message: &str) {
        if self.config.quiet {
            return;
        }
        println!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_mode_disables_styling() {
        let formatter = Formatter::new(OutputConfig {
            json: true,
            ..Default::default()
        });
        assert!(formatter.is_json());
        assert_eq!(formatter.style_dir("shadow/"), "shadow/");
    }

    #[test]
    fn test_no_color_is_plain() {
        let formatter = Formatter::new(OutputConfig {
            no_color: true,
            ..Default::default()
        });
        assert!(!formatter.is_json());
        assert_eq!(formatter.style_size("1 KiB"), "1 KiB");
    }

    #[test]
    fn test_format_size() {
        let formatter = Formatter::new(OutputConfig::default());
        assert_eq!(formatter.format_size(0), "0 B");
        assert_eq!(formatter.format_size(512 * 1024), "512 KiB");
    }

    #[test]
    fn test_format_timestamp() {
        let formatter = Formatter::new(OutputConfig::default());
        let ts = Timestamp::from_second(1_700_000_000).unwrap();
        assert_eq!(formatter.format_timestamp(Some(ts)), "2023-11-14 22:13:20 UTC");
        assert_eq!(formatter.format_timestamp(None).len(), 23);
    }
}
