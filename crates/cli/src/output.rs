// Output formatting for CLI

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s {
            "json" => OutputFormat::Json,
            "yaml" => OutputFormat::Yaml,
            _ => OutputFormat::Text,
        }
    }

    pub fn print_value<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        match self {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
            OutputFormat::Text => {
                // Text format is handled by each command
            }
        }
        Ok(())
    }

    pub fn is_text(&self) -> bool {
        matches!(self, OutputFormat::Text)
    }
}

/// Print a simple key-value pair for text output
pub fn print_field(label: &str, value: &str) {
    println!("{:<14} {}", format!("{}:", label), value);
}

/// Print a table header
pub fn print_table_header(columns: &[(&str, usize)]) {
    let header: String = columns
        .iter()
        .map(|(name, width)| format!("{:<width$}", name, width = width))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", header.trim_end());
}

/// Print a table row
pub fn print_table_row(values: &[(&str, usize)]) {
    let row: String = values
        .iter()
        .map(|(val, width)| format!("{:<width$}", truncate(val, *width), width = width))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", row.trim_end());
}

/// Fit a value into `width` characters, marking cut text with "..."
pub fn truncate(value: &str, width: usize) -> String {
    // Only the first line is shown in tables
    let value = value.lines().next().unwrap_or("");
    if value.chars().count() <= width {
        return value.to_string();
    }
    if width <= 3 {
        return value.chars().take(width).collect();
    }
    let kept: String = value.chars().take(width - 3).collect();
    format!("{kept}...")
}

/// Compact UTC timestamp for tables
pub fn format_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

/// Print a non-fatal notice to stderr
pub fn print_notice(notice: &impl std::fmt::Display) {
    eprintln!("warning: {notice}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_from_str() {
        assert_eq!(OutputFormat::from_str("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("yaml"), OutputFormat::Yaml);
        assert_eq!(OutputFormat::from_str("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::from_str("other"), OutputFormat::Text);
    }

    #[test]
    fn test_truncate_short_value_unchanged() {
        assert_eq!(truncate("octo/site", 20), "octo/site");
    }

    #[test]
    fn test_truncate_long_value() {
        assert_eq!(truncate("Pushed 12 commits to main", 10), "Pushed ...");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
        assert_eq!(truncate("日本語のタイトル", 5), "日本...");
    }

    #[test]
    fn test_truncate_first_line_only() {
        assert_eq!(truncate("Fix bug\n\nLong body", 20), "Fix bug");
    }

    #[test]
    fn test_format_time() {
        let time = Utc.with_ymd_and_hms(2024, 6, 15, 9, 5, 0).unwrap();
        assert_eq!(format_time(&time), "2024-06-15 09:05");
    }
}
