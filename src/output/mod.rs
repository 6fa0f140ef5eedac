//! Console output for run summaries and stored history

mod table;

pub use table::{Alignment, Column, RowData, Table};

use crate::{
    models::{Measurement, StoredResult},
    reporter::{Evaluation, NotificationStatus, ReportOutcome},
};
use colored::{Color, ColoredString, Colorize};

/// Color scheme for terminal output
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub header: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            header: Color::Cyan,
            muted: Color::BrightBlack,
        }
    }
}

/// Renders run results and history for the console
pub struct OutputFormatter {
    enable_color: bool,
    verbose: bool,
    color_scheme: ColorScheme,
}

impl OutputFormatter {
    pub fn new(enable_color: bool, verbose: bool) -> Self {
        Self {
            enable_color,
            verbose,
            color_scheme: ColorScheme::default(),
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn bold(&self, text: &str) -> ColoredString {
        if self.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn heading(&self, text: &str) -> ColoredString {
        if self.enable_color {
            text.color(self.color_scheme.header).bold()
        } else {
            text.normal()
        }
    }

    /// Summary of one measurement run and what the reporter did with it
    pub fn format_run_summary(&self, measurement: &Measurement, outcome: &ReportOutcome) -> String {
        let scheme = &self.color_scheme;
        let mut table = Table::new(vec![Column::left("Metric"), Column::right("Value")]).without_borders();

        table.push_row(vec!["Download".to_string(), measurement.download_human()]);
        table.push_row(vec!["Upload".to_string(), measurement.upload_human()]);
        table.push_row(vec!["Ping".to_string(), format!("{} ms", measurement.latency_ms())]);
        table.push_row(vec!["Share".to_string(), measurement.share_token().to_string()]);
        if self.verbose {
            table.push_row(vec!["Source".to_string(), measurement.source().to_string()]);
            table.push_row(vec!["Taken".to_string(), measurement.date_text()]);
        }

        let mut lines = vec![
            self.heading("Speedtest Results").to_string(),
            table.render(),
            String::new(),
        ];

        lines.push(match &outcome.stored {
            Ok(id) => format!("{} row {}", self.bold("Stored:"), id),
            Err(e) => format!("{} {}", self.bold("Stored:"), self.colorize(&format!("failed ({})", e), scheme.error)),
        });

        lines.push(match &outcome.evaluation {
            Evaluation::NotEvaluated => format!(
                "{} {}",
                self.bold("Threshold:"),
                self.colorize("not evaluated (download disabled)", scheme.muted)
            ),
            Evaluation::Checked { comparison_value, threshold, hit: true } => format!(
                "{} {}",
                self.bold("Threshold:"),
                self.colorize(&format!("HIT ({} <= {})", comparison_value, threshold), scheme.warning)
            ),
            Evaluation::Checked { comparison_value, threshold, hit: false } => format!(
                "{} {}",
                self.bold("Threshold:"),
                self.colorize(&format!("ok ({} > {})", comparison_value, threshold), scheme.success)
            ),
        });

        lines.push(match &outcome.notification {
            NotificationStatus::NotNeeded => format!(
                "{} {}",
                self.bold("Notification:"),
                self.colorize("not needed", scheme.muted)
            ),
            NotificationStatus::Sent { via } => format!(
                "{} {}",
                self.bold("Notification:"),
                self.colorize(&format!("sent via {}", via), scheme.success)
            ),
            NotificationStatus::Failed(e) => format!(
                "{} {}",
                self.bold("Notification:"),
                self.colorize(&format!("failed ({})", e), scheme.error)
            ),
        });

        lines.join("\n")
    }

    /// Table of stored results, newest first
    pub fn format_history(&self, results: &[StoredResult]) -> String {
        if results.is_empty() {
            return self.colorize("No stored results", self.color_scheme.muted).to_string();
        }

        let mut table = Table::new(vec![
            Column::right("ID"),
            Column::left("Date"),
            Column::right("Download"),
            Column::right("Upload"),
            Column::right("Ping (ms)"),
            Column::left("Share"),
        ]);
        for result in results {
            table.push_row(vec![
                result.id.to_string(),
                result.date.clone(),
                result.download.clone(),
                result.upload.clone(),
                format!("{:.3}", result.ping),
                result.image_result.clone(),
            ]);
        }

        format!(
            "{}\n{}",
            self.heading(&format!("Last {} results", results.len())),
            table.render()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{placeholder_values, DRY_RUN_SHARE_TOKEN};
    use crate::error::AppError;
    use crate::models::{MeasurementSource, PlaceholderSet};
    use chrono::Local;

    fn measurement() -> Measurement {
        let mut raw = placeholder_values(PlaceholderSet::Precise);
        raw.share_token = DRY_RUN_SHARE_TOKEN.to_string();
        Measurement::new(
            Local::now(),
            raw,
            10.0,
            MeasurementSource::Placeholder(PlaceholderSet::Precise),
        )
        .unwrap()
    }

    fn outcome(evaluation: Evaluation, notification: NotificationStatus) -> ReportOutcome {
        ReportOutcome { stored: Ok(3), evaluation, notification }
    }

    #[test]
    fn test_run_summary_plain() {
        let formatter = OutputFormatter::new(false, false);
        let text = formatter.format_run_summary(
            &measurement(),
            &outcome(
                Evaluation::Checked { comparison_value: 88.63, threshold: 10.0, hit: false },
                NotificationStatus::NotNeeded,
            ),
        );

        assert!(text.starts_with("Speedtest Results"));
        assert!(text.contains("88.63 MB/s"));
        assert!(text.contains("10.86 MB/s"));
        assert!(text.contains("14.582 ms"));
        assert!(text.contains("test run"));
        assert!(text.contains("Stored: row 3"));
        assert!(text.contains("Threshold: ok (88.63 > 10)"));
        assert!(text.contains("Notification: not needed"));
        assert!(!text.contains("Source"));
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn test_run_summary_failures_and_verbose() {
        let formatter = OutputFormatter::new(false, true);
        let mut report = outcome(
            Evaluation::Checked { comparison_value: 88.63, threshold: 100.0, hit: true },
            NotificationStatus::Failed(AppError::mail("connection refused")),
        );
        report.stored = Err(AppError::storage("disk full"));

        let text = formatter.format_run_summary(&measurement(), &report);
        assert!(text.contains("Stored: failed"));
        assert!(text.contains("disk full"));
        assert!(text.contains("HIT (88.63 <= 100)"));
        assert!(text.contains("Notification: failed"));
        assert!(text.contains("Precise placeholders"));
    }

    #[test]
    fn test_history_table() {
        let formatter = OutputFormatter::new(false, false);
        let rows = vec![StoredResult {
            id: 2,
            date: "2026-10-15 08:00:00.000000".to_string(),
            download: "88.63 MB/s".to_string(),
            upload: "10.86 MB/s".to_string(),
            ping: 14.582,
            image_result: "test run".to_string(),
        }];

        let text = formatter.format_history(&rows);
        assert!(text.starts_with("Last 1 results"));
        assert!(text.contains("| 2  |") || text.contains("|  2 |"));
        assert!(text.contains("14.582"));
        assert_eq!(formatter.format_history(&[]), "No stored results");
    }
}
