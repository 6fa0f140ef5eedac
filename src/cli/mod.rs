//! Command-line interface

use crate::{models::StorageFormat, units::ThresholdMode};
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Speedtest Monitor - measure your connection, keep a history, get mailed when it drops
#[derive(Parser, Debug, Clone)]
#[command(name = "speedmon")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Measure against speedtest.net
    #[arg(long)]
    pub real_run: bool,

    /// Use placeholder values instead of measuring
    #[arg(long)]
    pub dry_run: bool,

    /// Notify when the download is at or below this value
    #[arg(long, value_parser = parse_threshold)]
    pub threshold: Option<f64>,

    /// Threshold units: auto, bytes, kb, mb, gb
    #[arg(long, value_name = "MODE")]
    pub threshold_mode: Option<ThresholdMode>,

    /// SQLite result database
    #[arg(long, value_name = "FILE")]
    pub database: Option<PathBuf>,

    /// Throughput column format: human or raw
    #[arg(long, value_name = "FORMAT")]
    pub storage_format: Option<StorageFormat>,

    /// Append-only log file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Restrict the speed test to this server ID (can be used multiple times)
    #[arg(long = "server-id", value_name = "ID", action = ArgAction::Append)]
    pub server_ids: Vec<u32>,

    /// Show the N most recent stored results and exit
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub history: Option<u32>,

    /// Write an example .env file to PATH and exit
    #[arg(long, value_name = "PATH")]
    pub init_env: Option<PathBuf>,

    /// List supported environment variables and exit
    #[arg(long)]
    pub env_help: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Echo log entries to the console
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.real_run && self.dry_run {
            return Err("Cannot specify both --real-run and --dry-run".to_string());
        }

        let exclusive = [self.history.is_some(), self.init_env.is_some(), self.env_help]
            .iter()
            .filter(|set| **set)
            .count();
        if exclusive > 1 {
            return Err("--history, --init-env and --env-help cannot be combined".to_string());
        }

        if exclusive == 1 && (self.real_run || self.dry_run) {
            return Err("--real-run/--dry-run only apply to a measurement run".to_string());
        }

        if let Some(path) = &self.init_env {
            if path.is_dir() {
                return Err(format!("--init-env expects a file path, {} is a directory", path.display()));
            }
        }

        Ok(())
    }

    /// The run mode forced on the command line, if any
    pub fn real_run_override(&self) -> Option<bool> {
        if self.real_run {
            Some(true)
        } else if self.dry_run {
            Some(false)
        } else {
            None
        }
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }
}

/// Parse a non-negative threshold
fn parse_threshold(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("Invalid threshold: {}", s))?;
    if !value.is_finite() || value < 0.0 {
        return Err("Threshold must be a non-negative number".to_string());
    }
    Ok(value)
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    // Default to true on Unix-like systems, false on Windows
    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::ByteUnit;

    #[test]
    fn test_cli_parsing_defaults() {
        let cli = Cli::parse_from(["speedmon"]);
        assert!(cli.config.is_none());
        assert!(cli.threshold.is_none());
        assert!(cli.server_ids.is_empty());
        assert_eq!(cli.real_run_override(), None);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_cli_parsing_all_options() {
        let cli = Cli::parse_from([
            "speedmon",
            "--config", "speedmon.json",
            "--real-run",
            "--threshold", "12.5",
            "--threshold-mode", "mb",
            "--database", "/tmp/results.db",
            "--storage-format", "raw",
            "--log-file", "/tmp/speedmon.log",
            "--server-id", "1234",
            "--server-id", "5678",
            "--no-color",
            "--verbose",
            "--debug",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("speedmon.json")));
        assert_eq!(cli.real_run_override(), Some(true));
        assert_eq!(cli.threshold, Some(12.5));
        assert_eq!(cli.threshold_mode, Some(ThresholdMode::Fixed(ByteUnit::MB)));
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/results.db")));
        assert_eq!(cli.storage_format, Some(StorageFormat::Raw));
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/speedmon.log")));
        assert_eq!(cli.server_ids, vec![1234, 5678]);
        assert!(!cli.use_colors());
        assert!(cli.verbose && cli.debug);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected_by_parser() {
        assert!(Cli::try_parse_from(["speedmon", "--threshold", "-1"]).is_err());
        assert!(Cli::try_parse_from(["speedmon", "--threshold", "fast"]).is_err());
        assert!(Cli::try_parse_from(["speedmon", "--threshold-mode", "parsecs"]).is_err());
        assert!(Cli::try_parse_from(["speedmon", "--storage-format", "xml"]).is_err());
        assert!(Cli::try_parse_from(["speedmon", "--server-id", "abc"]).is_err());
        assert!(Cli::try_parse_from(["speedmon", "--history", "0"]).is_err());
    }

    #[test]
    fn test_conflicting_flags() {
        let cli = Cli::parse_from(["speedmon", "--real-run", "--dry-run"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["speedmon", "--color", "--no-color"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["speedmon", "--history", "5", "--init-env", ".env"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["speedmon", "--history", "5", "--real-run"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_dry_run_override() {
        let cli = Cli::parse_from(["speedmon", "--dry-run"]);
        assert_eq!(cli.real_run_override(), Some(false));
    }

    #[test]
    fn test_forced_color() {
        let cli = Cli::parse_from(["speedmon", "--color"]);
        assert!(cli.use_colors());
    }
}
