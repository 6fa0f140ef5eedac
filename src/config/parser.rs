//! Configuration parsing from the config file, environment and CLI arguments

use crate::{
    cli::Cli,
    config::env::{EnvManager, EnvSource, DEFAULT_ENV_FILE},
    error::Result,
    models::Config,
};
use std::path::PathBuf;

/// Builds the run configuration:
/// defaults, then `--config` file, then .env/environment, then CLI flags
pub struct ConfigParser {
    cli: Cli,
    env_file: PathBuf,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
        }
    }

    /// Read .env values from another file
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = path.into();
        self
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let source = EnvManager::load_env_file(&self.env_file)?;
        self.parse_with(&source)
    }

    /// Build the configuration from an explicit variable source
    pub fn parse_with(&self, source: &EnvSource) -> Result<Config> {
        let mut config = match &self.cli.config {
            Some(path) => Config::from_file(path)?,
            None => Config::new(),
        };

        config.merge_from_lookup(|key| source.get(key))?;
        self.apply_cli_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        if let Some(real_run) = cli.real_run_override() {
            config.run_mode.real_run = real_run;
        }
        if let Some(threshold) = cli.threshold {
            config.thresholds.download = threshold;
        }
        if let Some(mode) = cli.threshold_mode {
            config.thresholds.mode = mode;
        }
        if let Some(path) = &cli.database {
            config.storage.database_path = path.clone();
        }
        if let Some(format) = cli.storage_format {
            config.storage.format = format;
        }
        if let Some(path) = &cli.log_file {
            config.logging.file = Some(path.clone());
        }
        if !cli.server_ids.is_empty() {
            config.provider.server_ids = cli.server_ids.clone();
        }

        if cli.color {
            config.enable_color = true;
        } else if cli.no_color || !cli.use_colors() {
            config.enable_color = false;
        }

        // CLI-only flags
        config.verbose = cli.verbose;
        config.debug = cli.debug;
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let run_mode = &config.run_mode;
    let mut summary = Vec::new();

    summary.push(format!("Real Run: {}", run_mode.real_run));
    summary.push(format!(
        "Phases: download={}, upload={}, image={}",
        run_mode.download, run_mode.upload, run_mode.image
    ));
    if !run_mode.real_run {
        summary.push(format!("Placeholder Set: {:?}", run_mode.placeholders));
    }
    summary.push(format!(
        "Download Threshold: {} (mode: {})",
        config.thresholds.download, config.thresholds.mode
    ));
    summary.push(format!(
        "Database: {} ({:?})",
        config.storage.database_path.display(),
        config.storage.format
    ));
    summary.push(format!(
        "Log File: {}",
        config.logging.file.as_ref().map_or("disabled".to_string(), |p| p.display().to_string())
    ));
    summary.push(format!("Log Level: {}", config.logging.level));
    if run_mode.real_run {
        summary.push(format!("SMTP: {}:{}", config.gmail.smtp_host, config.gmail.smtp_port));
        let ids: Vec<String> = config.provider.server_ids.iter().map(u32::to_string).collect();
        summary.push(format!(
            "Servers: {}",
            if ids.is_empty() { "any".to_string() } else { ids.join(", ") }
        ));
    } else {
        summary.push(format!("Debug SMTP: {}:{}", config.debug_mail.host, config.debug_mail.port));
    }
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}
