//! Configuration validation utilities and rules

use crate::{
    error::Result,
    models::Config,
    units::ThresholdMode,
};

/// Configuration validator producing non-fatal warnings
pub struct ConfigValidator;

impl ConfigValidator {
    /// Run the hard checks, then collect warnings about suspicious settings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_run_mode(config));
        warnings.extend(Self::validate_threshold(config));
        warnings.extend(Self::validate_mail(config));
        warnings.extend(Self::validate_outputs(config));

        Ok(warnings)
    }

    fn validate_run_mode(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let run_mode = &config.run_mode;

        if !run_mode.real_run {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Dry run: {:?} placeholder values will be reported", run_mode.placeholders),
            ));
            return warnings;
        }

        if !run_mode.download && !run_mode.upload && !run_mode.image {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "Download, upload and image phases are all disabled; only latency will be measured".to_string(),
            ));
        }

        if config.provider.parallel_requests > 8 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("{} parallel transfer requests may saturate slower links", config.provider.parallel_requests),
            ));
        }

        warnings
    }

    fn validate_threshold(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let thresholds = &config.thresholds;

        if !config.run_mode.download {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "Download phase disabled; the threshold will not be evaluated".to_string(),
            ));
            return warnings;
        }

        if thresholds.download == 0.0 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "Download threshold is 0; notifications are only sent for a zero download".to_string(),
            ));
        }

        if thresholds.mode == ThresholdMode::Auto {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Threshold mode 'auto' compares the auto-scaled number, so {} MB/s and {} GB/s are treated alike; set THRESHOLD_MODE=mb for a fixed unit",
                    thresholds.download, thresholds.download
                ),
            ));
        }

        warnings
    }

    fn validate_mail(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.run_mode.real_run {
            if !config.gmail.is_complete() {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    "Gmail credentials incomplete; threshold notifications will fail on real runs".to_string(),
                ));
            }
            if config.gmail.smtp_port != crate::notify::IMPLICIT_TLS_PORT {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!(
                        "SMTP port {} will use STARTTLS instead of implicit TLS",
                        config.gmail.smtp_port
                    ),
                ));
            }
        } else {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Notifications go to the local debug SMTP server at {}:{}",
                    config.debug_mail.host, config.debug_mail.port
                ),
            ));
        }

        warnings
    }

    fn validate_outputs(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.logging.file.is_none() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "File logging disabled".to_string(),
            ));
        }

        if let Some(parent) = config.storage.database_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("Database directory {} does not exist", parent.display()),
                ));
            }
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    /// Get display string for level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// Get color for terminal display
    pub fn color(&self) -> &'static str {
        match self {
            Self::Info => "blue",
            Self::Warning => "yellow",
            Self::Error => "red",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    /// Create a new validation warning
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        use colored::Colorize;

        let label = format!("[{}]", self.level.as_str());
        if use_color {
            format!("{} {}", label.color(self.level.color()), self.message)
        } else {
            format!("{} {}", label, self.message)
        }
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}
