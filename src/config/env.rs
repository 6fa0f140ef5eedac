//! Environment variable handling and .env file management

use crate::error::{AppError, ErrorContext, Result};
use std::collections::HashMap;
use std::path::Path;

/// Default location of the .env file
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Variables read from the process environment and the .env file.
///
/// Process environment values win over .env values, as with `dotenvy`.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    file_values: HashMap<String, String>,
    use_process_env: bool,
}

impl EnvSource {
    /// Process environment only
    pub fn process() -> Self {
        Self { file_values: HashMap::new(), use_process_env: true }
    }

    /// Fixed values only, ignoring the process environment
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            file_values: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            use_process_env: false,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if self.use_process_env {
            if let Ok(value) = std::env::var(key) {
                return Some(value);
            }
        }
        self.file_values.get(key).cloned()
    }

    /// Number of values that came from the .env file
    pub fn file_value_count(&self) -> usize {
        self.file_values.len()
    }
}

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Read `path` (if it exists) without touching the process environment
    pub fn load_env_file(path: &Path) -> Result<EnvSource> {
        let mut source = EnvSource::process();

        if !path.exists() {
            return Ok(source);
        }

        let iter = dotenvy::from_path_iter(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        for item in iter {
            let (key, value) = item
                .map_err(|e| AppError::config(format!("Failed to parse {}: {}", path.display(), e)))?;
            source.file_values.insert(key, value);
        }

        Ok(source)
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Speedtest Monitor Configuration
#
# Values here are used unless the same variable is set in the environment
# or overridden on the command line.

# Run against the real speedtest.net service (false = dry run with placeholders)
# REAL_RUN=false

# Individual phases of a real run
# RUN_DOWNLOAD=true
# RUN_UPLOAD=true
# RUN_IMAGE=true

# Placeholder values used on dry runs: precise or round
# PLACEHOLDER_SET=precise

# Notify when the download is at or below this value
# DOWNLOAD_THRESHOLD=10

# Units of DOWNLOAD_THRESHOLD:
#   auto  - compare against the auto-scaled number (5 MB/s and 5 GB/s both compare as 5)
#   bytes - compare raw bytes per second
#   kb, mb, gb - compare in a fixed unit
# THRESHOLD_MODE=auto

# Gmail account used for real-run notifications (use an app password)
# GMAIL_SENDER_EMAIL=alerts@example.com
# GMAIL_SENDER_PASSWORD=
# GMAIL_RECIPIENT_EMAIL=you@example.com
# SMTP_HOST=smtp.gmail.com
# SMTP_PORT=465

# Local debugging SMTP server used on dry runs
# DEBUG_SMTP_HOST=localhost
# DEBUG_SMTP_PORT=1025

# Result store
# DATABASE_PATH=speedtest_results.db
# STORAGE_FORMAT=human

# Log file (empty disables file logging) and level
# LOG_FILE=speedtest_app.log
# LOG_LEVEL=debug

# Restrict the speed test to these server IDs (comma-separated)
# SERVER_IDS=1234,5678

# Provider request timeout and parallel transfer requests
# PROVIDER_TIMEOUT_SECONDS=30
# PARALLEL_REQUESTS=1

# Enable colored output (true/false)
# ENABLE_COLOR=true
"#.to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .with_context(|| format!("Failed to write example env file {}", path.display()))
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        let invalid = |what: &str| AppError::config(format!("Invalid {} value '{}': {}", key, value, what));

        match key {
            "REAL_RUN" | "RUN_DOWNLOAD" | "RUN_UPLOAD" | "RUN_IMAGE" | "ENABLE_COLOR" => {
                value.parse::<bool>().map_err(|_| invalid("expected true or false"))?;
            }
            "PLACEHOLDER_SET" => {
                value.parse::<crate::models::PlaceholderSet>()?;
            }
            "DOWNLOAD_THRESHOLD" => {
                let threshold: f64 = value.parse().map_err(|_| invalid("expected a number"))?;
                if !threshold.is_finite() || threshold < 0.0 {
                    return Err(invalid("must be a non-negative number"));
                }
            }
            "THRESHOLD_MODE" => {
                value.parse::<crate::units::ThresholdMode>()?;
            }
            "GMAIL_SENDER_EMAIL" | "GMAIL_RECIPIENT_EMAIL" => {
                if !value.is_empty() {
                    value.parse::<lettre::Address>().map_err(|e| invalid(&e.to_string()))?;
                }
            }
            "SMTP_PORT" | "DEBUG_SMTP_PORT" => {
                let port: u16 = value.parse().map_err(|_| invalid("expected a port number"))?;
                if port == 0 {
                    return Err(invalid("port must be greater than 0"));
                }
            }
            "STORAGE_FORMAT" => {
                value.parse::<crate::models::StorageFormat>()?;
            }
            "LOG_LEVEL" => {
                value.parse::<crate::logging::LogLevel>()?;
            }
            "SERVER_IDS" => {
                for id in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    id.parse::<u32>().map_err(|_| invalid("expected comma-separated numeric server IDs"))?;
                }
            }
            "PROVIDER_TIMEOUT_SECONDS" => {
                let timeout: u64 = value.parse().map_err(|_| invalid("expected whole seconds"))?;
                if timeout == 0 || timeout > 600 {
                    return Err(invalid("must be between 1 and 600"));
                }
            }
            "PARALLEL_REQUESTS" => {
                let parallel: usize = value.parse().map_err(|_| invalid("expected a whole number"))?;
                if parallel == 0 || parallel > 32 {
                    return Err(invalid("must be between 1 and 32"));
                }
            }
            _ => {
                // Free-form or unknown, nothing to check
            }
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("REAL_RUN", "Measure against speedtest.net instead of placeholders", "false"),
            ("RUN_DOWNLOAD", "Run the download phase", "true"),
            ("RUN_UPLOAD", "Run the upload phase", "true"),
            ("RUN_IMAGE", "Request a shareable result image", "true"),
            ("PLACEHOLDER_SET", "Dry-run placeholder values (precise, round)", "precise"),
            ("DOWNLOAD_THRESHOLD", "Notify at or below this download value", "10"),
            ("THRESHOLD_MODE", "Threshold units (auto, bytes, kb, mb, gb)", "auto"),
            ("GMAIL_SENDER_EMAIL", "Gmail account sending notifications", "alerts@example.com"),
            ("GMAIL_SENDER_PASSWORD", "Gmail app password", "app-password"),
            ("GMAIL_RECIPIENT_EMAIL", "Notification recipient", "you@example.com"),
            ("SMTP_HOST", "SMTP relay for real runs", "smtp.gmail.com"),
            ("SMTP_PORT", "SMTP relay port (implicit TLS)", "465"),
            ("DEBUG_SMTP_HOST", "Local SMTP server for dry runs", "localhost"),
            ("DEBUG_SMTP_PORT", "Local SMTP server port", "1025"),
            ("DATABASE_PATH", "SQLite result database", "speedtest_results.db"),
            ("STORAGE_FORMAT", "Throughput column format (human, raw)", "human"),
            ("LOG_FILE", "Append-only log file (empty disables)", "speedtest_app.log"),
            ("LOG_LEVEL", "Log file level", "debug"),
            ("SERVER_IDS", "Comma-separated speedtest.net server IDs", "1234,5678"),
            ("PROVIDER_TIMEOUT_SECONDS", "Provider request timeout (1-600)", "30"),
            ("PARALLEL_REQUESTS", "Parallel transfer requests (1-32)", "1"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<26} {}\n", var, description));
            help.push_str(&format!("  {:<26} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. --config file values\n");
        help.push_str("  5. Default values\n");

        help
    }

    /// Validate every supported variable present in `source`
    pub fn validate_source(source: &EnvSource) -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(name, _, _)| {
                let value = source.get(name)?;
                Self::validate_env_var(name, &value).err().map(|e| format!("Warning: {}", e))
            })
            .collect()
    }
}
