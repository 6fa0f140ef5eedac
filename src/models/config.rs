//! Configuration data model and validation

use crate::error::{AppError, Result};
use crate::units::ThresholdMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Which fixed values a dry run reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderSet {
    /// Round numbers: 999 B/s both ways, 0 ms ping
    Round,
    /// Realistic figures with decimals
    #[default]
    Precise,
}

impl FromStr for PlaceholderSet {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "round" => Ok(PlaceholderSet::Round),
            "precise" => Ok(PlaceholderSet::Precise),
            _ => Err(AppError::parse(format!("Invalid placeholder set '{}': expected round or precise", s))),
        }
    }
}

/// How throughput is written to the `download`/`upload` columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    /// Bytes per second as a number
    Raw,
    /// Scaled string such as `"12.34 MB/s"`
    #[default]
    Human,
}

impl FromStr for StorageFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "raw" => Ok(StorageFormat::Raw),
            "human" => Ok(StorageFormat::Human),
            _ => Err(AppError::parse(format!("Invalid storage format '{}': expected raw or human", s))),
        }
    }
}

/// Run mode switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunMode {
    /// Measure against the real provider instead of placeholders
    pub real_run: bool,
    /// Run the download phase
    pub download: bool,
    /// Run the upload phase
    pub upload: bool,
    /// Request a shareable result image
    pub image: bool,
    /// Placeholder values used when `real_run` is off
    pub placeholders: PlaceholderSet,
}

impl Default for RunMode {
    fn default() -> Self {
        Self {
            real_run: false,
            download: true,
            upload: true,
            image: true,
            placeholders: PlaceholderSet::default(),
        }
    }
}

/// Notification thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Download floor; a measurement at or below it triggers a notification
    pub download: f64,
    /// Units the floor is expressed in
    pub mode: ThresholdMode,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            download: crate::defaults::DEFAULT_DOWNLOAD_THRESHOLD,
            mode: ThresholdMode::default(),
        }
    }
}

/// Gmail account used to send notifications on real runs
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GmailSettings {
    pub sender_email: String,
    pub sender_password: String,
    pub recipient_email: String,
    pub smtp_host: String,
    pub smtp_port: u16,
}

impl Default for GmailSettings {
    fn default() -> Self {
        Self {
            sender_email: String::new(),
            sender_password: String::new(),
            recipient_email: String::new(),
            smtp_host: crate::defaults::DEFAULT_SMTP_HOST.to_string(),
            smtp_port: crate::defaults::DEFAULT_SMTP_PORT,
        }
    }
}

impl GmailSettings {
    /// All three account fields are filled in
    pub fn is_complete(&self) -> bool {
        !self.sender_email.is_empty() && !self.sender_password.is_empty() && !self.recipient_email.is_empty()
    }
}

// Keep the password out of debug output and logs
impl std::fmt::Debug for GmailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmailSettings")
            .field("sender_email", &self.sender_email)
            .field("sender_password", &if self.sender_password.is_empty() { "" } else { "********" })
            .field("recipient_email", &self.recipient_email)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .finish()
    }
}

/// Local SMTP endpoint that receives mail on dry runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugMailSettings {
    pub host: String,
    pub port: u16,
}

impl Default for DebugMailSettings {
    fn default() -> Self {
        Self {
            host: crate::defaults::DEFAULT_DEBUG_SMTP_HOST.to_string(),
            port: crate::defaults::DEFAULT_DEBUG_SMTP_PORT,
        }
    }
}

/// Result store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub database_path: PathBuf,
    pub format: StorageFormat,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(crate::defaults::DEFAULT_DATABASE_PATH),
            format: StorageFormat::default(),
        }
    }
}

/// Log file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub file: Option<PathBuf>,
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: Some(PathBuf::from(crate::defaults::DEFAULT_LOG_FILE)),
            level: "debug".to_string(),
        }
    }
}

/// speedtest.net provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// JSON server list endpoint
    pub servers_url: String,
    /// Result sharing endpoint
    pub share_url: String,
    /// Restrict the candidate servers to these IDs (empty = any)
    pub server_ids: Vec<u32>,
    /// Closest servers probed when picking the best one
    pub candidate_servers: usize,
    /// Latency probes per candidate server
    pub latency_probes: u32,
    /// Square image sizes fetched during the download phase
    pub download_sizes: Vec<u32>,
    /// Payload sizes in bytes posted during the upload phase
    pub upload_sizes: Vec<usize>,
    /// Requests issued per size
    pub requests_per_size: u32,
    /// Transfer requests in flight at once
    pub parallel_requests: usize,
    pub timeout_seconds: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            servers_url: crate::defaults::DEFAULT_SERVERS_URL.to_string(),
            share_url: crate::defaults::DEFAULT_SHARE_URL.to_string(),
            server_ids: Vec::new(),
            candidate_servers: 5,
            latency_probes: 3,
            download_sizes: crate::defaults::DEFAULT_DOWNLOAD_SIZES.to_vec(),
            upload_sizes: crate::defaults::DEFAULT_UPLOAD_SIZES.to_vec(),
            requests_per_size: 2,
            parallel_requests: 1,
            timeout_seconds: crate::defaults::DEFAULT_PROVIDER_TIMEOUT.as_secs(),
        }
    }
}

impl ProviderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub run_mode: RunMode,
    pub thresholds: Thresholds,
    pub gmail: GmailSettings,
    pub debug_mail: DebugMailSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
    pub provider: ProviderSettings,

    /// Enable colored terminal output
    #[serde(skip)]
    pub enable_color: bool,

    /// Echo log entries to the console
    #[serde(skip)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(skip)]
    pub debug: bool,
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self {
            enable_color: crate::defaults::DEFAULT_ENABLE_COLOR,
            ..Self::default()
        }
    }

    /// Load settings from a JSON file; missing sections keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read config file {}: {}", path.display(), e)))?;
        let mut config: Config = serde_json::from_str(&content)
            .map_err(|e| AppError::config(format!("Invalid config file {}: {}", path.display(), e)))?;
        config.enable_color = crate::defaults::DEFAULT_ENABLE_COLOR;
        Ok(config)
    }

    /// Validate the configuration and return the first error found
    pub fn validate(&self) -> Result<()> {
        let threshold = self.thresholds.download;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(AppError::config(format!("Download threshold must be a non-negative number, got {}", threshold)));
        }

        for (name, address) in [
            ("GMAIL_SENDER_EMAIL", &self.gmail.sender_email),
            ("GMAIL_RECIPIENT_EMAIL", &self.gmail.recipient_email),
        ] {
            if !address.is_empty() && address.parse::<lettre::Address>().is_err() {
                return Err(AppError::config(format!("{} is not a valid email address: {}", name, address)));
            }
        }

        if self.gmail.smtp_host.is_empty() {
            return Err(AppError::config("SMTP host cannot be empty"));
        }

        if self.debug_mail.host.is_empty() {
            return Err(AppError::config("Debug SMTP host cannot be empty"));
        }

        if self.storage.database_path.as_os_str().is_empty() {
            return Err(AppError::config("Database path cannot be empty"));
        }

        for (name, endpoint) in [("servers_url", &self.provider.servers_url), ("share_url", &self.provider.share_url)] {
            if let Err(e) = url::Url::parse(endpoint) {
                return Err(AppError::config(format!("Invalid provider {} '{}': {}", name, endpoint, e)));
            }
        }

        let provider = &self.provider;
        if provider.candidate_servers == 0 {
            return Err(AppError::config("Candidate server count must be greater than 0"));
        }

        if provider.latency_probes == 0 {
            return Err(AppError::config("Latency probe count must be greater than 0"));
        }

        if provider.requests_per_size == 0 {
            return Err(AppError::config("Requests per size must be greater than 0"));
        }

        if provider.parallel_requests == 0 || provider.parallel_requests > 32 {
            return Err(AppError::config("Parallel requests must be between 1 and 32"));
        }

        if provider.timeout_seconds == 0 || provider.timeout_seconds > 600 {
            return Err(AppError::config("Provider timeout must be between 1 and 600 seconds"));
        }

        if self.run_mode.download && provider.download_sizes.is_empty() {
            return Err(AppError::config("Download phase enabled but no download sizes configured"));
        }

        if self.run_mode.upload && provider.upload_sizes.is_empty() {
            return Err(AppError::config("Upload phase enabled but no upload sizes configured"));
        }

        self.logging.level.parse::<crate::logging::LogLevel>()
            .map_err(|_| AppError::config(format!("Invalid log level: {}", self.logging.level)))?;

        Ok(())
    }

    /// Merge values supplied by `lookup` (keyed by environment variable name)
    pub fn merge_from_lookup<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse_var<T, E>(key: &str, value: &str) -> Result<T>
        where
            T: FromStr<Err = E>,
            E: std::fmt::Display,
        {
            value.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))
        }

        if let Some(v) = lookup("REAL_RUN") {
            self.run_mode.real_run = parse_var("REAL_RUN", &v)?;
        }
        if let Some(v) = lookup("RUN_DOWNLOAD") {
            self.run_mode.download = parse_var("RUN_DOWNLOAD", &v)?;
        }
        if let Some(v) = lookup("RUN_UPLOAD") {
            self.run_mode.upload = parse_var("RUN_UPLOAD", &v)?;
        }
        if let Some(v) = lookup("RUN_IMAGE") {
            self.run_mode.image = parse_var("RUN_IMAGE", &v)?;
        }
        if let Some(v) = lookup("PLACEHOLDER_SET") {
            self.run_mode.placeholders = parse_var("PLACEHOLDER_SET", &v)?;
        }

        if let Some(v) = lookup("DOWNLOAD_THRESHOLD") {
            self.thresholds.download = parse_var("DOWNLOAD_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("THRESHOLD_MODE") {
            self.thresholds.mode = parse_var("THRESHOLD_MODE", &v)?;
        }

        if let Some(v) = lookup("GMAIL_SENDER_EMAIL") {
            self.gmail.sender_email = v.trim().to_string();
        }
        if let Some(v) = lookup("GMAIL_SENDER_PASSWORD") {
            self.gmail.sender_password = v;
        }
        if let Some(v) = lookup("GMAIL_RECIPIENT_EMAIL") {
            self.gmail.recipient_email = v.trim().to_string();
        }
        if let Some(v) = lookup("SMTP_HOST") {
            self.gmail.smtp_host = v.trim().to_string();
        }
        if let Some(v) = lookup("SMTP_PORT") {
            self.gmail.smtp_port = parse_var("SMTP_PORT", &v)?;
        }
        if let Some(v) = lookup("DEBUG_SMTP_HOST") {
            self.debug_mail.host = v.trim().to_string();
        }
        if let Some(v) = lookup("DEBUG_SMTP_PORT") {
            self.debug_mail.port = parse_var("DEBUG_SMTP_PORT", &v)?;
        }

        if let Some(v) = lookup("DATABASE_PATH") {
            self.storage.database_path = PathBuf::from(v.trim());
        }
        if let Some(v) = lookup("STORAGE_FORMAT") {
            self.storage.format = parse_var("STORAGE_FORMAT", &v)?;
        }

        if let Some(v) = lookup("LOG_FILE") {
            let v = v.trim();
            self.logging.file = if v.is_empty() { None } else { Some(PathBuf::from(v)) };
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.logging.level = v.trim().to_string();
        }

        if let Some(v) = lookup("SERVER_IDS") {
            self.provider.server_ids = v
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| parse_var("SERVER_IDS", s))
                .collect::<Result<Vec<u32>>>()?;
        }
        if let Some(v) = lookup("PROVIDER_TIMEOUT_SECONDS") {
            self.provider.timeout_seconds = parse_var("PROVIDER_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = lookup("PARALLEL_REQUESTS") {
            self.provider.parallel_requests = parse_var("PARALLEL_REQUESTS", &v)?;
        }

        if let Some(v) = lookup("ENABLE_COLOR") {
            self.enable_color = parse_var("ENABLE_COLOR", &v)?;
        }

        Ok(())
    }
}
