//! Structured logging system for the speedtest monitor
//!
//! This module provides the injected logger used by every component:
//! - Leveled, structured log entries with arbitrary JSON fields
//! - Pluggable sinks: console, append-only log file, in-memory capture
//! - Per-sink output format and minimum level
//! - Session and correlation IDs for tying a run's entries together

use crate::error::{AppError, Result};
use crate::models::{Config, Measurement};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace level - most detailed
    Trace = 0,
    /// Debug level - one entry per pipeline step
    Debug = 1,
    /// Info level - run milestones
    Info = 2,
    /// Warning level - potentially harmful situations
    Warn = 3,
    /// Error level - a step failed but the run continues
    Error = 4,
    /// Fatal level - the run is aborted
    Fatal = 5,
}

impl LogLevel {
    /// Get log level name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Level name written to the log file; warnings and fatal entries
    /// use the WARNING and CRITICAL names that log tooling expects
    pub fn file_name(&self) -> &'static str {
        match self {
            LogLevel::Warn => "WARNING",
            LogLevel::Fatal => "CRITICAL",
            other => other.as_str(),
        }
    }

    /// Get ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",    // White
            LogLevel::Debug => "\x1b[36m",    // Cyan
            LogLevel::Info => "\x1b[32m",     // Green
            LogLevel::Warn => "\x1b[33m",     // Yellow
            LogLevel::Error => "\x1b[31m",    // Red
            LogLevel::Fatal => "\x1b[35m",    // Magenta
        }
    }

    /// Reset ANSI color code
    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" | "CRITICAL" => Ok(LogLevel::Fatal),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// Log entry structure for structured logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Timestamp when log entry was created
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Correlation ID for tracking related events
    pub correlation_id: Option<String>,
    /// Additional structured fields
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// `timestamp:LEVEL:message` lines for the log file
    Plain,
}

/// In-memory sink contents, shared between the logger and the test reading them
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, entry: LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }

    /// Snapshot of everything captured so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Captured entries at exactly `level`
    pub fn at_level(&self, level: LogLevel) -> Vec<LogEntry> {
        self.entries().into_iter().filter(|e| e.level == level).collect()
    }

    /// True if any captured message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|e| e.message.contains(needle))
    }
}

#[derive(Debug, Clone)]
enum SinkTarget {
    /// stdout, or stderr for warnings and above
    Console,
    File(Arc<Mutex<File>>),
    Memory(LogCapture),
}

/// One destination for log entries
#[derive(Debug, Clone)]
pub struct LogSink {
    target: SinkTarget,
    format: LogFormat,
    min_level: LogLevel,
    use_color: bool,
}

impl LogSink {
    /// Console sink
    pub fn console(min_level: LogLevel, format: LogFormat, use_color: bool) -> Self {
        Self { target: SinkTarget::Console, format, min_level, use_color }
    }

    /// Append-only file sink; the file is created if missing
    pub fn file(path: &Path, min_level: LogLevel) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AppError::io(format!("Failed to create log directory {}: {}", parent.display(), e)))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AppError::io(format!("Failed to open log file {}: {}", path.display(), e)))?;

        Ok(Self {
            target: SinkTarget::File(Arc::new(Mutex::new(file))),
            format: LogFormat::Plain,
            min_level,
            use_color: false,
        })
    }

    /// In-memory sink plus the handle to read it back
    pub fn memory(min_level: LogLevel) -> (Self, LogCapture) {
        let capture = LogCapture::new();
        let sink = Self {
            target: SinkTarget::Memory(capture.clone()),
            format: LogFormat::Plain,
            min_level,
            use_color: false,
        };
        (sink, capture)
    }

    fn accepts(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    fn write(&self, entry: &LogEntry) {
        if !self.accepts(entry.level) {
            return;
        }

        match &self.target {
            SinkTarget::Memory(capture) => capture.push(entry.clone()),
            SinkTarget::File(file) => {
                let line = format_entry(entry, self.format, false);
                if let Ok(mut file) = file.lock() {
                    let _ = writeln!(file, "{}", line);
                }
            }
            SinkTarget::Console => {
                let line = format_entry(entry, self.format, self.use_color);
                // Write to stderr for errors/warnings, stdout for others
                if entry.level >= LogLevel::Warn {
                    let _ = writeln!(io::stderr(), "{}", line);
                } else {
                    let _ = writeln!(io::stdout(), "{}", line);
                }
            }
        }
    }
}

/// Shared logging context for correlation and session tracking
#[derive(Debug, Default)]
struct LogContext {
    /// Correlation ID for the whole run
    session_id: Option<String>,
    /// Current operation correlation ID
    current_correlation_id: Option<String>,
    /// Additional context fields
    context_fields: BTreeMap<String, serde_json::Value>,
}

/// Logger handle. Cloning is cheap; clones share sinks and context.
#[derive(Debug, Clone)]
pub struct Logger {
    name: String,
    sinks: Arc<Vec<LogSink>>,
    context: Arc<RwLock<LogContext>>,
}

impl Logger {
    /// Create a logger writing to the given sinks
    pub fn new(name: &str, sinks: Vec<LogSink>) -> Self {
        Self {
            name: name.to_string(),
            sinks: Arc::new(sinks),
            context: Arc::new(RwLock::new(LogContext {
                session_id: Some(Uuid::new_v4().to_string()),
                ..LogContext::default()
            })),
        }
    }

    /// Logger that discards everything
    pub fn disabled() -> Self {
        Self::new("NULL", Vec::new())
    }

    /// Logger backed by a single in-memory sink, for tests and embedding
    pub fn captured(name: &str, min_level: LogLevel) -> (Self, LogCapture) {
        let (sink, capture) = LogSink::memory(min_level);
        (Self::new(name, vec![sink]), capture)
    }

    /// Build the run logger from configuration: the log file at the
    /// configured level, plus the console at a level picked by
    /// `--verbose`/`--debug`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let file_level: LogLevel = config.logging.level.parse()?;

        let console_level = if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };

        let mut sinks = vec![LogSink::console(console_level, LogFormat::Console, config.enable_color)];
        if let Some(path) = &config.logging.file {
            sinks.push(LogSink::file(path, file_level)?);
        }

        Ok(Self::new("speedmon", sinks))
    }

    /// Child logger with another component name, sharing sinks and context
    pub fn named(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            sinks: Arc::clone(&self.sinks),
            context: Arc::clone(&self.context),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session correlation ID shared by every entry of this run
    pub async fn session_id(&self) -> Option<String> {
        self.context.read().await.session_id.clone()
    }

    /// Add context field for all subsequent log entries
    pub async fn add_context_field<T: Serialize>(&self, key: &str, value: T) {
        if let Ok(json_value) = serde_json::to_value(value) {
            let mut context = self.context.write().await;
            context.context_fields.insert(key.to_string(), json_value);
        }
    }

    /// Start a correlated operation
    pub async fn start_operation(&self, operation_name: &str) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        {
            let mut context = self.context.write().await;
            context.current_correlation_id = Some(correlation_id.clone());
        }

        self.debug(&format!("Started operation: {}", operation_name))
            .correlation_id(&correlation_id)
            .field("operation", operation_name)
            .field("operation_type", "start")
            .log()
            .await;

        correlation_id
    }

    /// End a correlated operation
    pub async fn end_operation(&self, correlation_id: &str, operation_name: &str, success: bool) {
        let level = if success { LogLevel::Info } else { LogLevel::Error };
        self.log(level, &format!("Completed operation: {} (success: {})", operation_name, success))
            .correlation_id(correlation_id)
            .field("operation", operation_name)
            .field("operation_type", "end")
            .field("success", success)
            .log()
            .await;

        let mut context = self.context.write().await;
        if context.current_correlation_id.as_deref() == Some(correlation_id) {
            context.current_correlation_id = None;
        }
    }

    /// Create a log entry builder
    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    /// Check if any sink would output a given level
    pub fn would_log(&self, level: LogLevel) -> bool {
        self.sinks.iter().any(|sink| sink.accepts(level))
    }

    async fn write_entry(&self, mut entry: LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }

        let context = self.context.read().await;
        if let Some(session_id) = &context.session_id {
            entry.fields.insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
        }
        if entry.correlation_id.is_none() {
            entry.correlation_id = context.current_correlation_id.clone();
        }
        for (key, value) in &context.context_fields {
            entry.fields.entry(key.clone()).or_insert_with(|| value.clone());
        }
        drop(context);

        for sink in self.sinks.iter() {
            sink.write(&entry);
        }
    }
}

/// Render an entry in the given format
fn format_entry(entry: &LogEntry, format: LogFormat, use_color: bool) -> String {
    match format {
        LogFormat::Console => format_console(entry, use_color),
        LogFormat::Plain => format_plain(entry),
    }
}

fn format_fields(entry: &LogEntry) -> String {
    let fields: Vec<String> = entry.fields.iter()
        .filter(|(k, _)| k.as_str() != "session_id")
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    if fields.is_empty() {
        String::new()
    } else {
        format!(" {{{}}}", fields.join(", "))
    }
}

fn format_console(entry: &LogEntry, use_color: bool) -> String {
    let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
    let level_str = entry.level.as_str();

    let formatted_level = if use_color {
        format!("{}{:>5}{}", entry.level.color_code(), level_str, LogLevel::reset_code())
    } else {
        format!("{:>5}", level_str)
    };

    let mut output = format!("{} {} [{}] {}", timestamp, formatted_level, entry.logger, entry.message);

    if let Some(correlation_id) = &entry.correlation_id {
        output.push_str(&format!(" [{}]", &correlation_id[..correlation_id.len().min(8)]));
    }

    output.push_str(&format_fields(entry));
    output
}

fn format_plain(entry: &LogEntry) -> String {
    format!("{}:{}:{}{}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S,%3f"),
        entry.level.file_name(),
        entry.message,
        format_fields(entry)
    )
}

/// Builder pattern for creating log entries
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Local::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: BTreeMap::new(),
            },
        }
    }

    /// Add a correlation ID
    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    /// Add a structured field
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    /// Add the figures of a measurement
    pub fn measurement(self, measurement: &Measurement) -> Self {
        self.field("download_bps", measurement.download_bps())
            .field("upload_bps", measurement.upload_bps())
            .field("latency_ms", measurement.latency_ms())
            .field("share_token", measurement.share_token())
            .field("source", measurement.source().to_string())
    }

    /// Add error information
    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
            .field("error_exit_code", error.exit_code())
    }

    /// Finalize and write the log entry
    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}
