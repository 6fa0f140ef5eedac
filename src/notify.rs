//! Notification mail composition and SMTP delivery
//!
//! Real runs send through the Gmail SMTP relay with the configured account,
//! using implicit TLS on port 465 and STARTTLS on any other port.
//! Dry runs send unauthenticated plain SMTP to a local debugging endpoint.

use crate::{
    error::{AppError, Result},
    models::{
        config::{DebugMailSettings, GmailSettings},
        Config, Measurement,
    },
    units::ThresholdMode,
};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use std::time::Duration;

pub const SUBJECT: &str = "Speedtest Results";

/// Address used on dry runs when no Gmail addresses are configured
pub const DEBUG_MAIL_ADDRESS: &str = "speedtest@localhost";

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Port on which the relay expects TLS from the first byte
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// How the relay connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// TLS handshake immediately after connecting
    ImplicitTls,
    /// Plain connection upgraded with the STARTTLS command
    StartTls,
}

impl SmtpSecurity {
    pub fn for_port(port: u16) -> Self {
        if port == IMPLICIT_TLS_PORT {
            SmtpSecurity::ImplicitTls
        } else {
            SmtpSecurity::StartTls
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SmtpSecurity::ImplicitTls => "TLS",
            SmtpSecurity::StartTls => "STARTTLS",
        }
    }
}

/// A fully formed notification mail
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    fn to_message(&self) -> Result<Message> {
        let from: Mailbox = self.from.parse()?;
        let to: Mailbox = self.to.parse()?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(self.body.clone())?;
        Ok(message)
    }
}

/// Three-line body: download with threshold, upload, ping
pub fn compose_body(measurement: &Measurement, mode: ThresholdMode) -> String {
    format!(
        "Download: {} (threshold: {})\nUpload: {}\nPing: {} ms",
        measurement.download_human(),
        mode.describe_threshold(measurement.download_threshold_bps()),
        measurement.upload_human(),
        measurement.latency_ms(),
    )
}

pub fn compose_notification(measurement: &Measurement, mode: ThresholdMode, from: &str, to: &str) -> Notification {
    Notification {
        from: from.to_string(),
        to: to.to_string(),
        subject: SUBJECT.to_string(),
        body: compose_body(measurement, mode),
    }
}

/// Sender and recipient for this run's notification
pub fn mail_addresses(config: &Config) -> (String, String) {
    let pick = |configured: &str| {
        if configured.is_empty() && !config.run_mode.real_run {
            DEBUG_MAIL_ADDRESS.to_string()
        } else {
            configured.to_string()
        }
    };
    (pick(&config.gmail.sender_email), pick(&config.gmail.recipient_email))
}

/// Mail delivery seam
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;

    /// Short human-readable description of where mail goes
    fn describe(&self) -> String;
}

/// Transport for this run: Gmail on real runs, the debug endpoint otherwise
pub fn transport_for(config: &Config) -> Arc<dyn MailTransport> {
    if config.run_mode.real_run {
        Arc::new(SmtpMailer::new(config.gmail.clone()))
    } else {
        Arc::new(DebugMailer::new(config.debug_mail.clone()))
    }
}

/// Authenticated SMTP relay (Gmail)
pub struct SmtpMailer {
    settings: GmailSettings,
}

impl SmtpMailer {
    pub fn new(settings: GmailSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, notification: &Notification) -> Result<()> {
        if !self.settings.is_complete() {
            return Err(AppError::config(
                "GMAIL_SENDER_EMAIL, GMAIL_SENDER_PASSWORD and GMAIL_RECIPIENT_EMAIL must be set for real-run notifications",
            ));
        }

        let message = notification.to_message()?;
        let credentials = Credentials::new(
            self.settings.sender_email.clone(),
            self.settings.sender_password.clone(),
        );

        let builder = match SmtpSecurity::for_port(self.settings.smtp_port) {
            SmtpSecurity::ImplicitTls => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.settings.smtp_host)?,
            SmtpSecurity::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.settings.smtp_host)?,
        };
        let mailer = builder
            .port(self.settings.smtp_port)
            .credentials(credentials)
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        mailer.send(message).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "{}:{} ({}, authenticated)",
            self.settings.smtp_host,
            self.settings.smtp_port,
            SmtpSecurity::for_port(self.settings.smtp_port).label()
        )
    }
}

/// Plain, unauthenticated SMTP to a local debugging server
pub struct DebugMailer {
    settings: DebugMailSettings,
}

impl DebugMailer {
    pub fn new(settings: DebugMailSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl MailTransport for DebugMailer {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let message = notification.to_message()?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.settings.host)
            .port(self.settings.port)
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        mailer.send(message).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{}:{} (local debug)", self.settings.host, self.settings.port)
    }
}

/// Transport that records notifications instead of sending them
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingMailer {
    pub sent: std::sync::Mutex<Vec<Notification>>,
    pub fail_with: Option<AppError>,
}

#[cfg(test)]
impl RecordingMailer {
    pub fn failing(error: AppError) -> Self {
        Self { sent: Default::default(), fail_with: Some(error) }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl MailTransport for RecordingMailer {
    async fn send(&self, notification: &Notification) -> Result<()> {
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}
