//! Result reporting: persist, evaluate, notify
//!
//! The three steps run in order. A failing step is logged and recorded in
//! the [`ReportOutcome`]; it never stops the steps after it.

use crate::{
    error::AppError,
    logging::Logger,
    models::{Config, Measurement},
    notify::{compose_notification, mail_addresses, transport_for, MailTransport},
    store::ResultStore,
    units::ThresholdMode,
};
use std::sync::Arc;

/// Threshold verdict for one measurement
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Download phase was off, so there is nothing to compare
    NotEvaluated,
    Checked {
        /// Download reduced to the threshold's units
        comparison_value: f64,
        threshold: f64,
        hit: bool,
    },
}

impl Evaluation {
    pub fn is_hit(&self) -> bool {
        matches!(self, Evaluation::Checked { hit: true, .. })
    }
}

/// What happened to the notification
#[derive(Debug, Clone)]
pub enum NotificationStatus {
    /// Threshold not hit
    NotNeeded,
    Sent { via: String },
    Failed(AppError),
}

/// Per-step results of one report
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub stored: std::result::Result<i64, AppError>,
    pub evaluation: Evaluation,
    pub notification: NotificationStatus,
}

impl ReportOutcome {
    pub fn is_success(&self) -> bool {
        self.stored.is_ok() && !matches!(self.notification, NotificationStatus::Failed(_))
    }

    /// Combined error for every failed step, if any
    pub fn failure(&self) -> Option<AppError> {
        let mut failed = Vec::new();
        if let Err(e) = &self.stored {
            failed.push(format!("persist: {}", e));
        }
        if let NotificationStatus::Failed(e) = &self.notification {
            failed.push(format!("notify: {}", e));
        }

        if failed.is_empty() {
            None
        } else {
            Some(AppError::reporting(failed.join("; ")))
        }
    }
}

/// Persists, evaluates and notifies for one measurement
pub struct ResultReporter {
    store: ResultStore,
    transport: Arc<dyn MailTransport>,
    mode: ThresholdMode,
    evaluate_download: bool,
    from: String,
    to: String,
    logger: Logger,
}

impl ResultReporter {
    pub fn new(config: &Config, logger: Logger) -> Self {
        Self::with_transport(config, transport_for(config), logger)
    }

    pub fn with_transport(config: &Config, transport: Arc<dyn MailTransport>, logger: Logger) -> Self {
        let (from, to) = mail_addresses(config);
        Self {
            store: ResultStore::new(
                config.storage.database_path.clone(),
                config.storage.format,
                logger.named("store"),
            ),
            transport,
            mode: config.thresholds.mode,
            evaluate_download: config.run_mode.download,
            from,
            to,
            logger,
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Run all three steps for `measurement`
    pub async fn report(&self, measurement: &Measurement) -> ReportOutcome {
        let stored = self.persist(measurement).await;
        let evaluation = self.evaluate(measurement).await;

        let notification = if evaluation.is_hit() {
            self.notify(measurement).await
        } else {
            NotificationStatus::NotNeeded
        };

        ReportOutcome { stored, evaluation, notification }
    }

    async fn persist(&self, measurement: &Measurement) -> std::result::Result<i64, AppError> {
        let correlation_id = self.logger.start_operation("persist").await;
        let stored = self.store.persist(measurement).await;
        self.logger.end_operation(&correlation_id, "persist", stored.is_ok()).await;

        if let Ok(id) = stored {
            self.logger.info("Result stored")
                .field("id", id)
                .field("format", self.store.format())
                .log()
                .await;
        }
        stored
    }

    async fn evaluate(&self, measurement: &Measurement) -> Evaluation {
        if !self.evaluate_download {
            self.logger.debug("Download phase disabled, threshold not evaluated").log().await;
            return Evaluation::NotEvaluated;
        }

        let threshold = measurement.download_threshold_bps();
        let comparison_value = self.mode.comparison_value(measurement.download_bps());
        let hit = self.mode.is_hit(measurement.download_bps(), threshold);

        self.logger.debug("Threshold evaluated")
            .field("mode", self.mode)
            .field("comparison_value", comparison_value)
            .field("threshold", threshold)
            .field("hit", hit)
            .log()
            .await;

        Evaluation::Checked { comparison_value, threshold, hit }
    }

    async fn notify(&self, measurement: &Measurement) -> NotificationStatus {
        let notification = compose_notification(measurement, self.mode, &self.from, &self.to);
        let via = self.transport.describe();

        self.logger.debug("Sending notification")
            .field("to", &notification.to)
            .field("transport", &via)
            .log()
            .await;

        match self.transport.send(&notification).await {
            Ok(()) => {
                self.logger.info("Notification sent").field("transport", &via).log().await;
                NotificationStatus::Sent { via }
            }
            Err(e) => {
                self.logger.error(&format!("Failed to send notification: {}", e))
                    .error_info(&e)
                    .field("transport", &via)
                    .log()
                    .await;
                NotificationStatus::Failed(e)
            }
        }
    }
}
