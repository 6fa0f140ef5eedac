//! Measurement collection
//!
//! Produces the run's single [`Measurement`], either from the speed test
//! provider or, on dry runs, from a fixed placeholder set.

use crate::{
    error::{AppError, Result},
    logging::Logger,
    models::{
        config::RunMode, Config, Measurement, MeasurementSource, PlaceholderSet, RawMeasurement,
    },
    provider::{run_speed_test, SpeedTestBackend, SpeedTestPlan, SpeedtestNetClient},
};
use chrono::Local;
use std::sync::Arc;

/// Share token reported by dry runs
pub const DRY_RUN_SHARE_TOKEN: &str = "test run";

/// Fixed figures reported by a dry run
pub fn placeholder_values(set: PlaceholderSet) -> RawMeasurement {
    let (download_bps, upload_bps, latency_ms) = match set {
        PlaceholderSet::Round => (999.0, 999.0, 0.0),
        PlaceholderSet::Precise => (92940235.49, 11386233.17, 14.582),
    };

    RawMeasurement {
        download_bps,
        upload_bps,
        latency_ms,
        share_token: DRY_RUN_SHARE_TOKEN.to_string(),
    }
}

/// Collects one measurement per run
pub struct MeasurementCollector {
    run_mode: RunMode,
    download_threshold: f64,
    plan: SpeedTestPlan,
    backend: Option<Arc<dyn SpeedTestBackend>>,
    logger: Logger,
}

impl MeasurementCollector {
    /// Create a collector; the speedtest.net client is only built for real runs
    pub fn new(config: &Config, logger: Logger) -> Result<Self> {
        let backend: Option<Arc<dyn SpeedTestBackend>> = if config.run_mode.real_run {
            Some(Arc::new(SpeedtestNetClient::new(&config.provider)?))
        } else {
            None
        };

        Ok(Self::build(config, backend, logger))
    }

    /// Create a collector with an explicit provider backend
    pub fn with_backend(config: &Config, backend: Arc<dyn SpeedTestBackend>, logger: Logger) -> Self {
        Self::build(config, Some(backend), logger)
    }

    fn build(config: &Config, backend: Option<Arc<dyn SpeedTestBackend>>, logger: Logger) -> Self {
        let run_mode = config.run_mode.clone();
        let plan = SpeedTestPlan::from_settings(&config.provider, run_mode.download, run_mode.upload, run_mode.image);

        Self {
            run_mode,
            download_threshold: config.thresholds.download,
            plan,
            backend,
            logger,
        }
    }

    pub fn is_real_run(&self) -> bool {
        self.run_mode.real_run
    }

    /// Take the measurement for this run
    pub async fn collect(&self) -> Result<Measurement> {
        let timestamp = Local::now();

        if !self.run_mode.real_run {
            let set = self.run_mode.placeholders;
            self.logger.debug("Dry run, using placeholder values")
                .field("placeholder_set", set)
                .log()
                .await;

            return Measurement::new(
                timestamp,
                placeholder_values(set),
                self.download_threshold,
                MeasurementSource::Placeholder(set),
            );
        }

        let backend = self.backend.as_ref()
            .ok_or_else(|| AppError::internal("Real run requested without a speed test backend"))?;

        self.logger.info("Starting speed test")
            .field("download", self.plan.download)
            .field("upload", self.plan.upload)
            .field("share", self.plan.share)
            .log()
            .await;

        let report = match run_speed_test(backend.as_ref(), &self.plan, &self.logger).await {
            Ok(report) => report,
            Err(failure) => {
                let error = AppError::from(failure);
                self.logger.error(&format!("Speed test failed: {}", error))
                    .error_info(&error)
                    .field("server_ids", &self.plan.server_ids)
                    .log()
                    .await;
                return Err(error);
            }
        };

        let measurement = Measurement::new(
            timestamp,
            report.raw,
            self.download_threshold,
            MeasurementSource::Provider { server: report.server },
        )?;

        self.logger.info("Speed test complete")
            .measurement(&measurement)
            .log()
            .await;

        Ok(measurement)
    }
}
