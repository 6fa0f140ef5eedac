//! Measurement and stored result data models

use crate::error::{AppError, Result};
use crate::models::config::PlaceholderSet;
use crate::units::format_byte_rate;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server the real-run measurement was taken against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub id: String,
    pub name: String,
    pub sponsor: String,
    pub country: String,
    pub host: String,
    /// Upload endpoint; the other test endpoints live beside it
    pub url: String,
    pub distance_km: f64,
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {}) [{}]", self.sponsor, self.name, self.country, self.id)
    }
}

/// Where the numbers in a measurement came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeasurementSource {
    Provider { server: ServerInfo },
    Placeholder(PlaceholderSet),
}

impl MeasurementSource {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, MeasurementSource::Placeholder(_))
    }
}

impl fmt::Display for MeasurementSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementSource::Provider { server } => write!(f, "speedtest server {}", server),
            MeasurementSource::Placeholder(set) => write!(f, "{:?} placeholders", set),
        }
    }
}

/// Figures returned by a provider or placeholder set, before the threshold
/// and timestamp are attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMeasurement {
    pub download_bps: f64,
    pub upload_bps: f64,
    pub latency_ms: f64,
    pub share_token: String,
}

/// One run's measurement. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    timestamp: DateTime<Local>,
    download_bps: f64,
    upload_bps: f64,
    latency_ms: f64,
    share_token: String,
    #[serde(skip)]
    download_threshold_bps: f64,
    source: MeasurementSource,
}

impl Measurement {
    /// Build a measurement, rejecting negative or non-finite figures
    pub fn new(
        timestamp: DateTime<Local>,
        raw: RawMeasurement,
        download_threshold_bps: f64,
        source: MeasurementSource,
    ) -> Result<Self> {
        for (name, value) in [
            ("download", raw.download_bps),
            ("upload", raw.upload_bps),
            ("latency", raw.latency_ms),
            ("download threshold", download_threshold_bps),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::validation(format!(
                    "{} must be a non-negative number, got {}", name, value
                )));
            }
        }

        Ok(Self {
            timestamp,
            download_bps: raw.download_bps,
            upload_bps: raw.upload_bps,
            latency_ms: raw.latency_ms,
            share_token: raw.share_token,
            download_threshold_bps,
            source,
        })
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn download_bps(&self) -> f64 {
        self.download_bps
    }

    pub fn upload_bps(&self) -> f64 {
        self.upload_bps
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency_ms
    }

    pub fn share_token(&self) -> &str {
        &self.share_token
    }

    pub fn download_threshold_bps(&self) -> f64 {
        self.download_threshold_bps
    }

    pub fn source(&self) -> &MeasurementSource {
        &self.source
    }

    /// Timestamp in the text form stored in the `date` column
    pub fn date_text(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }

    pub fn download_human(&self) -> String {
        format_byte_rate(self.download_bps)
    }

    pub fn upload_human(&self) -> String {
        format_byte_rate(self.upload_bps)
    }
}

/// A row read back from the `results` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    pub id: i64,
    pub date: String,
    /// Raw number or scaled string, depending on the storage format in use
    /// when the row was written
    pub download: String,
    pub upload: String,
    pub ping: f64,
    pub image_result: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(download: f64, upload: f64, latency: f64) -> RawMeasurement {
        RawMeasurement {
            download_bps: download,
            upload_bps: upload,
            latency_ms: latency,
            share_token: "test run".to_string(),
        }
    }

    #[test]
    fn test_measurement_accessors() {
        let at = Local.with_ymd_and_hms(2026, 10, 15, 8, 30, 0).unwrap();
        let m = Measurement::new(
            at,
            raw(92940235.49, 11386233.17, 14.582),
            10.0,
            MeasurementSource::Placeholder(PlaceholderSet::Precise),
        ).unwrap();

        assert_eq!(m.timestamp(), at);
        assert_eq!(m.download_bps(), 92940235.49);
        assert_eq!(m.download_threshold_bps(), 10.0);
        assert_eq!(m.share_token(), "test run");
        assert_eq!(m.download_human(), "88.63 MB/s");
        assert_eq!(m.upload_human(), "10.86 MB/s");
        assert_eq!(m.date_text(), "2026-10-15 08:30:00.000000");
        assert!(m.source().is_placeholder());
    }

    #[test]
    fn test_measurement_rejects_negative_or_nan() {
        let source = MeasurementSource::Placeholder(PlaceholderSet::Round);
        assert!(Measurement::new(Local::now(), raw(-1.0, 0.0, 0.0), 10.0, source.clone()).is_err());
        assert!(Measurement::new(Local::now(), raw(1.0, f64::NAN, 0.0), 10.0, source.clone()).is_err());
        assert!(Measurement::new(Local::now(), raw(1.0, 1.0, f64::INFINITY), 10.0, source.clone()).is_err());
        assert!(Measurement::new(Local::now(), raw(1.0, 1.0, 1.0), -5.0, source).is_err());
    }

    #[test]
    fn test_threshold_not_serialized() {
        let m = Measurement::new(
            Local::now(),
            raw(999.0, 999.0, 0.0),
            42.0,
            MeasurementSource::Placeholder(PlaceholderSet::Round),
        ).unwrap();
        let json = serde_json::to_value(&m).unwrap();
        assert!(json.get("download_threshold_bps").is_none());
        assert_eq!(json["download_bps"], 999.0);
    }
}
