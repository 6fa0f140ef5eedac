//! Data models and structures for the speedtest monitor

pub mod config;
pub mod measurement;

// Re-export main model types
pub use config::{Config, PlaceholderSet, StorageFormat};
pub use measurement::{Measurement, MeasurementSource, RawMeasurement, ServerInfo, StoredResult};
