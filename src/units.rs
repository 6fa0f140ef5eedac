//! Byte-rate scaling and threshold comparison units
//!
//! Throughput is measured in bytes per second and rendered with a
//! 1024-based unit table (`B`, `KB`, `MB`, ...). The same scaling feeds
//! both the stored/mailed strings and, in [`ThresholdMode::Auto`], the
//! number compared against the configured download threshold.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scale factor between adjacent units
pub const SCALE: f64 = 1024.0;

/// Units in ascending order of magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ByteUnit {
    B,
    KB,
    MB,
    GB,
    TB,
    PB,
    EB,
    ZB,
    YB,
}

impl ByteUnit {
    pub const ALL: [ByteUnit; 9] = [
        ByteUnit::B,
        ByteUnit::KB,
        ByteUnit::MB,
        ByteUnit::GB,
        ByteUnit::TB,
        ByteUnit::PB,
        ByteUnit::EB,
        ByteUnit::ZB,
        ByteUnit::YB,
    ];

    /// Position in the unit table, i.e. the power of 1024
    pub fn index(self) -> usize {
        self as usize
    }

    /// Number of bytes in one of this unit
    pub fn factor(self) -> f64 {
        SCALE.powi(self.index() as i32)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ByteUnit::B => "B",
            ByteUnit::KB => "KB",
            ByteUnit::MB => "MB",
            ByteUnit::GB => "GB",
            ByteUnit::TB => "TB",
            ByteUnit::PB => "PB",
            ByteUnit::EB => "EB",
            ByteUnit::ZB => "ZB",
            ByteUnit::YB => "YB",
        }
    }

    /// Largest unit whose factor does not exceed `bytes`, clamped to the table
    pub fn for_bytes(bytes: f64) -> Self {
        let mut unit = ByteUnit::B;
        for candidate in ByteUnit::ALL.iter().skip(1) {
            if bytes >= candidate.factor() {
                unit = *candidate;
            } else {
                break;
            }
        }
        unit
    }
}

impl fmt::Display for ByteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ByteUnit {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_uppercase();
        ByteUnit::ALL
            .iter()
            .copied()
            .find(|unit| unit.symbol() == wanted)
            .ok_or_else(|| AppError::parse(format!("Unknown byte unit: {}", s)))
    }
}

/// A byte rate reduced to an auto-selected unit, rounded to two decimals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledRate {
    pub value: f64,
    pub unit: ByteUnit,
}

impl ScaledRate {
    /// Human-readable form, e.g. `"88.63 MB/s"` or `"1.5 KB/s"`.
    ///
    /// The value is printed in its shortest form with at least one
    /// fractional digit, so whole numbers read `"999.0 B/s"`.
    pub fn to_human(&self) -> String {
        let mut number = self.value.to_string();
        if !number.contains('.') {
            number.push_str(".0");
        }
        format!("{} {}/s", number, self.unit)
    }
}

impl fmt::Display for ScaledRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_human())
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Scale a byte rate into the largest unit not exceeding it.
///
/// Negative and non-finite inputs are outside the measurement domain and
/// scale to zero.
pub fn scale_byte_rate(bytes_per_sec: f64) -> ScaledRate {
    if !bytes_per_sec.is_finite() || bytes_per_sec <= 0.0 {
        return ScaledRate { value: 0.0, unit: ByteUnit::B };
    }

    let unit = ByteUnit::for_bytes(bytes_per_sec);
    ScaledRate {
        value: round2(bytes_per_sec / unit.factor()),
        unit,
    }
}

/// Human-readable byte rate, `"0B"` for zero
pub fn format_byte_rate(bytes_per_sec: f64) -> String {
    if !bytes_per_sec.is_finite() || bytes_per_sec <= 0.0 {
        return "0B".to_string();
    }
    scale_byte_rate(bytes_per_sec).to_human()
}

/// How the measured download is reduced before comparing with the threshold.
///
/// `Auto` reproduces the historical behaviour: the download is scaled to
/// whatever unit fits it and the bare number is compared with the threshold,
/// so 5 MB/s and 5 GB/s both compare as `5.xx`. `Bytes` and `Fixed` compare
/// in a stable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ThresholdMode {
    #[default]
    Auto,
    Bytes,
    Fixed(ByteUnit),
}

impl ThresholdMode {
    /// The number compared against the threshold for a given download rate
    pub fn comparison_value(self, download_bps: f64) -> f64 {
        match self {
            ThresholdMode::Auto => scale_byte_rate(download_bps).value,
            ThresholdMode::Bytes => download_bps,
            ThresholdMode::Fixed(unit) => round2(download_bps / unit.factor()),
        }
    }

    /// Threshold hit: download at or below the configured floor
    pub fn is_hit(self, download_bps: f64, threshold: f64) -> bool {
        self.comparison_value(download_bps) <= threshold
    }

    /// Render a threshold value in this mode's units for messages
    pub fn describe_threshold(self, threshold: f64) -> String {
        match self {
            ThresholdMode::Auto => format!("{}", threshold),
            ThresholdMode::Bytes => format_byte_rate(threshold),
            ThresholdMode::Fixed(unit) => format!("{} {}/s", threshold, unit),
        }
    }

    pub fn as_str(self) -> String {
        match self {
            ThresholdMode::Auto => "auto".to_string(),
            ThresholdMode::Bytes => "bytes".to_string(),
            ThresholdMode::Fixed(unit) => unit.symbol().to_lowercase(),
        }
    }
}

impl fmt::Display for ThresholdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl TryFrom<String> for ThresholdMode {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ThresholdMode> for String {
    fn from(mode: ThresholdMode) -> Self {
        mode.as_str()
    }
}

impl FromStr for ThresholdMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "scaled" => Ok(ThresholdMode::Auto),
            "bytes" | "b" | "raw" => Ok(ThresholdMode::Bytes),
            other => other
                .parse::<ByteUnit>()
                .map(ThresholdMode::Fixed)
                .map_err(|_| AppError::parse(format!(
                    "Invalid threshold mode '{}': expected auto, bytes, kb, mb or gb", s
                ))),
        }
    }
}
