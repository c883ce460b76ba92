use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("wrap period must be positive, got {0}")]
    InvalidPeriod(f64),
    #[error("wrap threshold must lie within (0, {period}), got {threshold}")]
    InvalidThreshold { threshold: f64, period: f64 },
    #[error("wrap epsilon must not be negative, got {0}")]
    InvalidEpsilon(f64),
    #[error("{field} must be at least 1")]
    ZeroWidth { field: &'static str },
}

/// Unit of the raw delay field embedded in capture payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayUnit {
    #[default]
    Micros,
    Nanos,
}

impl DelayUnit {
    pub fn units_per_ms(self) -> f64 {
        match self {
            DelayUnit::Micros => 1_000.0,
            DelayUnit::Nanos => 1_000_000.0,
        }
    }
}

/// Heuristic recovery of delays measured by a counter that wraps at
/// `period_ms`.
///
/// # Examples
/// ```
/// use relaytrace_core::WrapCorrection;
///
/// let wrap = WrapCorrection::default();
/// assert_eq!(wrap.correct(995.0), (5.0, true));
/// assert_eq!(wrap.correct(120.0), (120.0, false));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WrapCorrection {
    pub period_ms: f64,
    pub threshold_ms: f64,
    pub epsilon_ms: f64,
}

impl Default for WrapCorrection {
    fn default() -> Self {
        Self {
            period_ms: 1000.0,
            threshold_ms: 900.0,
            epsilon_ms: 0.05,
        }
    }
}

impl WrapCorrection {
    /// Reduce a raw delay into the counter period.
    pub fn reduce(&self, delay_ms: f64) -> f64 {
        delay_ms.rem_euclid(self.period_ms)
    }

    /// Returns the corrected delay and whether the value was treated as
    /// wrapped.
    pub fn correct(&self, delay_ms: f64) -> (f64, bool) {
        let raw = self.reduce(delay_ms);
        if raw > self.threshold_ms {
            (self.period_ms - raw, true)
        } else {
            (raw, false)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.period_ms > 0.0) {
            return Err(ConfigError::InvalidPeriod(self.period_ms));
        }
        if !(self.threshold_ms > 0.0 && self.threshold_ms < self.period_ms) {
            return Err(ConfigError::InvalidThreshold {
                threshold: self.threshold_ms,
                period: self.period_ms,
            });
        }
        if !(self.epsilon_ms >= 0.0) {
            return Err(ConfigError::InvalidEpsilon(self.epsilon_ms));
        }
        Ok(())
    }
}

/// Run-wide analysis settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub wrap: WrapCorrection,
    pub delay_unit: DelayUnit,
    /// Digits the send-log sub-second field is normalised to.
    pub subsecond_width: usize,
    /// Characters of the receiver-log timestamp field that are parsed.
    pub receiver_timestamp_width: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            wrap: WrapCorrection::default(),
            delay_unit: DelayUnit::default(),
            subsecond_width: 6,
            receiver_timestamp_width: 17,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.wrap.validate()?;
        if self.subsecond_width == 0 {
            return Err(ConfigError::ZeroWidth {
                field: "subsecond_width",
            });
        }
        if self.receiver_timestamp_width == 0 {
            return Err(ConfigError::ZeroWidth {
                field: "receiver_timestamp_width",
            });
        }
        Ok(())
    }
}
