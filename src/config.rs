//! Filter configuration, read once before processing starts.
//!
//! Changing any value requires building a new
//! [`ProcessingCycle`](../cycle/struct.ProcessingCycle.html); coefficients are
//! never swapped while samples are flowing.

use crate::filter::butterworth::{FilterCoefficients, FilterSpec, MAX_ORDER};
use crate::filter::FilterError;
use serde::{Deserialize, Serialize};
use std::error;
use std::fmt;

pub const MIN_CUTOFF_RADPS: f64 = 1.0;
pub const MAX_CUTOFF_RADPS: f64 = 400.0;

/// 400 Hz processing rate.
pub const DEFAULT_STEP_INTERVAL_S: f64 = 0.0025;

#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    NoChannels,
    Codec(String),
    Filter(FilterError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConfigError::NoChannels => {
                write!(f, "Config error: no sensor channel is configured")
            }
            ConfigError::Codec(ref msg) => {
                write!(f, "Config error: CBOR codec failed: {}", msg)
            }
            ConfigError::Filter(ref e) => write!(f, "Config error: {}", e),
        }
    }
}

impl error::Error for ConfigError {
    fn cause(&self) -> Option<&dyn error::Error> {
        match *self {
            ConfigError::Filter(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<FilterError> for ConfigError {
    fn from(e: FilterError) -> ConfigError {
        ConfigError::Filter(e)
    }
}

/// Order and cutoff of one filter role.
///
/// An order of zero disables filtering for that role.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    pub order: usize,
    pub cutoff_radps: f64,
}

impl FilterParams {
    pub fn new(order: usize, cutoff_radps: f64) -> FilterParams {
        FilterParams {
            order,
            cutoff_radps,
        }
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        if self.order > MAX_ORDER {
            return Err(FilterError::InvalidOrder);
        }
        if !(self.cutoff_radps >= MIN_CUTOFF_RADPS
            && self.cutoff_radps <= MAX_CUTOFF_RADPS)
        {
            return Err(FilterError::InvalidCutoff);
        }
        Ok(())
    }

    /// Synthesizes coefficients for these parameters at `sample_rate_hz`.
    pub fn coefficients(
        &self,
        sample_rate_hz: f64,
    ) -> Result<FilterCoefficients, FilterError> {
        self.validate()?;
        if self.order == 0 {
            return Ok(FilterCoefficients::passthrough());
        }
        FilterSpec::new(self.order, self.cutoff_radps, sample_rate_hz)?
            .synthesize()
    }
}

/// Filters for one sensor channel: the raw signal and its derivative.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub primary: FilterParams,
    pub derived: FilterParams,
}

impl ChannelConfig {
    /// Acceleration at 2nd order / 70 rad/s, jerk at 2nd order / 70 rad/s.
    pub fn accel_default() -> ChannelConfig {
        ChannelConfig {
            primary: FilterParams::new(2, 70.0),
            derived: FilterParams::new(2, 70.0),
        }
    }

    /// Angular rate at 2nd order / 50 rad/s, angular acceleration at 2nd
    /// order / 50 rad/s.
    pub fn gyro_default() -> ChannelConfig {
        ChannelConfig {
            primary: FilterParams::new(2, 50.0),
            derived: FilterParams::new(2, 50.0),
        }
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        self.primary.validate()?;
        self.derived.validate()
    }
}

/// Complete filter configuration.
///
/// Either channel may be left out: acceleration only, angular rate only, or
/// both combined in one cycle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub step_interval_s: f64,
    pub accel: Option<ChannelConfig>,
    pub gyro: Option<ChannelConfig>,
}

impl Default for FilterConfig {
    fn default() -> FilterConfig {
        FilterConfig::combined()
    }
}

impl FilterConfig {
    pub fn accel_only() -> FilterConfig {
        FilterConfig {
            step_interval_s: DEFAULT_STEP_INTERVAL_S,
            accel: Some(ChannelConfig::accel_default()),
            gyro: None,
        }
    }

    pub fn gyro_only() -> FilterConfig {
        FilterConfig {
            step_interval_s: DEFAULT_STEP_INTERVAL_S,
            accel: None,
            gyro: Some(ChannelConfig::gyro_default()),
        }
    }

    pub fn combined() -> FilterConfig {
        FilterConfig {
            step_interval_s: DEFAULT_STEP_INTERVAL_S,
            accel: Some(ChannelConfig::accel_default()),
            gyro: Some(ChannelConfig::gyro_default()),
        }
    }

    pub fn sample_rate_hz(&self) -> f64 {
        1.0 / self.step_interval_s
    }

    /// Checks ranges and that every filter can be synthesized at the
    /// configured rate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.step_interval_s.is_finite() || self.step_interval_s <= 0.0 {
            return Err(FilterError::InvalidSampleRate.into());
        }
        if self.accel.is_none() && self.gyro.is_none() {
            return Err(ConfigError::NoChannels);
        }
        for channel in self.accel.iter().chain(self.gyro.iter()) {
            channel.validate()?;
            channel.primary.coefficients(self.sample_rate_hz())?;
            channel.derived.coefficients(self.sample_rate_hz())?;
        }
        Ok(())
    }

    /// Decodes and validates a CBOR encoded configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use imu_filter_rs::config::FilterConfig;
    ///
    /// let bytes = FilterConfig::gyro_only().to_cbor().unwrap();
    /// let config = FilterConfig::from_cbor(&bytes).unwrap();
    /// assert!(config.accel.is_none());
    /// ```
    pub fn from_cbor(bytes: &[u8]) -> Result<FilterConfig, ConfigError> {
        let config: FilterConfig = serde_cbor::from_slice(bytes)
            .map_err(|e| ConfigError::Codec(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, ConfigError> {
        serde_cbor::to_vec(self).map_err(|e| ConfigError::Codec(e.to_string()))
    }
}
