//! One processing step of the sensor conditioning pipeline.
//!
//! A [`ProcessingCycle`] takes the latest raw acceleration and angular rate
//! vectors, runs each configured channel through its
//! [`DerivedSignalStage`](../filter/bank/struct.DerivedSignalStage.html) and
//! assembles a [`ResultRecord`]. How often and on what trigger a cycle runs is
//! decided by the host; see [`cycle_node`].

pub mod cycle_node;

use crate::config::{ChannelConfig, ConfigError, FilterConfig};
use crate::filter::bank::{ChannelOutput, DerivedSignalStage};
use crate::prelude::Vector3;
use serde::{Deserialize, Serialize};

/// A raw sensor vector as delivered by the host transport.
///
/// Acceleration is in m/s^2, angular rate in rad/s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub timestamp_us: u64,
    pub xyz: Vector3,
}

impl SampleRecord {
    pub fn new(timestamp_us: u64, xyz: Vector3) -> SampleRecord {
        SampleRecord { timestamp_us, xyz }
    }
}

/// The output of one cycle.
///
/// `accel` carries acceleration (m/s^2) and jerk (m/s^3), `gyro` carries
/// angular rate (rad/s) and angular acceleration (rad/s^2). A channel that is
/// not configured is `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub timestamp_us: u64,
    pub accel: Option<ChannelOutput>,
    pub gyro: Option<ChannelOutput>,
}

pub struct ProcessingCycle {
    accel: Option<DerivedSignalStage>,
    gyro: Option<DerivedSignalStage>,
}

fn build_stage(
    name: &str,
    channel: &ChannelConfig,
    config: &FilterConfig,
) -> Result<DerivedSignalStage, ConfigError> {
    let rate = config.sample_rate_hz();
    let primary = channel.primary.coefficients(rate)?;
    let derived = channel.derived.coefficients(rate)?;
    info!(
        "{} filters at {} Hz: primary order {} a={:?} b={:?}, derived order {} a={:?} b={:?}",
        name,
        rate,
        primary.order(),
        primary.a(),
        primary.b(),
        derived.order(),
        derived.a(),
        derived.b()
    );
    Ok(DerivedSignalStage::new(
        primary,
        derived,
        config.step_interval_s,
    )?)
}

impl ProcessingCycle {
    /// Synthesizes every filter the configuration asks for.
    ///
    /// # Examples
    ///
    /// ```
    /// use imu_filter_rs::config::FilterConfig;
    /// use imu_filter_rs::cycle::ProcessingCycle;
    ///
    /// let mut cycle = ProcessingCycle::new(&FilterConfig::accel_only()).unwrap();
    /// let record = cycle.step(0, &[0.0, 0.0, 9.81], &[0.0; 3]);
    /// assert!(record.accel.is_some());
    /// assert!(record.gyro.is_none());
    /// ```
    pub fn new(config: &FilterConfig) -> Result<ProcessingCycle, ConfigError> {
        config.validate()?;
        let accel = match config.accel {
            Some(ref channel) => Some(build_stage("accel", channel, config)?),
            None => None,
        };
        let gyro = match config.gyro {
            Some(ref channel) => Some(build_stage("gyro", channel, config)?),
            None => None,
        };
        Ok(ProcessingCycle { accel, gyro })
    }

    pub fn has_accel(&self) -> bool {
        self.accel.is_some()
    }

    pub fn has_gyro(&self) -> bool {
        self.gyro.is_some()
    }

    /// Runs one cycle. Inputs for channels that are not configured are
    /// ignored.
    pub fn step(
        &mut self,
        timestamp_us: u64,
        accel: &Vector3,
        gyro: &Vector3,
    ) -> ResultRecord {
        self.step_available(timestamp_us, Some(accel), Some(gyro))
    }

    /// Runs one cycle on the channels that have a sample. A channel given
    /// `None` keeps its filter state untouched and is `None` in the record.
    pub fn step_available(
        &mut self,
        timestamp_us: u64,
        accel: Option<&Vector3>,
        gyro: Option<&Vector3>,
    ) -> ResultRecord {
        let accel = match (self.accel.as_mut(), accel) {
            (Some(stage), Some(xyz)) => Some(stage.process(xyz)),
            _ => None,
        };
        let gyro = match (self.gyro.as_mut(), gyro) {
            (Some(stage), Some(xyz)) => Some(stage.process(xyz)),
            _ => None,
        };
        ResultRecord {
            timestamp_us,
            accel,
            gyro,
        }
    }

    /// Re-seeds all filters after a discontinuity in the sensor data.
    pub fn reset(&mut self, accel: &Vector3, gyro: &Vector3) {
        self.reset_available(Some(accel), Some(gyro));
    }

    /// Re-seeds the filters of the channels given a value.
    pub fn reset_available(
        &mut self,
        accel: Option<&Vector3>,
        gyro: Option<&Vector3>,
    ) {
        debug!("resetting filters to accel {:?} gyro {:?}", accel, gyro);
        if let (Some(stage), Some(xyz)) = (self.accel.as_mut(), accel) {
            stage.reset(xyz);
        }
        if let (Some(stage), Some(xyz)) = (self.gyro.as_mut(), gyro) {
            stage.reset(xyz);
        }
    }
}
