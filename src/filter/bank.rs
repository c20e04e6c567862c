//! Per-axis filtering of vector signals and derivation of smoothed rate of
//! change signals (jerk from acceleration, angular acceleration from angular
//! rate).

use crate::filter::butterworth::FilterCoefficients;
use crate::filter::iir::DirectFormIir;
use crate::filter::FilterError;
use crate::prelude::Vector3;
use serde::{Deserialize, Serialize};

/// Number of axes in a sensor vector.
pub const AXES: usize = 3;

/// Independent filters for each axis of a vector signal, all sharing one
/// coefficient set. Axes never interact.
#[derive(Clone, Debug)]
pub struct FilterBank {
    filters: [DirectFormIir; AXES],
}

impl FilterBank {
    pub fn new(coeffs: FilterCoefficients) -> Result<FilterBank, FilterError> {
        let filter = DirectFormIir::new(coeffs)?;
        Ok(FilterBank {
            filters: [filter.clone(), filter.clone(), filter],
        })
    }

    pub fn order(&self) -> usize {
        self.filters[0].coefficients().map_or(0, |c| c.order())
    }

    /// Filters one sample on every axis.
    pub fn process_vector(&mut self, input: &[f64; AXES]) -> [f64; AXES] {
        let mut out = [0.0; AXES];
        for (ix, filter) in self.filters.iter_mut().enumerate() {
            out[ix] = filter.process(input[ix]);
        }
        out
    }

    /// Resets each axis filter to the matching component of `value`.
    pub fn reset(&mut self, value: &[f64; AXES]) {
        for (filter, v) in self.filters.iter_mut().zip(value.iter()) {
            filter.reset(*v);
        }
    }
}

/// The filtered signal of one sensor channel and its smoothed derivative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelOutput {
    pub filtered: Vector3,
    pub derived: Vector3,
}

/// Low pass filters a raw vector signal, differentiates the result with a
/// fixed step, and low pass filters the derivative.
///
/// The step interval is a configuration constant, not a measured delta, so
/// the derivative assumes the stage is driven at a constant rate.
#[derive(Clone, Debug)]
pub struct DerivedSignalStage {
    primary: FilterBank,
    derived: FilterBank,
    step_interval_s: f64,
    previous: [f64; AXES],
    primed: bool,
}

impl DerivedSignalStage {
    /// Creates a new stage.
    ///
    /// # Arguments
    ///
    /// * `primary` - Coefficients for the raw signal filters.
    /// * `derived` - Coefficients for the derivative filters.
    /// * `step_interval_s` - Time between consecutive samples in seconds.
    ///
    /// # Examples
    ///
    /// ```
    /// use imu_filter_rs::filter::bank::DerivedSignalStage;
    /// use imu_filter_rs::filter::butterworth::synthesize;
    ///
    /// let accel = synthesize(2, 11.1, 400.0).unwrap();
    /// let jerk = synthesize(2, 11.1, 400.0).unwrap();
    /// let mut stage = DerivedSignalStage::new(accel, jerk, 0.0025).unwrap();
    ///
    /// // The first sample never produces a derivative.
    /// let out = stage.process(&[0.1, -0.2, 9.81]);
    /// assert_eq!(out.derived, [0.0; 3]);
    /// ```
    pub fn new(
        primary: FilterCoefficients,
        derived: FilterCoefficients,
        step_interval_s: f64,
    ) -> Result<DerivedSignalStage, FilterError> {
        if !step_interval_s.is_finite() || step_interval_s <= 0.0 {
            return Err(FilterError::InvalidSampleRate);
        }
        Ok(DerivedSignalStage {
            primary: FilterBank::new(primary)?,
            derived: FilterBank::new(derived)?,
            step_interval_s,
            previous: [0.0; AXES],
            primed: false,
        })
    }

    pub fn is_primed(&self) -> bool {
        self.primed
    }

    pub fn step_interval_s(&self) -> f64 {
        self.step_interval_s
    }

    pub fn process(&mut self, raw: &Vector3) -> ChannelOutput {
        let mut input = [0.0; AXES];
        for (x, r) in input.iter_mut().zip(raw.iter()) {
            *x = f64::from(*r);
        }
        let filtered = self.primary.process_vector(&input);

        if !self.primed {
            self.previous = filtered;
            self.primed = true;
            return ChannelOutput {
                filtered: to_vector(&filtered),
                derived: [0.0; AXES],
            };
        }

        let mut rate = [0.0; AXES];
        for ix in 0..AXES {
            rate[ix] = (filtered[ix] - self.previous[ix]) / self.step_interval_s;
        }
        let derived = self.derived.process_vector(&rate);
        self.previous = filtered;

        ChannelOutput {
            filtered: to_vector(&filtered),
            derived: to_vector(&derived),
        }
    }

    /// Handles a discontinuity in the raw signal: primary filters settle on
    /// `value`, derivative filters on zero, and the next sample re-primes the
    /// finite difference.
    pub fn reset(&mut self, value: &Vector3) {
        let mut seed = [0.0; AXES];
        for (s, v) in seed.iter_mut().zip(value.iter()) {
            *s = f64::from(*v);
        }
        self.primary.reset(&seed);
        self.derived.reset(&[0.0; AXES]);
        self.previous = seed;
        self.primed = false;
    }
}

fn to_vector(v: &[f64; AXES]) -> Vector3 {
    [v[0] as f32, v[1] as f32, v[2] as f32]
}
