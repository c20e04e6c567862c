//! Filters for conditioning inertial sensor samples.
//!
//! There are two primary categories of digital filters in signal processing:
//!
//! * Finite Impulse Response (FIR) Filters
//! * Infinite Impulse Response (IIR) Filters
//!
//! This module is built around the second kind. IIR filters are feedback
//! based systems, and have all the caveats associated with any feedback
//! system.  If poorly designed they can be unstable and unpredictable.  The
//! phase and group delay responses are non-linear.
//!
//! With those drawbacks noted, a well designed IIR filter can be stable in all
//! but the most unlikely scenarios, and extremely efficient as well.  A second
//! order Butterworth section needs only five multiplies per sample, which is
//! what makes it attractive for smoothing accelerometer and gyroscope data
//! inside a tight control loop.
//!
//! * [`butterworth`] synthesizes low pass coefficients from an order and a
//!   cutoff frequency.
//! * [`iir`] applies a coefficient set to a scalar stream.
//! * [`bank`] runs one filter per vector axis and derives smoothed rate of
//!   change signals.

use std::error;
use std::fmt;

pub mod bank;
pub mod butterworth;
pub mod iir;

/// Tolerance on the leading denominator coefficient, which must be 1.
pub const A0_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Debug, PartialEq)]
pub enum FilterError {
    InvalidOrder,
    InvalidCutoff,
    InvalidSampleRate,
    CutoffAboveNyquist,
    Unstable,
    IllConditioned,
    CoefficientMismatch,
    NotNormalized,
}

impl FilterError {
    /// True for errors caused by a bad filter specification, as opposed to
    /// misuse of an already synthesized coefficient set.
    pub fn is_invalid_spec(&self) -> bool {
        match *self {
            FilterError::InvalidOrder
            | FilterError::InvalidCutoff
            | FilterError::InvalidSampleRate
            | FilterError::CutoffAboveNyquist
            | FilterError::Unstable
            | FilterError::IllConditioned => true,
            FilterError::CoefficientMismatch | FilterError::NotNormalized => {
                false
            }
        }
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let desc = match *self {
            FilterError::InvalidOrder => {
                "Filter order must be on interval [1, MAX_ORDER]"
            }
            FilterError::InvalidCutoff => {
                "Cutoff frequency must be finite and positive"
            }
            FilterError::InvalidSampleRate => {
                "Sample rate must be finite and positive"
            }
            FilterError::CutoffAboveNyquist => {
                "Cutoff frequency must be below half the sample rate"
            }
            FilterError::Unstable => {
                "Rounded coefficients place a pole on or outside the unit circle"
            }
            FilterError::IllConditioned => {
                "Cutoff is too low for this order to hold unity DC gain in f64"
            }
            FilterError::CoefficientMismatch => {
                "Coefficient sequences must be non-empty, of equal length and within MAX_ORDER"
            }
            FilterError::NotNormalized => {
                "Leading denominator coefficient must equal 1"
            }
        };
        write!(f, "Filter error: {}", desc)
    }
}

impl error::Error for FilterError {
    fn cause(&self) -> Option<&dyn error::Error> {
        None
    }
}
