//! Implementation of a direct form infinite impulse response (IIR) filter.
//!
//! The filter keeps newest-first input and output history in fixed storage
//! sized for [`MAX_ORDER`](../butterworth/constant.MAX_ORDER.html), so the
//! per-sample path never allocates. For a coefficient set of order N the
//! output for input `x[n]` is
//!
//! ```text
//! y[n] = b[0] x[n] + ... + b[N] x[n-N] - a[1] y[n-1] - ... - a[N] y[n-N]
//! ```

use crate::filter::butterworth::{FilterCoefficients, MAX_COEFFS, MAX_ORDER};
use crate::filter::FilterError;

/// A single channel recursive filter.
///
/// A default constructed filter has no coefficients and must be configured
/// with [`set_coefficients`](#method.set_coefficients) before use.
#[derive(Clone, Debug, Default)]
pub struct DirectFormIir {
    coeffs: Option<FilterCoefficients>,
    x_hist: [f64; MAX_COEFFS],
    y_hist: [f64; MAX_COEFFS],
}

impl DirectFormIir {
    /// Creates a filter that is ready to process samples.
    ///
    /// # Examples
    ///
    /// ```
    /// use imu_filter_rs::filter::butterworth::synthesize;
    /// use imu_filter_rs::filter::iir::DirectFormIir;
    ///
    /// let coeffs = synthesize(2, 20.0, 400.0).unwrap();
    /// let mut filter = DirectFormIir::new(coeffs).unwrap();
    /// filter.reset(9.81);
    /// assert!((filter.process(9.81) - 9.81).abs() < 1e-9);
    /// ```
    pub fn new(coeffs: FilterCoefficients) -> Result<DirectFormIir, FilterError> {
        let mut filter = DirectFormIir::default();
        filter.set_coefficients(coeffs)?;
        Ok(filter)
    }

    /// Installs a coefficient set and clears all history, including slots
    /// beyond the new order that a previous configuration may have used.
    pub fn set_coefficients(
        &mut self,
        coeffs: FilterCoefficients,
    ) -> Result<(), FilterError> {
        if coeffs.order() > MAX_ORDER {
            return Err(FilterError::CoefficientMismatch);
        }
        if !coeffs.is_normalized() {
            return Err(FilterError::NotNormalized);
        }
        self.x_hist = [0.0; MAX_COEFFS];
        self.y_hist = [0.0; MAX_COEFFS];
        self.coeffs = Some(coeffs);
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.coeffs.is_some()
    }

    pub fn coefficients(&self) -> Option<&FilterCoefficients> {
        self.coeffs.as_ref()
    }

    fn active(&self) -> &FilterCoefficients {
        match self.coeffs {
            Some(ref c) => c,
            None => panic!("IIR filter used before coefficients were set"),
        }
    }

    /// Filters one sample.
    ///
    /// # Panics
    ///
    /// Panics if the filter has no coefficients.
    pub fn process(&mut self, x: f64) -> f64 {
        let order = self.active().order();
        if order == 0 {
            return x;
        }
        let coeffs = *self.active();

        self.x_hist.copy_within(0..order, 1);
        self.x_hist[0] = x;

        let mut y = 0.0;
        for (b, x_prev) in coeffs.b().iter().zip(self.x_hist.iter()) {
            y += b * x_prev;
        }
        // y_hist[0] still holds y[n-1] at this point.
        for (a, y_prev) in coeffs.a()[1..].iter().zip(self.y_hist.iter()) {
            y -= a * y_prev;
        }

        self.y_hist.copy_within(0..order, 1);
        self.y_hist[0] = y;
        y
    }

    /// Filters a batch of samples in order.
    pub fn process_batch(&mut self, input: &[f64]) -> Vec<f64> {
        input.iter().map(|x| self.process(*x)).collect()
    }

    /// Sets every active history slot to `value`, as if the filter had been
    /// fed `value` forever.
    ///
    /// # Panics
    ///
    /// Panics if the filter has no coefficients.
    pub fn reset(&mut self, value: f64) {
        let active = self.active().order() + 1;
        for slot in self.x_hist[..active].iter_mut() {
            *slot = value;
        }
        for slot in self.y_hist[..active].iter_mut() {
            *slot = value;
        }
    }
}
