//! Butterworth low pass coefficient synthesis.
//!
//! Analog poles are placed evenly on the left half of the unit circle, scaled
//! to a pre-warped cutoff, and mapped into the z plane with the bilinear
//! transform. All N zeros of the digital filter sit at z = -1. The numerator is
//! scaled so that the DC gain is exactly one.
//!
//! Coefficients are stored highest power of z first, so for a second order
//! filter `a = [1, a1, a2]` describes `z^2 + a1 z + a2`. Dividing through by
//! `z^N` shows that `a[k]` and `b[k]` weight the sample `k` steps in the past,
//! which is the convention [`DirectFormIir`](../iir/struct.DirectFormIir.html)
//! relies on.
//!
//! High orders at cutoffs far below the sample rate put every pole close to
//! z = 1. The expanded denominator then cancels almost completely at DC, and
//! rounding its coefficients either biases the DC gain or pushes poles out of
//! the unit circle. `synthesize` rejects such specs with
//! `FilterError::IllConditioned` or `FilterError::Unstable`.

use crate::filter::{FilterError, A0_TOLERANCE};
use crate::util::math;
use num::complex::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Highest filter order that fits into the fixed coefficient storage.
pub const MAX_ORDER: usize = 10;
pub const MAX_COEFFS: usize = MAX_ORDER + 1;

/// Poles of a synthesized filter must lie within this distance inside the
/// unit circle.
pub const STABILITY_MARGIN: f64 = 1e-6;

/// Largest accepted estimate of the relative DC error caused by rounding the
/// denominator to `f64`.
pub const MAX_DC_BIAS: f64 = 1e-6;

/// The requested shape of a Butterworth low pass filter.
///
/// The cutoff is given in rad/s, matching how the sensor pipeline is
/// configured; synthesis works in Hz.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub order: usize,
    pub cutoff_radps: f64,
    pub sample_rate_hz: f64,
}

impl FilterSpec {
    /// Creates a validated `FilterSpec`.
    ///
    /// # Arguments
    ///
    /// * `order` - Filter order, on interval [1, MAX_ORDER].
    /// * `cutoff_radps` - Cutoff frequency in rad/s.
    /// * `sample_rate_hz` - Rate at which samples are fed to the filter.
    ///
    /// # Examples
    ///
    /// ```
    /// use imu_filter_rs::filter::butterworth::FilterSpec;
    /// use imu_filter_rs::filter::FilterError;
    ///
    /// assert!(FilterSpec::new(2, 70.0, 400.0).is_ok());
    /// // 2000 rad/s is roughly 318 Hz, above the 200 Hz Nyquist limit.
    /// assert_eq!(
    ///     FilterSpec::new(2, 2000.0, 400.0),
    ///     Err(FilterError::CutoffAboveNyquist)
    /// );
    /// ```
    pub fn new(
        order: usize,
        cutoff_radps: f64,
        sample_rate_hz: f64,
    ) -> Result<FilterSpec, FilterError> {
        let spec = FilterSpec {
            order,
            cutoff_radps,
            sample_rate_hz,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn cutoff_hz(&self) -> f64 {
        self.cutoff_radps / (2.0 * PI)
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        validate(self.order, self.cutoff_hz(), self.sample_rate_hz)
    }

    /// Synthesizes the coefficients described by this spec.
    pub fn synthesize(&self) -> Result<FilterCoefficients, FilterError> {
        synthesize(self.order, self.cutoff_hz(), self.sample_rate_hz)
    }
}

/// Recursive filter coefficients, highest power first with `a[0] == 1`.
///
/// Backed by fixed storage of `MAX_COEFFS` entries; only the first
/// `order + 1` are meaningful and the rest are always zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterCoefficients {
    a: [f64; MAX_COEFFS],
    b: [f64; MAX_COEFFS],
    order: usize,
}

impl FilterCoefficients {
    /// Builds a coefficient set from denominator `a` and numerator `b`.
    ///
    /// Both sequences must be non-empty, of equal length, and at most
    /// `MAX_COEFFS` long. The order is one less than their length.
    pub fn new(a: &[f64], b: &[f64]) -> Result<FilterCoefficients, FilterError> {
        if a.is_empty() || a.len() != b.len() || a.len() > MAX_COEFFS {
            return Err(FilterError::CoefficientMismatch);
        }
        let mut coeffs = FilterCoefficients {
            a: [0.0; MAX_COEFFS],
            b: [0.0; MAX_COEFFS],
            order: a.len() - 1,
        };
        coeffs.a[..a.len()].copy_from_slice(a);
        coeffs.b[..b.len()].copy_from_slice(b);
        Ok(coeffs)
    }

    /// An order zero set that passes samples through unchanged.
    pub fn passthrough() -> FilterCoefficients {
        let mut coeffs = FilterCoefficients {
            a: [0.0; MAX_COEFFS],
            b: [0.0; MAX_COEFFS],
            order: 0,
        };
        coeffs.a[0] = 1.0;
        coeffs.b[0] = 1.0;
        coeffs
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Denominator coefficients, `order + 1` long.
    pub fn a(&self) -> &[f64] {
        &self.a[..=self.order]
    }

    /// Numerator coefficients, `order + 1` long.
    pub fn b(&self) -> &[f64] {
        &self.b[..=self.order]
    }

    pub fn is_normalized(&self) -> bool {
        (self.a[0] - 1.0).abs() <= A0_TOLERANCE
    }

    /// Ratio of output to input for a constant signal, `sum(b) / sum(a)`.
    pub fn dc_gain(&self) -> f64 {
        self.b().iter().sum::<f64>() / self.a().iter().sum::<f64>()
    }

    /// Roots of the denominator polynomial.
    pub fn poles(&self) -> Vec<Complex<f64>> {
        math::poly_roots(self.a())
    }
}

fn validate(
    order: usize,
    cutoff_hz: f64,
    sample_rate_hz: f64,
) -> Result<(), FilterError> {
    if order < 1 || order > MAX_ORDER {
        return Err(FilterError::InvalidOrder);
    }
    if !sample_rate_hz.is_finite() || sample_rate_hz <= 0.0 {
        return Err(FilterError::InvalidSampleRate);
    }
    if !cutoff_hz.is_finite() || cutoff_hz <= 0.0 {
        return Err(FilterError::InvalidCutoff);
    }
    if cutoff_hz >= sample_rate_hz / 2.0 {
        return Err(FilterError::CutoffAboveNyquist);
    }
    Ok(())
}

/// Synthesizes a digital Butterworth low pass filter.
///
/// # Arguments
///
/// * `order` - Filter order, on interval [1, MAX_ORDER].
/// * `cutoff_hz` - Cutoff frequency in Hz, strictly below `sample_rate_hz / 2`.
/// * `sample_rate_hz` - Sample rate in Hz.
///
/// # Examples
///
/// ```
/// use imu_filter_rs::filter::butterworth::synthesize;
///
/// let coeffs = synthesize(2, 70.0, 400.0).unwrap();
/// assert_eq!(coeffs.order(), 2);
/// assert_eq!(coeffs.a()[0], 1.0);
/// assert!((coeffs.dc_gain() - 1.0).abs() < 1e-9);
/// ```
pub fn synthesize(
    order: usize,
    cutoff_hz: f64,
    sample_rate_hz: f64,
) -> Result<FilterCoefficients, FilterError> {
    validate(order, cutoff_hz, sample_rate_hz)?;

    // Pre-warp so the digital cutoff lands where the analog one was asked for.
    let warped_hz = sample_rate_hz / PI * (PI * cutoff_hz / sample_rate_hz).tan();
    let scale = 2.0 * PI * warped_hz;

    let one = Complex::new(1.0, 0.0);
    let poles: Vec<Complex<f64>> = (1..=order)
        .map(|k| {
            let theta = (2 * k - 1) as f64 * PI / (2 * order) as f64;
            let analog = Complex::new(-theta.sin(), theta.cos()) * scale;
            let s = analog / (2.0 * sample_rate_hz);
            (one + s) / (one - s)
        })
        .collect();
    let zeros = vec![Complex::new(-1.0, 0.0); order];

    let den = math::poly(&poles);
    let num = math::poly(&zeros);
    let den_sum: Complex<f64> = den.iter().cloned().sum();
    let num_sum: Complex<f64> = num.iter().cloned().sum();
    let gain = den_sum / num_sum;

    let a: Vec<f64> = den.iter().map(|c| c.re).collect();
    let b: Vec<f64> = num.iter().map(|c| (*c * gain).re).collect();
    assert!(
        (a[0] - 1.0).abs() <= A0_TOLERANCE,
        "synthesized denominator is not monic: a[0] = {}",
        a[0]
    );

    check_conditioning(&poles, &a)?;
    let coeffs = FilterCoefficients::new(&a, &b)?;
    if coeffs
        .poles()
        .iter()
        .any(|p| p.norm() >= 1.0 - STABILITY_MARGIN)
    {
        return Err(FilterError::Unstable);
    }
    Ok(coeffs)
}

/// Compares the rounding error of the denominator against its exact value at
/// DC, `prod(1 - p)`, which is computed from the poles without cancellation.
fn check_conditioning(
    poles: &[Complex<f64>],
    a: &[f64],
) -> Result<(), FilterError> {
    let one = Complex::new(1.0, 0.0);
    let exact_dc = poles
        .iter()
        .fold(one, |acc, p| acc * (one - *p))
        .norm();
    let rounding: f64 = a.iter().map(|c| c.abs()).sum::<f64>() * std::f64::EPSILON;
    if !(rounding <= MAX_DC_BIAS * exact_dc) {
        return Err(FilterError::IllConditioned);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use crate::filter::butterworth::*;
    use crate::filter::iir::DirectFormIir;
    use assert_approx_eq::assert_approx_eq;
    use rand::{thread_rng, Rng};

    #[test]
    fn test_second_order_reference() {
        let coeffs = synthesize(2, 70.0, 400.0).unwrap();
        let a = [1.0, -0.557_030_997_311_750_8, 0.226_966_197_819_818];
        let b = [0.167_483_800_127_016_8, 0.334_967_600_254_033_6, 0.167_483_800_127_016_8];
        assert_eq!(coeffs.a().len(), 3);
        assert_eq!(coeffs.b().len(), 3);
        for (x, y) in coeffs.a().iter().zip(a.iter()) {
            assert_approx_eq!(x, y, 1e-12);
        }
        for (x, y) in coeffs.b().iter().zip(b.iter()) {
            assert_approx_eq!(x, y, 1e-12);
        }
    }

    #[test]
    fn test_first_order_reference() {
        let coeffs = synthesize(1, 10.0, 400.0).unwrap();
        assert_approx_eq!(coeffs.a()[1], -0.854_080_685_463_466_6, 1e-12);
        assert_approx_eq!(coeffs.b()[0], 0.072_959_657_268_266_7, 1e-12);
        assert_approx_eq!(coeffs.b()[1], 0.072_959_657_268_266_7, 1e-12);
    }

    #[test]
    fn test_spec_converts_radps() {
        // 70 rad/s at 400 Hz, as the angular rate channel configures it.
        let coeffs = FilterSpec::new(2, 70.0, 400.0).unwrap().synthesize().unwrap();
        assert_approx_eq!(coeffs.a()[1], -1.753_566_203_341_903_5, 1e-12);
        assert_approx_eq!(coeffs.a()[2], 0.780_764_642_833_694, 1e-12);
        assert_approx_eq!(coeffs.b()[1], 0.013_599_219_745_895_23, 1e-12);
    }

    #[test]
    fn test_invalid_specs() {
        assert_eq!(synthesize(0, 10.0, 400.0), Err(FilterError::InvalidOrder));
        assert_eq!(
            synthesize(MAX_ORDER + 1, 10.0, 400.0),
            Err(FilterError::InvalidOrder)
        );
        assert_eq!(
            synthesize(2, 200.0, 400.0),
            Err(FilterError::CutoffAboveNyquist)
        );
        assert_eq!(
            synthesize(2, 250.0, 400.0),
            Err(FilterError::CutoffAboveNyquist)
        );
        assert_eq!(synthesize(2, 0.0, 400.0), Err(FilterError::InvalidCutoff));
        assert_eq!(
            synthesize(2, 10.0, 0.0),
            Err(FilterError::InvalidSampleRate)
        );
        assert_eq!(
            synthesize(2, std::f64::NAN, 400.0),
            Err(FilterError::InvalidCutoff)
        );
        assert!(FilterError::CutoffAboveNyquist.is_invalid_spec());
    }

    #[test]
    fn test_max_order_fits_storage() {
        let coeffs = synthesize(MAX_ORDER, 50.0, 400.0).unwrap();
        assert_eq!(coeffs.order(), MAX_ORDER);
        assert_eq!(coeffs.a().len(), MAX_COEFFS);
        assert_eq!(coeffs.b().len(), MAX_COEFFS);
    }

    #[test]
    fn test_numerator_is_scaled_binomial() {
        let coeffs = synthesize(4, 50.0, 1000.0).unwrap();
        let b = coeffs.b();
        let binomial = [1.0, 4.0, 6.0, 4.0, 1.0];
        for (x, y) in b.iter().zip(binomial.iter()) {
            assert_approx_eq!(x / b[0], y, 1e-9);
        }
    }

    fn assert_stable_and_unbiased(coeffs: &FilterCoefficients, label: &str) {
        assert!(coeffs.is_normalized());
        let poles = coeffs.poles();
        assert_eq!(poles.len(), coeffs.order());
        for pole in poles.iter() {
            assert!(pole.norm() < 1.0, "unstable pole {} for {}", pole, label);
        }

        // A filter seeded at steady state must stay there when the input
        // holds still.
        let mut filter = DirectFormIir::new(*coeffs).unwrap();
        filter.reset(1.0);
        let mut y = 0.0;
        for _ in 0..2000 {
            y = filter.process(1.0);
        }
        assert!((y - 1.0).abs() < 1e-5, "DC output {} for {}", y, label);
    }

    #[test]
    // Sweeps random specs across sample rates and cutoffs. Accepted specs
    // must be stable with unity DC gain, and rejected ones must be rejected
    // as ill conditioned rather than for a range error.
    fn test_random_specs_are_stable() {
        let mut rng = thread_rng();
        for _ in 0..200 {
            let order = rng.gen_range(1, MAX_ORDER + 1);
            let fs = rng.gen_range(50.0, 2000.0);
            let fc = fs * rng.gen_range(0.001, 0.45);
            let label = format!("order {} fc {} fs {}", order, fc, fs);
            match synthesize(order, fc, fs) {
                Ok(coeffs) => assert_stable_and_unbiased(&coeffs, &label),
                Err(e) => assert!(
                    e == FilterError::IllConditioned || e == FilterError::Unstable,
                    "unexpected {:?} for {}",
                    e,
                    label
                ),
            }
        }
    }

    #[test]
    // Every order over the configurable cutoff range at 400 Hz.
    fn test_sensor_range_is_stable_or_rejected() {
        let cutoffs = [
            1.0, 2.0, 3.0, 5.0, 8.0, 10.0, 15.0, 20.0, 30.0, 50.0, 70.0, 100.0,
            200.0, 400.0,
        ];
        for order in 1..=MAX_ORDER {
            for radps in cutoffs.iter() {
                let label = format!("order {} at {} rad/s", order, radps);
                match FilterSpec::new(order, *radps, 400.0).unwrap().synthesize() {
                    Ok(coeffs) => assert_stable_and_unbiased(&coeffs, &label),
                    Err(e) => assert!(e.is_invalid_spec(), "{:?} for {}", e, label),
                }
            }
        }
    }

    #[test]
    fn test_rejects_ill_conditioned() {
        for &(order, radps) in [(10, 1.0), (8, 1.0), (6, 1.0), (10, 20.0)].iter() {
            let res = FilterSpec::new(order, radps, 400.0).unwrap().synthesize();
            match res {
                Err(FilterError::IllConditioned) | Err(FilterError::Unstable) => (),
                other => panic!("order {} at {} rad/s gave {:?}", order, radps, other),
            }
        }
        assert!(FilterError::IllConditioned.is_invalid_spec());
        assert!(FilterError::Unstable.is_invalid_spec());

        // Low orders stay usable all the way down to 1 rad/s.
        for order in 1..=3 {
            let coeffs = FilterSpec::new(order, 1.0, 400.0).unwrap().synthesize();
            assert!(coeffs.is_ok());
        }
    }

    #[test]
    fn test_coefficients_new() {
        assert_eq!(
            FilterCoefficients::new(&[], &[]),
            Err(FilterError::CoefficientMismatch)
        );
        assert_eq!(
            FilterCoefficients::new(&[1.0, 0.5], &[1.0]),
            Err(FilterError::CoefficientMismatch)
        );
        assert_eq!(
            FilterCoefficients::new(&[1.0; MAX_COEFFS + 1], &[1.0; MAX_COEFFS + 1]),
            Err(FilterError::CoefficientMismatch)
        );
        let coeffs = FilterCoefficients::new(&[1.0, -0.5], &[0.25, 0.25]).unwrap();
        assert_eq!(coeffs.order(), 1);
        assert_eq!(coeffs.a(), &[1.0, -0.5]);
        assert_approx_eq!(coeffs.dc_gain(), 1.0);
    }

    #[test]
    fn test_passthrough() {
        let coeffs = FilterCoefficients::passthrough();
        assert_eq!(coeffs.order(), 0);
        assert_eq!(coeffs.a(), &[1.0]);
        assert_eq!(coeffs.b(), &[1.0]);
    }
}
