use num::complex::Complex;
use num::Zero;

const ROOT_MAX_ITER: usize = 500;
const ROOT_TOLERANCE: f64 = 1e-12;

/// Calculates the coefficients of the monic polynomial with the specified
/// roots.
///
/// The result is ordered highest power first, so `poly(&[r])` yields
/// `[1, -r]`. All arithmetic stays complex; callers expecting a real
/// polynomial should only take real parts once they are done combining the
/// coefficients.
///
/// # Arguments
///
/// * `roots` - Roots of the polynomial, in any order.
///
/// # Examples
///
/// ```
/// use imu_filter_rs::util::math::poly;
/// use num::Complex;
///
/// // (z - 1)(z + 1) = z^2 - 1
/// let coeffs = poly(&[Complex::new(1.0, 0.0), Complex::new(-1.0, 0.0)]);
/// assert_eq!(coeffs, vec![
///     Complex::new(1.0, 0.0),
///     Complex::new(0.0, 0.0),
///     Complex::new(-1.0, 0.0),
/// ]);
/// ```
pub fn poly(roots: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let mut coeffs = vec![Complex::new(1.0, 0.0)];
    for root in roots {
        let mut next = vec![Complex::zero(); coeffs.len() + 1];
        for (ix, c) in coeffs.iter().enumerate() {
            next[ix] = next[ix] + *c;
            next[ix + 1] = next[ix + 1] - *c * *root;
        }
        coeffs = next;
    }
    coeffs
}

/// Evaluates a polynomial stored highest power first at `z` using Horner's
/// method.
pub fn polyval(coeffs: &[Complex<f64>], z: Complex<f64>) -> Complex<f64> {
    coeffs
        .iter()
        .fold(Complex::zero(), |acc, c| acc * z + *c)
}

/// Finds all roots of a real polynomial stored highest power first using
/// Durand-Kerner iteration.
///
/// Returns an empty vector for constant polynomials or when the leading
/// coefficient is zero.
///
/// # Examples
///
/// ```
/// use imu_filter_rs::util::math::poly_roots;
///
/// // z^2 - 0.25 has roots at +/- 0.5
/// let mut roots: Vec<f64> = poly_roots(&[1.0, 0.0, -0.25])
///     .iter()
///     .map(|r| r.re)
///     .collect();
/// roots.sort_by(|a, b| a.partial_cmp(b).unwrap());
/// assert!((roots[0] + 0.5).abs() < 1e-9);
/// assert!((roots[1] - 0.5).abs() < 1e-9);
/// ```
pub fn poly_roots(coeffs: &[f64]) -> Vec<Complex<f64>> {
    if coeffs.len() < 2 || coeffs[0] == 0.0 {
        return vec![];
    }
    let degree = coeffs.len() - 1;
    let lead = coeffs[0];
    let monic: Vec<Complex<f64>> = coeffs
        .iter()
        .map(|c| Complex::new(c / lead, 0.0))
        .collect();

    // Powers of a seed that is neither real nor a root of unity keep the
    // initial guesses distinct.
    let seed = Complex::new(0.4, 0.9);
    let mut roots = Vec::with_capacity(degree);
    let mut guess = Complex::new(1.0, 0.0);
    for _ in 0..degree {
        roots.push(guess);
        guess = guess * seed;
    }

    for _ in 0..ROOT_MAX_ITER {
        let mut largest_step = 0.0_f64;
        for ix in 0..degree {
            let mut denom = Complex::new(1.0, 0.0);
            for jx in 0..degree {
                if ix != jx {
                    denom = denom * (roots[ix] - roots[jx]);
                }
            }
            let step = polyval(&monic, roots[ix]) / denom;
            roots[ix] = roots[ix] - step;
            largest_step = largest_step.max(step.norm());
        }
        if largest_step < ROOT_TOLERANCE {
            break;
        }
    }
    roots
}

#[cfg(test)]
mod test {
    use crate::util::math::*;
    use assert_approx_eq::assert_approx_eq;
    use num::Complex;

    #[test]
    fn test_poly_conjugate_pair_is_real() {
        let roots = [Complex::new(0.3, 0.4), Complex::new(0.3, -0.4)];
        let coeffs = poly(&roots);
        // z^2 - 0.6z + 0.25
        assert_approx_eq!(coeffs[0].re, 1.0);
        assert_approx_eq!(coeffs[1].re, -0.6);
        assert_approx_eq!(coeffs[2].re, 0.25);
        for c in coeffs.iter() {
            assert_approx_eq!(c.im, 0.0);
        }
    }

    #[test]
    fn test_poly_binomial() {
        let coeffs = poly(&vec![Complex::new(-1.0, 0.0); 4]);
        let expected = [1.0, 4.0, 6.0, 4.0, 1.0];
        for (c, e) in coeffs.iter().zip(expected.iter()) {
            assert_approx_eq!(c.re, *e);
        }
    }

    #[test]
    fn test_polyval() {
        let coeffs = vec![
            Complex::new(2.0, 0.0),
            Complex::new(-3.0, 0.0),
            Complex::new(1.0, 0.0),
        ];
        let val = polyval(&coeffs, Complex::new(3.0, 0.0));
        assert_approx_eq!(val.re, 10.0);
        assert_approx_eq!(val.im, 0.0);
    }

    #[test]
    fn test_poly_roots_recovers_roots() {
        let expected = [
            Complex::new(0.5, 0.25),
            Complex::new(0.5, -0.25),
            Complex::new(-0.7, 0.0),
        ];
        let coeffs: Vec<f64> = poly(&expected).iter().map(|c| c.re).collect();
        let found = poly_roots(&coeffs);
        assert_eq!(found.len(), 3);
        for root in expected.iter() {
            let nearest = found
                .iter()
                .map(|f| (f - root).norm())
                .fold(std::f64::INFINITY, f64::min);
            assert!(nearest < 1e-9, "root {} not found", root);
        }
    }

    #[test]
    fn test_poly_roots_degenerate() {
        assert!(poly_roots(&[1.0]).is_empty());
        assert!(poly_roots(&[0.0, 1.0]).is_empty());
    }
}
