use num_complex::Complex64;
use std::f64::consts::{LN_2, PI};

const SQRT_PI: f64 = 1.772_453_850_905_516;

/// Humlicek (1982) W4 rational approximation of the Faddeeva function
/// `w(z) = exp(-z^2) erfc(-iz)` for `Im z >= 0`.
///
/// The four regions keep the relative error of `Re w` below 1e-4 over the
/// whole upper half plane, which bounds the Voigt profile error to < 0.01 %
/// of the local value.
pub fn faddeeva_humlicek(x: f64, y: f64) -> Complex64 {
    let t = Complex64::new(y, -x);
    let s = x.abs() + y;

    if s >= 15.0 {
        return t * 0.564_189_6 / (t * t + 0.5);
    }

    if s >= 5.5 {
        let u = t * t;
        return t * (u * 0.564_189_6 + 1.410_474) / (u * (u + 3.0) + 0.75);
    }

    if y >= 0.195 * x.abs() - 0.176 {
        let numerator = ((((t * 0.564_223_6 + 3.778_987) * t + 11.964_82) * t + 20.209_33) * t)
            + 16.495_5;
        let denominator = (((((t + 6.699_398) * t + 21.692_74) * t + 39.271_21) * t
            + 38.823_63)
            * t)
            + 16.495_5;
        return numerator / denominator;
    }

    let u = t * t;
    let numerator = alternating_horner(
        u,
        Complex64::new(1.320_522, 0.0) - u * 0.564_19,
        &[35.766_83, 219.031_3, 1_540.787, 3_321.990_5, 36_183.31],
    );
    let denominator = alternating_horner(
        u,
        Complex64::new(1.841_439, 0.0) - u,
        &[61.570_37, 364.219_1, 2_186.181, 9_022.228, 24_322.84, 32_066.6],
    );
    u.exp() - t * numerator / denominator
}

/// Evaluates `c_n - u (c_{n-1} - u (... - u * innermost))` from the inside out.
fn alternating_horner(u: Complex64, innermost: Complex64, coefficients: &[f64]) -> Complex64 {
    coefficients
        .iter()
        .fold(innermost, |accumulator, &coefficient| {
            Complex64::new(coefficient, 0.0) - u * accumulator
        })
}

/// Area-normalized Voigt profile evaluated at `offset` (cm-1) from the line
/// center for Lorentzian and Gaussian half widths at half maximum (cm-1).
pub fn voigt_humlicek(offset: f64, hwhm_lorentz: f64, hwhm_gauss: f64) -> f64 {
    if hwhm_gauss <= 0.0 {
        return hwhm_lorentz / PI / (offset * offset + hwhm_lorentz * hwhm_lorentz);
    }

    let sigma_sqrt2 = hwhm_gauss / LN_2.sqrt();
    let x = offset / sigma_sqrt2;
    let y = hwhm_lorentz.max(0.0) / sigma_sqrt2;
    faddeeva_humlicek(x, y).re / (sigma_sqrt2 * SQRT_PI)
}
