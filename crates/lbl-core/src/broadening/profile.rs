//! Voigt lineshape approximations. All profiles are area-normalized in
//! cm and take half widths at half maximum.

use crate::common::config::VoigtApproximation;
use crate::numerics::voigt_humlicek;
use std::f64::consts::{LN_2, PI};

/// Olivero & Longbothum (1977) Voigt FWHM, accurate to 0.02 %.
pub fn voigt_fwhm(hwhm_lorentz: f64, hwhm_gauss: f64) -> f64 {
    let fwhm_lorentz = 2.0 * hwhm_lorentz;
    let fwhm_gauss = 2.0 * hwhm_gauss;
    0.5346 * fwhm_lorentz + (0.2166 * fwhm_lorentz * fwhm_lorentz + fwhm_gauss * fwhm_gauss).sqrt()
}

pub fn lorentzian(offset: f64, hwhm: f64) -> f64 {
    hwhm / PI / (offset * offset + hwhm * hwhm)
}

pub fn gaussian(offset: f64, hwhm: f64) -> f64 {
    (LN_2 / PI).sqrt() / hwhm * (-LN_2 * (offset / hwhm).powi(2)).exp()
}

impl VoigtApproximation {
    /// Profile value at `offset` from the line center, 1/cm-1.
    pub fn evaluate(self, offset: f64, hwhm_lorentz: f64, hwhm_gauss: f64) -> f64 {
        match self {
            Self::Humlicek => voigt_humlicek(offset, hwhm_lorentz, hwhm_gauss),
            Self::Whiting => whiting(offset, hwhm_lorentz, hwhm_gauss),
            Self::PseudoVoigt => pseudo_voigt(offset, hwhm_lorentz, hwhm_gauss),
        }
    }

    pub fn peak(self, hwhm_lorentz: f64, hwhm_gauss: f64) -> f64 {
        self.evaluate(0.0, hwhm_lorentz, hwhm_gauss)
    }

    /// Documented maximum relative error in the profile core.
    pub const fn core_error_bound(self) -> f64 {
        match self {
            Self::Humlicek => 1.0e-4,
            Self::Whiting => 2.0e-2,
            Self::PseudoVoigt => 1.5e-2,
        }
    }
}

/// Whiting (1968) empirical Voigt shape with Olivero's width.
fn whiting(offset: f64, hwhm_lorentz: f64, hwhm_gauss: f64) -> f64 {
    let fwhm = voigt_fwhm(hwhm_lorentz, hwhm_gauss);
    if fwhm <= 0.0 {
        return 0.0;
    }
    let ratio = 2.0 * hwhm_lorentz / fwhm;
    let y = (offset / fwhm).abs();
    let y225 = y.powf(2.25);
    let shape = (1.0 - ratio) * (-4.0 * LN_2 * y * y).exp()
        + ratio / (1.0 + 4.0 * y * y)
        + 0.016 * (1.0 - ratio) * ratio * ((-0.4 * y225).exp() - 10.0 / (10.0 + y225));
    let peak = 1.0 / (fwhm * (1.065 + 0.447 * ratio + 0.058 * ratio * ratio));
    shape * peak
}

/// Thompson-Cox-Hastings pseudo-Voigt.
fn pseudo_voigt(offset: f64, hwhm_lorentz: f64, hwhm_gauss: f64) -> f64 {
    let fl = 2.0 * hwhm_lorentz;
    let fg = 2.0 * hwhm_gauss;
    let f = (fg.powi(5)
        + 2.692_69 * fg.powi(4) * fl
        + 2.428_43 * fg.powi(3) * fl.powi(2)
        + 4.471_63 * fg.powi(2) * fl.powi(3)
        + 0.078_42 * fg * fl.powi(4)
        + fl.powi(5))
    .powf(0.2);
    if f <= 0.0 {
        return 0.0;
    }
    let q = fl / f;
    let eta = (1.366_03 * q - 0.477_19 * q * q + 0.111_16 * q * q * q).clamp(0.0, 1.0);
    let half = 0.5 * f;
    eta * lorentzian(offset, half) + (1.0 - eta) * gaussian(offset, half)
}

#[cfg(test)]
mod tests {
    use super::{gaussian, lorentzian, voigt_fwhm};
    use crate::common::config::VoigtApproximation;

    #[test]
    fn fwhm_reduces_to_component_widths() {
        assert!((voigt_fwhm(0.05, 0.0) - 0.1).abs() < 2.0e-4 * 0.1);
        assert!((voigt_fwhm(0.0, 0.05) - 0.1).abs() < 1.0e-12);
    }

    #[test]
    fn approximations_agree_with_humlicek_within_documented_bounds() {
        for (hwhm_lorentz, hwhm_gauss) in [(0.07, 0.003), (0.02, 0.02), (0.003, 0.01)] {
            let reference = VoigtApproximation::Humlicek.peak(hwhm_lorentz, hwhm_gauss);
            for approximation in [VoigtApproximation::Whiting, VoigtApproximation::PseudoVoigt] {
                let value = approximation.peak(hwhm_lorentz, hwhm_gauss);
                assert!(
                    (value / reference - 1.0).abs() <= approximation.core_error_bound(),
                    "{approximation:?} gammaL={hwhm_lorentz} gammaG={hwhm_gauss}"
                );
            }
        }
    }

    #[test]
    fn component_shapes_are_normalized_at_half_maximum() {
        let hwhm = 0.04;
        assert!((lorentzian(hwhm, hwhm) / lorentzian(0.0, hwhm) - 0.5).abs() < 1.0e-12);
        assert!((gaussian(hwhm, hwhm) / gaussian(0.0, hwhm) - 0.5).abs() < 1.0e-12);
    }
}
