//! Physical constants (CODATA 2018) shared by the synthesis kernels.
//!
//! Spectroscopic quantities use cm-1 and Kelvin; radiative quantities are
//! expressed with the speed of light in cm/s so that intensities come out in
//! cm-1/(molecule.cm-2) and radiances in W/cm2/sr/cm-1.

/// Planck constant, J.s.
pub const PLANCK: f64 = 6.626_070_15e-34;
/// Boltzmann constant, J/K.
pub const BOLTZMANN: f64 = 1.380_649e-23;
/// Speed of light, m/s.
pub const SPEED_OF_LIGHT_SI: f64 = 299_792_458.0;
/// Speed of light, cm/s.
pub const SPEED_OF_LIGHT_CGS: f64 = SPEED_OF_LIGHT_SI * 100.0;
/// Avogadro constant, 1/mol.
pub const AVOGADRO: f64 = 6.022_140_76e23;
/// Second radiation constant hc/k, cm.K.
pub const C2: f64 = PLANCK * SPEED_OF_LIGHT_CGS / BOLTZMANN;
/// Reference temperature of HITRAN-style line lists, K.
pub const TREF_HITRAN: f64 = 296.0;
/// One standard atmosphere, bar.
pub const ATM_TO_BAR: f64 = 1.013_25;
/// Pascals per bar.
pub const BAR_TO_PA: f64 = 1.0e5;
pub const LN2: f64 = std::f64::consts::LN_2;

#[cfg(test)]
mod tests {
    use super::{AVOGADRO, BOLTZMANN, C2, PLANCK, SPEED_OF_LIGHT_CGS, SPEED_OF_LIGHT_SI};

    #[test]
    fn second_radiation_constant_matches_reference_value() {
        assert!((C2 - 1.438_776_877).abs() < 1.0e-9);
        assert_eq!(SPEED_OF_LIGHT_CGS, 100.0 * SPEED_OF_LIGHT_SI);
    }

    #[test]
    fn constants_remain_finite_and_positive() {
        for value in [PLANCK, BOLTZMANN, AVOGADRO, C2] {
            assert!(value.is_finite());
            assert!(value > 0.0);
        }
    }
}
