//! Per-line pressure and Doppler widths, pressure shift and medium
//! conversion.

pub mod medium;
pub mod profile;

pub use medium::{
    air_refractive_index, air_to_vacuum_wavenumber, to_medium, to_vacuum,
    vacuum_to_air_wavenumber,
};
pub use profile::{gaussian, lorentzian, voigt_fwhm};

use crate::common::constants::{ATM_TO_BAR, BOLTZMANN, LN2, SPEED_OF_LIGHT_SI};
use crate::common::molecules::molecular_mass_kg;
use crate::domain::Medium;
use crate::population::ScaledLine;

/// Derived per-call line: position in the medium, widths and intensities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroadenedLine {
    /// Shifted line center in the wavenumbers of the medium, cm-1.
    pub position: f64,
    pub intensity: f64,
    pub emission: f64,
    pub hwhm_lorentz: f64,
    pub hwhm_gauss: f64,
}

impl BroadenedLine {
    pub fn fwhm(&self) -> f64 {
        voigt_fwhm(self.hwhm_lorentz, self.hwhm_gauss)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroadeningConditions {
    /// Translational temperature, K.
    pub temperature: f64,
    pub reference_temperature: f64,
    /// Total pressure, bar.
    pub pressure: f64,
    pub mole_fraction: f64,
    pub medium: Medium,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadeningReport {
    /// Lines broadened with the air coefficient in place of a missing
    /// self-broadening coefficient.
    pub missing_self_broadening: usize,
}

/// Lorentzian HWHM, cm-1: `p [(1-x) g_air (Tref/T)^n_air + x g_self (Tref/T)^n_self]`
/// with `p` in atm. Returns the width and whether the air coefficient stood
/// in for a missing self coefficient.
pub fn lorentzian_hwhm(line: &crate::lines::Line, conditions: &BroadeningConditions) -> (f64, bool) {
    let pressure_atm = conditions.pressure / ATM_TO_BAR;
    let ratio = conditions.reference_temperature / conditions.temperature;
    let x = conditions.mole_fraction;

    let air = line.air_broadening * ratio.powf(line.air_temperature_exponent);
    let fallback = line.self_broadening.is_none();
    let self_broadening = line.self_broadening.unwrap_or(line.air_broadening);
    let self_exponent = line
        .self_temperature_exponent
        .unwrap_or(line.air_temperature_exponent);
    let own = self_broadening * ratio.powf(self_exponent);

    (pressure_atm * ((1.0 - x) * air + x * own), fallback && x > 0.0)
}

/// Doppler HWHM, cm-1.
pub fn gaussian_hwhm(wavenumber: f64, temperature: f64, molar_mass: f64) -> f64 {
    let mass = molecular_mass_kg(molar_mass);
    wavenumber / SPEED_OF_LIGHT_SI * (2.0 * LN2 * BOLTZMANN * temperature / mass).sqrt()
}

pub fn broaden(lines: &[ScaledLine<'_>], conditions: &BroadeningConditions) -> (Vec<BroadenedLine>, BroadeningReport) {
    let pressure_atm = conditions.pressure / ATM_TO_BAR;
    let mut report = BroadeningReport::default();

    let broadened = lines
        .iter()
        .map(|scaled| {
            let line = scaled.line;
            let (hwhm_lorentz, fallback) = lorentzian_hwhm(line, conditions);
            if fallback {
                report.missing_self_broadening += 1;
            }
            let shifted = line.wavenumber + line.pressure_shift * pressure_atm;
            let hwhm_gauss = gaussian_hwhm(shifted, conditions.temperature, scaled.molar_mass);

            let position = to_medium(shifted, conditions.medium);
            // Widths stretch with the local index of refraction.
            let stretch = position / shifted;
            BroadenedLine {
                position,
                intensity: scaled.intensity,
                emission: scaled.emission,
                hwhm_lorentz: hwhm_lorentz * stretch,
                hwhm_gauss: hwhm_gauss * stretch,
            }
        })
        .collect();

    (broadened, report)
}
