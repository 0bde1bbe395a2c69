//! Spectrum assembler: physical quantities derived from the absorption and
//! emission coefficients on the output grid of one synthesis call.

use crate::common::config::{PseudoContinuumConfig, StrategyConfig, VoigtApproximation};
use crate::domain::{LblError, LblResult, Medium, ThermalConditions, WarningRecord};
use crate::lines::IsotopologueId;
use crate::numerics::trapezoid;
use crate::superposition::SuperpositionDiagnostics;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Below this optical depth the slab radiance uses its series expansion.
const THIN_OPTICAL_DEPTH: f64 = 1.0e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    /// Absorption coefficient, cm-1.
    Abscoeff,
    /// Emission coefficient, W/cm3/sr/cm-1.
    Emisscoeff,
    /// Optical depth.
    Absorbance,
    TransmittanceNoslit,
    EmissivityNoslit,
    /// W/cm2/sr/cm-1.
    RadianceNoslit,
}

impl Quantity {
    pub const ALL: [Self; 6] = [
        Self::Abscoeff,
        Self::Emisscoeff,
        Self::Absorbance,
        Self::TransmittanceNoslit,
        Self::EmissivityNoslit,
        Self::RadianceNoslit,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Abscoeff => "abscoeff",
            Self::Emisscoeff => "emisscoeff",
            Self::Absorbance => "absorbance",
            Self::TransmittanceNoslit => "transmittance_noslit",
            Self::EmissivityNoslit => "emissivity_noslit",
            Self::RadianceNoslit => "radiance_noslit",
        }
    }
}

impl Display for Quantity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

impl FromStr for Quantity {
    type Err = LblError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|quantity| quantity.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| {
                LblError::input_validation(
                    "INPUT.QUANTITY",
                    format!("unknown spectral quantity '{value}'"),
                )
            })
    }
}

/// Every input that shaped a spectrum, plus the calculation time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumConditions {
    pub molecule: String,
    pub database: String,
    pub isotopes: Vec<IsotopologueId>,
    pub thermal: ThermalConditions,
    pub medium: Medium,
    /// Output range in the wavenumbers of the medium, cm-1.
    pub wavenum_min: f64,
    pub wavenum_max: f64,
    pub wstep: f64,
    pub broadening_max_width: f64,
    pub cutoff: f64,
    pub voigt: VoigtApproximation,
    pub strategy: StrategyConfig,
    pub pseudo_continuum: PseudoContinuumConfig,
    pub reference_temperature: f64,
    pub calculation_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SynthesisDiagnostics {
    pub lines_selected: usize,
    pub lines_out_of_range: usize,
    pub negative_energies: usize,
    pub missing_self_broadening: usize,
    pub extrapolated_partition: Vec<IsotopologueId>,
    pub superposition: SuperpositionDiagnostics,
    pub warnings: Vec<WarningRecord>,
}

/// Immutable result of one synthesis call. Coefficients are stored per unit
/// length, so path-length rescaling never re-runs the synthesis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spectrum {
    wavenumbers: Vec<f64>,
    abscoeff: Vec<f64>,
    emisscoeff: Vec<f64>,
    conditions: SpectrumConditions,
    diagnostics: SynthesisDiagnostics,
}

impl Spectrum {
    pub fn new(
        wavenumbers: Vec<f64>,
        abscoeff: Vec<f64>,
        emisscoeff: Vec<f64>,
        conditions: SpectrumConditions,
        diagnostics: SynthesisDiagnostics,
    ) -> LblResult<Self> {
        if abscoeff.len() != wavenumbers.len() || emisscoeff.len() != wavenumbers.len() {
            return Err(LblError::internal(
                "INTERNAL.SPECTRUM_SHAPE",
                format!(
                    "coefficient arrays ({}, {}) do not match the {} grid points",
                    abscoeff.len(),
                    emisscoeff.len(),
                    wavenumbers.len()
                ),
            ));
        }
        Ok(Self {
            wavenumbers,
            abscoeff,
            emisscoeff,
            conditions,
            diagnostics,
        })
    }

    pub fn len(&self) -> usize {
        self.wavenumbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavenumbers.is_empty()
    }

    /// Wavenumbers of the medium, cm-1.
    pub fn wavenumbers(&self) -> &[f64] {
        &self.wavenumbers
    }

    /// Wavelengths in the medium, nm.
    pub fn wavelength_nm(&self) -> Vec<f64> {
        self.wavenumbers.iter().map(|nu| 1.0e7 / nu).collect()
    }

    pub fn conditions(&self) -> &SpectrumConditions {
        &self.conditions
    }

    pub fn diagnostics(&self) -> &SynthesisDiagnostics {
        &self.diagnostics
    }

    pub fn path_length(&self) -> f64 {
        self.conditions.thermal.path_length
    }

    pub fn abscoeff(&self) -> &[f64] {
        &self.abscoeff
    }

    pub fn emisscoeff(&self) -> &[f64] {
        &self.emisscoeff
    }

    pub fn absorbance(&self) -> Vec<f64> {
        let length = self.path_length();
        self.abscoeff.iter().map(|k| k * length).collect()
    }

    pub fn transmittance_noslit(&self) -> Vec<f64> {
        let length = self.path_length();
        self.abscoeff.iter().map(|k| (-k * length).exp()).collect()
    }

    pub fn emissivity_noslit(&self) -> Vec<f64> {
        let length = self.path_length();
        self.abscoeff.iter().map(|k| -(-k * length).exp_m1()).collect()
    }

    /// Homogeneous-slab radiance. With self-absorption the source function
    /// `j/k` is attenuated along the path; without it the optically thin
    /// limit `j L` is returned.
    pub fn radiance_noslit(&self) -> Vec<f64> {
        let length = self.path_length();
        let self_absorption = self.conditions.thermal.self_absorption;
        self.abscoeff
            .iter()
            .zip(&self.emisscoeff)
            .map(|(k, j)| {
                let depth = k * length;
                if !self_absorption {
                    j * length
                } else if depth.abs() < THIN_OPTICAL_DEPTH {
                    j * length * (1.0 - 0.5 * depth)
                } else {
                    j / k * -(-depth).exp_m1()
                }
            })
            .collect()
    }

    /// `(wavenumbers, values)` of a named quantity.
    pub fn get(&self, quantity: Quantity) -> (&[f64], Vec<f64>) {
        let values = match quantity {
            Quantity::Abscoeff => self.abscoeff.clone(),
            Quantity::Emisscoeff => self.emisscoeff.clone(),
            Quantity::Absorbance => self.absorbance(),
            Quantity::TransmittanceNoslit => self.transmittance_noslit(),
            Quantity::EmissivityNoslit => self.emissivity_noslit(),
            Quantity::RadianceNoslit => self.radiance_noslit(),
        };
        (&self.wavenumbers, values)
    }

    /// Integrated radiance over the output range, W/cm2/sr.
    pub fn power(&self) -> f64 {
        trapezoid(&self.wavenumbers, &self.radiance_noslit()).unwrap_or(0.0)
    }

    pub fn rescale_path_length(&self, path_length: f64) -> LblResult<Self> {
        if !path_length.is_finite() || path_length <= 0.0 {
            return Err(LblError::input_validation(
                "INPUT.PATH_LENGTH",
                format!("path length must be finite and > 0 cm, got {path_length}"),
            ));
        }
        let mut rescaled = self.clone();
        rescaled.conditions.thermal.path_length = path_length;
        Ok(rescaled)
    }

    /// Scales both coefficients linearly with the mole fraction. Line widths
    /// keep the broadening of the original composition.
    pub fn rescale_mole_fraction(&self, mole_fraction: f64) -> LblResult<Self> {
        let current = self.conditions.thermal.mole_fraction;
        if !(0.0..=1.0).contains(&mole_fraction) {
            return Err(LblError::input_validation(
                "INPUT.MOLE_FRACTION",
                format!("mole fraction must lie in [0, 1], got {mole_fraction}"),
            ));
        }
        if current <= 0.0 {
            return Err(LblError::input_validation(
                "INPUT.MOLE_FRACTION",
                "cannot rescale a spectrum computed at zero mole fraction",
            ));
        }

        let ratio = mole_fraction / current;
        let mut rescaled = self.clone();
        rescaled.abscoeff.iter_mut().for_each(|k| *k *= ratio);
        rescaled.emisscoeff.iter_mut().for_each(|j| *j *= ratio);
        rescaled.conditions.thermal.mole_fraction = mole_fraction;
        Ok(rescaled)
    }
}

#[cfg(test)]
mod tests {
    use super::{Quantity, Spectrum, SpectrumConditions, SynthesisDiagnostics};
    use crate::common::config::{PseudoContinuumConfig, StrategyConfig, VoigtApproximation};
    use crate::domain::{Medium, ThermalConditions};
    use crate::lines::IsotopologueId;

    fn spectrum(self_absorption: bool) -> Spectrum {
        let wavenumbers: Vec<f64> = (0..5).map(|index| 2000.0 + f64::from(index)).collect();
        let conditions = SpectrumConditions {
            molecule: "CO".to_string(),
            database: "test".to_string(),
            isotopes: vec![IsotopologueId(1)],
            thermal: ThermalConditions::equilibrium(300.0)
                .with_path_length(2.0)
                .with_mole_fraction(0.5)
                .with_self_absorption(self_absorption),
            medium: Medium::Vacuum,
            wavenum_min: 2000.0,
            wavenum_max: 2004.0,
            wstep: 1.0,
            broadening_max_width: 10.0,
            cutoff: 0.0,
            voigt: VoigtApproximation::Humlicek,
            strategy: StrategyConfig::Direct,
            pseudo_continuum: PseudoContinuumConfig::default(),
            reference_temperature: 296.0,
            calculation_time: 0.0,
        };
        Spectrum::new(
            wavenumbers,
            vec![0.0, 0.1, 0.5, 1.0e-12, 2.0],
            vec![0.0, 1.0e-3, 2.0e-3, 3.0e-3, 4.0e-3],
            conditions,
            SynthesisDiagnostics::default(),
        )
        .expect("consistent arrays")
    }

    #[test]
    fn derived_quantities_follow_beer_lambert() {
        let spectrum = spectrum(true);
        let transmittance = spectrum.transmittance_noslit();
        let emissivity = spectrum.emissivity_noslit();
        for ((k, t), e) in spectrum.abscoeff().iter().zip(&transmittance).zip(&emissivity) {
            assert!((t - (-2.0 * k).exp()).abs() < 1.0e-15);
            assert!((t + e - 1.0).abs() < 1.0e-15);
        }
        assert_eq!(spectrum.absorbance()[2], 1.0);
    }

    #[test]
    fn radiance_switches_formula_with_self_absorption() {
        let absorbing = spectrum(true).radiance_noslit();
        let thin = spectrum(false).radiance_noslit();

        let expected = 4.0e-3 / 2.0 * (1.0 - (-4.0_f64).exp());
        assert!((absorbing[4] - expected).abs() < 1.0e-15);
        assert!((thin[4] - 8.0e-3).abs() < 1.0e-15);
        // Vanishing optical depth reduces to the thin limit.
        assert!((absorbing[3] / thin[3] - 1.0).abs() < 1.0e-9);
        assert_eq!(absorbing[0], 0.0);
    }

    #[test]
    fn path_length_rescaling_composes() {
        let original = spectrum(true);
        let via = original
            .rescale_path_length(5.0)
            .and_then(|spectrum| spectrum.rescale_path_length(0.3))
            .expect("rescale");
        let direct = original.rescale_path_length(0.3).expect("rescale");
        assert_eq!(via.radiance_noslit(), direct.radiance_noslit());
        assert_eq!(via.path_length(), 0.3);
        assert!(original.rescale_path_length(-1.0).is_err());
    }

    #[test]
    fn mole_fraction_rescaling_is_linear() {
        let original = spectrum(true);
        let doubled = original.rescale_mole_fraction(1.0).expect("rescale");
        assert_eq!(doubled.abscoeff()[2], 1.0);
        assert_eq!(doubled.emisscoeff()[4], 8.0e-3);
        assert!(original.rescale_mole_fraction(1.5).is_err());
    }

    #[test]
    fn quantities_parse_by_name_and_power_integrates_radiance() {
        assert_eq!(
            "radiance_noslit".parse::<Quantity>().expect("known"),
            Quantity::RadianceNoslit
        );
        assert!("radiance".parse::<Quantity>().is_err());

        let thin = spectrum(false);
        let (wavenumbers, values) = thin.get(Quantity::RadianceNoslit);
        assert_eq!(wavenumbers.len(), values.len());
        // Trapezoid over unit steps of 2 * [0, 1, 2, 3, 4] * 1e-3.
        assert!((thin.power() - 16.0e-3).abs() < 1.0e-15);
        assert_eq!(thin.wavelength_nm()[0], 5000.0);
    }
}
