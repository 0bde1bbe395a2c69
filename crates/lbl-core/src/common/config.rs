//! Per-call synthesis configuration. Every knob has a default so partial
//! JSON documents are accepted.

use crate::domain::{ExecutionMode, LblError, Medium, WarningPolicy};
use crate::lines::IsotopologueId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read synthesis config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse synthesis config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid synthesis config field '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}

impl From<ConfigError> for LblError {
    fn from(error: ConfigError) -> Self {
        LblError::input_validation("INPUT.SYNTHESIS_CONFIG", error.to_string())
    }
}

/// Requested output range, expressed in the propagation medium.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "unit")]
pub enum SpectralRange {
    /// cm-1
    Wavenumber { min: f64, max: f64 },
    /// nm
    Wavelength { min: f64, max: f64 },
}

impl SpectralRange {
    /// `(wmin, wmax)` in cm-1 of the medium.
    pub fn wavenumbers(&self) -> (f64, f64) {
        match *self {
            Self::Wavenumber { min, max } => (min, max),
            Self::Wavelength { min, max } => (1.0e7 / max, 1.0e7 / min),
        }
    }
}

impl Default for SpectralRange {
    fn default() -> Self {
        Self::Wavenumber {
            min: 1_900.0,
            max: 2_300.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum GridStep {
    Fixed { wstep: f64 },
    /// Derived from the narrowest line FWHM in the calculation range.
    Auto { points_per_linewidth: f64 },
}

impl Default for GridStep {
    fn default() -> Self {
        Self::Fixed { wstep: 0.01 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoigtApproximation {
    #[default]
    Humlicek,
    Whiting,
    PseudoVoigt,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StrategyConfig {
    #[default]
    Direct,
    /// Discretized lineshape pooling on log-spaced width axes.
    Pooled { res_lorentz: f64, res_gauss: f64 },
}

impl StrategyConfig {
    pub fn pooled() -> Self {
        Self::Pooled {
            res_lorentz: 0.1,
            res_gauss: 0.1,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Pooled { .. } => "pooled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PseudoContinuumConfig {
    /// Lines with peak contribution below `threshold` times the rough
    /// spectrum peak become continuum. Zero disables extraction.
    pub threshold: f64,
    /// Width of the coarse continuum cells, cm-1.
    pub coarse_resolution: f64,
}

impl Default for PseudoContinuumConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            coarse_resolution: 1.0,
        }
    }
}

impl PseudoContinuumConfig {
    pub fn enabled(&self) -> bool {
        self.threshold > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeEnergyPolicy {
    #[default]
    Drop,
    ZeroIntensity,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub range: SpectralRange,
    pub wstep: GridStep,
    /// Full width of each line's evaluation window, cm-1.
    pub broadening_max_width: f64,
    /// Intensity cutoff, cm-1/(molecule.cm-2).
    pub cutoff: f64,
    pub cutoff_error_tolerance: f64,
    pub isotopes: Option<Vec<IsotopologueId>>,
    pub medium: Medium,
    pub voigt: VoigtApproximation,
    pub strategy: StrategyConfig,
    pub pseudo_continuum: PseudoContinuumConfig,
    pub negative_energies: NegativeEnergyPolicy,
    pub execution: ExecutionMode,
    pub warnings: WarningPolicy,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            range: SpectralRange::default(),
            wstep: GridStep::default(),
            broadening_max_width: 10.0,
            cutoff: 1.0e-27,
            cutoff_error_tolerance: 0.01,
            isotopes: None,
            medium: Medium::default(),
            voigt: VoigtApproximation::default(),
            strategy: StrategyConfig::default(),
            pseudo_continuum: PseudoContinuumConfig::default(),
            negative_energies: NegativeEnergyPolicy::default(),
            execution: ExecutionMode::default(),
            warnings: WarningPolicy::default(),
        }
    }
}

impl SynthesisConfig {
    pub fn with_range(mut self, range: SpectralRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_wavenumber_range(self, min: f64, max: f64) -> Self {
        self.with_range(SpectralRange::Wavenumber { min, max })
    }

    pub fn with_wstep(mut self, wstep: f64) -> Self {
        self.wstep = GridStep::Fixed { wstep };
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = cutoff;
        self
    }

    pub fn with_broadening_max_width(mut self, broadening_max_width: f64) -> Self {
        self.broadening_max_width = broadening_max_width;
        self
    }

    pub fn with_medium(mut self, medium: Medium) -> Self {
        self.medium = medium;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_isotopes(mut self, isotopes: &[u8]) -> Self {
        self.isotopes = Some(isotopes.iter().copied().map(IsotopologueId).collect());
        self
    }

    pub fn with_warnings(mut self, warnings: WarningPolicy) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, message: String| Err(ConfigError::Invalid { field, message });

        let (wmin, wmax) = self.range.wavenumbers();
        if !wmin.is_finite() || !wmax.is_finite() || wmin <= 0.0 || wmax <= wmin {
            return invalid(
                "range",
                format!("expected 0 < min < max, got {wmin}..{wmax} cm-1"),
            );
        }
        match self.wstep {
            GridStep::Fixed { wstep } if !(wstep.is_finite() && wstep > 0.0) => {
                return invalid("wstep", format!("must be finite and > 0, got {wstep}"));
            }
            GridStep::Auto {
                points_per_linewidth,
            } if !(points_per_linewidth.is_finite() && points_per_linewidth >= 1.0) => {
                return invalid(
                    "wstep",
                    format!("points_per_linewidth must be >= 1, got {points_per_linewidth}"),
                );
            }
            _ => {}
        }
        if !(self.broadening_max_width.is_finite() && self.broadening_max_width > 0.0) {
            return invalid(
                "broadening_max_width",
                format!("must be finite and > 0, got {}", self.broadening_max_width),
            );
        }
        if !(self.cutoff.is_finite() && self.cutoff >= 0.0) {
            return invalid("cutoff", format!("must be finite and >= 0, got {}", self.cutoff));
        }
        if !(self.cutoff_error_tolerance.is_finite() && self.cutoff_error_tolerance >= 0.0) {
            return invalid(
                "cutoff_error_tolerance",
                format!("must be finite and >= 0, got {}", self.cutoff_error_tolerance),
            );
        }
        if let StrategyConfig::Pooled {
            res_lorentz,
            res_gauss,
        } = self.strategy
        {
            let valid = |resolution: f64| resolution.is_finite() && resolution > 0.0;
            if !(valid(res_lorentz) && valid(res_gauss)) {
                return invalid(
                    "strategy",
                    format!("pooled resolutions must be > 0, got {res_lorentz}, {res_gauss}"),
                );
            }
        }
        let continuum = self.pseudo_continuum;
        if !(continuum.threshold.is_finite() && (0.0..1.0).contains(&continuum.threshold)) {
            return invalid(
                "pseudo_continuum.threshold",
                format!("must lie in [0, 1), got {}", continuum.threshold),
            );
        }
        if !(continuum.coarse_resolution.is_finite() && continuum.coarse_resolution > 0.0) {
            return invalid(
                "pseudo_continuum.coarse_resolution",
                format!("must be > 0, got {}", continuum.coarse_resolution),
            );
        }
        if let ExecutionMode::Parallel { chunk_size: 0 } = self.execution {
            return invalid("execution", "chunk_size must be > 0".to_string());
        }
        if self.isotopes.as_ref().is_some_and(Vec::is_empty) {
            return invalid("isotopes", "isotope subset must not be empty".to_string());
        }
        Ok(())
    }
}

pub fn load_synthesis_config(path: impl AsRef<Path>) -> Result<SynthesisConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: SynthesisConfig =
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, GridStep, SpectralRange, StrategyConfig, SynthesisConfig,
        load_synthesis_config,
    };
    use crate::domain::{ExecutionMode, Medium, WarningAction, WarningCategory};
    use crate::lines::IsotopologueId;

    #[test]
    fn wavelength_range_maps_to_inverted_wavenumbers() {
        let range = SpectralRange::Wavelength {
            min: 4_150.0,
            max: 4_400.0,
        };
        let (wmin, wmax) = range.wavenumbers();
        assert!((wmin - 2_272.727_272_7).abs() < 1.0e-6);
        assert!((wmax - 2_409.638_554_2).abs() < 1.0e-6);
    }

    #[test]
    fn partial_json_keeps_defaults_for_missing_knobs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "range": { "unit": "wavelength", "min": 4150.0, "max": 4400.0 },
                "strategy": { "kind": "pooled", "res_lorentz": 0.05, "res_gauss": 0.1 },
                "medium": "air",
                "isotopes": [1, 2],
                "execution": { "mode": "parallel", "chunk_size": 512 },
                "warnings": { "LinestrengthCutoffWarning": "ignore" }
            }"#,
        )
        .expect("write config");

        let config = load_synthesis_config(&path).expect("config should load");
        assert_eq!(config.wstep, GridStep::Fixed { wstep: 0.01 });
        assert_eq!(config.medium, Medium::Air);
        assert_eq!(
            config.strategy,
            StrategyConfig::Pooled {
                res_lorentz: 0.05,
                res_gauss: 0.1
            }
        );
        assert_eq!(config.isotopes, Some(vec![IsotopologueId(1), IsotopologueId(2)]));
        assert_eq!(config.execution, ExecutionMode::Parallel { chunk_size: 512 });
        assert_eq!(
            config.warnings.action(WarningCategory::LinestrengthCutoff),
            WarningAction::Ignore
        );
    }

    #[test]
    fn loader_distinguishes_read_parse_and_validation_failures() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = temp.path().join("missing.json");
        assert!(matches!(
            load_synthesis_config(&missing),
            Err(ConfigError::Read { .. })
        ));

        let broken = temp.path().join("broken.json");
        std::fs::write(&broken, "{ \"cutoff\": ").expect("write");
        assert!(matches!(
            load_synthesis_config(&broken),
            Err(ConfigError::Parse { .. })
        ));

        let invalid = temp.path().join("invalid.json");
        std::fs::write(&invalid, r#"{ "cutoff": -1.0 }"#).expect("write");
        assert!(matches!(
            load_synthesis_config(&invalid),
            Err(ConfigError::Invalid { field: "cutoff", .. })
        ));
    }

    #[test]
    fn validation_rejects_degenerate_knobs() {
        assert!(SynthesisConfig::default().validate().is_ok());
        assert!(SynthesisConfig::default().with_wstep(0.0).validate().is_err());
        assert!(SynthesisConfig::default()
            .with_wavenumber_range(2_000.0, 1_000.0)
            .validate()
            .is_err());
        assert!(SynthesisConfig::default()
            .with_execution(ExecutionMode::Parallel { chunk_size: 0 })
            .validate()
            .is_err());
        assert!(SynthesisConfig::default()
            .with_strategy(StrategyConfig::Pooled {
                res_lorentz: 0.0,
                res_gauss: 0.1
            })
            .validate()
            .is_err());
    }
}
