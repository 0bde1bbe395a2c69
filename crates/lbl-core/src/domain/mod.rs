pub mod errors;
pub mod warnings;

pub use errors::{LblError, LblErrorCategory, LblResult};
pub use warnings::{WarningAction, WarningCategory, WarningPolicy, WarningRecord, WarningSink};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// How line chunks are scheduled during superposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ExecutionMode {
    #[default]
    Serial,
    /// Lines are split into chunks of `chunk_size`; each chunk is accumulated
    /// by an independent worker and partial arrays are merged in chunk order.
    Parallel { chunk_size: usize },
}

impl ExecutionMode {
    pub const DEFAULT_CHUNK_SIZE: usize = 4_096;

    pub fn parallel() -> Self {
        Self::Parallel {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Propagation medium. Grids and line positions are expressed in the
/// wavenumbers of that medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Medium {
    #[default]
    Vacuum,
    Air,
}

impl Medium {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vacuum => "vacuum",
            Self::Air => "air",
        }
    }
}

impl Display for Medium {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "regime")]
pub enum ThermalState {
    Equilibrium { t_gas: f64 },
    /// Separate vibrational and rotational temperatures. The rotational
    /// temperature doubles as the translational one (Doppler, density).
    NonEquilibrium { t_vib: f64, t_rot: f64 },
}

impl ThermalState {
    /// Temperature driving translation: number density and line widths.
    pub fn translational_temperature(&self) -> f64 {
        match *self {
            Self::Equilibrium { t_gas } => t_gas,
            Self::NonEquilibrium { t_rot, .. } => t_rot,
        }
    }

    pub const fn is_equilibrium(&self) -> bool {
        matches!(self, Self::Equilibrium { .. })
    }

    fn temperatures(&self) -> [f64; 2] {
        match *self {
            Self::Equilibrium { t_gas } => [t_gas, t_gas],
            Self::NonEquilibrium { t_vib, t_rot } => [t_vib, t_rot],
        }
    }
}

impl Display for ThermalState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Equilibrium { t_gas } => write!(f, "Tgas={t_gas} K"),
            Self::NonEquilibrium { t_vib, t_rot } => write!(f, "Tvib={t_vib} K Trot={t_rot} K"),
        }
    }
}

pub const DEFAULT_DILUENT: &str = "air";

/// Physical state of the slab for one synthesis call.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ThermalConditions {
    pub thermal: ThermalState,
    /// Total pressure in bar.
    pub pressure: f64,
    pub mole_fraction: f64,
    /// Diluent species and their mole fractions. Only `air` broadening
    /// coefficients are tabulated; an empty list means pure air diluent.
    #[serde(default)]
    pub diluents: Vec<(String, f64)>,
    /// Path length in cm.
    pub path_length: f64,
    #[serde(default = "default_self_absorption")]
    pub self_absorption: bool,
}

fn default_self_absorption() -> bool {
    true
}

impl ThermalConditions {
    pub fn equilibrium(t_gas: f64) -> Self {
        Self {
            thermal: ThermalState::Equilibrium { t_gas },
            pressure: 1.01325,
            mole_fraction: 1.0,
            diluents: Vec::new(),
            path_length: 1.0,
            self_absorption: true,
        }
    }

    pub fn non_equilibrium(t_vib: f64, t_rot: f64) -> Self {
        Self {
            thermal: ThermalState::NonEquilibrium { t_vib, t_rot },
            ..Self::equilibrium(t_rot)
        }
    }

    pub fn with_pressure(mut self, pressure: f64) -> Self {
        self.pressure = pressure;
        self
    }

    pub fn with_mole_fraction(mut self, mole_fraction: f64) -> Self {
        self.mole_fraction = mole_fraction;
        self
    }

    pub fn with_path_length(mut self, path_length: f64) -> Self {
        self.path_length = path_length;
        self
    }

    pub fn with_self_absorption(mut self, self_absorption: bool) -> Self {
        self.self_absorption = self_absorption;
        self
    }

    pub fn validate(&self) -> LblResult<()> {
        for temperature in self.thermal.temperatures() {
            if !temperature.is_finite() || temperature <= 0.0 {
                return Err(LblError::input_validation(
                    "INPUT.TEMPERATURE",
                    format!("temperatures must be finite and > 0 K, got {}", self.thermal),
                ));
            }
        }
        if !self.pressure.is_finite() || self.pressure <= 0.0 {
            return Err(LblError::input_validation(
                "INPUT.PRESSURE",
                format!("pressure must be finite and > 0 bar, got {}", self.pressure),
            ));
        }
        if !(0.0..=1.0).contains(&self.mole_fraction) {
            return Err(LblError::input_validation(
                "INPUT.MOLE_FRACTION",
                format!("mole fraction must lie in [0, 1], got {}", self.mole_fraction),
            ));
        }
        if !self.path_length.is_finite() || self.path_length <= 0.0 {
            return Err(LblError::input_validation(
                "INPUT.PATH_LENGTH",
                format!("path length must be finite and > 0 cm, got {}", self.path_length),
            ));
        }

        for (species, fraction) in &self.diluents {
            if !species.eq_ignore_ascii_case(DEFAULT_DILUENT) {
                return Err(LblError::input_validation(
                    "INPUT.DILUENT",
                    format!("no broadening coefficients for diluent '{species}'"),
                ));
            }
            if !fraction.is_finite() || *fraction < 0.0 {
                return Err(LblError::input_validation(
                    "INPUT.DILUENT",
                    format!("diluent '{species}' mole fraction must be >= 0, got {fraction}"),
                ));
            }
        }
        if !self.diluents.is_empty() {
            let total = self.mole_fraction + self.diluents.iter().map(|(_, x)| x).sum::<f64>();
            if (total - 1.0).abs() > 1.0e-6 {
                return Err(LblError::input_validation(
                    "INPUT.DILUENT",
                    format!("mole fractions of molecule and diluents must sum to 1, got {total}"),
                ));
            }
        }

        Ok(())
    }
}
