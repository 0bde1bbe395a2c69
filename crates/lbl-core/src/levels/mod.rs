//! Rovibrational energy levels, referenced to the ground level.

pub mod ladder;

pub use ladder::{LadderLimits, RovibrationalConstants, RovibrationalLadder};

use crate::lines::ContentHasher;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct EnergyLevel {
    /// Total degeneracy including nuclear-spin statistics.
    pub degeneracy: f64,
    /// Vibrational part of the level energy, cm-1.
    pub vib_energy: f64,
    /// Rotational part of the level energy, cm-1.
    pub rot_energy: f64,
    #[serde(default)]
    pub v: Option<u32>,
    #[serde(default)]
    pub j: Option<u32>,
}

impl EnergyLevel {
    pub fn new(degeneracy: f64, vib_energy: f64, rot_energy: f64) -> Self {
        Self {
            degeneracy,
            vib_energy,
            rot_energy,
            v: None,
            j: None,
        }
    }

    pub fn total_energy(&self) -> f64 {
        self.vib_energy + self.rot_energy
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct EnergyLevelTable {
    levels: Vec<EnergyLevel>,
}

impl EnergyLevelTable {
    /// Drops levels with zero degeneracy (forbidden by spin statistics).
    pub fn new(levels: Vec<EnergyLevel>) -> Self {
        Self {
            levels: levels
                .into_iter()
                .filter(|level| level.degeneracy > 0.0)
                .collect(),
        }
    }

    pub fn levels(&self) -> &[EnergyLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn into_levels(self) -> Vec<EnergyLevel> {
        self.levels
    }

    pub fn content_hash(&self) -> u64 {
        Self::hash_levels(&self.levels)
    }

    /// Content hash of raw levels, equal to the hash of the table built
    /// from them.
    pub fn hash_levels(levels: &[EnergyLevel]) -> u64 {
        let mut hasher = ContentHasher::new();
        for level in levels {
            hasher.write_f64(level.degeneracy);
            hasher.write_f64(level.vib_energy);
            hasher.write_f64(level.rot_energy);
        }
        hasher.finish()
    }

    /// Highest total energy in the table, cm-1.
    pub fn max_energy(&self) -> Option<f64> {
        self.levels
            .iter()
            .map(EnergyLevel::total_energy)
            .max_by(f64::total_cmp)
    }
}
