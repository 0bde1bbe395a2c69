//! Normalized in-memory line store: one row per transition, grouped by
//! isotopologue, positions sorted ascending inside each group.

pub mod databank;
mod hash;

pub use databank::{
    Databank, DatabankFile, DatabankRequest, InMemoryDatabank, JsonDatabankDirectory,
    PartitionEntry, PartitionSourceSpec, read_databank_file,
};
pub use hash::ContentHasher;

use crate::common::molecules::isotopologue_parameters;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct IsotopologueId(pub u8);

impl Display for IsotopologueId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One spectral transition with its static parameters at the reference
/// temperature of the store.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Line {
    /// Vacuum wavenumber, cm-1.
    pub wavenumber: f64,
    /// Line intensity at the store reference temperature, cm-1/(molecule.cm-2).
    /// Includes the natural isotopic abundance.
    pub intensity: f64,
    /// Einstein coefficient for spontaneous emission, s-1.
    #[serde(default)]
    pub einstein_a: Option<f64>,
    /// Lower-state energy, cm-1.
    #[serde(default)]
    pub lower_energy: Option<f64>,
    #[serde(default)]
    pub upper_degeneracy: Option<f64>,
    #[serde(default)]
    pub lower_degeneracy: Option<f64>,
    /// Vibrational part of the upper/lower state energies, cm-1. Required for
    /// non-equilibrium populations.
    #[serde(default)]
    pub upper_vib_energy: Option<f64>,
    #[serde(default)]
    pub lower_vib_energy: Option<f64>,
    /// Air-broadened HWHM at the reference temperature, cm-1/atm.
    pub air_broadening: f64,
    #[serde(default)]
    pub self_broadening: Option<f64>,
    pub air_temperature_exponent: f64,
    #[serde(default)]
    pub self_temperature_exponent: Option<f64>,
    /// Air pressure shift, cm-1/atm.
    #[serde(default)]
    pub pressure_shift: f64,
}

impl Line {
    pub fn new(wavenumber: f64, intensity: f64) -> Self {
        Self {
            wavenumber,
            intensity,
            einstein_a: None,
            lower_energy: None,
            upper_degeneracy: None,
            lower_degeneracy: None,
            upper_vib_energy: None,
            lower_vib_energy: None,
            air_broadening: 0.07,
            self_broadening: None,
            air_temperature_exponent: 0.75,
            self_temperature_exponent: None,
            pressure_shift: 0.0,
        }
    }

    pub fn with_lower_energy(mut self, lower_energy: f64) -> Self {
        self.lower_energy = Some(lower_energy);
        self
    }

    pub fn with_broadening(
        mut self,
        air_broadening: f64,
        self_broadening: Option<f64>,
        air_temperature_exponent: f64,
    ) -> Self {
        self.air_broadening = air_broadening;
        self.self_broadening = self_broadening;
        self.air_temperature_exponent = air_temperature_exponent;
        self
    }

    pub fn with_pressure_shift(mut self, pressure_shift: f64) -> Self {
        self.pressure_shift = pressure_shift;
        self
    }

    pub fn with_einstein(mut self, einstein_a: f64, upper_degeneracy: f64, lower_degeneracy: f64) -> Self {
        self.einstein_a = Some(einstein_a);
        self.upper_degeneracy = Some(upper_degeneracy);
        self.lower_degeneracy = Some(lower_degeneracy);
        self
    }

    pub fn with_vib_energies(mut self, upper_vib_energy: f64, lower_vib_energy: f64) -> Self {
        self.upper_vib_energy = Some(upper_vib_energy);
        self.lower_vib_energy = Some(lower_vib_energy);
        self
    }

    /// Upper-state energy `El + nu`, cm-1.
    pub fn upper_energy(&self) -> Option<f64> {
        self.lower_energy.map(|energy| energy + self.wavenumber)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IsotopologueGroup {
    pub id: IsotopologueId,
    /// Natural abundance already folded into the tabulated intensities.
    pub abundance: f64,
    /// Molar mass, g/mol.
    pub molar_mass: f64,
    pub lines: Vec<Line>,
}

impl IsotopologueGroup {
    /// Builds a group with abundance and mass from the built-in table.
    pub fn for_molecule(molecule: &str, isotope: u8, lines: Vec<Line>) -> Result<Self, LineStoreError> {
        let parameters = isotopologue_parameters(molecule, isotope).ok_or_else(|| {
            LineStoreError::MissingMolecularData {
                molecule: molecule.to_string(),
                isotope,
            }
        })?;
        Ok(Self {
            id: IsotopologueId(isotope),
            abundance: parameters.abundance,
            molar_mass: parameters.molar_mass,
            lines,
        })
    }

    pub fn is_sorted(&self) -> bool {
        self.lines
            .windows(2)
            .all(|pair| pair[0].wavenumber <= pair[1].wavenumber)
    }

    /// Lines whose position lies in `[min, max]`, found by bisection.
    pub fn lines_in_range(&self, min: f64, max: f64) -> &[Line] {
        let start = self.lines.partition_point(|line| line.wavenumber < min);
        let end = self.lines.partition_point(|line| line.wavenumber <= max);
        &self.lines[start..end.max(start)]
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LineStoreError {
    #[error("databank '{name}' not found")]
    DatabankNotFound { name: String },
    #[error("databank '{name}' could not be read: {message}")]
    Unreadable { name: String, message: String },
    #[error("isotopologue {isotope} of {molecule} has no molecular parameters")]
    MissingMolecularData { molecule: String, isotope: u8 },
    #[error("isotopologue {id} appears more than once in the line store")]
    DuplicateIsotopologue { id: IsotopologueId },
    #[error("lines of isotopologue {id} are not sorted by wavenumber (index {index})")]
    Unsorted { id: IsotopologueId, index: usize },
    #[error("line {index} of isotopologue {id} has a non-finite or negative {field}")]
    InvalidLine {
        id: IsotopologueId,
        index: usize,
        field: &'static str,
    },
    #[error("isotopologue {id} has an invalid {field}")]
    InvalidGroup { id: IsotopologueId, field: &'static str },
    #[error("reference temperature must be finite and > 0 K, got {value}")]
    InvalidReferenceTemperature { value: f64 },
}

/// Caller-owned, read-only table of transitions for one molecule.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LineStore {
    pub molecule: String,
    /// Identity of the source database, part of every cache key derived
    /// from this store.
    pub database: String,
    /// Reference temperature of the tabulated intensities and widths, K.
    pub reference_temperature: f64,
    groups: Vec<IsotopologueGroup>,
}

impl LineStore {
    /// Validates the groups: unique ids, sorted positions and finite
    /// mandatory columns. Unsorted groups are rejected rather than re-sorted.
    pub fn new(
        molecule: impl Into<String>,
        database: impl Into<String>,
        reference_temperature: f64,
        mut groups: Vec<IsotopologueGroup>,
    ) -> Result<Self, LineStoreError> {
        if !reference_temperature.is_finite() || reference_temperature <= 0.0 {
            return Err(LineStoreError::InvalidReferenceTemperature {
                value: reference_temperature,
            });
        }

        groups.sort_by_key(|group| group.id);
        if let Some(pair) = groups.windows(2).find(|pair| pair[0].id == pair[1].id) {
            return Err(LineStoreError::DuplicateIsotopologue { id: pair[0].id });
        }

        for group in &groups {
            validate_group(group)?;
        }

        Ok(Self {
            molecule: molecule.into(),
            database: database.into(),
            reference_temperature,
            groups,
        })
    }

    /// Re-runs the constructor checks, for stores obtained by deserialization.
    pub fn validated(self) -> Result<Self, LineStoreError> {
        Self::new(
            self.molecule,
            self.database,
            self.reference_temperature,
            self.groups,
        )
    }

    pub fn groups(&self) -> &[IsotopologueGroup] {
        &self.groups
    }

    pub fn group(&self, id: IsotopologueId) -> Option<&IsotopologueGroup> {
        self.groups
            .binary_search_by_key(&id, |group| group.id)
            .ok()
            .map(|index| &self.groups[index])
    }

    pub fn isotopologues(&self) -> Vec<IsotopologueId> {
        self.groups.iter().map(|group| group.id).collect()
    }

    pub fn line_count(&self) -> usize {
        self.groups.iter().map(|group| group.lines.len()).sum()
    }

    /// Stable content hash of one group, used to key derived-data caches.
    pub fn content_hash(&self, id: IsotopologueId) -> Option<u64> {
        let group = self.group(id)?;
        let mut hasher = ContentHasher::new();
        hasher.write_str(&self.molecule);
        hasher.write_f64(self.reference_temperature);
        hasher.write_u64(u64::from(group.id.0));
        for line in &group.lines {
            hasher.write_f64(line.wavenumber);
            hasher.write_f64(line.intensity);
            hasher.write_option_f64(line.lower_energy);
            hasher.write_option_f64(line.einstein_a);
            hasher.write_f64(line.air_broadening);
            hasher.write_option_f64(line.self_broadening);
        }
        Some(hasher.finish())
    }

    /// Selects the lines of the requested isotopologues inside
    /// `[min, max]` cm-1. `None` selects every group.
    pub fn select(
        &self,
        isotopes: Option<&[IsotopologueId]>,
        min: f64,
        max: f64,
    ) -> Vec<LineSelection<'_>> {
        self.groups
            .iter()
            .filter(|group| isotopes.is_none_or(|wanted| wanted.contains(&group.id)))
            .map(|group| LineSelection {
                group,
                lines: group.lines_in_range(min, max),
            })
            .collect()
    }

    /// Wavenumber span covered by the store, if it holds any line.
    pub fn wavenumber_span(&self) -> Option<(f64, f64)> {
        let min = self
            .groups
            .iter()
            .filter_map(|group| group.lines.first())
            .map(|line| line.wavenumber)
            .min_by(f64::total_cmp)?;
        let max = self
            .groups
            .iter()
            .filter_map(|group| group.lines.last())
            .map(|line| line.wavenumber)
            .max_by(f64::total_cmp)?;
        Some((min, max))
    }
}

/// Borrowed view of the lines of one isotopologue inside a wavenumber range.
#[derive(Debug, Clone, Copy)]
pub struct LineSelection<'a> {
    pub group: &'a IsotopologueGroup,
    pub lines: &'a [Line],
}

fn validate_group(group: &IsotopologueGroup) -> Result<(), LineStoreError> {
    let id = group.id;
    for (index, line) in group.lines.iter().enumerate() {
        let invalid = |field| LineStoreError::InvalidLine { id, index, field };
        if !line.wavenumber.is_finite() || line.wavenumber <= 0.0 {
            return Err(invalid("wavenumber"));
        }
        if !line.intensity.is_finite() || line.intensity < 0.0 {
            return Err(invalid("intensity"));
        }
        if !line.air_broadening.is_finite() || line.air_broadening < 0.0 {
            return Err(invalid("air broadening"));
        }
        if !line.air_temperature_exponent.is_finite() {
            return Err(invalid("air temperature exponent"));
        }
        if line.einstein_a.is_some_and(|value| !value.is_finite() || value < 0.0) {
            return Err(invalid("Einstein A coefficient"));
        }
        if index > 0 && group.lines[index - 1].wavenumber > line.wavenumber {
            return Err(LineStoreError::Unsorted { id, index });
        }
    }
    if !group.molar_mass.is_finite() || group.molar_mass <= 0.0 {
        return Err(LineStoreError::InvalidGroup {
            id,
            field: "molar mass",
        });
    }
    if !group.abundance.is_finite() || group.abundance <= 0.0 || group.abundance > 1.0 {
        return Err(LineStoreError::InvalidGroup {
            id,
            field: "abundance",
        });
    }
    Ok(())
}
