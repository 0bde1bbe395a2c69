//! Dunham-style rovibrational ladders of diatomic-like vibrational modes and
//! their Delta v = +1 bands, used both as physical test data and to give
//! databanks self-consistent energy levels and line lists.

use super::{EnergyLevel, EnergyLevelTable};
use crate::common::constants::{C2, SPEED_OF_LIGHT_CGS, TREF_HITRAN};
use crate::common::molecules::isotopologue_parameters;
use crate::lines::{
    DatabankFile, IsotopologueGroup, IsotopologueId, Line, LineStore, LineStoreError,
    PartitionEntry, PartitionSourceSpec,
};
use crate::partition::level_partition_sum;
use std::f64::consts::PI;

/// Spectroscopic constants of one vibrational mode, cm-1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RovibrationalConstants {
    pub molecule: &'static str,
    pub isotope: u8,
    pub we: f64,
    pub wexe: f64,
    pub be: f64,
    pub alpha_e: f64,
    pub de: f64,
    /// Nuclear-spin weights of levels with even and odd `J + v`.
    pub spin_weights: [f64; 2],
    /// Einstein A of the 1 -> 0 band, s-1.
    pub band_einstein_a: f64,
}

/// X1Sigma+ ground state of 12C16O.
pub const CO_X: RovibrationalConstants = RovibrationalConstants {
    molecule: "CO",
    isotope: 1,
    we: 2_169.813_58,
    wexe: 13.288_31,
    be: 1.931_280_87,
    alpha_e: 0.017_504_41,
    de: 6.121_47e-6,
    spin_weights: [1.0, 1.0],
    band_einstein_a: 33.0,
};

/// 13C16O, mass-scaled from the 12C16O constants.
pub const CO_X_13C: RovibrationalConstants = RovibrationalConstants {
    molecule: "CO",
    isotope: 2,
    we: 2_121.439,
    wexe: 12.703,
    be: 1.846_141,
    alpha_e: 0.016_36,
    de: 5.593e-6,
    spin_weights: [1.0, 1.0],
    band_einstein_a: 31.0,
};

/// Effective nu3 ladder of 12C16O2. Only one parity of `J + v` survives
/// because 16O has zero nuclear spin.
pub const CO2_NU3_626: RovibrationalConstants = RovibrationalConstants {
    molecule: "CO2",
    isotope: 1,
    we: 2_374.14,
    wexe: 12.5,
    be: 0.390_21,
    alpha_e: 0.003_1,
    de: 1.33e-7,
    spin_weights: [1.0, 0.0],
    band_einstein_a: 424.0,
};

/// Effective nu3 ladder of 13C16O2, band origin near 2283.5 cm-1.
pub const CO2_NU3_636: RovibrationalConstants = RovibrationalConstants {
    molecule: "CO2",
    isotope: 2,
    we: 2_307.89,
    wexe: 12.2,
    be: 0.390_24,
    alpha_e: 0.003_08,
    de: 1.33e-7,
    spin_weights: [1.0, 0.0],
    band_einstein_a: 398.0,
};

const BUILTIN: [RovibrationalConstants; 4] = [CO_X, CO_X_13C, CO2_NU3_626, CO2_NU3_636];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LadderLimits {
    pub v_max: u32,
    pub j_max: u32,
}

impl RovibrationalConstants {
    pub fn builtin(molecule: &str, isotope: u8) -> Option<Self> {
        BUILTIN
            .iter()
            .find(|constants| {
                constants.isotope == isotope && constants.molecule.eq_ignore_ascii_case(molecule.trim())
            })
            .copied()
    }

    pub fn default_limits(&self) -> LadderLimits {
        if self.be < 1.0 {
            LadderLimits {
                v_max: 2,
                j_max: 120,
            }
        } else {
            LadderLimits {
                v_max: 4,
                j_max: 80,
            }
        }
    }

    fn vib_term(&self, v: u32) -> f64 {
        let half = f64::from(v) + 0.5;
        self.we * half - self.wexe * half * half
    }

    fn rot_term(&self, v: u32, j: u32) -> f64 {
        let b_v = self.be - self.alpha_e * (f64::from(v) + 0.5);
        let jj = f64::from(j) * f64::from(j + 1);
        b_v * jj - self.de * jj * jj
    }

    /// Level `(v, J)` relative to `(0, 0)`.
    pub fn level(&self, v: u32, j: u32) -> EnergyLevel {
        let weight = self.spin_weights[((j + v) % 2) as usize];
        EnergyLevel {
            degeneracy: weight * f64::from(2 * j + 1),
            vib_energy: self.vib_term(v) - self.vib_term(0),
            rot_energy: self.rot_term(v, j) - self.rot_term(0, 0),
            v: Some(v),
            j: Some(j),
        }
    }

    /// Band origin of `v + 1 <- v`, cm-1.
    pub fn band_origin(&self, v: u32) -> f64 {
        self.vib_term(v + 1) - self.vib_term(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RovibrationalLadder {
    pub molecule: String,
    pub isotope: IsotopologueId,
    pub abundance: f64,
    pub molar_mass: f64,
    pub levels: EnergyLevelTable,
    /// Lines sorted by wavenumber, intensities at 296 K.
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, Copy)]
enum Branch {
    P,
    R,
}

impl RovibrationalLadder {
    pub fn generate(
        constants: &RovibrationalConstants,
        limits: LadderLimits,
    ) -> Result<Self, LineStoreError> {
        let parameters = isotopologue_parameters(constants.molecule, constants.isotope)
            .ok_or_else(|| LineStoreError::MissingMolecularData {
                molecule: constants.molecule.to_string(),
                isotope: constants.isotope,
            })?;

        let mut levels = Vec::new();
        for v in 0..=limits.v_max {
            for j in 0..=limits.j_max {
                levels.push(constants.level(v, j));
            }
        }
        let table = EnergyLevelTable::new(levels);
        let q_ref = level_partition_sum(table.levels(), TREF_HITRAN, TREF_HITRAN);

        let mut lines = Vec::new();
        for v in 0..limits.v_max {
            let band_einstein_a = f64::from(v + 1) * constants.band_einstein_a;
            for j_lower in 0..=limits.j_max {
                for branch in [Branch::P, Branch::R] {
                    let j_upper = match branch {
                        Branch::R => j_lower + 1,
                        Branch::P if j_lower > 0 => j_lower - 1,
                        Branch::P => continue,
                    };
                    if j_upper > limits.j_max {
                        continue;
                    }
                    let lower = constants.level(v, j_lower);
                    let upper = constants.level(v + 1, j_upper);
                    if lower.degeneracy <= 0.0 || upper.degeneracy <= 0.0 {
                        continue;
                    }

                    let wavenumber = upper.total_energy() - lower.total_energy();
                    if wavenumber <= 0.0 {
                        continue;
                    }
                    let ju = f64::from(j_upper);
                    let honl_london = match branch {
                        Branch::R => ju / (2.0 * ju + 1.0),
                        Branch::P => (ju + 1.0) / (2.0 * ju + 1.0),
                    };
                    let einstein_a = band_einstein_a * honl_london;
                    let m = match branch {
                        Branch::R => f64::from(j_lower + 1),
                        Branch::P => f64::from(j_lower),
                    };
                    let air_broadening = (0.076 - 4.0e-4 * m).max(0.045);

                    let mut line = Line::new(
                        wavenumber,
                        reference_intensity(
                            parameters.abundance,
                            einstein_a,
                            upper.degeneracy,
                            lower.total_energy(),
                            wavenumber,
                            q_ref,
                        ),
                    )
                    .with_lower_energy(lower.total_energy())
                    .with_einstein(einstein_a, upper.degeneracy, lower.degeneracy)
                    .with_vib_energies(upper.vib_energy, lower.vib_energy)
                    .with_broadening(air_broadening, Some(1.15 * air_broadening), 0.7)
                    .with_pressure_shift(-0.002);
                    line.self_temperature_exponent = Some(0.7);
                    lines.push(line);
                }
            }
        }
        lines.sort_by(|lhs, rhs| lhs.wavenumber.total_cmp(&rhs.wavenumber));

        tracing::debug!(
            molecule = constants.molecule,
            isotope = constants.isotope,
            levels = table.len(),
            lines = lines.len(),
            "generated rovibrational ladder"
        );

        Ok(Self {
            molecule: parameters.molecule.to_string(),
            isotope: IsotopologueId(constants.isotope),
            abundance: parameters.abundance,
            molar_mass: parameters.molar_mass,
            levels: table,
            lines,
        })
    }

    pub fn into_group(self) -> (IsotopologueGroup, EnergyLevelTable) {
        (
            IsotopologueGroup {
                id: self.isotope,
                abundance: self.abundance,
                molar_mass: self.molar_mass,
                lines: self.lines,
            },
            self.levels,
        )
    }

    /// Databank holding the built-in ladders of `isotopes`, each with its
    /// energy levels as partition source.
    pub fn databank(
        molecule: &str,
        isotopes: &[u8],
        database: &str,
    ) -> Result<DatabankFile, LineStoreError> {
        let mut groups = Vec::with_capacity(isotopes.len());
        let mut partition = Vec::with_capacity(isotopes.len());
        for &isotope in isotopes {
            let constants = RovibrationalConstants::builtin(molecule, isotope).ok_or_else(|| {
                LineStoreError::MissingMolecularData {
                    molecule: molecule.to_string(),
                    isotope,
                }
            })?;
            let (group, levels) = Self::generate(&constants, constants.default_limits())?.into_group();
            partition.push(PartitionEntry {
                isotope: group.id,
                source: PartitionSourceSpec::Levels {
                    levels: levels.into_levels(),
                },
            });
            groups.push(group);
        }

        Ok(DatabankFile {
            store: LineStore::new(molecule.trim(), database, TREF_HITRAN, groups)?,
            partition,
        })
    }
}

/// Equilibrium line intensity at 296 K from the Einstein coefficient,
/// cm-1/(molecule.cm-2).
fn reference_intensity(
    abundance: f64,
    einstein_a: f64,
    upper_degeneracy: f64,
    lower_energy: f64,
    wavenumber: f64,
    partition: f64,
) -> f64 {
    let boltzmann = (-C2 * lower_energy / TREF_HITRAN).exp();
    let stimulated = -(-C2 * wavenumber / TREF_HITRAN).exp_m1();
    abundance * einstein_a * upper_degeneracy * boltzmann * stimulated
        / (8.0 * PI * SPEED_OF_LIGHT_CGS * wavenumber * wavenumber * partition)
}

#[cfg(test)]
mod tests {
    use super::{CO_X, CO2_NU3_626, RovibrationalConstants, RovibrationalLadder};
    use crate::lines::IsotopologueId;

    #[test]
    fn co_fundamental_lines_sit_at_measured_positions() {
        let ladder = RovibrationalLadder::generate(&CO_X, CO_X.default_limits()).expect("ladder");
        let find = |target: f64| {
            ladder
                .lines
                .iter()
                .map(|line| line.wavenumber)
                .min_by(|a, b| (a - target).abs().total_cmp(&(b - target).abs()))
                .expect("lines")
        };
        // R(0) and P(1) of the 1-0 band.
        assert!((find(2147.081) - 2147.081).abs() < 0.1);
        assert!((find(2139.426) - 2139.426).abs() < 0.1);
        assert!((CO_X.band_origin(0) - 2143.24).abs() < 0.05);
    }

    #[test]
    fn lines_are_sorted_and_band_strength_is_physical() {
        let ladder = RovibrationalLadder::generate(&CO_X, CO_X.default_limits()).expect("ladder");
        assert!(ladder.lines.windows(2).all(|w| w[0].wavenumber <= w[1].wavenumber));

        let band_strength: f64 = ladder.lines.iter().map(|line| line.intensity).sum();
        assert!(
            (8.0e-18..1.2e-17).contains(&band_strength),
            "band strength {band_strength:e}"
        );
    }

    #[test]
    fn honl_london_factors_sum_to_band_einstein_coefficient() {
        let ladder = RovibrationalLadder::generate(&CO_X, CO_X.default_limits()).expect("ladder");
        // Lines out of (v=1, J'=10): R(9) and P(11).
        let total: f64 = ladder
            .lines
            .iter()
            .filter(|line| line.lower_vib_energy == Some(0.0))
            .filter(|line| line.upper_degeneracy == Some(21.0))
            .filter_map(|line| line.einstein_a)
            .sum();
        assert!((total - CO_X.band_einstein_a).abs() < 1.0e-9);
    }

    #[test]
    fn co2_ladder_respects_spin_statistics() {
        let ladder =
            RovibrationalLadder::generate(&CO2_NU3_626, CO2_NU3_626.default_limits()).expect("ladder");
        assert!(ladder.levels.levels().iter().all(|level| {
            let parity = (level.v.unwrap_or(0) + level.j.unwrap_or(0)) % 2;
            parity == 0
        }));
        let strongest = ladder
            .lines
            .iter()
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
            .expect("lines");
        assert!((2330.0..2370.0).contains(&strongest.wavenumber));
    }

    #[test]
    fn databank_bundles_levels_for_each_isotope() {
        let file = RovibrationalLadder::databank("CO2", &[1, 2], "ladder").expect("databank");
        assert_eq!(
            file.store.isotopologues(),
            vec![IsotopologueId(1), IsotopologueId(2)]
        );
        assert!(file.partition_source(IsotopologueId(2)).is_some());
        assert!(RovibrationalConstants::builtin("co2", 2).is_some());
        assert!(RovibrationalLadder::databank("CO2", &[3], "ladder").is_err());
    }
}
