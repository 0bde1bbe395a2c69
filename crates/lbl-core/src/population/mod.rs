//! Line intensities at the requested thermal state.
//!
//! Equilibrium scales the tabulated reference intensities with partition
//! function, Boltzmann and stimulated-emission ratios. Non-equilibrium builds
//! level populations from separate vibrational and rotational temperatures
//! and returns both absorption and spontaneous-emission intensities, which no
//! longer collapse into a single net term.

use crate::common::config::NegativeEnergyPolicy;
use crate::common::constants::{BAR_TO_PA, BOLTZMANN, C2, PLANCK, SPEED_OF_LIGHT_CGS};
use crate::lines::{IsotopologueId, Line, LineSelection};
use crate::numerics::stable_sum_iter;
use crate::partition::{PartitionError, PartitionFunctionProvider};
use std::f64::consts::PI;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PopulationError {
    #[error(transparent)]
    Partition(#[from] PartitionError),
    #[error("line {index} of isotopologue {isotope} lacks {field}, required for non-equilibrium populations")]
    MissingNonEquilibriumData {
        isotope: IsotopologueId,
        index: usize,
        field: &'static str,
    },
}

/// A line with its intensities at the requested thermal state.
#[derive(Debug, Clone, Copy)]
pub struct ScaledLine<'a> {
    pub line: &'a Line,
    pub isotope: IsotopologueId,
    pub molar_mass: f64,
    /// Absorption intensity, cm-1/(molecule.cm-2). Negative under
    /// population inversion.
    pub intensity: f64,
    /// Spontaneous emission per molecule, W/sr.
    pub emission: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationReport {
    pub lines_in: usize,
    pub lines_out: usize,
    /// Lines with missing or negative lower-state energy.
    pub negative_energies: usize,
    /// Isotopologues whose partition function was extrapolated.
    pub extrapolated_partition: Vec<IsotopologueId>,
}

impl PopulationReport {
    pub fn merge(&mut self, other: Self) {
        self.lines_in += other.lines_in;
        self.lines_out += other.lines_out;
        self.negative_energies += other.negative_energies;
        for isotope in other.extrapolated_partition {
            if !self.extrapolated_partition.contains(&isotope) {
                self.extrapolated_partition.push(isotope);
            }
        }
    }
}

pub struct PopulationCalculator<'p> {
    provider: &'p PartitionFunctionProvider,
    reference_temperature: f64,
    negative_energies: NegativeEnergyPolicy,
}

impl<'p> PopulationCalculator<'p> {
    pub fn new(
        provider: &'p PartitionFunctionProvider,
        reference_temperature: f64,
        negative_energies: NegativeEnergyPolicy,
    ) -> Self {
        Self {
            provider,
            reference_temperature,
            negative_energies,
        }
    }

    /// Lower-state energy under the negative-energy policy. `None` drops
    /// the line; `Some(None)` keeps it with zero intensity.
    fn lower_energy(&self, line: &Line) -> Option<Option<f64>> {
        match line.lower_energy {
            Some(energy) if energy >= 0.0 && energy.is_finite() => Some(Some(energy)),
            _ => match self.negative_energies {
                NegativeEnergyPolicy::Drop => None,
                NegativeEnergyPolicy::ZeroIntensity => Some(None),
            },
        }
    }

    pub fn equilibrium<'a>(
        &self,
        selection: &LineSelection<'a>,
        t_gas: f64,
    ) -> Result<(Vec<ScaledLine<'a>>, PopulationReport), PopulationError> {
        let group = selection.group;
        let t_ref = self.reference_temperature;
        let q_gas = self.provider.q(group.id, t_gas)?;
        let q_ref = self.provider.q(group.id, t_ref)?;
        let q_ratio = q_ref.value / q_gas.value;

        let mut report = PopulationReport {
            lines_in: selection.lines.len(),
            ..PopulationReport::default()
        };
        if q_gas.extrapolated {
            report.extrapolated_partition.push(group.id);
        }

        let mut scaled = Vec::with_capacity(selection.lines.len());
        for line in selection.lines {
            let Some(lower_energy) = self.lower_energy(line) else {
                report.negative_energies += 1;
                continue;
            };
            let intensity = match lower_energy {
                Some(lower_energy) => {
                    line.intensity
                        * q_ratio
                        * boltzmann_ratio(lower_energy, t_gas, t_ref)
                        * stimulated_emission_ratio(line.wavenumber, t_gas, t_ref)
                }
                None => {
                    report.negative_energies += 1;
                    0.0
                }
            };
            scaled.push(ScaledLine {
                line,
                isotope: group.id,
                molar_mass: group.molar_mass,
                intensity,
                emission: intensity * planck_radiance(line.wavenumber, t_gas),
            });
        }

        report.lines_out = scaled.len();
        Ok((scaled, report))
    }

    pub fn nonequilibrium<'a>(
        &self,
        selection: &LineSelection<'a>,
        t_vib: f64,
        t_rot: f64,
    ) -> Result<(Vec<ScaledLine<'a>>, PopulationReport), PopulationError> {
        let group = selection.group;
        let q = self.provider.q_nonequilibrium(group.id, t_vib, t_rot)?;

        let mut report = PopulationReport {
            lines_in: selection.lines.len(),
            ..PopulationReport::default()
        };
        if q.extrapolated {
            report.extrapolated_partition.push(group.id);
        }

        let mut scaled = Vec::with_capacity(selection.lines.len());
        for (index, line) in selection.lines.iter().enumerate() {
            let Some(lower_energy) = self.lower_energy(line) else {
                report.negative_energies += 1;
                continue;
            };
            let Some(lower_energy) = lower_energy else {
                report.negative_energies += 1;
                scaled.push(ScaledLine {
                    line,
                    isotope: group.id,
                    molar_mass: group.molar_mass,
                    intensity: 0.0,
                    emission: 0.0,
                });
                continue;
            };

            let missing = |field| PopulationError::MissingNonEquilibriumData {
                isotope: group.id,
                index,
                field,
            };
            let einstein_a = line.einstein_a.ok_or_else(|| missing("an Einstein A coefficient"))?;
            let g_upper = line.upper_degeneracy.ok_or_else(|| missing("the upper degeneracy"))?;
            let g_lower = line.lower_degeneracy.ok_or_else(|| missing("the lower degeneracy"))?;
            let vib_upper = line.upper_vib_energy.ok_or_else(|| missing("the upper vibrational energy"))?;
            let vib_lower = line.lower_vib_energy.ok_or_else(|| missing("the lower vibrational energy"))?;
            if g_lower <= 0.0 {
                return Err(missing("a positive lower degeneracy"));
            }

            let upper_energy = lower_energy + line.wavenumber;
            let population = |degeneracy: f64, total: f64, vib: f64| {
                degeneracy * (-C2 * vib / t_vib - C2 * (total - vib) / t_rot).exp() / q.value
            };
            let n_lower = population(g_lower, lower_energy, vib_lower);
            let n_upper = population(g_upper, upper_energy, vib_upper);

            let nu = line.wavenumber;
            let abundance = group.abundance;
            let intensity = abundance * einstein_a / (8.0 * PI * SPEED_OF_LIGHT_CGS * nu * nu)
                * (n_lower * g_upper / g_lower - n_upper);
            let emission = abundance * n_upper * einstein_a * PLANCK * SPEED_OF_LIGHT_CGS * nu / (4.0 * PI);

            scaled.push(ScaledLine {
                line,
                isotope: group.id,
                molar_mass: group.molar_mass,
                intensity,
                emission,
            });
        }

        report.lines_out = scaled.len();
        Ok((scaled, report))
    }
}

/// `exp(-c2 El (1/T - 1/Tref))`
pub fn boltzmann_ratio(lower_energy: f64, temperature: f64, reference_temperature: f64) -> f64 {
    (-C2 * lower_energy * (1.0 / temperature - 1.0 / reference_temperature)).exp()
}

/// `(1 - exp(-c2 nu/T)) / (1 - exp(-c2 nu/Tref))`, evaluated with `expm1`
/// so it stays accurate when `c2 nu / T` is small.
pub fn stimulated_emission_ratio(wavenumber: f64, temperature: f64, reference_temperature: f64) -> f64 {
    (-C2 * wavenumber / temperature).exp_m1() / (-C2 * wavenumber / reference_temperature).exp_m1()
}

/// Blackbody spectral radiance, W/cm2/sr/cm-1.
pub fn planck_radiance(wavenumber: f64, temperature: f64) -> f64 {
    let exponent = C2 * wavenumber / temperature;
    if exponent > 700.0 {
        return 0.0;
    }
    2.0 * PLANCK * SPEED_OF_LIGHT_CGS * SPEED_OF_LIGHT_CGS * wavenumber.powi(3) / exponent.exp_m1()
}

/// Absorber number density `x p / (k T)`, molecules/cm3, with `p` in bar.
pub fn number_density(mole_fraction: f64, pressure_bar: f64, temperature: f64) -> f64 {
    mole_fraction * pressure_bar * BAR_TO_PA / (BOLTZMANN * temperature) * 1.0e-6
}

/// Optically thin emitted power `N L sum(eps_i)`, W/cm2/sr, over the lines
/// whose position lies inside `[wmin, wmax]`.
pub fn optically_thin_power(
    emitters: impl IntoIterator<Item = (f64, f64)>,
    number_density: f64,
    path_length: f64,
    (wmin, wmax): (f64, f64),
) -> f64 {
    number_density
        * path_length
        * stable_sum_iter(
            emitters
                .into_iter()
                .filter(|(position, _)| (wmin..=wmax).contains(position))
                .map(|(_, emission)| emission),
        )
}
