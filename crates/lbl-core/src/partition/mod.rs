//! Total internal partition functions per isotopologue.

mod cache;

pub use cache::{LevelCache, LevelCacheKey};

use crate::common::constants::C2;
use crate::levels::{EnergyLevel, EnergyLevelTable};
use crate::lines::{DatabankFile, IsotopologueId, PartitionSourceSpec};
use crate::numerics::{extrapolate_linear, interpolate_linear, stable_sum_iter};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PartitionError {
    #[error("no partition function source for isotopologue {isotope}")]
    MissingPartitionData { isotope: IsotopologueId },
    #[error("isotopologue {isotope} only has tabulated Q(T); non-equilibrium populations need energy levels")]
    NonEquilibriumUnsupported { isotope: IsotopologueId },
    #[error("invalid partition table: {reason}")]
    InvalidTable { reason: String },
    #[error("partition function evaluated to a non-positive value {value} at T={temperature} K")]
    NonPositive { temperature: f64, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionValue {
    pub value: f64,
    /// The temperature lies outside the data the source was built from.
    pub extrapolated: bool,
}

pub trait PartitionFunction: Send + Sync {
    fn at(&self, temperature: f64) -> Result<PartitionValue, PartitionError>;

    /// Two-temperature partition function. `None` when the source has no
    /// vibrational/rotational split.
    fn at_nonequilibrium(&self, t_vib: f64, t_rot: f64) -> Option<Result<PartitionValue, PartitionError>> {
        let _ = (t_vib, t_rot);
        None
    }

    fn kind(&self) -> &'static str;
}

/// Q(T) tabulated on a strictly increasing temperature grid.
#[derive(Debug, Clone, PartialEq)]
pub struct TabulatedPartitionFunction {
    temperatures: Vec<f64>,
    values: Vec<f64>,
}

impl TabulatedPartitionFunction {
    pub fn new(temperatures: Vec<f64>, values: Vec<f64>) -> Result<Self, PartitionError> {
        let invalid = |reason: &str| PartitionError::InvalidTable {
            reason: reason.to_string(),
        };
        if temperatures.len() < 2 || temperatures.len() != values.len() {
            return Err(invalid("needs at least two (T, Q) pairs of equal length"));
        }
        if temperatures.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(invalid("temperatures must be strictly increasing"));
        }
        if values.iter().any(|value| !value.is_finite() || *value <= 0.0) {
            return Err(invalid("Q values must be finite and positive"));
        }
        Ok(Self {
            temperatures,
            values,
        })
    }

    pub fn range(&self) -> (f64, f64) {
        (
            self.temperatures[0],
            self.temperatures[self.temperatures.len() - 1],
        )
    }
}

impl PartitionFunction for TabulatedPartitionFunction {
    fn at(&self, temperature: f64) -> Result<PartitionValue, PartitionError> {
        let (t_min, t_max) = self.range();
        let extrapolated = temperature < t_min || temperature > t_max;
        let value = if extrapolated {
            extrapolate_linear(temperature, &self.temperatures, &self.values)
        } else {
            interpolate_linear(temperature, &self.temperatures, &self.values)
        }
        .ok_or_else(|| PartitionError::InvalidTable {
            reason: format!("cannot evaluate at T={temperature} K"),
        })?;

        if !value.is_finite() || value <= 0.0 {
            return Err(PartitionError::NonPositive { temperature, value });
        }
        Ok(PartitionValue {
            value,
            extrapolated,
        })
    }

    fn kind(&self) -> &'static str {
        "tabulated"
    }
}

/// Direct Boltzmann sum over a shared level table.
#[derive(Debug, Clone)]
pub struct EnergyLevelPartitionFunction {
    levels: Arc<EnergyLevelTable>,
}

impl EnergyLevelPartitionFunction {
    pub fn new(levels: Arc<EnergyLevelTable>) -> Self {
        Self { levels }
    }

    pub fn levels(&self) -> &EnergyLevelTable {
        &self.levels
    }

    /// Levels above ~ 30 kT are missing from the table.
    fn is_extrapolated(&self, temperature: f64) -> bool {
        self.levels
            .max_energy()
            .is_none_or(|energy| C2 * energy / temperature < 30.0)
    }
}

/// `sum g exp(-c2 Evib/Tvib) exp(-c2 Erot/Trot)`.
pub fn level_partition_sum(levels: &[EnergyLevel], t_vib: f64, t_rot: f64) -> f64 {
    stable_sum_iter(levels.iter().map(|level| {
        level.degeneracy
            * (-C2 * level.vib_energy / t_vib - C2 * level.rot_energy / t_rot).exp()
    }))
}

impl PartitionFunction for EnergyLevelPartitionFunction {
    fn at(&self, temperature: f64) -> Result<PartitionValue, PartitionError> {
        let value = level_partition_sum(self.levels.levels(), temperature, temperature);
        if !value.is_finite() || value <= 0.0 {
            return Err(PartitionError::NonPositive { temperature, value });
        }
        Ok(PartitionValue {
            value,
            extrapolated: self.is_extrapolated(temperature),
        })
    }

    fn at_nonequilibrium(&self, t_vib: f64, t_rot: f64) -> Option<Result<PartitionValue, PartitionError>> {
        let value = level_partition_sum(self.levels.levels(), t_vib, t_rot);
        Some(if !value.is_finite() || value <= 0.0 {
            Err(PartitionError::NonPositive {
                temperature: t_vib,
                value,
            })
        } else {
            Ok(PartitionValue {
                value,
                extrapolated: self.is_extrapolated(t_vib.max(t_rot)),
            })
        })
    }

    fn kind(&self) -> &'static str {
        "energy-levels"
    }
}

/// Arena of partition-function sources indexed by isotopologue id.
#[derive(Default)]
pub struct PartitionFunctionProvider {
    sources: Vec<Option<Arc<dyn PartitionFunction>>>,
}

impl std::fmt::Debug for PartitionFunctionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.sources
                    .iter()
                    .enumerate()
                    .filter_map(|(id, source)| source.as_ref().map(|source| (id, source.kind()))),
            )
            .finish()
    }
}

impl PartitionFunctionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, isotope: IsotopologueId, source: Arc<dyn PartitionFunction>) {
        let index = usize::from(isotope.0);
        if self.sources.len() <= index {
            self.sources.resize(index + 1, None);
        }
        self.sources[index] = Some(source);
    }

    pub fn contains(&self, isotope: IsotopologueId) -> bool {
        self.sources
            .get(usize::from(isotope.0))
            .is_some_and(Option::is_some)
    }

    pub fn source(&self, isotope: IsotopologueId) -> Result<&dyn PartitionFunction, PartitionError> {
        self.sources
            .get(usize::from(isotope.0))
            .and_then(Option::as_deref)
            .ok_or(PartitionError::MissingPartitionData { isotope })
    }

    pub fn q(&self, isotope: IsotopologueId, temperature: f64) -> Result<PartitionValue, PartitionError> {
        self.source(isotope)?.at(temperature)
    }

    pub fn q_nonequilibrium(
        &self,
        isotope: IsotopologueId,
        t_vib: f64,
        t_rot: f64,
    ) -> Result<PartitionValue, PartitionError> {
        self.source(isotope)?
            .at_nonequilibrium(t_vib, t_rot)
            .unwrap_or(Err(PartitionError::NonEquilibriumUnsupported { isotope }))
    }

    /// Builds sources for every partition entry shipped with a databank.
    /// Level tables go through `cache`, keyed by the databank identity and
    /// the content hash of the levels themselves.
    pub fn from_databank(file: &DatabankFile, cache: &LevelCache) -> Result<Self, PartitionError> {
        let mut provider = Self::new();
        for entry in &file.partition {
            let source: Arc<dyn PartitionFunction> = match &entry.source {
                PartitionSourceSpec::Tabulated {
                    temperatures,
                    values,
                } => Arc::new(TabulatedPartitionFunction::new(
                    temperatures.clone(),
                    values.clone(),
                )?),
                PartitionSourceSpec::Levels { levels } => {
                    let key = LevelCacheKey {
                        database: file.store.database.clone(),
                        isotope: entry.isotope,
                        content_hash: EnergyLevelTable::hash_levels(levels),
                    };
                    let table =
                        cache.get_or_insert_with(key, || EnergyLevelTable::new(levels.clone()));
                    Arc::new(EnergyLevelPartitionFunction::new(table))
                }
            };
            provider.insert(entry.isotope, source);
        }
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        EnergyLevelPartitionFunction, LevelCache, PartitionError, PartitionFunction,
        PartitionFunctionProvider, TabulatedPartitionFunction, level_partition_sum,
    };
    use crate::common::constants::C2;
    use crate::levels::{EnergyLevel, EnergyLevelTable, RovibrationalLadder};
    use crate::lines::{IsotopologueId, PartitionSourceSpec};
    use std::sync::Arc;

    #[test]
    fn tabulated_source_interpolates_and_flags_extrapolation() {
        let table =
            TabulatedPartitionFunction::new(vec![100.0, 200.0, 300.0], vec![36.0, 72.0, 108.0])
                .expect("valid table");

        let inside = table.at(250.0).expect("inside");
        assert!((inside.value - 90.0).abs() < 1.0e-12);
        assert!(!inside.extrapolated);

        let outside = table.at(400.0).expect("extrapolated");
        assert!((outside.value - 144.0).abs() < 1.0e-12);
        assert!(outside.extrapolated);
        assert!(table.at_nonequilibrium(300.0, 300.0).is_none());

        assert!(TabulatedPartitionFunction::new(vec![100.0, 100.0], vec![1.0, 2.0]).is_err());
        assert!(TabulatedPartitionFunction::new(vec![100.0], vec![1.0]).is_err());
    }

    #[test]
    fn level_sum_matches_rigid_rotor_high_temperature_limit() {
        let b = 1.93;
        let levels: Vec<EnergyLevel> = (0..400)
            .map(|j| {
                let j = f64::from(j);
                EnergyLevel::new(2.0 * j + 1.0, 0.0, b * j * (j + 1.0))
            })
            .collect();
        let source = EnergyLevelPartitionFunction::new(Arc::new(EnergyLevelTable::new(levels)));
        let temperature = 1_000.0;
        let q = source.at(temperature).expect("q").value;
        let classical = temperature / (C2 * b) + 1.0 / 3.0;
        assert!((q / classical - 1.0).abs() < 1.0e-3, "q={q} classical={classical}");
    }

    #[test]
    fn two_temperature_sum_collapses_at_equal_temperatures() {
        let levels = vec![
            EnergyLevel::new(1.0, 0.0, 0.0),
            EnergyLevel::new(3.0, 0.0, 3.8),
            EnergyLevel::new(1.0, 2143.0, 0.0),
            EnergyLevel::new(3.0, 2143.0, 3.8),
        ];
        let equal = level_partition_sum(&levels, 800.0, 800.0);
        let source = EnergyLevelPartitionFunction::new(Arc::new(EnergyLevelTable::new(levels)));
        let noneq = source
            .at_nonequilibrium(800.0, 800.0)
            .expect("levels support non-equilibrium")
            .expect("q");
        assert_eq!(noneq.value, equal);
        assert!(source.at_nonequilibrium(3_000.0, 800.0).expect("supported").expect("q").value > equal);
    }

    #[test]
    fn provider_reports_missing_sources_and_reuses_cached_levels() {
        let file = RovibrationalLadder::databank("CO", &[1, 2], "ladder").expect("databank");
        let cache = LevelCache::new();
        let provider = PartitionFunctionProvider::from_databank(&file, &cache).expect("provider");
        let again = PartitionFunctionProvider::from_databank(&file, &cache).expect("provider");

        assert!(provider.contains(IsotopologueId(1)));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.hits(), 2);
        assert_eq!(
            provider.q(IsotopologueId(1), 296.0).expect("q").value,
            again.q(IsotopologueId(1), 296.0).expect("q").value
        );
        assert_eq!(
            provider.q(IsotopologueId(3), 296.0).expect_err("missing"),
            PartitionError::MissingPartitionData {
                isotope: IsotopologueId(3)
            }
        );

        let mut tabulated = PartitionFunctionProvider::new();
        tabulated.insert(
            IsotopologueId(1),
            Arc::new(TabulatedPartitionFunction::new(vec![1.0, 2.0], vec![1.0, 2.0]).expect("table")),
        );
        assert_eq!(
            tabulated.q_nonequilibrium(IsotopologueId(1), 1.0, 1.0),
            Err(PartitionError::NonEquilibriumUnsupported {
                isotope: IsotopologueId(1)
            })
        );
    }

    #[test]
    fn shared_cache_keeps_databanks_with_different_levels_apart() {
        let file = RovibrationalLadder::databank("CO", &[1], "ladder").expect("databank");
        let mut truncated = file.clone();
        for entry in &mut truncated.partition {
            if let PartitionSourceSpec::Levels { levels } = &mut entry.source {
                levels.truncate(10);
            }
        }

        let cache = LevelCache::new();
        let full = PartitionFunctionProvider::from_databank(&file, &cache).expect("full levels");
        let shared = PartitionFunctionProvider::from_databank(&truncated, &cache)
            .expect("truncated levels through the shared cache");
        let fresh = PartitionFunctionProvider::from_databank(&truncated, &LevelCache::new())
            .expect("truncated levels through a fresh cache");

        let q_full = full.q(IsotopologueId(1), 1_000.0).expect("q").value;
        let q_shared = shared.q(IsotopologueId(1), 1_000.0).expect("q").value;
        let q_fresh = fresh.q(IsotopologueId(1), 1_000.0).expect("q").value;
        assert_eq!(q_shared, q_fresh);
        assert!(q_full > q_shared, "full={q_full} truncated={q_shared}");
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.hits(), 0);

        let again = PartitionFunctionProvider::from_databank(&truncated, &cache).expect("reuse");
        assert_eq!(cache.hits(), 1);
        assert_eq!(again.q(IsotopologueId(1), 1_000.0).expect("q").value, q_fresh);
    }
}
