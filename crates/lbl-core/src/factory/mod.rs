//! `SpectrumFactory`: one configured synthesis engine over a caller-owned
//! line store. Every call runs selection, populations, broadening, grid
//! sizing, superposition and assembly from scratch; only the line store and
//! the partition sources outlive a call.

use crate::broadening::{BroadenedLine, BroadeningConditions, broaden, to_vacuum};
use crate::common::config::{GridStep, NegativeEnergyPolicy, SynthesisConfig};
use crate::domain::{
    LblError, LblResult, ThermalConditions, ThermalState, WarningCategory, WarningSink,
};
use crate::grid::{GridError, SpectralGrid, auto_step};
use crate::lines::{
    Databank, DatabankFile, DatabankRequest, IsotopologueId, LineStore, LineStoreError,
};
use crate::partition::{LevelCache, PartitionError, PartitionFunctionProvider};
use crate::population::{
    PopulationCalculator, PopulationError, PopulationReport, ScaledLine, number_density,
    optically_thin_power, planck_radiance,
};
use crate::spectrum::{Spectrum, SpectrumConditions, SynthesisDiagnostics};
use crate::superposition::{SuperpositionSettings, superpose};
use std::sync::Arc;
use std::time::Instant;

/// Step used by `GridStep::Auto` when no line falls in the range.
const AUTO_STEP_FALLBACK: f64 = 0.01;

impl From<LineStoreError> for LblError {
    fn from(error: LineStoreError) -> Self {
        match &error {
            LineStoreError::DatabankNotFound { .. } => {
                LblError::data_availability("DATA.DATABANK_NOT_FOUND", error.to_string())
            }
            LineStoreError::Unreadable { .. } => {
                LblError::data_availability("DATA.DATABANK_UNREADABLE", error.to_string())
            }
            LineStoreError::MissingMolecularData { .. } => {
                LblError::data_availability("DATA.MISSING_MOLECULAR_DATA", error.to_string())
            }
            _ => LblError::input_validation("INPUT.LINE_STORE", error.to_string()),
        }
    }
}

impl From<PartitionError> for LblError {
    fn from(error: PartitionError) -> Self {
        match &error {
            PartitionError::MissingPartitionData { .. } => {
                LblError::data_availability("DATA.MISSING_PARTITION_DATA", error.to_string())
            }
            PartitionError::NonEquilibriumUnsupported { .. } => {
                LblError::data_availability("DATA.NONEQUILIBRIUM_UNSUPPORTED", error.to_string())
            }
            PartitionError::InvalidTable { .. } => {
                LblError::input_validation("INPUT.PARTITION_TABLE", error.to_string())
            }
            PartitionError::NonPositive { .. } => {
                LblError::computation("COMPUTE.PARTITION_FUNCTION", error.to_string())
            }
        }
    }
}

impl From<PopulationError> for LblError {
    fn from(error: PopulationError) -> Self {
        match error {
            PopulationError::Partition(error) => error.into(),
            PopulationError::MissingNonEquilibriumData { .. } => {
                LblError::data_availability("DATA.MISSING_NONEQUILIBRIUM_DATA", error.to_string())
            }
        }
    }
}

impl From<GridError> for LblError {
    fn from(error: GridError) -> Self {
        LblError::input_validation("INPUT.GRID", error.to_string())
    }
}

pub struct SpectrumFactory {
    config: SynthesisConfig,
    store: Arc<LineStore>,
    partitions: PartitionFunctionProvider,
}

impl std::fmt::Debug for SpectrumFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumFactory")
            .field("molecule", &self.store.molecule)
            .field("database", &self.store.database)
            .field("lines", &self.store.line_count())
            .field("partitions", &self.partitions)
            .finish()
    }
}

impl SpectrumFactory {
    pub fn new(
        config: SynthesisConfig,
        store: Arc<LineStore>,
        partitions: PartitionFunctionProvider,
    ) -> LblResult<Self> {
        config.validate()?;
        if let Some(isotopes) = &config.isotopes {
            if let Some(missing) = isotopes.iter().find(|id| store.group(**id).is_none()) {
                return Err(LblError::data_availability(
                    "DATA.MISSING_ISOTOPOLOGUE",
                    format!(
                        "isotopologue {missing} is not in the {} line store of '{}'",
                        store.molecule, store.database
                    ),
                ));
            }
        }
        Ok(Self {
            config,
            store,
            partitions,
        })
    }

    /// Builds the partition sources shipped with `file`, sharing level
    /// tables through `cache`.
    pub fn from_databank(
        config: SynthesisConfig,
        file: DatabankFile,
        cache: &LevelCache,
    ) -> LblResult<Self> {
        let partitions = PartitionFunctionProvider::from_databank(&file, cache)?;
        Self::new(config, Arc::new(file.store), partitions)
    }

    pub fn load(
        config: SynthesisConfig,
        databank: &impl Databank,
        name: &str,
        cache: &LevelCache,
    ) -> LblResult<Self> {
        let request = Self::request(&config, name);
        let file = databank
            .load(&request)
            .map_err(|error| LblError::from(error).with_conditions(format!("databank={name}")))?;
        Self::from_databank(config, file, cache)
    }

    /// Like [`SpectrumFactory::load`], but a missing databank yields `None`
    /// when `skip_missing` is set.
    pub fn load_or_skip(
        config: SynthesisConfig,
        databank: &impl Databank,
        name: &str,
        cache: &LevelCache,
        skip_missing: bool,
    ) -> LblResult<Option<Self>> {
        let request = Self::request(&config, name);
        let file = databank
            .load_databank_or_skip(&request, skip_missing)
            .map_err(|error| LblError::from(error).with_conditions(format!("databank={name}")))?;
        file.map(|file| Self::from_databank(config, file, cache))
            .transpose()
    }

    fn request(config: &SynthesisConfig, name: &str) -> DatabankRequest {
        let request = DatabankRequest::new(name);
        match &config.isotopes {
            Some(isotopes) => request.with_isotopes(isotopes.clone()),
            None => request,
        }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn store(&self) -> &LineStore {
        &self.store
    }

    pub fn partitions(&self) -> &PartitionFunctionProvider {
        &self.partitions
    }

    /// Equilibrium spectrum at a single gas temperature.
    pub fn eq_spectrum(&self, conditions: &ThermalConditions) -> LblResult<Spectrum> {
        if !conditions.thermal.is_equilibrium() {
            return Err(LblError::input_validation(
                "INPUT.THERMAL_REGIME",
                "eq_spectrum needs equilibrium conditions, use non_eq_spectrum",
            )
            .with_conditions(self.describe(conditions)));
        }
        self.spectrum(conditions)
    }

    /// Spectrum with separate vibrational and rotational temperatures.
    pub fn non_eq_spectrum(&self, conditions: &ThermalConditions) -> LblResult<Spectrum> {
        if conditions.thermal.is_equilibrium() {
            return Err(LblError::input_validation(
                "INPUT.THERMAL_REGIME",
                "non_eq_spectrum needs separate vibrational and rotational temperatures",
            )
            .with_conditions(self.describe(conditions)));
        }
        self.spectrum(conditions)
    }

    /// Runs the regime named by `conditions.thermal`.
    pub fn spectrum(&self, conditions: &ThermalConditions) -> LblResult<Spectrum> {
        self.synthesize(conditions)
            .map_err(|error| error.with_conditions(self.describe(conditions)))
    }

    /// Analytic optically thin power `N L sum(eps)` over the output range,
    /// W/cm2/sr.
    pub fn optically_thin_power(&self, conditions: &ThermalConditions) -> LblResult<f64> {
        self.thin_power(conditions)
            .map_err(|error| error.with_conditions(self.describe(conditions)))
    }

    fn thin_power(&self, conditions: &ThermalConditions) -> LblResult<f64> {
        conditions.validate()?;
        let mut warnings = WarningSink::new(&self.config.warnings);
        let mut diagnostics = SynthesisDiagnostics::default();
        let range = self.config.range.wavenumbers();
        let lines = self.broadened_lines(conditions, range, &mut warnings, &mut diagnostics)?;

        let density = number_density(
            conditions.mole_fraction,
            conditions.pressure,
            conditions.thermal.translational_temperature(),
        );
        Ok(optically_thin_power(
            lines.iter().map(|line| (line.position, line.emission)),
            density,
            conditions.path_length,
            range,
        ))
    }

    fn synthesize(&self, conditions: &ThermalConditions) -> LblResult<Spectrum> {
        let started = Instant::now();
        conditions.validate()?;
        let config = &self.config;
        let mut warnings = WarningSink::new(&config.warnings);
        let mut diagnostics = SynthesisDiagnostics::default();

        let (wmin, wmax) = config.range.wavenumbers();
        let half_window = 0.5 * config.broadening_max_width;
        let mut lines = self.broadened_lines(
            conditions,
            (wmin - half_window, wmax + half_window),
            &mut warnings,
            &mut diagnostics,
        )?;

        let narrowest = lines
            .iter()
            .map(BroadenedLine::fwhm)
            .filter(|fwhm| *fwhm > 0.0)
            .min_by(f64::total_cmp);
        let wstep = match config.wstep {
            GridStep::Fixed { wstep } => wstep,
            GridStep::Auto {
                points_per_linewidth,
            } => narrowest
                .and_then(|fwhm| auto_step(fwhm, points_per_linewidth))
                .unwrap_or(AUTO_STEP_FALLBACK),
        };
        let grid = SpectralGrid::new(wmin, wmax, wstep, config.broadening_max_width)?;

        let selected = lines.len();
        lines.retain(|line| grid.contains(line.position));
        diagnostics.lines_out_of_range = selected - lines.len();
        warnings.emit(
            WarningCategory::OutOfRangeLines,
            diagnostics.lines_out_of_range,
            "lines shifted outside the calculation range were discarded",
        )?;
        self.check_lineshapes(&lines, wstep, &mut warnings)?;

        let settings = SuperpositionSettings {
            strategy: config.strategy,
            voigt: config.voigt,
            broadening_max_width: config.broadening_max_width,
            cutoff: config.cutoff,
            pseudo_continuum: config.pseudo_continuum,
            execution: config.execution,
            with_emission: !conditions.thermal.is_equilibrium(),
        };
        let outcome = superpose(lines, &grid, &settings);
        let cutoff = &outcome.diagnostics.cutoff;
        if cutoff.discarded_fraction() > config.cutoff_error_tolerance {
            warnings.emit(
                WarningCategory::LinestrengthCutoff,
                cutoff.lines_discarded(),
                format!(
                    "cutoff {:e} discarded {:.3} % of the total intensity (tolerance {:.3} %)",
                    cutoff.cutoff,
                    100.0 * cutoff.discarded_fraction(),
                    100.0 * config.cutoff_error_tolerance
                ),
            )?;
        }

        let density = number_density(
            conditions.mole_fraction,
            conditions.pressure,
            conditions.thermal.translational_temperature(),
        );
        let output = grid.output_indices();
        let wavenumbers: Vec<f64> = output.clone().map(|index| grid.wavenumber(index)).collect();
        let abscoeff: Vec<f64> = outcome.accumulator.absorption[output.clone()]
            .iter()
            .map(|value| value * density)
            .collect();
        let emisscoeff: Vec<f64> = match (conditions.thermal, &outcome.accumulator.emission) {
            (ThermalState::Equilibrium { t_gas }, _) => abscoeff
                .iter()
                .zip(&wavenumbers)
                .map(|(k, nu)| k * planck_radiance(to_vacuum(*nu, config.medium), t_gas))
                .collect(),
            (ThermalState::NonEquilibrium { .. }, Some(emission)) => emission[output]
                .iter()
                .map(|value| value * density)
                .collect(),
            (ThermalState::NonEquilibrium { .. }, None) => vec![0.0; wavenumbers.len()],
        };

        diagnostics.superposition = outcome.diagnostics;
        diagnostics.warnings = warnings.into_records();
        let calculation_time = started.elapsed().as_secs_f64();
        tracing::info!(
            molecule = %self.store.molecule,
            thermal = %conditions.thermal,
            lines = diagnostics.superposition.strategy.lines,
            points = wavenumbers.len(),
            strategy = config.strategy.name(),
            calculation_time,
            "synthesized spectrum"
        );

        let (wavenum_min, wavenum_max) = grid.output_range();
        let conditions = SpectrumConditions {
            molecule: self.store.molecule.clone(),
            database: self.store.database.clone(),
            isotopes: self.isotopes(),
            thermal: conditions.clone(),
            medium: config.medium,
            wavenum_min,
            wavenum_max,
            wstep,
            broadening_max_width: config.broadening_max_width,
            cutoff: config.cutoff,
            voigt: config.voigt,
            strategy: config.strategy,
            pseudo_continuum: config.pseudo_continuum,
            reference_temperature: self.store.reference_temperature,
            calculation_time,
        };
        Spectrum::new(wavenumbers, abscoeff, emisscoeff, conditions, diagnostics)
    }

    /// Lines of the configured isotopologues whose rest position falls in
    /// `range` (medium wavenumbers), with populations and widths at
    /// `conditions`.
    fn broadened_lines(
        &self,
        conditions: &ThermalConditions,
        (min, max): (f64, f64),
        warnings: &mut WarningSink<'_>,
        diagnostics: &mut SynthesisDiagnostics,
    ) -> LblResult<Vec<BroadenedLine>> {
        let config = &self.config;
        let vacuum_min = to_vacuum(min, config.medium);
        let vacuum_max = to_vacuum(max, config.medium);
        let selections = self
            .store
            .select(config.isotopes.as_deref(), vacuum_min, vacuum_max);

        let calculator = PopulationCalculator::new(
            &self.partitions,
            self.store.reference_temperature,
            config.negative_energies,
        );
        let mut scaled: Vec<ScaledLine<'_>> = Vec::new();
        let mut report = PopulationReport::default();
        for selection in &selections {
            let (lines, group_report) = match conditions.thermal {
                ThermalState::Equilibrium { t_gas } => calculator.equilibrium(selection, t_gas)?,
                ThermalState::NonEquilibrium { t_vib, t_rot } => {
                    calculator.nonequilibrium(selection, t_vib, t_rot)?
                }
            };
            scaled.extend(lines);
            report.merge(group_report);
        }
        tracing::debug!(
            selected = report.lines_in,
            kept = report.lines_out,
            "computed line populations"
        );

        diagnostics.lines_selected = report.lines_in;
        diagnostics.negative_energies = report.negative_energies;
        let action = match config.negative_energies {
            NegativeEnergyPolicy::Drop => "dropped",
            NegativeEnergyPolicy::ZeroIntensity => "kept with zero intensity",
        };
        warnings.emit(
            WarningCategory::NegativeEnergies,
            report.negative_energies,
            format!("lines with missing or negative lower-state energy were {action}"),
        )?;
        if !report.extrapolated_partition.is_empty() {
            let isotopes: Vec<String> = report
                .extrapolated_partition
                .iter()
                .map(ToString::to_string)
                .collect();
            warnings.emit(
                WarningCategory::HighTemperature,
                report.extrapolated_partition.len(),
                format!(
                    "partition function extrapolated at {} for isotopologues {}",
                    conditions.thermal,
                    isotopes.join(",")
                ),
            )?;
        }
        diagnostics.extrapolated_partition = report.extrapolated_partition;

        let broadening = BroadeningConditions {
            temperature: conditions.thermal.translational_temperature(),
            reference_temperature: self.store.reference_temperature,
            pressure: conditions.pressure,
            mole_fraction: conditions.mole_fraction,
            medium: config.medium,
        };
        let (lines, broadening_report) = broaden(&scaled, &broadening);
        diagnostics.missing_self_broadening = broadening_report.missing_self_broadening;
        warnings.emit(
            WarningCategory::MissingSelfBroadening,
            broadening_report.missing_self_broadening,
            "self-broadening coefficients missing, air broadening used instead",
        )?;
        Ok(lines)
    }

    fn check_lineshapes(
        &self,
        lines: &[BroadenedLine],
        wstep: f64,
        warnings: &mut WarningSink<'_>,
    ) -> LblResult<()> {
        let window = self.config.broadening_max_width;
        let truncated = lines
            .iter()
            .filter(|line| line.fwhm() > 0.25 * window)
            .count();
        warnings.emit(
            WarningCategory::LineshapeTruncation,
            truncated,
            format!("line FWHM exceeds a quarter of the {window} cm-1 lineshape window"),
        )?;

        if let GridStep::Fixed { .. } = self.config.wstep {
            let coarse = lines
                .iter()
                .filter(|line| wstep > 0.5 * line.fwhm())
                .count();
            warnings.emit(
                WarningCategory::CoarseGrid,
                coarse,
                format!("grid step {wstep} cm-1 is larger than half the FWHM of some lines"),
            )?;
        }
        Ok(())
    }

    fn isotopes(&self) -> Vec<IsotopologueId> {
        self.config
            .isotopes
            .clone()
            .unwrap_or_else(|| self.store.isotopologues())
    }

    /// Condition record attached to every aborted call.
    fn describe(&self, conditions: &ThermalConditions) -> String {
        let (wmin, wmax) = self.config.range.wavenumbers();
        let isotopes: Vec<String> = self.isotopes().iter().map(ToString::to_string).collect();
        format!(
            "molecule={} isotopes={} {} p={} bar x={} range={wmin}..{wmax} cm-1 medium={}",
            self.store.molecule,
            isotopes.join(","),
            conditions.thermal,
            conditions.pressure,
            conditions.mole_fraction,
            self.config.medium
        )
    }
}
