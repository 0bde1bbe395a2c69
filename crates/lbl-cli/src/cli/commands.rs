use super::CliError;
use super::helpers::*;
use lbl_core::levels::RovibrationalLadder;
use lbl_core::partition::LevelCache;
use lbl_core::{ExecutionMode, LblError, Quantity, Spectrum, SpectrumFactory, ThermalConditions};
use serde::Serialize;
use std::path::PathBuf;

#[derive(clap::Args)]
pub(super) struct SourceArgs {
    /// Serialized line databank (line store plus partition data)
    #[arg(long)]
    lines: PathBuf,

    /// Synthesis configuration JSON; every knob has a default
    #[arg(long)]
    config: Option<PathBuf>,

    /// Superpose lines on the rayon pool regardless of the config
    #[arg(long)]
    parallel: bool,
}

#[derive(clap::Args)]
pub(super) struct GasArgs {
    /// Total pressure, bar
    #[arg(long)]
    pressure: Option<f64>,

    /// Mole fraction of the absorbing molecule
    #[arg(long)]
    mole_fraction: Option<f64>,

    /// Path length, cm
    #[arg(long)]
    path_length: Option<f64>,

    /// Neglect self-absorption in the slab radiance
    #[arg(long)]
    no_self_absorption: bool,
}

#[derive(clap::Args)]
pub(super) struct OutputArgs {
    /// Table output path; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,

    /// Quantity column to tabulate, repeatable; all quantities when omitted
    #[arg(long = "quantity", value_parser = parse_quantity)]
    quantities: Vec<Quantity>,

    /// JSON file receiving the conditions and diagnostics of the run
    #[arg(long)]
    diagnostics: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct EqArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Gas temperature, K
    #[arg(long)]
    tgas: f64,

    #[command(flatten)]
    gas: GasArgs,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(clap::Args)]
pub(super) struct NoneqArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Vibrational temperature, K
    #[arg(long)]
    tvib: f64,

    /// Rotational (and translational) temperature, K
    #[arg(long)]
    trot: f64,

    #[command(flatten)]
    gas: GasArgs,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(clap::Args)]
#[command(group(clap::ArgGroup::new("regime").required(true).args(["tgas", "tvib"])))]
pub(super) struct PowerArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Gas temperature, K
    #[arg(long)]
    tgas: Option<f64>,

    /// Vibrational temperature, K
    #[arg(long, requires = "trot")]
    tvib: Option<f64>,

    /// Rotational temperature, K
    #[arg(long, requires = "tvib")]
    trot: Option<f64>,

    #[command(flatten)]
    gas: GasArgs,

    /// JSON report output path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct LadderArgs {
    /// Molecule formula with built-in rovibrational constants
    #[arg(long, default_value = "CO")]
    molecule: String,

    /// Isotopologue number, repeatable
    #[arg(long = "isotope", default_value = "1")]
    isotopes: Vec<u8>,

    /// Database label recorded in the line store
    #[arg(long, default_value = "ladder")]
    database: String,

    /// Databank output path
    #[arg(long)]
    output: PathBuf,
}

#[derive(Debug, Serialize)]
struct RunRecord<'a> {
    conditions: &'a lbl_core::spectrum::SpectrumConditions,
    diagnostics: &'a lbl_core::spectrum::SynthesisDiagnostics,
    power: f64,
}

#[derive(Debug, Serialize)]
struct PowerReport {
    points: usize,
    integrated_power: f64,
    optically_thin_power: f64,
    relative_difference: f64,
}

pub(super) fn run_eq_command(args: EqArgs) -> Result<i32, CliError> {
    let conditions = args.gas.apply(ThermalConditions::equilibrium(args.tgas));
    let factory = build_factory(&args.source)?;
    let spectrum = factory.eq_spectrum(&conditions)?;
    emit_spectrum(&spectrum, &args.output)
}

pub(super) fn run_noneq_command(args: NoneqArgs) -> Result<i32, CliError> {
    let conditions = args
        .gas
        .apply(ThermalConditions::non_equilibrium(args.tvib, args.trot));
    let factory = build_factory(&args.source)?;
    let spectrum = factory.non_eq_spectrum(&conditions)?;
    emit_spectrum(&spectrum, &args.output)
}

/// The analytic value assumes an optically thin slab, so self-absorption is
/// always disabled for the comparison.
pub(super) fn run_power_command(args: PowerArgs) -> Result<i32, CliError> {
    let thermal = match (args.tgas, args.tvib, args.trot) {
        (Some(tgas), None, None) => ThermalConditions::equilibrium(tgas),
        (None, Some(tvib), Some(trot)) => ThermalConditions::non_equilibrium(tvib, trot),
        _ => {
            return Err(CliError::Usage(
                "power needs either --tgas or both --tvib and --trot".to_string(),
            ));
        }
    };
    let conditions = args.gas.apply(thermal).with_self_absorption(false);
    let factory = build_factory(&args.source)?;
    let spectrum = factory.spectrum(&conditions)?;
    let analytic = factory.optically_thin_power(&conditions)?;
    let integrated = spectrum.power();
    let relative_difference = if analytic > 0.0 {
        integrated / analytic - 1.0
    } else {
        0.0
    };

    let report = PowerReport {
        points: spectrum.len(),
        integrated_power: integrated,
        optically_thin_power: analytic,
        relative_difference,
    };
    println!("Grid points: {}", report.points);
    println!("Integrated power: {:.10e} W/cm2/sr", report.integrated_power);
    println!("Optically thin power: {:.10e} W/cm2/sr", report.optically_thin_power);
    println!("Relative difference: {:.3e}", report.relative_difference);
    if let Some(path) = &args.report {
        write_json(path, &report)?;
        println!("JSON report: {}", path.display());
    }
    Ok(0)
}

pub(super) fn run_ladder_command(args: LadderArgs) -> Result<i32, CliError> {
    let file = RovibrationalLadder::databank(&args.molecule, &args.isotopes, &args.database)
        .map_err(|error| {
            CliError::Compute(
                LblError::from(error).with_conditions(format!("molecule={}", args.molecule)),
            )
        })?;
    write_json(&args.output, &file)?;
    println!(
        "Wrote {} lines of {} ({} isotopologues) to {}",
        file.store.line_count(),
        file.store.molecule,
        file.store.groups().len(),
        args.output.display()
    );
    Ok(0)
}

impl GasArgs {
    fn apply(&self, mut conditions: ThermalConditions) -> ThermalConditions {
        if let Some(pressure) = self.pressure {
            conditions = conditions.with_pressure(pressure);
        }
        if let Some(mole_fraction) = self.mole_fraction {
            conditions = conditions.with_mole_fraction(mole_fraction);
        }
        if let Some(path_length) = self.path_length {
            conditions = conditions.with_path_length(path_length);
        }
        conditions.with_self_absorption(!self.no_self_absorption)
    }
}

fn build_factory(source: &SourceArgs) -> Result<SpectrumFactory, CliError> {
    let mut config = load_config(source.config.as_deref())?;
    if source.parallel {
        config = config.with_execution(ExecutionMode::parallel());
    }
    let (name, file) = load_databank(&source.lines)?;
    tracing::debug!(
        databank = %name,
        molecule = %file.store.molecule,
        lines = file.store.line_count(),
        "loaded line databank"
    );
    SpectrumFactory::from_databank(config, file, &LevelCache::new())
        .map_err(|error| CliError::Compute(error.with_conditions(format!("databank={name}"))))
}

fn emit_spectrum(spectrum: &Spectrum, output: &OutputArgs) -> Result<i32, CliError> {
    let quantities = if output.quantities.is_empty() {
        Quantity::ALL.to_vec()
    } else {
        output.quantities.clone()
    };
    write_output(output.output.as_deref(), &render_table(spectrum, &quantities))?;

    let diagnostics = spectrum.diagnostics();
    if let Some(path) = &output.output {
        println!("Spectrum points: {}", spectrum.len());
        println!("Lines selected: {}", diagnostics.lines_selected);
        for warning in &diagnostics.warnings {
            println!("Warning: {} (count {})", warning.category, warning.count);
        }
        println!("Power: {:.10e} W/cm2/sr", spectrum.power());
        println!("Table: {}", path.display());
    }
    if let Some(path) = &output.diagnostics {
        let record = RunRecord {
            conditions: spectrum.conditions(),
            diagnostics,
            power: spectrum.power(),
        };
        write_json(path, &record)?;
    }
    Ok(0)
}
