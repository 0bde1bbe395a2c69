use super::CliError;
use anyhow::Context;
use lbl_core::lines::{DatabankFile, read_databank_file};
use lbl_core::{LblError, Quantity, Spectrum, SynthesisConfig, load_synthesis_config};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

const DEFAULT_LOG_FILTER: &str = "info";
const COLUMN_WIDTH: usize = 22;

/// Logs go to stderr so tables written to stdout stay parseable.
pub(super) fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub(super) fn parse_quantity(value: &str) -> Result<Quantity, String> {
    value.parse::<Quantity>().map_err(|error| error.to_string())
}

pub(super) fn load_config(path: Option<&Path>) -> Result<SynthesisConfig, CliError> {
    match path {
        Some(path) => load_synthesis_config(path).map_err(|error| CliError::Compute(error.into())),
        None => Ok(SynthesisConfig::default()),
    }
}

/// The databank name is the file stem of `path`.
pub(super) fn load_databank(path: &Path) -> Result<(String, DatabankFile), CliError> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| {
            CliError::Usage(format!(
                "line databank path '{}' has no usable file name",
                path.display()
            ))
        })?
        .to_string();
    if !path.is_file() {
        return Err(CliError::Compute(
            LblError::data_availability(
                "DATA.DATABANK_NOT_FOUND",
                format!("line databank '{}' does not exist", path.display()),
            )
            .with_conditions(format!("databank={name}")),
        ));
    }
    let file = read_databank_file(path, &name)
        .map_err(|error| CliError::Compute(LblError::from(error).with_conditions(format!("databank={name}"))))?;
    Ok((name, file))
}

/// Fixed-width table: wavenumber, wavelength, then one column per quantity.
pub(super) fn render_table(spectrum: &Spectrum, quantities: &[Quantity]) -> String {
    let wavelengths = spectrum.wavelength_nm();
    let columns: Vec<Vec<f64>> = quantities
        .iter()
        .map(|quantity| spectrum.get(*quantity).1)
        .collect();

    let mut table = String::new();
    table.push_str(&format!(
        "# molecule={} medium={} path_length={} cm\n",
        spectrum.conditions().molecule,
        spectrum.conditions().medium,
        spectrum.path_length()
    ));
    table.push_str(&format!(
        "#{:>w$}{:>w2$}",
        "wavenumber_cm-1",
        "wavelength_nm",
        w = COLUMN_WIDTH - 1,
        w2 = COLUMN_WIDTH
    ));
    for quantity in quantities {
        table.push_str(&format!("{:>w$}", quantity.as_str(), w = COLUMN_WIDTH));
    }
    table.push('\n');

    for (row, wavenumber) in spectrum.wavenumbers().iter().enumerate() {
        table.push_str(&format!(
            "{:>w$.6}{:>w$.6}",
            wavenumber,
            wavelengths[row],
            w = COLUMN_WIDTH
        ));
        for column in &columns {
            table.push_str(&format!("{:>w$.10e}", column[row], w = COLUMN_WIDTH));
        }
        table.push('\n');
    }
    table
}

pub(super) fn write_output(path: Option<&Path>, content: &str) -> Result<(), CliError> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create output directory '{}'", parent.display())
                })?;
            }
            fs::write(path, content)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(content.as_bytes())
                .context("failed to write table to stdout")?;
        }
    }
    Ok(())
}

pub(super) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize '{}'", path.display()))?;
    write_output(Some(path), &json)
}
