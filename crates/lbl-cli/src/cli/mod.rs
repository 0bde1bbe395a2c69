mod commands;
mod helpers;

use clap::Parser;
use lbl_core::LblError;

pub fn run_from_env() -> i32 {
    helpers::init_tracing();
    let remaining: Vec<String> = std::env::args().skip(1).collect();

    match run(remaining) {
        Ok(code) => code,
        Err(error) => {
            let lbl_error = error.as_lbl_error();
            eprintln!("{}", lbl_error.diagnostic_line());
            eprintln!("{}", lbl_error.fatal_exit_line());
            lbl_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("lbl-rs".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

/// Line-by-line molecular spectra from a serialized line databank.
#[derive(Parser)]
#[command(name = "lbl-rs", version)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Equilibrium spectrum at a single gas temperature
    Eq(commands::EqArgs),
    /// Spectrum with separate vibrational and rotational temperatures
    Noneq(commands::NoneqArgs),
    /// Integrated radiance next to its optically thin analytic value
    Power(commands::PowerArgs),
    /// Write a databank generated from built-in rovibrational constants
    Ladder(commands::LadderArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Eq(args) => commands::run_eq_command(args),
        CliCommand::Noneq(args) => commands::run_noneq_command(args),
        CliCommand::Power(args) => commands::run_power_command(args),
        CliCommand::Ladder(args) => commands::run_ladder_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(LblError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<LblError> for CliError {
    fn from(error: LblError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_lbl_error(&self) -> LblError {
        match self {
            Self::Usage(message) => LblError::input_validation("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => LblError::internal("INTERNAL.CLI", format!("{error:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CliError, run};

    #[test]
    fn help_exits_cleanly() {
        let code = run(["--help"]).expect("help should render");
        assert_eq!(code, 0);
    }

    #[test]
    fn unknown_subcommand_is_a_usage_error() {
        let error = run(["spectrum"]).expect_err("unknown subcommand");
        assert!(matches!(error, CliError::Usage(_)));
        assert_eq!(error.as_lbl_error().exit_code(), 2);
        assert_eq!(error.as_lbl_error().placeholder(), "INPUT.CLI_USAGE");
    }

    #[test]
    fn internal_errors_map_to_the_internal_exit_code() {
        let error = CliError::Internal(anyhow::anyhow!("table write failed"));
        let lbl_error = error.as_lbl_error();
        assert_eq!(lbl_error.placeholder(), "INTERNAL.CLI");
        assert_eq!(lbl_error.exit_code(), 5);
        assert!(lbl_error.message().contains("table write failed"));
    }
}
