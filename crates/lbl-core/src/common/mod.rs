pub mod config;
pub mod constants;
pub mod molecules;

pub use config::{
    ConfigError, GridStep, NegativeEnergyPolicy, PseudoContinuumConfig, SpectralRange,
    StrategyConfig, SynthesisConfig, VoigtApproximation, load_synthesis_config,
};
