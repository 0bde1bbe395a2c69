pub mod broadening;
pub mod common;
pub mod domain;
pub mod factory;
pub mod grid;
pub mod levels;
pub mod lines;
pub mod numerics;
pub mod partition;
pub mod population;
pub mod spectrum;
pub mod superposition;

pub use common::config::{SynthesisConfig, load_synthesis_config};
pub use domain::{
    ExecutionMode, LblError, LblErrorCategory, LblResult, Medium, ThermalConditions, ThermalState,
    WarningAction, WarningCategory, WarningPolicy,
};
pub use factory::SpectrumFactory;
pub use lines::{IsotopologueId, Line, LineStore};
pub use spectrum::{Quantity, Spectrum};
