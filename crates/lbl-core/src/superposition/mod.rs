//! Line superposition: cutoff filter, pseudo-continuum extraction and the
//! direct or pooled accumulation of line profiles onto the spectral grid.
//!
//! Each strategy is a pure function from (lines, grid, settings) to an
//! accumulator and its diagnostics. Execution mode is orthogonal: parallel
//! runs split the work into fixed-size chunks, evaluate them a bounded batch
//! at a time and merge the partial results in chunk order, so the output does
//! not depend on the thread pool.

pub mod continuum;
pub mod cutoff;
mod direct;
mod pooled;

pub use continuum::ContinuumDiagnostics;
pub use cutoff::{CutoffDiagnostics, apply_cutoff};

use crate::broadening::BroadenedLine;
use crate::common::config::{PseudoContinuumConfig, StrategyConfig, VoigtApproximation};
use crate::domain::ExecutionMode;
use crate::grid::SpectralGrid;
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::time::Instant;

/// Chunk partials evaluated concurrently before they are folded into the
/// running result.
const CHUNK_BATCH: usize = 8;

/// Accumulated `sum S_i phi_i` (cm2/molecule) and, when requested,
/// `sum eps_i phi_i` (W.cm/sr/molecule) on the calculation grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    pub absorption: Vec<f64>,
    pub emission: Option<Vec<f64>>,
}

impl Accumulator {
    pub fn zeros(len: usize, with_emission: bool) -> Self {
        Self {
            absorption: vec![0.0; len],
            emission: with_emission.then(|| vec![0.0; len]),
        }
    }

    pub fn len(&self) -> usize {
        self.absorption.len()
    }

    pub fn is_empty(&self) -> bool {
        self.absorption.is_empty()
    }

    /// Adds `weight` times the line's intensities at `index`; indices
    /// outside the grid are ignored.
    fn deposit(&mut self, index: i64, weight: f64, line: &BroadenedLine) {
        if index < 0 || index as usize >= self.absorption.len() {
            return;
        }
        let index = index as usize;
        self.absorption[index] += weight * line.intensity;
        if let Some(emission) = &mut self.emission {
            emission[index] += weight * line.emission;
        }
    }

    pub fn merge(&mut self, other: &Self) {
        for (lhs, rhs) in self.absorption.iter_mut().zip(&other.absorption) {
            *lhs += rhs;
        }
        if let (Some(lhs), Some(rhs)) = (&mut self.emission, &other.emission) {
            for (lhs, rhs) in lhs.iter_mut().zip(rhs) {
                *lhs += rhs;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuperpositionSettings {
    pub strategy: StrategyConfig,
    pub voigt: VoigtApproximation,
    pub broadening_max_width: f64,
    pub cutoff: f64,
    pub pseudo_continuum: PseudoContinuumConfig,
    pub execution: ExecutionMode,
    pub with_emission: bool,
}

impl Default for SuperpositionSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyConfig::Direct,
            voigt: VoigtApproximation::Humlicek,
            broadening_max_width: 10.0,
            cutoff: 0.0,
            pseudo_continuum: PseudoContinuumConfig::default(),
            execution: ExecutionMode::Serial,
            with_emission: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StrategyDiagnostics {
    pub strategy: &'static str,
    pub lines: usize,
    /// Lines narrower than the grid step, placed by two-point apportioning.
    pub narrow_lines: usize,
    pub profile_evaluations: usize,
    /// Occupied (Lorentzian, Gaussian) width nodes of the pooled strategy.
    pub pooled_nodes: usize,
    pub chunks: usize,
}

impl StrategyDiagnostics {
    fn merge(&mut self, other: &Self) {
        self.lines += other.lines;
        self.narrow_lines += other.narrow_lines;
        self.profile_evaluations += other.profile_evaluations;
        self.pooled_nodes = self.pooled_nodes.max(other.pooled_nodes);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuperpositionDiagnostics {
    pub cutoff: CutoffDiagnostics,
    pub continuum: ContinuumDiagnostics,
    pub strategy: StrategyDiagnostics,
    pub elapsed_seconds: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuperpositionOutcome {
    pub accumulator: Accumulator,
    pub diagnostics: SuperpositionDiagnostics,
}

fn by_position(lhs: &BroadenedLine, rhs: &BroadenedLine) -> Ordering {
    lhs.position
        .total_cmp(&rhs.position)
        .then_with(|| lhs.intensity.total_cmp(&rhs.intensity))
        .then_with(|| lhs.hwhm_lorentz.total_cmp(&rhs.hwhm_lorentz))
        .then_with(|| lhs.hwhm_gauss.total_cmp(&rhs.hwhm_gauss))
        .then_with(|| lhs.emission.total_cmp(&rhs.emission))
}

/// Cutoff, pseudo-continuum and strategy in sequence. Lines are put in a
/// canonical order first, so the result does not depend on input order.
pub fn superpose(
    lines: Vec<BroadenedLine>,
    grid: &SpectralGrid,
    settings: &SuperpositionSettings,
) -> SuperpositionOutcome {
    let started = Instant::now();

    let (mut lines, cutoff) = apply_cutoff(lines, settings.cutoff);
    lines.sort_by(by_position);
    tracing::debug!(
        before = cutoff.lines_before,
        after = cutoff.lines_after,
        discarded_fraction = cutoff.discarded_fraction(),
        "applied linestrength cutoff"
    );

    let extraction = continuum::extract(lines, grid, settings);
    let (mut accumulator, strategy) = execute(&extraction.strong, grid, settings);
    if let Some(background) = &extraction.background {
        accumulator.merge(background);
    }

    let elapsed_seconds = started.elapsed().as_secs_f64();
    tracing::debug!(
        strategy = strategy.strategy,
        lines = strategy.lines,
        continuum_lines = extraction.diagnostics.lines,
        elapsed_seconds,
        "superposed lines"
    );

    SuperpositionOutcome {
        accumulator,
        diagnostics: SuperpositionDiagnostics {
            cutoff,
            continuum: extraction.diagnostics,
            strategy,
            elapsed_seconds,
        },
    }
}

/// Maps `chunk_size`-item chunks on the rayon pool and folds their partials
/// into `init` in chunk order, holding at most `CHUNK_BATCH` partials at a
/// time. Returns the folded value and the number of chunks.
fn fold_chunks<T, P, A>(
    items: &[T],
    chunk_size: usize,
    init: A,
    map: impl Fn(&[T]) -> P + Sync,
    mut fold: impl FnMut(&mut A, P),
) -> (A, usize)
where
    T: Sync,
    P: Send,
{
    let chunk_size = chunk_size.max(1);
    let mut folded = init;
    let mut chunks = 0;
    for batch in items.chunks(chunk_size * CHUNK_BATCH) {
        let partials: Vec<P> = batch.par_chunks(chunk_size).map(&map).collect();
        chunks += partials.len();
        for partial in partials {
            fold(&mut folded, partial);
        }
    }
    (folded, chunks)
}

/// Runs the configured strategy on already filtered lines.
pub fn execute(
    lines: &[BroadenedLine],
    grid: &SpectralGrid,
    settings: &SuperpositionSettings,
) -> (Accumulator, StrategyDiagnostics) {
    match settings.strategy {
        StrategyConfig::Direct => direct::accumulate(lines, grid, settings),
        StrategyConfig::Pooled {
            res_lorentz,
            res_gauss,
        } => pooled::accumulate(lines, grid, settings, res_lorentz, res_gauss),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Accumulator, CHUNK_BATCH, SuperpositionSettings, execute, fold_chunks, superpose,
    };
    use crate::broadening::BroadenedLine;
    use crate::common::config::{PseudoContinuumConfig, StrategyConfig};
    use crate::domain::ExecutionMode;
    use crate::grid::SpectralGrid;
    use crate::numerics::{argmax, stable_sum};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    pub(super) fn band(count: usize) -> Vec<BroadenedLine> {
        (0..count)
            .map(|index| {
                let j = index as f64;
                BroadenedLine {
                    position: 2000.0 + 0.37 * j + 0.013 * (j * 0.7).sin(),
                    intensity: 1.0e-20 * (-(j - 20.0).powi(2) / 150.0).exp(),
                    emission: 3.0e-24 * (-(j - 25.0).powi(2) / 200.0).exp(),
                    hwhm_lorentz: 0.06 - 0.000_3 * j,
                    hwhm_gauss: 0.002_5 + 1.0e-6 * j,
                }
            })
            .collect()
    }

    pub(super) fn settings(strategy: StrategyConfig) -> SuperpositionSettings {
        SuperpositionSettings {
            strategy,
            broadening_max_width: 10.0,
            with_emission: true,
            ..SuperpositionSettings::default()
        }
    }

    #[test]
    fn accumulator_merge_adds_both_arrays() {
        let mut lhs = Accumulator::zeros(3, true);
        lhs.absorption[1] = 1.0;
        let mut rhs = Accumulator::zeros(3, true);
        rhs.absorption[1] = 2.0;
        if let Some(emission) = &mut rhs.emission {
            emission[2] = 5.0;
        }
        lhs.merge(&rhs);
        assert_eq!(lhs.absorption, vec![0.0, 3.0, 0.0]);
        assert_eq!(lhs.emission, Some(vec![0.0, 0.0, 5.0]));
    }

    #[test]
    fn direct_and_pooled_agree_on_peak_and_area() {
        let grid = SpectralGrid::new(1995.0, 2025.0, 0.005, 10.0).expect("grid");
        let lines = band(60);
        let (direct, _) = execute(&lines, &grid, &settings(StrategyConfig::Direct));
        let (pooled, diagnostics) = execute(&lines, &grid, &settings(StrategyConfig::pooled()));
        assert!(diagnostics.pooled_nodes > 1);

        let (_, direct_peak) = argmax(&direct.absorption).expect("peak");
        let (_, pooled_peak) = argmax(&pooled.absorption).expect("peak");
        assert!((pooled_peak / direct_peak - 1.0).abs() < 0.01);

        let direct_area = stable_sum(&direct.absorption);
        let pooled_area = stable_sum(&pooled.absorption);
        assert!((pooled_area / direct_area - 1.0).abs() < 0.005);
    }

    #[test]
    fn profiles_conserve_line_intensity() {
        let grid = SpectralGrid::new(1995.0, 2025.0, 0.005, 10.0).expect("grid");
        let lines = band(60);
        let total: f64 = lines.iter().map(|line| line.intensity).sum();
        for strategy in [StrategyConfig::Direct, StrategyConfig::pooled()] {
            let (accumulator, _) = execute(&lines, &grid, &settings(strategy));
            let area = stable_sum(&accumulator.absorption) * grid.wstep();
            assert!((area / total - 1.0).abs() < 1.0e-6, "{strategy:?} area={area:e}");
        }
    }

    #[test]
    fn parallel_execution_is_deterministic_and_matches_serial() {
        let grid = SpectralGrid::new(1995.0, 2025.0, 0.01, 5.0).expect("grid");
        for strategy in [StrategyConfig::Direct, StrategyConfig::pooled()] {
            let serial = superpose(band(80), &grid, &settings(strategy));
            let parallel_settings = SuperpositionSettings {
                execution: ExecutionMode::Parallel { chunk_size: 7 },
                ..settings(strategy)
            };
            let first = superpose(band(80), &grid, &parallel_settings);
            let second = superpose(band(80), &grid, &parallel_settings);

            assert_eq!(first.accumulator, second.accumulator);
            assert!(first.diagnostics.strategy.chunks > 1);
            let (_, scale) = argmax(&serial.accumulator.absorption).expect("peak");
            for (lhs, rhs) in serial
                .accumulator
                .absorption
                .iter()
                .zip(&first.accumulator.absorption)
            {
                assert!((lhs - rhs).abs() <= 1.0e-12 * scale);
            }
        }
    }

    #[test]
    fn chunk_folding_keeps_order_and_bounds_live_partials() {
        let items: Vec<usize> = (0..103).collect();
        let live = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let (folded, chunks) = fold_chunks(
            &items,
            3,
            Vec::new(),
            |chunk| {
                let now = live.fetch_add(1, AtomicOrdering::SeqCst) + 1;
                peak.fetch_max(now, AtomicOrdering::SeqCst);
                chunk.to_vec()
            },
            |folded: &mut Vec<usize>, partial| {
                live.fetch_sub(1, AtomicOrdering::SeqCst);
                folded.extend(partial);
            },
        );

        assert_eq!(folded, items);
        assert_eq!(chunks, 35);
        assert_eq!(live.load(AtomicOrdering::SeqCst), 0);
        assert!(peak.load(AtomicOrdering::SeqCst) <= CHUNK_BATCH);
    }

    #[test]
    fn single_line_chunks_span_many_batches() {
        let grid = SpectralGrid::new(1995.0, 2025.0, 0.01, 5.0).expect("grid");
        for strategy in [StrategyConfig::Direct, StrategyConfig::pooled()] {
            let serial = superpose(band(50), &grid, &settings(strategy));
            let parallel_settings = SuperpositionSettings {
                execution: ExecutionMode::Parallel { chunk_size: 1 },
                ..settings(strategy)
            };
            let parallel = superpose(band(50), &grid, &parallel_settings);

            assert_eq!(
                parallel.diagnostics.strategy.chunks,
                parallel.diagnostics.strategy.lines
            );
            assert!(parallel.diagnostics.strategy.chunks > CHUNK_BATCH);
            let (_, scale) = argmax(&serial.accumulator.absorption).expect("peak");
            for (lhs, rhs) in serial
                .accumulator
                .absorption
                .iter()
                .zip(&parallel.accumulator.absorption)
            {
                assert!((lhs - rhs).abs() <= 1.0e-12 * scale);
            }
        }
    }

    #[test]
    fn input_order_does_not_change_the_result() {
        let grid = SpectralGrid::new(1995.0, 2025.0, 0.01, 5.0).expect("grid");
        let forward = superpose(band(40), &grid, &settings(StrategyConfig::Direct));
        let mut reversed_lines = band(40);
        reversed_lines.reverse();
        let reversed = superpose(reversed_lines, &grid, &settings(StrategyConfig::Direct));
        assert_eq!(forward.accumulator, reversed.accumulator);
    }

    #[test]
    fn pseudo_continuum_moves_weak_lines_without_losing_intensity() {
        let grid = SpectralGrid::new(1995.0, 2025.0, 0.01, 5.0).expect("grid");
        let continuum_settings = SuperpositionSettings {
            pseudo_continuum: PseudoContinuumConfig {
                threshold: 0.01,
                coarse_resolution: 1.0,
            },
            ..settings(StrategyConfig::Direct)
        };
        let plain = superpose(band(60), &grid, &settings(StrategyConfig::Direct));
        let with_continuum = superpose(band(60), &grid, &continuum_settings);

        assert!(with_continuum.diagnostics.continuum.lines > 0);
        assert!(with_continuum.diagnostics.strategy.lines < 60);
        let plain_area = stable_sum(&plain.accumulator.absorption);
        let continuum_area = stable_sum(&with_continuum.accumulator.absorption);
        assert!((continuum_area / plain_area - 1.0).abs() < 1.0e-6);

        let (_, plain_peak) = argmax(&plain.accumulator.absorption).expect("peak");
        let (_, continuum_peak) = argmax(&with_continuum.accumulator.absorption).expect("peak");
        assert!((continuum_peak / plain_peak - 1.0).abs() < 0.02);
    }
}
