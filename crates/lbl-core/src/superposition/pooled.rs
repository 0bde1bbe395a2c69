//! Pooled strategy: line intensities are distributed over a 3D histogram
//! (position, log Lorentzian width, log Gaussian width) and each occupied
//! width node is convolved with its own lineshape by FFT.

use super::{Accumulator, StrategyDiagnostics, SuperpositionSettings, fold_chunks};
use crate::broadening::{BroadenedLine, voigt_fwhm};
use crate::domain::ExecutionMode;
use crate::grid::SpectralGrid;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

const NAME: &str = "pooled";
/// Width nodes transformed concurrently before their spectra are summed.
const NODE_BATCH: usize = 8;
const MIN_WIDTH: f64 = 1.0e-12;

type NodeKey = (usize, usize);
type Histograms = BTreeMap<NodeKey, Accumulator>;

/// Uniform axis in `ln(width)`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LogAxis {
    origin: f64,
    step: f64,
    count: usize,
}

impl LogAxis {
    fn spanning(widths: impl Iterator<Item = f64>, step: f64) -> Self {
        let (low, high) = widths.fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), width| {
            let value = width.max(MIN_WIDTH).ln();
            (low.min(value), high.max(value))
        });
        if !low.is_finite() {
            return Self {
                origin: 0.0,
                step,
                count: 2,
            };
        }
        Self {
            origin: low,
            step,
            count: ((high - low) / step).floor() as usize + 2,
        }
    }

    /// Lower node and the linear weight of the upper one.
    fn locate(&self, width: f64) -> (usize, f64) {
        let position = ((width.max(MIN_WIDTH).ln() - self.origin) / self.step).max(0.0);
        let node = (position.floor() as usize).min(self.count - 2);
        (node, position - node as f64)
    }

    fn width(&self, node: usize) -> f64 {
        (self.origin + node as f64 * self.step).exp()
    }
}

struct Axes {
    lorentz: LogAxis,
    gauss: LogAxis,
}

pub(super) fn accumulate(
    lines: &[BroadenedLine],
    grid: &SpectralGrid,
    settings: &SuperpositionSettings,
    res_lorentz: f64,
    res_gauss: f64,
) -> (Accumulator, StrategyDiagnostics) {
    let axes = Axes {
        lorentz: LogAxis::spanning(lines.iter().map(|line| line.hwhm_lorentz), res_lorentz),
        gauss: LogAxis::spanning(lines.iter().map(|line| line.hwhm_gauss), res_gauss),
    };

    let (histograms, chunks) = match settings.execution {
        ExecutionMode::Serial => (build_histograms(lines, grid, settings, &axes), 1),
        ExecutionMode::Parallel { chunk_size } => fold_chunks(
            lines,
            chunk_size,
            Histograms::new(),
            |chunk| build_histograms(chunk, grid, settings, &axes),
            merge_histograms,
        ),
    };

    let half_points = (0.5 * settings.broadening_max_width / grid.wstep()).floor() as usize;
    let mut diagnostics = StrategyDiagnostics {
        strategy: NAME,
        lines: lines.len(),
        narrow_lines: lines.iter().filter(|line| line.fwhm() < grid.wstep()).count(),
        profile_evaluations: histograms.len() * (2 * half_points + 1),
        pooled_nodes: histograms.len(),
        chunks,
    };
    if histograms.is_empty() {
        diagnostics.profile_evaluations = 0;
        return (Accumulator::zeros(grid.len(), settings.with_emission), diagnostics);
    }

    let size = (grid.len() + 2 * half_points + 1).next_power_of_two();
    let mut planner = FftPlanner::new();
    let transform = Convolution {
        forward: planner.plan_fft_forward(size),
        size,
        half_points,
        grid,
        settings,
        axes: &axes,
    };

    let mut absorption = vec![Complex::new(0.0, 0.0); size];
    let mut emission = settings
        .with_emission
        .then(|| vec![Complex::new(0.0, 0.0); size]);
    let mut add = |spectrum: NodeSpectrum| {
        add_into(&mut absorption, &spectrum.absorption);
        if let (Some(total), Some(node)) = (&mut emission, &spectrum.emission) {
            add_into(total, node);
        }
    };

    let nodes: Vec<(&NodeKey, &Accumulator)> = histograms.iter().collect();
    match settings.execution {
        ExecutionMode::Serial => {
            for (key, histogram) in nodes {
                add(transform.node_spectrum(*key, histogram));
            }
        }
        ExecutionMode::Parallel { .. } => {
            for batch in nodes.chunks(NODE_BATCH) {
                let spectra: Vec<NodeSpectrum> = batch
                    .par_iter()
                    .map(|(key, histogram)| transform.node_spectrum(**key, histogram))
                    .collect();
                spectra.into_iter().for_each(&mut add);
            }
        }
    }

    let inverse = planner.plan_fft_inverse(size);
    let mut accumulator = Accumulator::zeros(grid.len(), settings.with_emission);
    back_transform(inverse.as_ref(), &mut absorption, &mut accumulator.absorption);
    if let (Some(spectrum), Some(target)) = (&mut emission, &mut accumulator.emission) {
        back_transform(inverse.as_ref(), spectrum, target);
    }

    tracing::trace!(
        nodes = diagnostics.pooled_nodes,
        fft_size = size,
        "pooled convolution finished"
    );
    (accumulator, diagnostics)
}

fn build_histograms(
    lines: &[BroadenedLine],
    grid: &SpectralGrid,
    settings: &SuperpositionSettings,
    axes: &Axes,
) -> Histograms {
    let mut histograms = Histograms::new();
    for line in lines {
        let position = grid.fractional_index(line.position);
        let lower = position.floor();
        let fraction = position - lower;
        let lower = lower as i64;
        let (lorentz, lorentz_fraction) = axes.lorentz.locate(line.hwhm_lorentz);
        let (gauss, gauss_fraction) = axes.gauss.locate(line.hwhm_gauss);

        for (lorentz_offset, lorentz_weight) in [(0, 1.0 - lorentz_fraction), (1, lorentz_fraction)] {
            for (gauss_offset, gauss_weight) in [(0, 1.0 - gauss_fraction), (1, gauss_fraction)] {
                let weight = lorentz_weight * gauss_weight;
                if weight == 0.0 {
                    continue;
                }
                let histogram = histograms
                    .entry((lorentz + lorentz_offset, gauss + gauss_offset))
                    .or_insert_with(|| Accumulator::zeros(grid.len(), settings.with_emission));
                histogram.deposit(lower, (1.0 - fraction) * weight, line);
                histogram.deposit(lower + 1, fraction * weight, line);
            }
        }
    }
    histograms
}

fn merge_histograms(target: &mut Histograms, partial: Histograms) {
    for (key, histogram) in partial {
        match target.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(histogram);
            }
            Entry::Occupied(mut slot) => slot.get_mut().merge(&histogram),
        }
    }
}

struct NodeSpectrum {
    absorption: Vec<Complex<f64>>,
    emission: Option<Vec<Complex<f64>>>,
}

struct Convolution<'a> {
    forward: Arc<dyn Fft<f64>>,
    size: usize,
    half_points: usize,
    grid: &'a SpectralGrid,
    settings: &'a SuperpositionSettings,
    axes: &'a Axes,
}

impl Convolution<'_> {
    fn node_spectrum(&self, (lorentz, gauss): NodeKey, histogram: &Accumulator) -> NodeSpectrum {
        let kernel = self.kernel(self.axes.lorentz.width(lorentz), self.axes.gauss.width(gauss));
        NodeSpectrum {
            absorption: self.filtered(&histogram.absorption, &kernel),
            emission: histogram
                .emission
                .as_ref()
                .map(|values| self.filtered(values, &kernel)),
        }
    }

    fn filtered(&self, values: &[f64], kernel: &[Complex<f64>]) -> Vec<Complex<f64>> {
        let mut buffer = vec![Complex::new(0.0, 0.0); self.size];
        for (slot, value) in buffer.iter_mut().zip(values) {
            slot.re = *value;
        }
        self.forward.process(&mut buffer);
        for (slot, factor) in buffer.iter_mut().zip(kernel) {
            *slot *= factor;
        }
        buffer
    }

    /// Spectrum of the area-normalized node lineshape, centered on index 0
    /// with negative offsets wrapped to the end of the buffer.
    fn kernel(&self, hwhm_lorentz: f64, hwhm_gauss: f64) -> Vec<Complex<f64>> {
        let wstep = self.grid.wstep();
        let mut buffer = vec![Complex::new(0.0, 0.0); self.size];

        if voigt_fwhm(hwhm_lorentz, hwhm_gauss) < wstep || self.half_points == 0 {
            buffer[0].re = 1.0 / wstep;
        } else {
            let half = self.half_points as i64;
            let values: Vec<f64> = (-half..=half)
                .map(|offset| {
                    self.settings
                        .voigt
                        .evaluate(offset as f64 * wstep, hwhm_lorentz, hwhm_gauss)
                })
                .collect();
            let area = values.iter().sum::<f64>() * wstep;
            let size = self.size as i64;
            for (offset, value) in (-half..=half).zip(&values) {
                buffer[((offset + size) % size) as usize].re = value / area;
            }
        }

        self.forward.process(&mut buffer);
        buffer
    }
}

fn add_into(total: &mut [Complex<f64>], node: &[Complex<f64>]) {
    for (lhs, rhs) in total.iter_mut().zip(node) {
        *lhs += rhs;
    }
}

fn back_transform(inverse: &dyn Fft<f64>, spectrum: &mut [Complex<f64>], target: &mut [f64]) {
    inverse.process(spectrum);
    let scale = 1.0 / spectrum.len() as f64;
    for (value, point) in target.iter_mut().zip(spectrum.iter()) {
        *value = point.re * scale;
    }
}
