//! Pseudo-continuum: lines whose peak falls below a fraction of the rough
//! spectrum peak are binned on a coarse grid and spread as a smooth
//! background instead of being given individual profiles.

use super::{Accumulator, SuperpositionSettings};
use crate::broadening::BroadenedLine;
use crate::grid::SpectralGrid;
use crate::numerics::stable_sum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ContinuumDiagnostics {
    /// Lines moved into the background.
    pub lines: usize,
    /// Sum of their intensities, cm-1/(molecule.cm-2).
    pub intensity: f64,
    /// Rough spectrum peak the threshold was applied to.
    pub rough_peak: f64,
}

pub(crate) struct Extraction {
    pub strong: Vec<BroadenedLine>,
    pub background: Option<Accumulator>,
    pub diagnostics: ContinuumDiagnostics,
}

struct CoarseCells {
    first: f64,
    width: f64,
    count: usize,
}

impl CoarseCells {
    fn new(grid: &SpectralGrid, resolution: f64) -> Self {
        let (first, last) = grid.calculation_range();
        let width = resolution.max(grid.wstep());
        let count = (((last - first) / width - 1.0e-9).ceil() as usize).max(1);
        Self { first, width, count }
    }

    fn locate(&self, wavenumber: f64) -> usize {
        let cell = ((wavenumber - self.first) / self.width).floor();
        (cell.max(0.0) as usize).min(self.count - 1)
    }

    /// Linear interpolation between cell centers, flat beyond the outer ones.
    fn interpolate(&self, densities: &[f64], wavenumber: f64) -> f64 {
        let t = (wavenumber - self.first) / self.width - 0.5;
        if t <= 0.0 {
            return densities[0];
        }
        let last = (self.count - 1) as f64;
        if t >= last {
            return densities[self.count - 1];
        }
        let lower = t.floor();
        let fraction = t - lower;
        let lower = lower as usize;
        densities[lower] * (1.0 - fraction) + densities[lower + 1] * fraction
    }
}

pub(crate) fn extract(
    lines: Vec<BroadenedLine>,
    grid: &SpectralGrid,
    settings: &SuperpositionSettings,
) -> Extraction {
    let config = settings.pseudo_continuum;
    if !config.enabled() || lines.is_empty() {
        return Extraction {
            strong: lines,
            background: None,
            diagnostics: ContinuumDiagnostics::default(),
        };
    }

    let cells = CoarseCells::new(grid, config.coarse_resolution);
    let peaks: Vec<f64> = lines
        .iter()
        .map(|line| line.intensity.abs() * settings.voigt.peak(line.hwhm_lorentz, line.hwhm_gauss))
        .collect();

    let mut rough = vec![0.0; cells.count];
    for (line, peak) in lines.iter().zip(&peaks) {
        rough[cells.locate(line.position)] += peak;
    }
    let rough_peak = rough.iter().copied().fold(0.0, f64::max);
    let limit = config.threshold * rough_peak;

    let mut absorption_cells = vec![0.0; cells.count];
    let mut emission_cells = vec![0.0; cells.count];
    let mut strong = Vec::with_capacity(lines.len());
    let mut weak_intensity = Vec::new();
    let mut weak_emission = Vec::new();
    for (line, peak) in lines.into_iter().zip(peaks) {
        if peak >= limit {
            strong.push(line);
            continue;
        }
        let cell = cells.locate(line.position);
        absorption_cells[cell] += line.intensity;
        emission_cells[cell] += line.emission;
        weak_intensity.push(line.intensity);
        weak_emission.push(line.emission);
    }

    let diagnostics = ContinuumDiagnostics {
        lines: weak_intensity.len(),
        intensity: stable_sum(&weak_intensity),
        rough_peak,
    };
    if weak_intensity.is_empty() {
        return Extraction {
            strong,
            background: None,
            diagnostics,
        };
    }

    let mut background = Accumulator::zeros(grid.len(), settings.with_emission);
    spread(&cells, grid, &absorption_cells, diagnostics.intensity, &mut background.absorption);
    if let Some(emission) = &mut background.emission {
        spread(&cells, grid, &emission_cells, stable_sum(&weak_emission), emission);
    }

    Extraction {
        strong,
        background: Some(background),
        diagnostics,
    }
}

/// Interpolates cell densities onto the grid and rescales so the
/// background integrates to `total`.
fn spread(cells: &CoarseCells, grid: &SpectralGrid, sums: &[f64], total: f64, target: &mut [f64]) {
    let densities: Vec<f64> = sums.iter().map(|sum| sum / cells.width).collect();
    for (index, value) in target.iter_mut().enumerate() {
        *value = cells.interpolate(&densities, grid.wavenumber(index));
    }

    let integral = stable_sum(target) * grid.wstep();
    let scale = total / integral;
    if scale.is_finite() && scale > 0.0 {
        target.iter_mut().for_each(|value| *value *= scale);
    }
}
