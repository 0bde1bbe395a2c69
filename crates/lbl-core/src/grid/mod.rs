//! Uniform spectral grid. The calculation grid extends the output range by
//! half the lineshape window on each side so lines just outside the output
//! range still contribute their wings.

use std::ops::Range;

/// Upper bound on grid points, about 0.8 GB per accumulator array.
pub const MAX_GRID_POINTS: usize = 100_000_000;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("invalid wavenumber range {wmin}..{wmax} cm-1")]
    InvalidRange { wmin: f64, wmax: f64 },
    #[error("grid step must be finite and > 0, got {wstep}")]
    InvalidStep { wstep: f64 },
    #[error("grid of {points} points exceeds the {MAX_GRID_POINTS} point limit")]
    TooLarge { points: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralGrid {
    start: f64,
    wstep: f64,
    len: usize,
    output_start: usize,
    output_len: usize,
}

impl SpectralGrid {
    pub fn new(wmin: f64, wmax: f64, wstep: f64, broadening_max_width: f64) -> Result<Self, GridError> {
        if !wmin.is_finite() || !wmax.is_finite() || wmin <= 0.0 || wmax <= wmin {
            return Err(GridError::InvalidRange { wmin, wmax });
        }
        if !wstep.is_finite() || wstep <= 0.0 {
            return Err(GridError::InvalidStep { wstep });
        }

        let span = ((wmax - wmin) / wstep).round();
        let margin = (0.5 * broadening_max_width.max(0.0) / wstep - 1.0e-9).ceil().max(0.0);
        let total = span + 1.0 + 2.0 * margin;
        if total > MAX_GRID_POINTS as f64 {
            return Err(GridError::TooLarge {
                points: total as usize,
            });
        }

        let margin = margin as usize;
        let output_len = span as usize + 1;
        Ok(Self {
            start: wmin - margin as f64 * wstep,
            wstep,
            len: output_len + 2 * margin,
            output_start: margin,
            output_len,
        })
    }

    pub fn wstep(&self) -> f64 {
        self.wstep
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn wavenumber(&self, index: usize) -> f64 {
        self.start + index as f64 * self.wstep
    }

    pub fn wavenumbers(&self) -> Vec<f64> {
        (0..self.len).map(|index| self.wavenumber(index)).collect()
    }

    /// `(first, last)` wavenumber of the calculation grid.
    pub fn calculation_range(&self) -> (f64, f64) {
        (self.start, self.wavenumber(self.len - 1))
    }

    pub fn output_indices(&self) -> Range<usize> {
        self.output_start..self.output_start + self.output_len
    }

    pub fn output_range(&self) -> (f64, f64) {
        (
            self.wavenumber(self.output_start),
            self.wavenumber(self.output_start + self.output_len - 1),
        )
    }

    /// Position in grid units, `0.0` at the first point.
    pub fn fractional_index(&self, wavenumber: f64) -> f64 {
        (wavenumber - self.start) / self.wstep
    }

    pub fn contains(&self, wavenumber: f64) -> bool {
        let (first, last) = self.calculation_range();
        (first..=last).contains(&wavenumber)
    }

    /// Grid points within `half_width` of `center`, clipped to the grid.
    pub fn window(&self, center: f64, half_width: f64) -> Range<usize> {
        let low = self.fractional_index(center - half_width).ceil().max(0.0);
        let high = (self.fractional_index(center + half_width).floor() + 1.0).min(self.len as f64);
        if high <= low {
            return 0..0;
        }
        low as usize..high as usize
    }
}

/// Step giving `points_per_linewidth` points across the narrowest FWHM,
/// rounded down to three significant digits.
pub fn auto_step(min_fwhm: f64, points_per_linewidth: f64) -> Option<f64> {
    if !(min_fwhm.is_finite() && min_fwhm > 0.0 && points_per_linewidth >= 1.0) {
        return None;
    }
    let raw = min_fwhm / points_per_linewidth;
    let scale = 10_f64.powf(raw.log10().floor() - 2.0);
    Some((raw / scale).floor() * scale)
}
