use crate::broadening::BroadenedLine;
use crate::numerics::stable_sum_iter;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CutoffDiagnostics {
    pub cutoff: f64,
    pub lines_before: usize,
    pub lines_after: usize,
    /// Sum of |S| before the cutoff.
    pub intensity_before: f64,
    /// Sum of |S| over the discarded lines.
    pub intensity_discarded: f64,
}

impl CutoffDiagnostics {
    pub fn lines_discarded(&self) -> usize {
        self.lines_before - self.lines_after
    }

    pub fn discarded_fraction(&self) -> f64 {
        if self.intensity_before > 0.0 {
            self.intensity_discarded / self.intensity_before
        } else {
            0.0
        }
    }
}

/// Keeps lines with `|S| >= cutoff`.
pub fn apply_cutoff(lines: Vec<BroadenedLine>, cutoff: f64) -> (Vec<BroadenedLine>, CutoffDiagnostics) {
    let lines_before = lines.len();
    let intensity_before = stable_sum_iter(lines.iter().map(|line| line.intensity.abs()));

    let (kept, discarded): (Vec<_>, Vec<_>) = lines
        .into_iter()
        .partition(|line| line.intensity.abs() >= cutoff);
    let intensity_discarded = stable_sum_iter(discarded.iter().map(|line| line.intensity.abs()));

    let diagnostics = CutoffDiagnostics {
        cutoff,
        lines_before,
        lines_after: kept.len(),
        intensity_before,
        intensity_discarded,
    };
    (kept, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::apply_cutoff;
    use crate::broadening::BroadenedLine;

    fn line(intensity: f64) -> BroadenedLine {
        BroadenedLine {
            position: 2000.0,
            intensity,
            emission: 0.0,
            hwhm_lorentz: 0.05,
            hwhm_gauss: 0.003,
        }
    }

    #[test]
    fn cutoff_uses_absolute_intensity_and_reports_discarded_share() {
        let lines = vec![line(1.0e-20), line(-5.0e-21), line(1.0e-27), line(3.0e-28)];
        let (kept, diagnostics) = apply_cutoff(lines, 1.0e-25);

        assert_eq!(kept.len(), 2);
        assert_eq!(diagnostics.lines_discarded(), 2);
        let expected = 1.3e-27 / (1.5e-20 + 1.3e-27);
        assert!((diagnostics.discarded_fraction() / expected - 1.0).abs() < 1.0e-9);

        let (all, diagnostics) = apply_cutoff(vec![line(0.0)], 0.0);
        assert_eq!(all.len(), 1);
        assert_eq!(diagnostics.discarded_fraction(), 0.0);
    }
}
