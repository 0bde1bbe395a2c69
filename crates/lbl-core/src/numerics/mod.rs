pub mod faddeeva;

pub use faddeeva::{faddeeva_humlicek, voigt_humlicek};

fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

pub fn stable_sum(values: &[f64]) -> f64 {
    stable_sum_iter(values.iter().copied())
}

pub fn stable_sum_iter(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for value in values {
        kahan_add(&mut sum, &mut correction, value);
    }

    sum
}

/// Trapezoid rule on a (possibly non-uniform) abscissa.
pub fn trapezoid(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() {
        return None;
    }
    if x.len() < 2 {
        return Some(0.0);
    }

    Some(stable_sum_iter(
        x.windows(2)
            .zip(y.windows(2))
            .map(|(xs, ys)| 0.5 * (xs[1] - xs[0]) * (ys[0] + ys[1])),
    ))
}

/// Linear interpolation with boundary clamping. `x_grid` must be
/// non-decreasing.
pub fn interpolate_linear(x: f64, x_grid: &[f64], y_grid: &[f64]) -> Option<f64> {
    if x_grid.len() < 2 || x_grid.len() != y_grid.len() || !x.is_finite() {
        return None;
    }

    let last = x_grid.len() - 1;
    if x <= x_grid[0] {
        return Some(y_grid[0]);
    }
    if x >= x_grid[last] {
        return Some(y_grid[last]);
    }

    let upper = x_grid.partition_point(|probe| *probe < x);
    if x_grid[upper] == x {
        return Some(y_grid[upper]);
    }
    let lower = upper - 1;
    let (x0, x1) = (x_grid[lower], x_grid[upper]);
    if x1 == x0 {
        return Some(y_grid[upper]);
    }

    let fraction = (x - x0) / (x1 - x0);
    Some(y_grid[lower] + fraction * (y_grid[upper] - y_grid[lower]))
}

/// Linear extrapolation from the first or last segment of a table.
pub fn extrapolate_linear(x: f64, x_grid: &[f64], y_grid: &[f64]) -> Option<f64> {
    if x_grid.len() < 2 || x_grid.len() != y_grid.len() {
        return None;
    }

    let (i0, i1) = if x < x_grid[0] {
        (0, 1)
    } else {
        (x_grid.len() - 2, x_grid.len() - 1)
    };
    let (x0, x1) = (x_grid[i0], x_grid[i1]);
    if x1 == x0 {
        return Some(y_grid[i1]);
    }
    Some(y_grid[i0] + (x - x0) * (y_grid[i1] - y_grid[i0]) / (x1 - x0))
}

/// Index and value of the maximum, ignoring NaNs.
pub fn argmax(values: &[f64]) -> Option<(usize, f64)> {
    values
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, value)| !value.is_nan())
        .max_by(|lhs, rhs| lhs.1.total_cmp(&rhs.1).then_with(|| rhs.0.cmp(&lhs.0)))
}

#[cfg(test)]
mod tests {
    use super::{argmax, extrapolate_linear, interpolate_linear, stable_sum, trapezoid};

    #[test]
    fn stable_sum_reduces_order_loss_for_large_and_small_values() {
        let input = [1.0e16, 1.0, -1.0e16];
        assert_eq!(stable_sum(&input), 0.0);
    }

    #[test]
    fn trapezoid_integrates_linear_functions_exactly() {
        let x = [0.0, 0.5, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|value| 2.0 * value + 1.0).collect();
        let integral = trapezoid(&x, &y).expect("shapes match");
        assert!((integral - 12.0).abs() < 1.0e-12);
        assert_eq!(trapezoid(&[0.0], &[1.0]), Some(0.0));
        assert_eq!(trapezoid(&[0.0, 1.0], &[1.0]), None);
    }

    #[test]
    fn interpolate_linear_clamps_and_interpolates() {
        let x_grid = [0.0, 1.0, 2.0];
        let y_grid = [10.0, 20.0, 30.0];

        assert_eq!(interpolate_linear(-1.0, &x_grid, &y_grid), Some(10.0));
        assert_eq!(interpolate_linear(3.0, &x_grid, &y_grid), Some(30.0));
        assert_eq!(interpolate_linear(0.5, &x_grid, &y_grid), Some(15.0));
        assert_eq!(interpolate_linear(1.0, &x_grid, &y_grid), Some(20.0));
        assert_eq!(interpolate_linear(f64::NAN, &x_grid, &y_grid), None);
    }

    #[test]
    fn extrapolate_linear_uses_edge_segments() {
        let x_grid = [100.0, 200.0, 300.0];
        let y_grid = [1.0, 3.0, 4.0];
        assert_eq!(extrapolate_linear(400.0, &x_grid, &y_grid), Some(5.0));
        assert_eq!(extrapolate_linear(50.0, &x_grid, &y_grid), Some(0.0));
    }

    #[test]
    fn argmax_prefers_first_maximum_and_skips_nan() {
        assert_eq!(argmax(&[1.0, f64::NAN, 3.0, 3.0, 2.0]), Some((2, 3.0)));
        assert_eq!(argmax(&[]), None);
    }
}
