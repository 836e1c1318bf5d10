//! Gap filling for a single field's series.

use crate::model::Sample;
use crate::stats::compute_mean;
use std::fmt;

/// Window used by the moving average when none is given.
pub const DEFAULT_WINDOW: usize = 3;

/// How absent samples of a series are inferred from their neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Linear interpolation between the nearest present neighbours,
    /// with forward/backward fill at the edges.
    Interpolation,
    /// Mean of the present samples within `window` positions centred on the gap.
    MovingAverage { window: usize },
}

impl Strategy {
    pub fn moving_average() -> Self {
        Strategy::MovingAverage {
            window: DEFAULT_WINDOW,
        }
    }

    /// Conventional strategy for a field name.
    ///
    /// Temperature fields vary smoothly and are interpolated, everything else
    /// (humidity, wind speed, ...) is averaged locally.
    pub fn default_for_field(name: &str) -> Self {
        if name.starts_with("temp") {
            Strategy::Interpolation
        } else {
            Strategy::moving_average()
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Interpolation => write!(f, "linear_interpolation"),
            Strategy::MovingAverage { window } => write!(f, "moving_average(w={window})"),
        }
    }
}

/// Outcome of filling one series.
#[derive(Debug, Clone, PartialEq)]
pub struct ImputationResult {
    /// Filled series, same length as the input.
    pub series: Vec<Sample>,
    pub strategy: Strategy,
    /// Positions absent in the input and present in the output.
    pub imputed: usize,
    /// Positions still absent in the output.
    pub unresolved: usize,
}

impl ImputationResult {
    /// Number of positions absent in the input.
    pub fn missing(&self) -> usize {
        self.imputed + self.unresolved
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved == 0
    }

    /// Present values of the filled series, or `None` if any position is unresolved.
    pub fn values(&self) -> Option<Vec<f64>> {
        self.series.iter().map(|sample| sample.value()).collect()
    }
}

/// Fill the absent samples of `series` using `strategy`.
///
/// Never fails: positions that cannot be inferred stay [`Sample::Absent`]
/// and are counted in [`ImputationResult::unresolved`].
pub fn fill(series: &[Sample], strategy: Strategy) -> ImputationResult {
    let n_absent = series.iter().filter(|sample| sample.is_absent()).count();

    let filled = if n_absent == 0 {
        series.to_vec()
    } else {
        match strategy {
            Strategy::Interpolation => interpolate(series),
            Strategy::MovingAverage { window } => moving_average(series, window),
        }
    };

    let imputed = series
        .iter()
        .zip(&filled)
        .filter(|(old, new)| old.is_absent() && new.is_present())
        .count();
    let unresolved = filled.iter().filter(|sample| sample.is_absent()).count();

    log::debug!("{strategy}: {imputed} imputed, {unresolved} unresolved");

    ImputationResult {
        series: filled,
        strategy,
        imputed,
        unresolved,
    }
}

fn interpolate(series: &[Sample]) -> Vec<Sample> {
    let n_present = series.iter().filter(|sample| sample.is_present()).count();
    if n_present < 2 {
        return series.to_vec();
    }

    let mut filled = series.to_vec();
    for (i, slot) in filled.iter_mut().enumerate() {
        if slot.is_present() {
            continue;
        }

        // Neighbours are looked up in the input so earlier fills never act as nodes.
        let left = series[..i]
            .iter()
            .enumerate()
            .rev()
            .find_map(|(j, sample)| sample.value().map(|y| (j, y)));
        let right = series[i + 1..]
            .iter()
            .enumerate()
            .find_map(|(k, sample)| sample.value().map(|y| (i + 1 + k, y)));

        *slot = match (left, right) {
            (Some((x_l, y_l)), Some((x_r, y_r))) => {
                Sample::Present(y_l + (y_r - y_l) * (i - x_l) as f64 / (x_r - x_l) as f64)
            }
            (Some((_, y_l)), None) => Sample::Present(y_l),
            (None, Some((_, y_r))) => Sample::Present(y_r),
            (None, None) => Sample::Absent,
        };
    }
    filled
}

fn moving_average(series: &[Sample], window: usize) -> Vec<Sample> {
    let half = window / 2;
    let n_vals = series.len();

    let mut filled = series.to_vec();
    let mut window_vals = Vec::with_capacity(window.saturating_add(1).min(n_vals));
    for (i, slot) in filled.iter_mut().enumerate() {
        if slot.is_present() {
            continue;
        }

        let start = i.saturating_sub(half);
        let end = i.saturating_add(half).saturating_add(1).min(n_vals);

        window_vals.clear();
        window_vals.extend(series[start..end].iter().filter_map(|sample| sample.value()));

        if !window_vals.is_empty() {
            *slot = Sample::Present(compute_mean(&window_vals));
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::series_from_options;

    const TOL: f64 = 1e-9;

    fn series(vals: &[Option<f64>]) -> Vec<Sample> {
        series_from_options(vals.iter().copied())
    }

    fn assert_filled(result: &ImputationResult, exp: &[f64]) {
        let vals = result.values().expect("series has unresolved positions");
        assert_eq!(vals.len(), exp.len());
        for (i, (val, exp)) in vals.iter().zip(exp).enumerate() {
            assert!((val - exp).abs() < TOL, "position {i}: {val} != {exp}");
        }
    }

    #[test]
    fn interpolation_fills_edges_and_interior() {
        let input = series(&[None, Some(2.0), None, Some(4.0), None]);
        let result = fill(&input, Strategy::Interpolation);

        assert_filled(&result, &[2.0, 2.0, 3.0, 4.0, 4.0]);
        assert_eq!(result.imputed, 3);
        assert_eq!(result.unresolved, 0);
    }

    #[test]
    fn interpolation_uses_positions_as_nodes() {
        let input = series(&[Some(21.8), None, None, Some(23.5)]);
        let result = fill(&input, Strategy::Interpolation);

        let step = (23.5 - 21.8) / 3.0;
        assert_filled(&result, &[21.8, 21.8 + step, 21.8 + 2.0 * step, 23.5]);
        assert_eq!(result.imputed, 2);
    }

    #[test]
    fn interpolation_counts_every_gap() {
        let input = series(&[
            Some(32.5),
            None,
            Some(31.2),
            None,
            Some(33.8),
            Some(34.1),
            None,
            Some(30.9),
        ]);
        let result = fill(&input, Strategy::Interpolation);

        assert_filled(&result, &[32.5, 31.85, 31.2, 32.5, 33.8, 34.1, 32.5, 30.9]);
        assert_eq!(result.imputed, 3);
        assert_eq!(result.missing(), 3);
    }

    #[test]
    fn interpolation_needs_two_present_values() {
        let input = series(&[None, Some(5.0), None]);
        let result = fill(&input, Strategy::Interpolation);

        assert_eq!(result.series, input);
        assert_eq!(result.imputed, 0);
        assert_eq!(result.unresolved, 2);
        assert!(!result.is_complete());
    }

    #[test]
    fn moving_average_clips_window() {
        let input = series(&[Some(1.0), None, Some(3.0), None, Some(5.0)]);
        let result = fill(&input, Strategy::moving_average());

        assert_filled(&result, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(result.imputed, 2);
    }

    #[test]
    fn moving_average_ignores_earlier_fills() {
        let input = series(&[Some(6.0), None, None, Some(9.0)]);
        let result = fill(&input, Strategy::moving_average());

        assert_filled(&result, &[6.0, 6.0, 9.0, 9.0]);
        assert_eq!(result.imputed, 2);
    }

    #[test]
    fn moving_average_even_window_is_symmetric() {
        let input = series(&[Some(1.0), Some(2.0), None, Some(4.0), Some(8.0)]);
        let result = fill(&input, Strategy::MovingAverage { window: 4 });

        assert_filled(&result, &[1.0, 2.0, 3.75, 4.0, 8.0]);
    }

    #[test]
    fn moving_average_leaves_empty_windows_absent() {
        let input = series(&[None, None, None]);
        for window in [1, 3, 5, 100] {
            let result = fill(&input, Strategy::MovingAverage { window });
            assert_eq!(result.series, input);
            assert_eq!(result.imputed, 0);
            assert_eq!(result.unresolved, 3);
        }

        let input = series(&[Some(1.0), None, None, None, None, Some(2.0)]);
        let result = fill(&input, Strategy::moving_average());
        assert_eq!(result.imputed, 2);
        assert_eq!(result.unresolved, 2);
        assert_eq!(result.series[2], Sample::Absent);
        assert_eq!(result.series[3], Sample::Absent);
    }

    #[test]
    fn moving_average_accepts_any_window() {
        let input = series(&[Some(1.0), None, Some(3.0)]);
        let result = fill(&input, Strategy::MovingAverage { window: usize::MAX });

        assert_filled(&result, &[1.0, 2.0, 3.0]);
        assert_eq!(result.imputed, 1);

        let result = fill(&input, Strategy::MovingAverage { window: 1 << 40 });
        assert_filled(&result, &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn complete_series_is_unchanged() {
        let input = series(&[Some(1.0), Some(2.0), Some(3.0)]);
        for strategy in [Strategy::Interpolation, Strategy::moving_average()] {
            let once = fill(&input, strategy);
            let twice = fill(&once.series, strategy);
            assert_eq!(twice.series, input);
            assert_eq!(once.imputed, 0);
            assert_eq!(twice.imputed, 0);
        }
    }

    #[test]
    fn empty_series_is_unchanged() {
        for strategy in [Strategy::Interpolation, Strategy::moving_average()] {
            let result = fill(&[], strategy);
            assert!(result.series.is_empty());
            assert_eq!(result.missing(), 0);
        }
    }

    #[test]
    fn input_is_not_mutated() {
        let input = series(&[Some(1.0), None, Some(3.0)]);
        let copy = input.clone();
        let _ = fill(&input, Strategy::Interpolation);
        assert_eq!(input, copy);
    }

    #[test]
    fn strategy_labels() {
        assert_eq!(Strategy::Interpolation.to_string(), "linear_interpolation");
        assert_eq!(Strategy::moving_average().to_string(), "moving_average(w=3)");
        assert_eq!(Strategy::default_for_field("temp_min"), Strategy::Interpolation);
        assert_eq!(Strategy::default_for_field("wind_speed"), Strategy::moving_average());
    }
}
