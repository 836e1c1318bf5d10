use serde::{Deserialize, Serialize};
use std::fmt;

/// Divisor used when estimating the standard deviation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdKind {
    /// Unbiased estimator, divides by `n - 1`.
    #[default]
    Sample,
    /// Population estimator, divides by `n`.
    Population,
}

impl fmt::Display for StdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StdKind::Sample => write!(f, "sample"),
            StdKind::Population => write!(f, "population"),
        }
    }
}

/// Single-pass mean and variance accumulator (Welford's algorithm).
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn mean(&self) -> f64 {
        if self.n_vals == 0 {
            return f64::NAN;
        }
        self.mean
    }

    /// Standard deviation with the divisor selected by `kind`.
    ///
    /// Returns NaN when there are too few values for the estimator.
    pub fn std_dev(&self, kind: StdKind) -> f64 {
        let divisor = match kind {
            StdKind::Sample if self.n_vals > 1 => self.n_vals as f64 - 1.0,
            StdKind::Population if self.n_vals > 0 => self.n_vals as f64,
            _ => return f64::NAN,
        };
        (self.diff_2_sum / divisor).sqrt()
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Extend<f64> for Accumulator {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for val in iter {
            self.add(val);
        }
    }
}

pub fn compute_mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}
