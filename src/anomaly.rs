//! Distribution-based anomaly flagging.
//!
//! A point is anomalous when its distance from the series mean is strictly
//! greater than `threshold_multiplier` standard deviations. Mean and standard
//! deviation are computed once over the whole series before any point is judged.

use crate::model::Sample;
use crate::stats::{Accumulator, StdKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_THRESHOLD_MULTIPLIER: f64 = 2.0;

/// Reasons a series cannot be judged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectError {
    #[error("no values to analyze")]
    EmptyInput,

    #[error("got {values} values but {labels} labels")]
    LengthMismatch { values: usize, labels: usize },

    #[error("value at index {index} is missing or not finite")]
    InvalidValue { index: usize },

    #[error("need at least 2 values to estimate spread, but got {len}")]
    InsufficientData { len: usize },
}

/// Detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectParams {
    pub threshold_multiplier: f64,
    pub std_kind: StdKind,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            threshold_multiplier: DEFAULT_THRESHOLD_MULTIPLIER,
            std_kind: StdKind::Sample,
        }
    }
}

/// A point whose deviation exceeded the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedPoint<L> {
    /// Position of the point in the input.
    pub index: usize,
    pub label: L,
    pub value: f64,
    /// Absolute distance from the mean.
    pub deviation: f64,
}

/// Distribution summary and the points flagged against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySummary<L> {
    pub mean: f64,
    pub std_dev: f64,
    /// Estimator actually used for `std_dev`.
    pub std_kind: StdKind,
    pub threshold_multiplier: f64,
    /// `threshold_multiplier * std_dev`.
    pub threshold: f64,
    /// Number of values analyzed.
    pub total: usize,
    /// Flagged points in input order.
    pub flagged: Vec<FlaggedPoint<L>>,
}

impl<L> AnomalySummary<L> {
    pub fn flagged_labels(&self) -> impl Iterator<Item = &L> {
        self.flagged.iter().map(|pnt| &pnt.label)
    }

    pub fn flagged_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.flagged.iter().map(|pnt| pnt.index)
    }

    pub fn has_anomalies(&self) -> bool {
        !self.flagged.is_empty()
    }
}

fn check_shape(n_values: usize, n_labels: usize) -> Result<(), DetectError> {
    if n_values == 0 {
        return Err(DetectError::EmptyInput);
    }
    if n_labels != n_values {
        return Err(DetectError::LengthMismatch {
            values: n_values,
            labels: n_labels,
        });
    }
    Ok(())
}

/// Flag the values whose deviation from the mean exceeds the threshold.
///
/// `labels[i]` is reported for `values[i]`.
///
/// # Errors
/// Checked in order: empty `values`, length mismatch (including empty
/// `labels`), any non-finite value, fewer than two values.
pub fn detect<L: Clone>(
    values: &[f64],
    labels: &[L],
    params: DetectParams,
) -> Result<AnomalySummary<L>, DetectError> {
    check_shape(values.len(), labels.len())?;
    if let Some(index) = values.iter().position(|val| !val.is_finite()) {
        return Err(DetectError::InvalidValue { index });
    }
    if values.len() < 2 {
        return Err(DetectError::InsufficientData { len: values.len() });
    }

    // Moments are accumulated on values scaled into [-1, 1] so that finite
    // inputs near the f64 limit cannot overflow the squared deviations.
    let scale = values.iter().fold(0.0_f64, |max, val| max.max(val.abs()));
    let scale = if scale > 0.0 { scale } else { 1.0 };

    let mut acc = Accumulator::new();
    acc.extend(values.iter().map(|val| val / scale));
    let scaled_mean = acc.mean();
    let scaled_std_dev = acc.std_dev(params.std_kind);
    let scaled_threshold = params.threshold_multiplier * scaled_std_dev;

    let mean = scaled_mean * scale;
    let std_dev = scaled_std_dev * scale;
    let threshold = scaled_threshold * scale;

    let flagged: Vec<_> = values
        .iter()
        .zip(labels)
        .enumerate()
        .filter_map(|(index, (&value, label))| {
            let scaled_deviation = (value / scale - scaled_mean).abs();
            (scaled_deviation > scaled_threshold).then(|| FlaggedPoint {
                index,
                label: label.clone(),
                value,
                deviation: scaled_deviation * scale,
            })
        })
        .collect();

    log::debug!(
        "mean = {mean}, {} std = {std_dev}, threshold = {threshold}, {} of {} flagged",
        params.std_kind,
        flagged.len(),
        values.len()
    );

    Ok(AnomalySummary {
        mean,
        std_dev,
        std_kind: params.std_kind,
        threshold_multiplier: params.threshold_multiplier,
        threshold,
        total: values.len(),
        flagged,
    })
}

/// Like [`detect`], but takes a series that may still contain absent samples.
///
/// The first absent sample is reported as [`DetectError::InvalidValue`].
pub fn detect_samples<L: Clone>(
    samples: &[Sample],
    labels: &[L],
    params: DetectParams,
) -> Result<AnomalySummary<L>, DetectError> {
    check_shape(samples.len(), labels.len())?;
    let values = samples
        .iter()
        .enumerate()
        .map(|(index, sample)| sample.value().ok_or(DetectError::InvalidValue { index }))
        .collect::<Result<Vec<_>, _>>()?;
    detect(&values, labels, params)
}
