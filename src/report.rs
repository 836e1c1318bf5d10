//! Serializable summaries handed to downstream consumers.

use crate::anomaly::AnomalySummary;
use crate::impute::ImputationResult;
use crate::stats::StdKind;
use serde::{Deserialize, Serialize};

/// Imputation tally for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReport {
    pub field: String,
    pub strategy: String,
    /// Samples absent in the input.
    pub missing: usize,
    /// Samples filled in.
    pub imputed: usize,
    /// Samples still absent after filling.
    pub unresolved: usize,
    pub missing_frac: f64,
    /// Too much of the field was missing to trust the filled values blindly.
    pub needs_review: bool,
}

impl FieldReport {
    pub fn new(
        field: &str,
        n_records: usize,
        result: &ImputationResult,
        max_missing_frac: f64,
    ) -> Self {
        let missing = result.missing();
        let missing_frac = if n_records == 0 {
            0.0
        } else {
            missing as f64 / n_records as f64
        };

        Self {
            field: field.to_string(),
            strategy: result.strategy.to_string(),
            missing,
            imputed: result.imputed,
            unresolved: result.unresolved,
            missing_frac,
            needs_review: missing_frac > max_missing_frac,
        }
    }
}

/// Imputation tallies for every configured field of a record set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationReport {
    pub n_records: usize,
    pub fields: Vec<FieldReport>,
}

impl ImputationReport {
    pub fn total_imputed(&self) -> usize {
        self.fields.iter().map(|f| f.imputed).sum()
    }

    pub fn total_unresolved(&self) -> usize {
        self.fields.iter().map(|f| f.unresolved).sum()
    }
}

/// Details of one flagged point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetail {
    pub index: usize,
    pub label: String,
    pub value: f64,
    pub deviation: f64,
}

/// Anomaly summary of one field, rounded for display.
///
/// Always carries the estimator and multiplier: two valid configurations can
/// disagree on which points are anomalous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub field: String,
    pub mean: f64,
    pub std_dev: f64,
    pub std_kind: StdKind,
    pub threshold_multiplier: f64,
    pub threshold: f64,
    pub total_data_points: usize,
    pub anomalies: Vec<String>,
    pub anomaly_indices: Vec<usize>,
    pub details: Vec<AnomalyDetail>,
}

impl AnomalyReport {
    pub fn new(field: &str, summary: &AnomalySummary<String>) -> Self {
        let details = summary
            .flagged
            .iter()
            .map(|pnt| AnomalyDetail {
                index: pnt.index,
                label: pnt.label.clone(),
                value: pnt.value,
                deviation: round_2(pnt.deviation),
            })
            .collect();

        Self {
            field: field.to_string(),
            mean: round_2(summary.mean),
            std_dev: round_2(summary.std_dev),
            std_kind: summary.std_kind,
            threshold_multiplier: summary.threshold_multiplier,
            threshold: round_2(summary.threshold),
            total_data_points: summary.total,
            anomalies: summary.flagged_labels().cloned().collect(),
            anomaly_indices: summary.flagged_indices().collect(),
            details,
        }
    }
}

fn round_2(val: f64) -> f64 {
    (val * 100.0).round() / 100.0
}
