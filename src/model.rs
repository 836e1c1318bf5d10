//! Observation data types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single scalar measurement.
///
/// Missing measurements are an explicit variant rather than a NaN sentinel,
/// so they can never leak into arithmetic. Serialized as a number or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Option<f64>", into = "Option<f64>")]
pub enum Sample {
    /// A finite measured value.
    Present(f64),
    /// No measurement at this position.
    Absent,
}

impl Sample {
    /// Get the measured value, if any.
    pub fn value(self) -> Option<f64> {
        match self {
            Sample::Present(val) => Some(val),
            Sample::Absent => None,
        }
    }

    pub fn is_present(self) -> bool {
        matches!(self, Sample::Present(_))
    }

    pub fn is_absent(self) -> bool {
        matches!(self, Sample::Absent)
    }
}

impl TryFrom<Option<f64>> for Sample {
    type Error = String;

    fn try_from(val: Option<f64>) -> Result<Self, Self::Error> {
        match val {
            None => Ok(Sample::Absent),
            Some(val) if val.is_finite() => Ok(Sample::Present(val)),
            Some(val) => Err(format!("sample must be finite, but is {val}")),
        }
    }
}

impl From<Sample> for Option<f64> {
    fn from(sample: Sample) -> Self {
        sample.value()
    }
}

/// Build a series from optional values, treating non-finite values as absent.
pub fn series_from_options<I>(vals: I) -> Vec<Sample>
where
    I: IntoIterator<Item = Option<f64>>,
{
    vals.into_iter()
        .map(|val| Sample::try_from(val).unwrap_or(Sample::Absent))
        .collect()
}

/// Daily observation record.
///
/// Every key other than `date` is a numeric field whose value may be `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Label of the record, usually an ISO date.
    pub date: String,

    /// Measured fields, keyed by name.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Sample>,
}

/// Ordered collection of records for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Optional name of the location the records belong to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Records in time order.
    pub records: Vec<Record>,
}

impl RecordSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Labels of all records, in order.
    pub fn labels(&self) -> Vec<String> {
        self.records.iter().map(|rec| rec.date.clone()).collect()
    }

    /// Extract the series of one field. Records without the field yield [`Sample::Absent`].
    pub fn field_series(&self, name: &str) -> Vec<Sample> {
        self.records
            .iter()
            .map(|rec| rec.fields.get(name).copied().unwrap_or(Sample::Absent))
            .collect()
    }

    /// Write a series back into one field, position by position.
    ///
    /// # Panics
    /// Panics if `series` does not have exactly one sample per record.
    pub fn set_field_series(&mut self, name: &str, series: &[Sample]) {
        assert_eq!(
            series.len(),
            self.records.len(),
            "series length must match the number of records"
        );
        for (rec, &sample) in self.records.iter_mut().zip(series) {
            rec.fields.insert(name.to_string(), sample);
        }
    }
}
