use crate::anomaly::{DEFAULT_THRESHOLD_MULTIPLIER, DetectParams};
use crate::impute::{DEFAULT_WINDOW, Strategy};
use crate::stats::StdKind;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Processing configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Gap filling parameters.
    pub imputation: ImputationConfig,
    /// Anomaly detection parameters.
    pub anomaly: AnomalyConfig,
    /// Output parameters.
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ImputationConfig {
    /// Fraction of missing samples above which a field is flagged for review.
    #[serde(default = "default_max_missing_frac")]
    pub max_missing_frac: f64,
    /// Fields to fill, in report order.
    pub fields: Vec<FieldConfig>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Record key of the field.
    pub name: String,
    /// Filling method.
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Moving average window (only used by `moving_average`).
    pub window: Option<usize>,
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Pick by field name, see [`Strategy::default_for_field`].
    #[default]
    Auto,
    Interpolation,
    MovingAverage,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Record key of the field to analyze.
    pub field: String,
    /// Number of standard deviations a point must exceed to be flagged.
    #[serde(default = "default_threshold_multiplier")]
    pub threshold_multiplier: f64,
    /// Standard deviation estimator.
    #[serde(default)]
    pub std_kind: StdKind,
}

#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Encoding of the generated files.
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Json,
    Msgpack,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Msgpack => "msgpack",
        }
    }
}

fn default_max_missing_frac() -> f64 {
    0.5
}

fn default_threshold_multiplier() -> f64 {
    DEFAULT_THRESHOLD_MULTIPLIER
}

impl FieldConfig {
    /// Resolve the configured method into a concrete [`Strategy`].
    pub fn strategy(&self) -> Strategy {
        let window = self.window.unwrap_or(DEFAULT_WINDOW);
        match self.strategy {
            StrategyKind::Auto => match Strategy::default_for_field(&self.name) {
                Strategy::MovingAverage { .. } => Strategy::MovingAverage { window },
                strategy => strategy,
            },
            StrategyKind::Interpolation => Strategy::Interpolation,
            StrategyKind::MovingAverage => Strategy::MovingAverage { window },
        }
    }
}

impl AnomalyConfig {
    pub fn params(&self) -> DetectParams {
        DetectParams {
            threshold_multiplier: self.threshold_multiplier,
            std_kind: self.std_kind,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.imputation.max_missing_frac, 0.0..=1.0)
            .context("invalid maximum missing fraction")?;
        check_num(self.imputation.fields.len(), 1..=64).context("invalid number of fields")?;

        let mut names = HashSet::new();
        for field in &self.imputation.fields {
            check_name(&field.name).context("invalid field name")?;
            if !names.insert(field.name.as_str()) {
                bail!("field {:?} is configured more than once", field.name);
            }
            if let Some(window) = field.window {
                check_num(window, 1..=365)
                    .with_context(|| format!("invalid window for field {:?}", field.name))?;
            }
        }

        check_name(&self.anomaly.field).context("invalid anomaly field name")?;
        let multiplier = self.anomaly.threshold_multiplier;
        if multiplier <= 0.0 {
            bail!("threshold multiplier must be positive, but is {multiplier}");
        }
        check_num(multiplier, 0.0..=10.0).context("invalid threshold multiplier")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("name must not be empty");
    }
    if name == "date" {
        bail!("name \"date\" is reserved for record labels");
    }
    Ok(())
}
