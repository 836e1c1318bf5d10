use crate::anomaly::{DetectError, detect_samples};
use crate::config::{AnomalyConfig, Config, ImputationConfig, OutputFormat};
use crate::impute::fill;
use crate::model::RecordSet;
use crate::report::{AnomalyReport, FieldReport, ImputationReport};
use anyhow::{Context, Result};
use glob::glob;
use rmp_serde::{decode, encode};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

const RECORDS_PREFIX: &str = "records-";
const IMPUTED_PREFIX: &str = "imputed-";
const IMPUTATION_PREFIX: &str = "imputation-";
const ANOMALIES_PREFIX: &str = "anomalies-";

pub struct Manager {
    data_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(data_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { data_dir, cfg })
    }

    pub fn impute_data(&self) -> Result<()> {
        let format = self.cfg.output.format;
        for (stem, records_file) in self.records_files()? {
            let records: RecordSet = read_file(&records_file, OutputFormat::Json)
                .with_context(|| format!("failed to read {records_file:?}"))?;

            let (imputed, report) = impute_records(&records, &self.cfg.imputation);
            log::info!(
                "{stem}: imputed {} values in {} records, {} unresolved",
                report.total_imputed(),
                report.n_records,
                report.total_unresolved()
            );

            let imputed_file = self.output_file(IMPUTED_PREFIX, &stem);
            write_file(&imputed_file, format, &imputed)
                .with_context(|| format!("failed to write {imputed_file:?}"))?;

            let report_file = self.output_file(IMPUTATION_PREFIX, &stem);
            write_file(&report_file, format, &report)
                .with_context(|| format!("failed to write {report_file:?}"))?;
        }

        Ok(())
    }

    pub fn detect_anomalies(&self, imputed: bool) -> Result<()> {
        let format = self.cfg.output.format;
        for (stem, records_file) in self.records_files()? {
            let records: RecordSet = if imputed {
                let imputed_file = self.output_file(IMPUTED_PREFIX, &stem);
                read_file(&imputed_file, format)
                    .with_context(|| format!("failed to read {imputed_file:?}"))?
            } else {
                read_file(&records_file, OutputFormat::Json)
                    .with_context(|| format!("failed to read {records_file:?}"))?
            };

            let report = detect_records(&records, &self.cfg.anomaly)
                .with_context(|| format!("failed to detect anomalies in {stem}"))?;
            log::info!(
                "{stem}: {} of {} {} values flagged ({} std, multiplier {})",
                report.anomalies.len(),
                report.total_data_points,
                report.field,
                report.std_kind,
                report.threshold_multiplier
            );

            let anomalies_file = self.output_file(ANOMALIES_PREFIX, &stem);
            write_file(&anomalies_file, format, &report)
                .with_context(|| format!("failed to write {anomalies_file:?}"))?;
        }

        Ok(())
    }

    pub fn clean_data(&self) -> Result<()> {
        for prefix in [IMPUTED_PREFIX, IMPUTATION_PREFIX, ANOMALIES_PREFIX] {
            for file in self.glob_files(&format!("{prefix}*"))? {
                fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
                log::info!("removed {file:?}");
            }
        }

        Ok(())
    }

    fn records_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let files = self
            .glob_files(&format!("{RECORDS_PREFIX}*.json"))
            .context("failed to glob records files")?;

        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let stem = file
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.strip_prefix(RECORDS_PREFIX))
                .with_context(|| format!("invalid records file name {file:?}"))?
                .to_string();
            entries.push((stem, file));
        }

        if entries.is_empty() {
            log::warn!("no {RECORDS_PREFIX}*.json files in {:?}", self.data_dir);
        }
        Ok(entries)
    }

    fn glob_files(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let pattern = self.data_dir.join(pattern);
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let mut files: Vec<_> = glob(pattern)
            .context("failed to glob files")?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        Ok(files)
    }

    fn output_file(&self, prefix: &str, stem: &str) -> PathBuf {
        let ext = self.cfg.output.format.extension();
        self.data_dir.join(format!("{prefix}{stem}.{ext}"))
    }
}

/// Fill every configured field of `records`.
///
/// Returns a new record set; `records` is left untouched.
pub fn impute_records(
    records: &RecordSet,
    cfg: &ImputationConfig,
) -> (RecordSet, ImputationReport) {
    let n_records = records.len();
    let mut imputed = records.clone();
    let mut fields = Vec::with_capacity(cfg.fields.len());

    for field in &cfg.fields {
        let series = records.field_series(&field.name);
        let result = fill(&series, field.strategy());

        let report = FieldReport::new(&field.name, n_records, &result, cfg.max_missing_frac);
        if report.unresolved > 0 {
            log::warn!(
                "{}: {} of {} missing values could not be filled",
                field.name,
                report.unresolved,
                report.missing
            );
        }
        if report.needs_review {
            log::warn!(
                "{}: {:.0}% of values missing, flagged for review",
                field.name,
                100.0 * report.missing_frac
            );
        }

        imputed.set_field_series(&field.name, &result.series);
        fields.push(report);
    }

    (imputed, ImputationReport { n_records, fields })
}

/// Run the detector on one field of `records`, labelled by record date.
pub fn detect_records(
    records: &RecordSet,
    cfg: &AnomalyConfig,
) -> Result<AnomalyReport, DetectError> {
    let series = records.field_series(&cfg.field);
    let labels = records.labels();
    let summary = detect_samples(&series, &labels, cfg.params())?;
    Ok(AnomalyReport::new(&cfg.field, &summary))
}

fn read_file<T: DeserializeOwned, P: AsRef<Path>>(file: P, format: OutputFormat) -> Result<T> {
    let file = file.as_ref();
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let reader = BufReader::new(file);

    let value = match format {
        OutputFormat::Json => serde_json::from_reader(reader).context("failed to parse JSON")?,
        OutputFormat::Msgpack => {
            decode::from_read(reader).context("failed to decode MessagePack")?
        }
    };
    Ok(value)
}

fn write_file<T: Serialize, P: AsRef<Path>>(
    file: P,
    format: OutputFormat,
    value: &T,
) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, value).context("failed to write JSON")?
        }
        OutputFormat::Msgpack => {
            encode::write_named(&mut writer, value).context("failed to encode MessagePack")?
        }
    }

    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sample;

    const CONFIG: &str = r#"
[imputation]
fields = [
    { name = "temp_max", strategy = "interpolation" },
    { name = "humidity", strategy = "moving_average" },
]

[anomaly]
field = "temp_max"
"#;

    fn record_set() -> RecordSet {
        serde_json::from_str(
            r#"{"location": "Tokyo", "records": [
                {"date": "2024-08-15", "temp_max": 32.5, "humidity": null},
                {"date": "2024-08-16", "temp_max": null, "humidity": null},
                {"date": "2024-08-17", "temp_max": 31.2, "humidity": null},
                {"date": "2024-08-18", "temp_max": 33.0, "humidity": 72}
            ]}"#,
        )
        .expect("failed to parse record set")
    }

    #[test]
    fn imputes_configured_fields() {
        let cfg = Config::from_toml(CONFIG).expect("failed to parse config");
        let records = record_set();

        let (imputed, report) = impute_records(&records, &cfg.imputation);

        assert_eq!(records, record_set());
        assert_eq!(imputed.location.as_deref(), Some("Tokyo"));
        let temp_max = imputed.records[1].fields["temp_max"]
            .value()
            .expect("temp_max was not filled");
        assert!((temp_max - 31.85).abs() < 1e-9);

        let humidity = imputed.field_series("humidity");
        assert_eq!(humidity[0], Sample::Absent);
        assert_eq!(humidity[1], Sample::Absent);
        assert_eq!(humidity[2], Sample::Present(72.0));

        assert_eq!(report.n_records, 4);
        assert_eq!(report.fields[0].field, "temp_max");
        assert_eq!(report.fields[0].imputed, 1);
        assert!(!report.fields[0].needs_review);
        assert_eq!(report.fields[1].imputed, 1);
        assert_eq!(report.fields[1].unresolved, 2);
        assert!(report.fields[1].needs_review);
    }

    #[test]
    fn detection_requires_complete_series() {
        let cfg = Config::from_toml(CONFIG).expect("failed to parse config");
        let records = record_set();

        assert_eq!(
            detect_records(&records, &cfg.anomaly),
            Err(DetectError::InvalidValue { index: 1 })
        );

        let (imputed, _) = impute_records(&records, &cfg.imputation);
        let report =
            detect_records(&imputed, &cfg.anomaly).expect("failed to detect anomalies");
        assert_eq!(report.field, "temp_max");
        assert_eq!(report.total_data_points, 4);
        assert!(report.anomalies.is_empty());
    }
}
