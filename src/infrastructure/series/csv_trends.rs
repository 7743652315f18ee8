//! Search trend CSV reader and the weekly trend feature table

use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::series::{
    RawTrendSource, TrendFeatureRow, TrendFeatureSink, TrendFeatureSource, TrendRecord,
    TREND_FEATURE_COLUMNS,
};
use crate::domain::DomainError;

use super::csv_source::{column_index, parse_timestamp};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Header names of the search trend columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendColumns {
    pub timestamp: String,
    pub entity_id: String,
    pub interest: String,
    pub intent: String,
    pub safety: String,
}

impl Default for TrendColumns {
    fn default() -> Self {
        Self {
            timestamp: "date".to_string(),
            entity_id: "sub_region_1".to_string(),
            interest: "sni_covid19_vaccination".to_string(),
            intent: "sni_vaccination_intent".to_string(),
            safety: "sni_safety_side_effects".to_string(),
        }
    }
}

/// Parses search trend rows.
///
/// Rows with an empty entity are country-level aggregates and are skipped.
/// An empty metric stays missing rather than reading as zero.
pub fn parse_trend_csv<R: Read>(reader: R, columns: &TrendColumns) -> Result<Vec<TrendRecord>, DomainError> {
    let mut reader = csv::Reader::from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| DomainError::validation(format!("Failed to read headers: {}", e)))?
        .clone();

    let ts_idx = column_index(&headers, &columns.timestamp)?;
    let entity_idx = column_index(&headers, &columns.entity_id)?;
    let metric_idx = [
        column_index(&headers, &columns.interest)?,
        column_index(&headers, &columns.intent)?,
        column_index(&headers, &columns.safety)?,
    ];

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let line = row + 2;
        let record = result
            .map_err(|e| DomainError::validation(format!("Malformed CSV at line {}: {}", line, e)))?;

        let field = |idx: usize| record.get(idx).unwrap_or("").trim();

        let entity_id = field(entity_idx);
        if entity_id.is_empty() {
            continue;
        }

        let timestamp = match field(ts_idx) {
            "" => None,
            text => Some(parse_timestamp(text).ok_or_else(|| {
                DomainError::validation(format!("Unparseable timestamp '{}' at line {}", text, line))
            })?),
        };

        let mut metrics = [None; 3];
        for (slot, idx) in metrics.iter_mut().zip(metric_idx) {
            *slot = match field(idx) {
                "" => None,
                text => Some(text.parse::<f64>().map_err(|_| {
                    DomainError::validation(format!("Non-numeric value '{}' at line {}", text, line))
                })?),
            };
        }
        let [interest, intent, safety] = metrics;

        records.push(TrendRecord {
            entity_id: entity_id.to_string(),
            timestamp,
            interest,
            intent,
            safety,
        });
    }

    Ok(records)
}

/// Search trends read from a local CSV file
#[derive(Debug, Clone)]
pub struct CsvTrendSource {
    path: PathBuf,
    columns: TrendColumns,
}

impl CsvTrendSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            columns: TrendColumns::default(),
        }
    }

    pub fn with_columns(mut self, columns: TrendColumns) -> Self {
        self.columns = columns;
        self
    }
}

#[async_trait]
impl RawTrendSource for CsvTrendSource {
    async fn fetch(&self) -> Result<Vec<TrendRecord>, DomainError> {
        let contents = tokio::fs::read(&self.path).await.map_err(|e| {
            DomainError::backend("file", format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        let records = parse_trend_csv(contents.as_slice(), &self.columns)?;
        debug!(path = %self.path.display(), records = records.len(), "Read search trends");

        Ok(records)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

#[derive(Debug, Deserialize)]
struct TrendFeatureRecord {
    week_start: String,
    entity_id: String,
    lag_1_interest: f64,
    lag_2_interest: f64,
    lag_1_intent: f64,
    lag_2_intent: f64,
    lag_1_safety: f64,
    lag_2_safety: f64,
}

/// Weekly search trend lags, laid out like the count feature table
#[derive(Debug, Clone)]
pub struct CsvTrendTable {
    path: PathBuf,
}

impl CsvTrendTable {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn io_error(&self, action: &str, e: impl std::fmt::Display) -> DomainError {
        DomainError::backend(
            "file",
            format!("Failed to {} {}: {}", action, self.path.display(), e),
        )
    }
}

fn encode_trend_rows(rows: &[TrendFeatureRow]) -> Result<Vec<u8>, DomainError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let encode_error =
        |e: csv::Error| DomainError::serialization(format!("Failed to encode trend features: {}", e));

    writer.write_record(TREND_FEATURE_COLUMNS).map_err(encode_error)?;
    for row in rows {
        let week_start = row
            .week_start
            .and_hms_opt(0, 0, 0)
            .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
            .ok_or_else(|| DomainError::serialization("week start has no midnight"))?;

        writer
            .write_record([
                week_start,
                row.entity_id.clone(),
                row.lag_1_interest.to_string(),
                row.lag_2_interest.to_string(),
                row.lag_1_intent.to_string(),
                row.lag_2_intent.to_string(),
                row.lag_1_safety.to_string(),
                row.lag_2_safety.to_string(),
            ])
            .map_err(encode_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| DomainError::serialization(format!("Failed to flush trend features: {}", e)))
}

fn decode_trend_rows(data: &[u8]) -> Result<Vec<TrendFeatureRow>, DomainError> {
    let mut reader = csv::Reader::from_reader(data);

    reader
        .deserialize::<TrendFeatureRecord>()
        .map(|result| -> Result<TrendFeatureRow, DomainError> {
            let record = result.map_err(|e| {
                DomainError::serialization(format!("Malformed trend feature row: {}", e))
            })?;
            let week_start = parse_timestamp(record.week_start.trim())
                .ok_or_else(|| {
                    DomainError::serialization(format!("Bad week_start '{}'", record.week_start))
                })?
                .date_naive();

            Ok(TrendFeatureRow {
                entity_id: record.entity_id,
                week_start,
                lag_1_interest: record.lag_1_interest,
                lag_2_interest: record.lag_2_interest,
                lag_1_intent: record.lag_1_intent,
                lag_2_intent: record.lag_2_intent,
                lag_1_safety: record.lag_1_safety,
                lag_2_safety: record.lag_2_safety,
            })
        })
        .collect()
}

#[async_trait]
impl TrendFeatureSink for CsvTrendTable {
    async fn write(&self, rows: &[TrendFeatureRow]) -> Result<(), DomainError> {
        let data = encode_trend_rows(rows)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error("create directory for", e))?;
        }
        tokio::fs::write(&self.path, data)
            .await
            .map_err(|e| self.io_error("write", e))?;

        info!(path = %self.path.display(), rows = rows.len(), "Wrote trend feature table");
        Ok(())
    }
}

#[async_trait]
impl TrendFeatureSource for CsvTrendTable {
    async fn read(&self) -> Result<Vec<TrendFeatureRow>, DomainError> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| self.io_error("read", e))?;

        decode_trend_rows(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    const SAMPLE: &str = "\
country_region_code,sub_region_1,date,sni_covid19_vaccination,sni_vaccination_intent,sni_safety_side_effects
US,,2021-01-04,40.1,3.2,1.1
US,California,2021-01-04,38.5,2.9,0.8
US,California,2021-01-05,41,,1.0
US,Texas,2021-01-04,22.25,4,2
";

    fn feature_row(entity: &str, day: u32, base: f64) -> TrendFeatureRow {
        TrendFeatureRow {
            entity_id: entity.to_string(),
            week_start: NaiveDate::from_ymd_opt(2021, 1, day).unwrap(),
            lag_1_interest: base,
            lag_2_interest: base + 1.0,
            lag_1_intent: base + 2.0,
            lag_2_intent: base + 3.0,
            lag_1_safety: base + 4.0,
            lag_2_safety: base + 0.5,
        }
    }

    #[test]
    fn test_parse_skips_country_rows() {
        let records = parse_trend_csv(SAMPLE.as_bytes(), &TrendColumns::default()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            TrendRecord::new(
                "California",
                Utc.with_ymd_and_hms(2021, 1, 4, 0, 0, 0).unwrap(),
                38.5,
                2.9,
                0.8
            )
        );
        assert_eq!(records[2].entity_id, "Texas");
    }

    #[test]
    fn test_empty_metric_stays_missing() {
        let records = parse_trend_csv(SAMPLE.as_bytes(), &TrendColumns::default()).unwrap();

        assert_eq!(records[1].interest, Some(41.0));
        assert_eq!(records[1].intent, None);
        assert_eq!(records[1].safety, Some(1.0));
    }

    #[test]
    fn test_rejects_bad_rows() {
        let columns = TrendColumns::default();
        let header = "date,sub_region_1,sni_covid19_vaccination,sni_vaccination_intent,sni_safety_side_effects\n";

        let bad_value = format!("{}2021-01-04,CA,high,1,1\n", header);
        assert!(matches!(
            parse_trend_csv(bad_value.as_bytes(), &columns),
            Err(DomainError::Validation { .. })
        ));

        let bad_date = format!("{}Jan 4,CA,1,1,1\n", header);
        assert!(matches!(
            parse_trend_csv(bad_date.as_bytes(), &columns),
            Err(DomainError::Validation { .. })
        ));

        let missing_column = "date,sub_region_1,sni_covid19_vaccination\n2021-01-04,CA,1\n";
        assert!(matches!(
            parse_trend_csv(missing_column.as_bytes(), &columns),
            Err(DomainError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_csv_trend_source_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let source = CsvTrendSource::new(file.path());

        assert_eq!(source.fetch().await.unwrap().len(), 3);
        assert!(source.describe().starts_with("csv:"));
    }

    #[test]
    fn test_trend_table_header() {
        let data = encode_trend_rows(&[feature_row("CA", 11, 10.0)]).unwrap();
        let text = String::from_utf8(data).unwrap();

        assert_eq!(
            text,
            "week_start,entity_id,lag_1_interest,lag_2_interest,lag_1_intent,lag_2_intent,lag_1_safety,lag_2_safety\n\
             2021-01-11 00:00:00,CA,10,11,12,13,14,10.5\n"
        );
    }

    #[tokio::test]
    async fn test_trend_table_write_then_read_back() {
        let dir = tempdir().unwrap();
        let table = CsvTrendTable::new(dir.path().join("trends/weekly.csv"));
        let rows = vec![feature_row("CA", 11, 10.0), feature_row("TX", 11, 2.5)];

        table.write(&rows).await.unwrap();

        assert_eq!(table.read().await.unwrap(), rows);
    }

    #[tokio::test]
    async fn test_missing_trend_table_is_backend_error() {
        let table = CsvTrendTable::new("/nonexistent/trends.csv");

        assert!(matches!(
            table.read().await,
            Err(DomainError::BackendUnavailable { .. })
        ));
    }
}
