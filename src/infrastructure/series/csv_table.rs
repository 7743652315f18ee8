//! Feature table stored as a CSV file

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::domain::series::{FeatureRow, FeatureSink, FeatureSource, FEATURE_COLUMNS};
use crate::domain::DomainError;

use super::csv_source::parse_timestamp;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct FeatureRecord {
    week_start: String,
    entity_id: String,
    lag_1: f64,
    lag_2: f64,
    label: f64,
}

/// Offline feature table: written by the pipeline, read back by training and prediction
#[derive(Debug, Clone)]
pub struct CsvFeatureTable {
    path: PathBuf,
}

impl CsvFeatureTable {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, action: &str, e: impl std::fmt::Display) -> DomainError {
        DomainError::backend(
            "file",
            format!("Failed to {} {}: {}", action, self.path.display(), e),
        )
    }
}

pub(crate) fn encode_rows(rows: &[FeatureRow]) -> Result<Vec<u8>, DomainError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let encode_error = |e: csv::Error| DomainError::serialization(format!("Failed to encode features: {}", e));

    writer.write_record(FEATURE_COLUMNS).map_err(encode_error)?;
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
                row.lag_1.to_string(),
                row.lag_2.to_string(),
                row.label.to_string(),
            ])
            .map_err(encode_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| DomainError::serialization(format!("Failed to flush features: {}", e)))
}

pub(crate) fn decode_rows(data: &[u8]) -> Result<Vec<FeatureRow>, DomainError> {
    let mut reader = csv::Reader::from_reader(data);

    reader
        .deserialize::<FeatureRecord>()
        .map(|result| -> Result<FeatureRow, DomainError> {
            let record = result
                .map_err(|e| DomainError::serialization(format!("Malformed feature row: {}", e)))?;
            let week_start = parse_timestamp(record.week_start.trim())
                .ok_or_else(|| {
                    DomainError::serialization(format!("Bad week_start '{}'", record.week_start))
                })?
                .date_naive();

            Ok(FeatureRow {
                entity_id: record.entity_id,
                week_start,
                lag_1: record.lag_1,
                lag_2: record.lag_2,
                label: record.label,
            })
        })
        .collect()
}

#[async_trait]
impl FeatureSink for CsvFeatureTable {
    async fn write(&self, rows: &[FeatureRow]) -> Result<(), DomainError> {
        let data = encode_rows(rows)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error("create directory for", e))?;
        }
        tokio::fs::write(&self.path, data)
            .await
            .map_err(|e| self.io_error("write", e))?;

        info!(path = %self.path.display(), rows = rows.len(), "Wrote feature table");
        Ok(())
    }
}

#[async_trait]
impl FeatureSource for CsvFeatureTable {
    async fn read(&self) -> Result<Vec<FeatureRow>, DomainError> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| self.io_error("read", e))?;

        decode_rows(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn row(entity: &str, day: u32, lag_1: f64, lag_2: f64, label: f64) -> FeatureRow {
        FeatureRow {
            entity_id: entity.to_string(),
            week_start: NaiveDate::from_ymd_opt(2021, 1, day).unwrap(),
            lag_1,
            lag_2,
            label,
        }
    }

    #[test]
    fn test_header_and_timestamp_format() {
        let data = encode_rows(&[row("CA", 11, 12.0, 10.0, 9.5)]).unwrap();
        let text = String::from_utf8(data).unwrap();

        assert_eq!(
            text,
            "week_start,entity_id,lag_1,lag_2,label\n2021-01-11 00:00:00,CA,12,10,9.5\n"
        );
    }

    #[test]
    fn test_empty_table_has_header_only() {
        let data = encode_rows(&[]).unwrap();
        assert_eq!(data, b"week_start,entity_id,lag_1,lag_2,label\n");
        assert!(decode_rows(&data).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_bad_rows() {
        let bad = b"week_start,entity_id,lag_1,lag_2,label\nyesterday,CA,1,2,3\n";
        assert!(matches!(
            decode_rows(bad),
            Err(DomainError::Serialization { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_then_read_back() {
        let dir = tempdir().unwrap();
        let table = CsvFeatureTable::new(dir.path().join("features/weekly.csv"));
        let rows = vec![row("CA", 11, 12.0, 10.0, 9.0), row("TX", 11, 3.0, 4.0, 5.0)];

        table.write(&rows).await.unwrap();

        assert_eq!(table.read().await.unwrap(), rows);
    }

    #[tokio::test]
    async fn test_write_replaces_previous_table() {
        let dir = tempdir().unwrap();
        let table = CsvFeatureTable::new(dir.path().join("weekly.csv"));

        table.write(&[row("CA", 11, 1.0, 2.0, 3.0)]).await.unwrap();
        table.write(&[row("TX", 18, 4.0, 5.0, 6.0)]).await.unwrap();

        let rows = table.read().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity_id, "TX");
    }
}
