//! CSV raw series reader

use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

use crate::domain::series::{RawRecord, RawSeriesSource};
use crate::domain::DomainError;

/// Header names of the three columns the pipeline reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawColumns {
    pub timestamp: String,
    pub entity_id: String,
    pub value: String,
}

impl Default for RawColumns {
    fn default() -> Self {
        Self {
            timestamp: "date".to_string(),
            entity_id: "location".to_string(),
            value: "daily_vaccinations".to_string(),
        }
    }
}

impl RawColumns {
    pub fn new(
        timestamp: impl Into<String>,
        entity_id: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            entity_id: entity_id.into(),
            value: value.into(),
        }
    }
}

pub(crate) fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, DomainError> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| DomainError::validation(format!("Missing column '{}' in raw series", name)))
}

/// Accepts `YYYY-MM-DD`, RFC 3339 and `YYYY-MM-DD HH:MM:SS` (read as UTC)
pub(crate) fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|ts| ts.and_utc())
}

/// Parses raw CSV rows; columns other than the three configured ones are ignored.
///
/// An empty timestamp yields a record without one (the aggregator rejects it),
/// and an empty value is read as zero.
pub fn parse_raw_csv<R: Read>(reader: R, columns: &RawColumns) -> Result<Vec<RawRecord>, DomainError> {
    let mut reader = csv::Reader::from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| DomainError::validation(format!("Failed to read headers: {}", e)))?
        .clone();

    let ts_idx = column_index(&headers, &columns.timestamp)?;
    let entity_idx = column_index(&headers, &columns.entity_id)?;
    let value_idx = column_index(&headers, &columns.value)?;

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        // header is line 1
        let line = row + 2;
        let record = result
            .map_err(|e| DomainError::validation(format!("Malformed CSV at line {}: {}", line, e)))?;

        let field = |idx: usize| record.get(idx).unwrap_or("").trim();

        let timestamp = match field(ts_idx) {
            "" => None,
            text => Some(parse_timestamp(text).ok_or_else(|| {
                DomainError::validation(format!("Unparseable timestamp '{}' at line {}", text, line))
            })?),
        };

        let value = match field(value_idx) {
            "" => 0.0,
            text => text.parse::<f64>().map_err(|_| {
                DomainError::validation(format!("Non-numeric value '{}' at line {}", text, line))
            })?,
        };

        records.push(RawRecord {
            entity_id: field(entity_idx).to_string(),
            timestamp,
            value,
        });
    }

    Ok(records)
}

/// Raw series read from a local CSV file
#[derive(Debug, Clone)]
pub struct CsvRawSource {
    path: PathBuf,
    columns: RawColumns,
}

impl CsvRawSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            columns: RawColumns::default(),
        }
    }

    pub fn with_columns(mut self, columns: RawColumns) -> Self {
        self.columns = columns;
        self
    }
}

#[async_trait]
impl RawSeriesSource for CsvRawSource {
    async fn fetch(&self) -> Result<Vec<RawRecord>, DomainError> {
        let contents = tokio::fs::read(&self.path).await.map_err(|e| {
            DomainError::backend("file", format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        let records = parse_raw_csv(contents.as_slice(), &self.columns)?;
        debug!(path = %self.path.display(), records = records.len(), "Read raw series");

        Ok(records)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}
