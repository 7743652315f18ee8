//! Raw series and search trend sources, and the feature tables they feed

mod csv_source;
mod csv_table;
mod csv_trends;
mod http_source;
mod in_memory;

pub use csv_source::{parse_raw_csv, CsvRawSource, RawColumns};
pub use csv_table::CsvFeatureTable;
pub use csv_trends::{parse_trend_csv, CsvTrendSource, CsvTrendTable, TrendColumns};
pub use http_source::HttpRawSource;
pub use in_memory::InMemoryFeatureTable;
