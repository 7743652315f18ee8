//! Series domain - weekly aggregation, lag features and the search trend join

mod aggregator;
mod join;
mod lag;
mod record;
mod sink;
mod source;

pub use aggregator::{week_start_for, WeeklyAggregator};
pub use join::TrendIndex;
pub use lag::{GapPolicy, LagFeatureBuilder};
pub use record::{FeatureRow, RawRecord, TrendBucket, TrendFeatureRow, TrendRecord, WeeklyBucket};
pub use sink::{
    FeatureSink, FeatureSource, TrendFeatureSink, TrendFeatureSource, FEATURE_COLUMNS,
    TREND_FEATURE_COLUMNS,
};
pub use source::{RawSeriesFilter, RawSeriesSource, RawTrendSource};

#[cfg(test)]
pub use sink::{MockFeatureSink, MockFeatureSource, MockTrendFeatureSink, MockTrendFeatureSource};
#[cfg(test)]
pub use source::{MockRawSeriesSource, MockRawTrendSource};
