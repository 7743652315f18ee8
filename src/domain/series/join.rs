//! Point-in-time lookup of search trend rows

use std::collections::HashMap;

use chrono::NaiveDate;

use super::record::TrendFeatureRow;

/// Trend rows grouped per entity and ordered by week.
///
/// Lookups are as-of: a count row for week `W` sees the newest trend row at
/// or before `W`, never a later one.
#[derive(Debug, Clone, Default)]
pub struct TrendIndex {
    by_entity: HashMap<String, Vec<TrendFeatureRow>>,
}

impl TrendIndex {
    pub fn new(rows: Vec<TrendFeatureRow>) -> Self {
        let mut by_entity: HashMap<String, Vec<TrendFeatureRow>> = HashMap::new();
        for row in rows {
            by_entity.entry(row.entity_id.clone()).or_default().push(row);
        }
        for series in by_entity.values_mut() {
            series.sort_by_key(|r| r.week_start);
        }

        Self { by_entity }
    }

    pub fn as_of(&self, entity_id: &str, week: NaiveDate) -> Option<&TrendFeatureRow> {
        let series = self.by_entity.get(entity_id)?;
        let after = series.partition_point(|r| r.week_start <= week);
        after.checked_sub(1).map(|i| &series[i])
    }

    pub fn len(&self) -> usize {
        self.by_entity.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
