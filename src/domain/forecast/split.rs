//! Time-ordered train/test split

use chrono::{Days, NaiveDate};

use crate::domain::series::FeatureRow;
use crate::domain::DomainError;

/// Anything keyed by the start of its week
pub trait Weekly {
    fn week_start(&self) -> NaiveDate;
}

impl Weekly for FeatureRow {
    fn week_start(&self) -> NaiveDate {
        self.week_start
    }
}

/// Rows on or before `split_point` train; later rows test
#[derive(Debug, Clone)]
pub struct TrainTestSplit<T> {
    pub train: Vec<T>,
    pub test: Vec<T>,
    pub split_point: NaiveDate,
}

/// Holds out the last `holdout_weeks` weeks of `rows` as the test set
pub fn split_by_time<T: Weekly + Clone>(
    rows: &[T],
    holdout_weeks: u32,
) -> Result<TrainTestSplit<T>, DomainError> {
    if holdout_weeks == 0 {
        return Err(DomainError::validation("holdout_weeks must be at least 1"));
    }

    let last_week = rows
        .iter()
        .map(Weekly::week_start)
        .max()
        .ok_or_else(|| DomainError::empty_series("no feature rows to split"))?;

    let split_point = last_week
        .checked_sub_days(Days::new(u64::from(holdout_weeks) * 7))
        .ok_or_else(|| {
            DomainError::validation(format!(
                "holdout of {} weeks reaches before the calendar start",
                holdout_weeks
            ))
        })?;

    let (train, test): (Vec<T>, Vec<T>) = rows
        .iter()
        .cloned()
        .partition(|r| r.week_start() <= split_point);

    Ok(TrainTestSplit {
        train,
        test,
        split_point,
    })
}
