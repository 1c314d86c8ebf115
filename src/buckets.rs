use crate::models::{Bucket, DateRange, Granularity};
use crate::range::{RangePlan, first_of_month};
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

/// Trailing points shown for the single-day preset.
pub const DAY_SERIES_POINTS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketUnit {
    Day,
    /// 7-day block counted from the cursor, not aligned to weekdays.
    Week,
    /// Calendar month.
    Month,
    /// Calendar year.
    Year,
}

impl BucketUnit {
    fn natural_end(self, start: NaiveDate) -> NaiveDate {
        match self {
            Self::Day => start,
            Self::Week => start.checked_add_signed(Duration::days(6)).unwrap_or(NaiveDate::MAX),
            Self::Month => last_of_month(start),
            Self::Year => NaiveDate::from_ymd_opt(start.year(), 12, 31).unwrap_or(start),
        }
    }

    fn natural_start(self, end: NaiveDate) -> NaiveDate {
        match self {
            Self::Day => end,
            Self::Week => end.checked_sub_signed(Duration::days(6)).unwrap_or(NaiveDate::MIN),
            Self::Month => first_of_month(end),
            Self::Year => NaiveDate::from_ymd_opt(end.year(), 1, 1).unwrap_or(end),
        }
    }

    fn label(self, start: NaiveDate) -> String {
        match self {
            Self::Day | Self::Week => start.format("%Y-%m-%d").to_string(),
            Self::Month => start.format("%Y-%m").to_string(),
            Self::Year => start.format("%Y").to_string(),
        }
    }
}

/// Chart bucket size for a plan. Custom ranges use their derived granularity
/// directly; presets chart their point window at a finer resolution.
pub fn series_unit(granularity: Granularity, custom: bool) -> BucketUnit {
    match (granularity, custom) {
        (Granularity::Day, _) => BucketUnit::Day,
        (Granularity::Week, true) => BucketUnit::Week,
        (Granularity::Week, false) | (Granularity::Month, false) => BucketUnit::Day,
        (Granularity::Month, true) | (Granularity::Year, _) => BucketUnit::Month,
    }
}

/// Tile `range` with buckets of `unit`. Month and year boundaries snap to the
/// calendar, so the first and last bucket may be clipped.
pub fn plan_buckets(range: &DateRange, unit: BucketUnit) -> Vec<Bucket> {
    let mut buckets = Vec::new();
    let mut cursor = range.start;
    while cursor <= range.end {
        let end = unit.natural_end(cursor).min(range.end);
        buckets.push(Bucket {
            id: buckets.len(),
            start: cursor,
            end,
            label: unit.label(cursor),
        });
        match end.succ_opt() {
            Some(next) => cursor = next,
            None => break,
        }
    }
    buckets
}

/// `count` consecutive buckets whose last one ends on `end`, oldest first.
pub fn plan_buckets_ending(end: NaiveDate, unit: BucketUnit, count: usize) -> Vec<Bucket> {
    let mut spans = Vec::with_capacity(count);
    let mut bucket_end = end;
    for _ in 0..count {
        let start = unit.natural_start(bucket_end);
        spans.push((start, bucket_end));
        match start.pred_opt() {
            Some(prev) => bucket_end = prev,
            None => break,
        }
    }
    spans.reverse();
    spans
        .into_iter()
        .enumerate()
        .map(|(id, (start, end))| Bucket {
            id,
            start,
            end,
            label: unit.label(start),
        })
        .collect()
}

/// Current and previous chart buckets. `previous[i]` is the bucket right
/// before `current[i]`, so both lines have the same number of points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesPlan {
    pub unit: BucketUnit,
    pub current: Vec<Bucket>,
    pub previous: Vec<Bucket>,
}

impl SeriesPlan {
    /// Dates touched by either line, if any.
    pub fn span(&self) -> Option<DateRange> {
        let first = self.previous.first().or(self.current.first())?;
        let last = self.current.last()?;
        Some(DateRange {
            start: first.start.min(last.start),
            end: last.end,
        })
    }
}

pub fn plan_series(plan: &RangePlan) -> SeriesPlan {
    let unit = series_unit(plan.granularity, plan.custom);
    let current = if plan.granularity == Granularity::Day && !plan.custom {
        plan_buckets_ending(plan.current.end, BucketUnit::Day, DAY_SERIES_POINTS)
    } else {
        plan_buckets(&plan.current, unit)
    };
    let previous = match current.last().and_then(|last| last.start.pred_opt()) {
        Some(anchor) => plan_buckets_ending(anchor, unit, current.len()),
        None => Vec::new(),
    };
    SeriesPlan {
        unit,
        current,
        previous,
    }
}

fn last_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}
