use crate::delta::DeltaTrend;
use crate::errors::EngineError;
use crate::feed::SourceId;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inclusive calendar date range. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, EngineError> {
        if start > end {
            return Err(EngineError::invalid_range(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// Range of `days` consecutive days ending on `end`. `days` must be at least 1.
    pub fn ending_at(end: NaiveDate, days: i64) -> Result<Self, EngineError> {
        let start = end
            .checked_sub_signed(Duration::days(days.max(1) - 1))
            .ok_or_else(|| EngineError::invalid_range(format!("{days} days ending {end} is out of range")))?;
        Ok(Self { start, end })
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Smallest range covering both `self` and `other`.
    pub fn union(&self, other: &DateRange) -> DateRange {
        DateRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
}

impl FromStr for Granularity {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "d" | "day" => Ok(Self::Day),
            "w" | "week" => Ok(Self::Week),
            "m" | "month" => Ok(Self::Month),
            "y" | "year" => Ok(Self::Year),
            _ => Err(EngineError::UnknownGranularity(value.to_string())),
        }
    }
}

/// How month and year point windows are anchored to the reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeMode {
    /// Window ends on the reference date.
    #[default]
    Rolling,
    /// Last calendar month/year fully elapsed on the reference date.
    CalendarComplete,
}

impl FromStr for RangeMode {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rolling" => Ok(Self::Rolling),
            "calendar" | "calendar_complete" | "calendar-complete" => Ok(Self::CalendarComplete),
            other => Err(EngineError::invalid_range(format!("unknown mode '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub id: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: String,
}

impl Bucket {
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start,
            end: self.end,
        }
    }
}

/// One (source, day, path) count row from an upstream feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCountRecord {
    #[serde(rename = "date")]
    pub date_key: String,
    pub path: String,
    pub value: u64,
}

impl RawCountRecord {
    pub fn new(date_key: impl Into<String>, path: impl Into<String>, value: u64) -> Self {
        Self {
            date_key: date_key.into(),
            path: path.into(),
            value,
        }
    }
}

/// Accepts `YYYY-MM-DD` and the compact `YYYYMMDD` form some upstream feeds emit.
pub fn parse_date_key(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if trimmed.len() == 8 {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y%m%d") {
            return Some(date);
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PeriodTotals {
    pub current: u64,
    pub previous: u64,
}

impl PeriodTotals {
    pub fn add(&mut self, other: PeriodTotals) {
        self.current = self.current.saturating_add(other.current);
        self.previous = self.previous.saturating_add(other.previous);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub label: String,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonutSlice {
    pub label: String,
    pub value: u64,
    /// Set on the folded "Others" and "Unknown town" slices, which never
    /// merge with an entity of the same label.
    pub synthetic: bool,
}

impl DonutSlice {
    pub fn new(label: impl Into<String>, value: u64) -> Self {
        Self {
            label: label.into(),
            value,
            synthetic: false,
        }
    }

    pub fn synthetic(label: impl Into<String>, value: u64) -> Self {
        Self {
            synthetic: true,
            ..Self::new(label, value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceShare {
    pub source: SourceId,
    pub current: u64,
    pub previous: u64,
}

/// One entity's totals merged across both upstream sources.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedEntityResult {
    /// Normalized merge key.
    pub entity_id: String,
    pub label: String,
    pub combined_current: u64,
    pub combined_previous: u64,
    pub delta_pct: Option<f64>,
    pub trend: DeltaTrend,
    pub sources: Vec<SourceShare>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeMeta {
    pub granularity: Granularity,
    pub mode: RangeMode,
    pub custom: bool,
    pub current: DateRange,
    pub previous: Option<DateRange>,
    pub comparison_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesResponse {
    pub current: Vec<SeriesPoint>,
    pub previous: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonutResponse {
    pub window: DateRange,
    pub previous_window: Option<DateRange>,
    pub slices: Vec<DonutSlice>,
    pub total: u64,
    pub previous_total: u64,
    pub delta_pct: Option<f64>,
    pub trend: DeltaTrend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Diagnostics {
    pub unclassified_current: u64,
    pub unclassified_previous: u64,
    pub malformed_records: u64,
}

/// Query string accepted by the summary and range endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryQuery {
    pub granularity: Option<String>,
    pub reference: Option<String>,
    pub mode: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub category: Option<String>,
    pub top: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryResponse {
    pub range: RangeMeta,
    pub entities: Vec<CombinedEntityResult>,
    pub series: SeriesResponse,
    pub donut: DonutResponse,
    pub diagnostics: Diagnostics,
    pub degraded: bool,
    pub degraded_sources: Vec<SourceId>,
}
