use crate::errors::EngineError;
use crate::models::{DateRange, Granularity, RangeMeta, RangeMode};
use crate::period::{Comparison, compare_period};
use chrono::{Datelike, Months, NaiveDate};
use std::ops::RangeInclusive;

/// Longest custom range accepted, roughly three years.
pub const MAX_CUSTOM_SPAN_DAYS: i64 = 1095;

/// Years a selection may name. Keeps every derived window, baseline and
/// chart bucket far from the edges of the representable calendar.
pub const SUPPORTED_YEARS: RangeInclusive<i32> = 1..=9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSelection {
    Preset {
        granularity: Granularity,
        reference: Option<NaiveDate>,
        mode: RangeMode,
    },
    Custom {
        start: NaiveDate,
        end: NaiveDate,
    },
}

/// Clock and retention facts a derivation depends on, passed in so derivation
/// stays pure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeContext {
    pub today: NaiveDate,
    pub horizon: Option<NaiveDate>,
}

impl RangeContext {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            horizon: None,
        }
    }

    pub fn yesterday(&self) -> NaiveDate {
        self.today.pred_opt().unwrap_or(self.today)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePlan {
    /// For custom ranges this is the derived chart granularity.
    pub granularity: Granularity,
    pub mode: RangeMode,
    pub custom: bool,
    pub current: DateRange,
    pub comparison: Comparison,
}

impl RangePlan {
    pub fn previous(&self) -> Option<DateRange> {
        self.comparison.range()
    }

    /// Window covering both periods, fetched as one query per source.
    pub fn fetch_window(&self) -> DateRange {
        match self.previous() {
            Some(previous) => self.current.union(&previous),
            None => self.current,
        }
    }

    pub fn meta(&self) -> RangeMeta {
        RangeMeta {
            granularity: self.granularity,
            mode: self.mode,
            custom: self.custom,
            current: self.current,
            previous: self.previous(),
            comparison_available: self.previous().is_some(),
        }
    }
}

pub fn optimal_granularity(span_days: i64) -> Granularity {
    if span_days <= 32 {
        Granularity::Day
    } else if span_days <= 90 {
        Granularity::Week
    } else {
        Granularity::Month
    }
}

/// Current point window for a preset granularity ending at `reference`.
pub fn point_window(
    granularity: Granularity,
    reference: NaiveDate,
    mode: RangeMode,
) -> Result<DateRange, EngineError> {
    let range = match (granularity, mode) {
        (Granularity::Day, _) => DateRange::single(reference),
        (Granularity::Week, _) => DateRange::ending_at(reference, 7)?,
        (Granularity::Month, RangeMode::Rolling) => rolling_window(reference, 1)?,
        (Granularity::Year, RangeMode::Rolling) => rolling_window(reference, 12)?,
        (Granularity::Month, RangeMode::CalendarComplete) => {
            let month_end = if is_last_day_of_month(reference) {
                reference
            } else {
                first_of_month(reference)
                    .pred_opt()
                    .ok_or_else(|| EngineError::invalid_range(format!("no month before {reference}")))?
            };
            DateRange {
                start: first_of_month(month_end),
                end: month_end,
            }
        }
        (Granularity::Year, RangeMode::CalendarComplete) => {
            let year = if reference.month() == 12 && reference.day() == 31 {
                reference.year()
            } else {
                reference.year() - 1
            };
            let start = NaiveDate::from_ymd_opt(year, 1, 1)
                .ok_or_else(|| EngineError::invalid_range(format!("year {year} out of range")))?;
            let end = NaiveDate::from_ymd_opt(year, 12, 31)
                .ok_or_else(|| EngineError::invalid_range(format!("year {year} out of range")))?;
            DateRange { start, end }
        }
    };
    Ok(range)
}

/// Resolve a selection into current and previous windows. Fails before any
/// fetch is attempted.
pub fn derive_range(selection: &RangeSelection, ctx: &RangeContext) -> Result<RangePlan, EngineError> {
    match *selection {
        RangeSelection::Preset {
            granularity,
            reference,
            mode,
        } => {
            let reference = reference.unwrap_or_else(|| ctx.yesterday());
            check_supported(reference)?;
            let current = point_window(granularity, reference, mode)?;
            if current.start > ctx.today {
                return Err(EngineError::invalid_range(format!(
                    "window {current} starts in the future"
                )));
            }
            Ok(RangePlan {
                granularity,
                mode,
                custom: false,
                current,
                comparison: compare_period(&current, false, ctx.horizon)?,
            })
        }
        RangeSelection::Custom { start, end } => {
            check_supported(start)?;
            check_supported(end)?;
            let current = DateRange::new(start, end)?;
            if start > ctx.today {
                return Err(EngineError::invalid_range(format!(
                    "start {start} is in the future"
                )));
            }
            let span = current.len_days();
            if span > MAX_CUSTOM_SPAN_DAYS {
                return Err(EngineError::invalid_range(format!(
                    "span of {span} days exceeds {MAX_CUSTOM_SPAN_DAYS}"
                )));
            }
            Ok(RangePlan {
                granularity: optimal_granularity(span),
                mode: RangeMode::Rolling,
                custom: true,
                current,
                comparison: compare_period(&current, true, ctx.horizon)?,
            })
        }
    }
}

fn rolling_window(reference: NaiveDate, months: u32) -> Result<DateRange, EngineError> {
    let anchor = reference
        .checked_sub_months(Months::new(months))
        .ok_or_else(|| EngineError::invalid_range(format!("{reference} minus {months} months")))?;
    let start = anchor
        .succ_opt()
        .ok_or_else(|| EngineError::invalid_range(format!("no day after {anchor}")))?;
    Ok(DateRange {
        start,
        end: reference,
    })
}

fn check_supported(date: NaiveDate) -> Result<(), EngineError> {
    if SUPPORTED_YEARS.contains(&date.year()) {
        Ok(())
    } else {
        Err(EngineError::invalid_range(format!(
            "{date} is outside years {}..={}",
            SUPPORTED_YEARS.start(),
            SUPPORTED_YEARS.end()
        )))
    }
}

pub(crate) fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn is_last_day_of_month(date: NaiveDate) -> bool {
    date.succ_opt().is_none_or(|next| next.month() != date.month())
}
