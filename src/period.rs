use crate::errors::EngineError;
use crate::models::DateRange;
use chrono::NaiveDate;
use serde::Serialize;

/// Baseline for a current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "range", rename_all = "snake_case")]
pub enum Comparison {
    Previous(DateRange),
    /// No well-defined baseline; callers show "comparison unavailable".
    Unavailable,
}

impl Comparison {
    pub fn range(&self) -> Option<DateRange> {
        match self {
            Self::Previous(range) => Some(*range),
            Self::Unavailable => None,
        }
    }
}

/// Equal-length period ending the day before `current` starts.
pub fn previous_period(current: &DateRange) -> Result<DateRange, EngineError> {
    let end = current
        .start
        .pred_opt()
        .ok_or_else(|| EngineError::invalid_range(format!("no day before {}", current.start)))?;
    DateRange::ending_at(end, current.len_days())
}

/// Custom ranges lose their baseline when the previous period would reach back
/// past the earliest date the upstream feeds retain.
pub fn compare_period(
    current: &DateRange,
    custom: bool,
    horizon: Option<NaiveDate>,
) -> Result<Comparison, EngineError> {
    let previous = previous_period(current)?;
    Ok(match horizon {
        Some(horizon) if custom && previous.start < horizon => Comparison::Unavailable,
        _ => Comparison::Previous(previous),
    })
}
