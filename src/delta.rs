use serde::Serialize;

/// Direction of change as shown to the presentation layer. `NoData` is kept
/// apart from `Flat` so "no baseline" never renders as "no change".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaTrend {
    Up,
    Down,
    Flat,
    NoData,
}

impl DeltaTrend {
    pub fn from_delta(delta: Option<f64>) -> Self {
        match delta {
            None => Self::NoData,
            Some(value) if value > 0.0 => Self::Up,
            Some(value) if value < 0.0 => Self::Down,
            Some(_) => Self::Flat,
        }
    }
}

/// Fractional change from `previous` to `current`; `None` when there is no
/// positive baseline. Non-finite inputs count as zero.
pub fn delta_pct(current: f64, previous: f64) -> Option<f64> {
    let current = finite_or_zero(current);
    let previous = finite_or_zero(previous);
    if previous <= 0.0 {
        return None;
    }
    let delta = (current - previous) / previous;
    if delta.is_finite() {
        Some(delta)
    } else {
        Some(f64::MAX.copysign(delta))
    }
}

pub fn delta_counts(current: u64, previous: u64) -> Option<f64> {
    delta_pct(current as f64, previous as f64)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
