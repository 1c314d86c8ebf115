use crate::models::{DateRange, Granularity};
use crate::range::RangePlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DonutWindow {
    pub current: DateRange,
    pub previous: Option<DateRange>,
}

/// Window for breakdown charts. The day preset shows only its last day against
/// the day before, independent of the wider series window; every other plan
/// uses its full current and previous periods.
pub fn select_donut_window(plan: &RangePlan) -> DonutWindow {
    if plan.granularity == Granularity::Day && !plan.custom {
        let last = DateRange::single(plan.current.end);
        let previous = plan
            .previous()
            .and_then(|_| plan.current.end.pred_opt())
            .map(DateRange::single);
        return DonutWindow {
            current: last,
            previous,
        };
    }
    DonutWindow {
        current: plan.current,
        previous: plan.previous(),
    }
}
