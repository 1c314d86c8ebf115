use crate::aggregate::{
    ClassifiedRow, SourceTotals, aggregate_breakdown, aggregate_series, aggregate_totals, aggregate_towns,
    classify_records,
};
use crate::buckets::{SeriesPlan, plan_series};
use crate::classify::PathClassifier;
use crate::delta::{DeltaTrend, delta_counts};
use crate::donut::{DonutWindow, select_donut_window};
use crate::errors::EngineError;
use crate::feed::{FeedSet, SourceId};
use crate::merge::{LabeledTotals, SourceReport, merge_series, merge_slices, merge_totals};
use crate::models::{
    Bucket, DateRange, Diagnostics, DonutResponse, DonutSlice, RangeMeta, RawCountRecord, SeriesPoint,
    SeriesResponse, SummaryResponse,
};
use crate::range::{RangeContext, RangePlan, RangeSelection, derive_range};
use crate::taxonomy::{Catalog, EntityId};
use chrono::NaiveDate;
use tracing::{debug, warn};

/// Label of the town slice holding category traffic no town matched.
pub const UNKNOWN_TOWN_LABEL: &str = "Unknown town";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Earliest date the upstream feeds retain.
    pub horizon: Option<NaiveDate>,
    pub default_top_n: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            horizon: None,
            default_top_n: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRequest {
    pub selection: RangeSelection,
    /// Restricts the series to one category and switches the donut to its towns.
    pub category: Option<String>,
    pub top_n: Option<usize>,
}

/// Fetched rows per source; `None` marks a source whose fetch failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceInputs {
    pub analytics: Option<Vec<RawCountRecord>>,
    pub chatbot: Option<Vec<RawCountRecord>>,
}

/// Stateless apart from the read-only catalog; safe to share across requests.
#[derive(Debug)]
pub struct Engine {
    catalog: Catalog,
    categories: PathClassifier,
    towns: PathClassifier,
    config: EngineConfig,
}

/// Everything derived from the plan that every source is aggregated against.
struct Frame<'a> {
    plan: &'a RangePlan,
    series: SeriesPlan,
    donut: DonutWindow,
    category: Option<EntityId>,
}

struct SourcePart {
    report: SourceReport,
    current_series: Vec<u64>,
    previous_series: Vec<u64>,
    slices: Vec<DonutSlice>,
    donut_previous_total: u64,
}

impl Engine {
    pub fn new(catalog: Catalog, config: EngineConfig) -> Self {
        let categories = PathClassifier::new(&catalog.categories);
        let towns = PathClassifier::new(&catalog.towns);
        Self {
            catalog,
            categories,
            towns,
            config,
        }
    }

    pub fn plan(&self, selection: &RangeSelection, today: NaiveDate) -> Result<RangePlan, EngineError> {
        let ctx = RangeContext {
            today,
            horizon: self.config.horizon,
        };
        let plan = derive_range(selection, &ctx)?;
        debug!(
            current = %plan.current,
            previous = ?plan.previous().map(|range| range.to_string()),
            granularity = ?plan.granularity,
            "derived range"
        );
        Ok(plan)
    }

    pub fn range_meta(&self, selection: &RangeSelection, today: NaiveDate) -> Result<RangeMeta, EngineError> {
        Ok(self.plan(selection, today)?.meta())
    }

    /// Single window per source covering every period, series bucket and
    /// donut day the summary reads.
    pub fn fetch_window(&self, plan: &RangePlan) -> DateRange {
        let series = plan_series(plan);
        let mut window = plan.fetch_window();
        for bucket in &series.current {
            window = window.union(&bucket.range());
        }
        if plan.previous().is_some() {
            for bucket in &series.previous {
                window = window.union(&bucket.range());
            }
        }
        window
    }

    /// Validate, fetch both sources concurrently, then aggregate and merge.
    /// Validation errors surface before any fetch; fetch failures degrade.
    pub async fn summarize(
        &self,
        request: &SummaryRequest,
        feeds: &FeedSet,
        today: NaiveDate,
    ) -> Result<SummaryResponse, EngineError> {
        let plan = self.plan(&request.selection, today)?;
        self.resolve_category(request.category.as_deref())?;
        let window = self.fetch_window(&plan);

        let (analytics, chatbot) = tokio::join!(feeds.analytics.fetch(window), feeds.chatbot.fetch(window));
        let inputs = SourceInputs {
            analytics: keep_or_degrade(feeds.analytics.source(), analytics),
            chatbot: keep_or_degrade(feeds.chatbot.source(), chatbot),
        };
        self.compute(request, &plan, &inputs)
    }

    /// Pure part of the pipeline, usable with fixture rows.
    pub fn compute(
        &self,
        request: &SummaryRequest,
        plan: &RangePlan,
        inputs: &SourceInputs,
    ) -> Result<SummaryResponse, EngineError> {
        let frame = Frame {
            plan,
            series: plan_series(plan),
            donut: select_donut_window(plan),
            category: self.resolve_category(request.category.as_deref())?,
        };
        let top_n = request.top_n.unwrap_or(self.config.default_top_n);

        let mut diagnostics = Diagnostics::default();
        let mut degraded_sources = Vec::new();
        let mut part_for = |source: SourceId, records: Option<&[RawCountRecord]>| match records {
            Some(records) => self.source_part(source, records, &frame, &mut diagnostics),
            None => {
                degraded_sources.push(source);
                empty_part(source, &frame.series)
            }
        };
        let a = part_for(SourceId::Analytics, inputs.analytics.as_deref());
        let b = part_for(SourceId::Chatbot, inputs.chatbot.as_deref());
        debug!(
            unclassified_current = diagnostics.unclassified_current,
            unclassified_previous = diagnostics.unclassified_previous,
            malformed = diagnostics.malformed_records,
            "aggregated sources"
        );

        let entities = merge_totals(&a.report, &b.report);
        let series = SeriesResponse {
            current: points(&frame.series.current, merge_series(&a.current_series, &b.current_series)),
            previous: points(&frame.series.previous, merge_series(&a.previous_series, &b.previous_series)),
        };

        let slices = merge_slices(&a.slices, &b.slices, Some(top_n));
        let total: u64 = slices.iter().map(|slice| slice.value).sum();
        let previous_total = a.donut_previous_total.saturating_add(b.donut_previous_total);
        let donut_delta = match frame.donut.previous {
            Some(_) => delta_counts(total, previous_total),
            None => None,
        };
        let donut = DonutResponse {
            window: frame.donut.current,
            previous_window: frame.donut.previous,
            slices,
            total,
            previous_total,
            delta_pct: donut_delta,
            trend: DeltaTrend::from_delta(donut_delta),
        };

        Ok(SummaryResponse {
            range: plan.meta(),
            entities,
            series,
            donut,
            diagnostics,
            degraded: !degraded_sources.is_empty(),
            degraded_sources,
        })
    }

    fn resolve_category(&self, category: Option<&str>) -> Result<Option<EntityId>, EngineError> {
        match category.map(str::trim).filter(|key| !key.is_empty()) {
            None => Ok(None),
            Some(key) => self
                .catalog
                .categories
                .lookup(key)
                .map(Some)
                .ok_or_else(|| EngineError::UnknownCategory(key.to_string())),
        }
    }

    fn source_part(
        &self,
        source: SourceId,
        records: &[RawCountRecord],
        frame: &Frame<'_>,
        diagnostics: &mut Diagnostics,
    ) -> SourcePart {
        let batch = classify_records(records, &self.categories, &self.towns);
        let previous = frame.plan.previous();
        let totals = aggregate_totals(&batch.rows, &self.catalog.categories, &frame.plan.current, previous.as_ref());

        diagnostics.malformed_records += batch.malformed;
        diagnostics.unclassified_current += totals.unclassified.current;
        diagnostics.unclassified_previous += totals.unclassified.previous;

        let current_series = aggregate_series(&batch.rows, &frame.series.current, frame.category);
        let previous_series = if previous.is_some() {
            aggregate_series(&batch.rows, &frame.series.previous, frame.category)
        } else {
            vec![0; frame.series.previous.len()]
        };

        let (slices, donut_previous_total) = match frame.category {
            None => self.category_slices(source, &batch.rows, &frame.donut),
            Some(category) => self.town_slices(source, &batch.rows, category, &frame.donut),
        };

        SourcePart {
            report: self.report(source, &totals),
            current_series,
            previous_series,
            slices,
            donut_previous_total,
        }
    }

    fn report(&self, source: SourceId, totals: &SourceTotals) -> SourceReport {
        let entries = totals
            .totals
            .iter()
            .map(|(id, sums)| {
                let entity = self.catalog.categories.get(id);
                LabeledTotals {
                    label: self.catalog.label_for(source, entity).to_string(),
                    totals: *sums,
                }
            })
            .collect();
        SourceReport { source, entries }
    }

    fn category_slices(
        &self,
        source: SourceId,
        rows: &[ClassifiedRow],
        window: &DonutWindow,
    ) -> (Vec<DonutSlice>, u64) {
        let taxonomy = &self.catalog.categories;
        let current = aggregate_breakdown(rows, taxonomy, &window.current);
        let slices = current
            .iter()
            .map(|(id, value)| DonutSlice::new(self.catalog.label_for(source, taxonomy.get(id)), *value))
            .collect();
        let previous_total = window
            .previous
            .map(|range| aggregate_breakdown(rows, taxonomy, &range).iter().map(|(_, v)| *v).sum())
            .unwrap_or(0);
        (slices, previous_total)
    }

    fn town_slices(
        &self,
        source: SourceId,
        rows: &[ClassifiedRow],
        category: EntityId,
        window: &DonutWindow,
    ) -> (Vec<DonutSlice>, u64) {
        let towns = &self.catalog.towns;
        let current = aggregate_towns(rows, towns, category, &window.current);
        let mut slices: Vec<DonutSlice> = current
            .by_town
            .iter()
            .map(|(id, value)| DonutSlice::new(self.catalog.label_for(source, towns.get(id)), *value))
            .collect();
        slices.push(DonutSlice::synthetic(UNKNOWN_TOWN_LABEL, current.unknown));
        let previous_total = window
            .previous
            .map(|range| aggregate_towns(rows, towns, category, &range).total())
            .unwrap_or(0);
        (slices, previous_total)
    }
}

fn empty_part(source: SourceId, series_plan: &SeriesPlan) -> SourcePart {
    SourcePart {
        report: SourceReport::empty(source),
        current_series: vec![0; series_plan.current.len()],
        previous_series: vec![0; series_plan.previous.len()],
        slices: Vec::new(),
        donut_previous_total: 0,
    }
}

fn keep_or_degrade<E: std::fmt::Display>(
    source: SourceId,
    result: Result<Vec<RawCountRecord>, E>,
) -> Option<Vec<RawCountRecord>> {
    match result {
        Ok(records) => {
            debug!(%source, rows = records.len(), "fetched source");
            Some(records)
        }
        Err(err) => {
            warn!(%source, "source fetch failed, treating its contribution as zero: {err}");
            None
        }
    }
}

fn points(buckets: &[Bucket], values: Vec<u64>) -> Vec<SeriesPoint> {
    buckets
        .iter()
        .zip(values)
        .map(|(bucket, value)| SeriesPoint {
            label: bucket.label.clone(),
            value,
        })
        .collect()
}
