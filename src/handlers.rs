use crate::engine::SummaryRequest;
use crate::errors::{AppError, EngineError};
use crate::models::{Granularity, RangeMeta, RangeMode, SummaryQuery, SummaryResponse, parse_date_key};
use crate::range::RangeSelection;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{NaiveDate, Utc};
use tracing::info;

pub async fn get_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, AppError> {
    let request = SummaryRequest {
        selection: selection_from_query(&query)?,
        category: query.category.clone(),
        top_n: query.top,
    };
    let summary = state.engine.summarize(&request, &state.feeds, today()).await?;
    if summary.degraded {
        info!(sources = ?summary.degraded_sources, "serving partial summary");
    }
    Ok(Json(summary))
}

pub async fn get_range(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<RangeMeta>, AppError> {
    let selection = selection_from_query(&query)?;
    Ok(Json(state.engine.range_meta(&selection, today())?))
}

/// An explicit `start`/`end` pair wins over `granularity`, which defaults to day.
pub fn selection_from_query(query: &SummaryQuery) -> Result<RangeSelection, EngineError> {
    match (query.start.as_deref(), query.end.as_deref()) {
        (Some(start), Some(end)) => Ok(RangeSelection::Custom {
            start: parse_date(start)?,
            end: parse_date(end)?,
        }),
        (Some(_), None) | (None, Some(_)) => Err(EngineError::invalid_range(
            "custom ranges need both start and end",
        )),
        (None, None) => {
            let granularity = match query.granularity.as_deref() {
                Some(value) => value.parse::<Granularity>()?,
                None => Granularity::Day,
            };
            let mode = match query.mode.as_deref() {
                Some(value) => value.parse::<RangeMode>()?,
                None => RangeMode::default(),
            };
            let reference = query.reference.as_deref().map(parse_date).transpose()?;
            Ok(RangeSelection::Preset {
                granularity,
                reference,
                mode,
            })
        }
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, EngineError> {
    parse_date_key(value).ok_or_else(|| EngineError::InvalidDate(value.to_string()))
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
