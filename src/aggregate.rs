use crate::classify::{CachedClassifier, PathClassifier};
use crate::models::{Bucket, DateRange, PeriodTotals, RawCountRecord, parse_date_key};
use crate::taxonomy::{EntityId, EntityTable, Taxonomy};
use chrono::NaiveDate;

/// One upstream row after date parsing and path classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedRow {
    pub date: NaiveDate,
    pub category: Option<EntityId>,
    pub town: Option<EntityId>,
    pub value: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedBatch {
    pub rows: Vec<ClassifiedRow>,
    /// Rows dropped because their date key could not be read.
    pub malformed: u64,
}

/// Parse and classify one source's rows. Each distinct path is classified once.
pub fn classify_records(
    records: &[RawCountRecord],
    categories: &PathClassifier,
    towns: &PathClassifier,
) -> ClassifiedBatch {
    let mut category_memo = CachedClassifier::new(categories);
    let mut town_memo = CachedClassifier::new(towns);
    let mut batch = ClassifiedBatch {
        rows: Vec::with_capacity(records.len()),
        malformed: 0,
    };
    for record in records {
        let Some(date) = parse_date_key(&record.date_key) else {
            batch.malformed += 1;
            continue;
        };
        batch.rows.push(ClassifiedRow {
            date,
            category: category_memo.classify(&record.path),
            town: town_memo.classify(&record.path),
            value: record.value,
        });
    }
    batch
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTotals {
    pub totals: EntityTable<PeriodTotals>,
    /// Traffic no category matched; excluded from `totals`.
    pub unclassified: PeriodTotals,
}

/// Single pass: each row lands in current, previous, or nowhere.
pub fn aggregate_totals(
    rows: &[ClassifiedRow],
    taxonomy: &Taxonomy,
    current: &DateRange,
    previous: Option<&DateRange>,
) -> SourceTotals {
    let mut totals = EntityTable::filled(taxonomy, PeriodTotals::default());
    let mut unclassified = PeriodTotals::default();
    for row in rows {
        let slot = match row.category {
            Some(id) => &mut totals[id],
            None => &mut unclassified,
        };
        if current.contains(row.date) {
            slot.current = slot.current.saturating_add(row.value);
        } else if previous.is_some_and(|range| range.contains(row.date)) {
            slot.previous = slot.previous.saturating_add(row.value);
        }
    }
    SourceTotals {
        totals,
        unclassified,
    }
}

/// Classified traffic per bucket, optionally limited to one category. Buckets
/// must be sorted and non-overlapping.
pub fn aggregate_series(rows: &[ClassifiedRow], buckets: &[Bucket], category: Option<EntityId>) -> Vec<u64> {
    let mut values = vec![0u64; buckets.len()];
    for row in rows {
        let Some(row_category) = row.category else {
            continue;
        };
        if category.is_some_and(|wanted| wanted != row_category) {
            continue;
        }
        let index = buckets.partition_point(|bucket| bucket.end < row.date);
        if let Some(bucket) = buckets.get(index) {
            if bucket.start <= row.date {
                values[index] = values[index].saturating_add(row.value);
            }
        }
    }
    values
}

/// Per-category sums inside `window`.
pub fn aggregate_breakdown(rows: &[ClassifiedRow], taxonomy: &Taxonomy, window: &DateRange) -> EntityTable<u64> {
    let mut table = EntityTable::filled(taxonomy, 0u64);
    for row in rows.iter().filter(|row| window.contains(row.date)) {
        if let Some(id) = row.category {
            table[id] = table[id].saturating_add(row.value);
        }
    }
    table
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TownBreakdown {
    pub by_town: EntityTable<u64>,
    /// Category traffic no town matched.
    pub unknown: u64,
}

impl TownBreakdown {
    pub fn total(&self) -> u64 {
        self.by_town.iter().map(|(_, value)| *value).sum::<u64>() + self.unknown
    }
}

/// Town split of one category's traffic inside `window`. Rows without a town
/// go to `unknown` so the split always sums to the category total.
pub fn aggregate_towns(
    rows: &[ClassifiedRow],
    towns: &Taxonomy,
    category: EntityId,
    window: &DateRange,
) -> TownBreakdown {
    let mut breakdown = TownBreakdown {
        by_town: EntityTable::filled(towns, 0u64),
        unknown: 0,
    };
    for row in rows {
        if row.category != Some(category) || !window.contains(row.date) {
            continue;
        }
        match row.town {
            Some(town) => breakdown.by_town[town] = breakdown.by_town[town].saturating_add(row.value),
            None => breakdown.unknown = breakdown.unknown.saturating_add(row.value),
        }
    }
    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buckets::{BucketUnit, plan_buckets};
    use crate::taxonomy::{EntityConfig, EntityKind};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entity(id: &str, token: &str) -> EntityConfig {
        EntityConfig {
            id: id.to_string(),
            label: id.to_string(),
            tokens: vec![token.to_string()],
            legacy_tokens: Vec::new(),
        }
    }

    fn fixtures() -> (Taxonomy, Taxonomy) {
        let categories = Taxonomy::new(
            EntityKind::Category,
            &[entity("playas", "playas"), entity("museos", "museos")],
        )
        .unwrap();
        let towns = Taxonomy::new(EntityKind::Town, &[entity("mogan", "mogan"), entity("telde", "telde")]).unwrap();
        (categories, towns)
    }

    fn records() -> Vec<RawCountRecord> {
        vec![
            RawCountRecord::new("2025-10-13", "/es/playas/mogan/", 10),
            RawCountRecord::new("2025-10-13", "/es/playas/telde/", 5),
            RawCountRecord::new("2025-10-13", "/es/playas/", 2),
            RawCountRecord::new("2025-10-12", "/es/playas/mogan/", 7),
            RawCountRecord::new("2025-10-13", "/es/museos/telde/", 3),
            RawCountRecord::new("2025-10-13", "/es/contacto/", 9),
            RawCountRecord::new("2025-10-12", "/es/contacto/", 1),
            RawCountRecord::new("2025-10-01", "/es/playas/", 100),
            RawCountRecord::new("13.10.2025", "/es/playas/", 50),
        ]
    }

    fn classified() -> (Taxonomy, Taxonomy, ClassifiedBatch) {
        let (categories, towns) = fixtures();
        let batch = classify_records(&records(), &PathClassifier::new(&categories), &PathClassifier::new(&towns));
        (categories, towns, batch)
    }

    #[test]
    fn malformed_dates_are_counted_not_aggregated() {
        let (_, _, batch) = classified();
        assert_eq!(batch.malformed, 1);
        assert_eq!(batch.rows.len(), 8);
    }

    #[test]
    fn totals_split_current_and_previous() {
        let (categories, _, batch) = classified();
        let current = DateRange::single(date(2025, 10, 13));
        let previous = DateRange::single(date(2025, 10, 12));
        let result = aggregate_totals(&batch.rows, &categories, &current, Some(&previous));
        let playas = categories.lookup("playas").unwrap();
        let museos = categories.lookup("museos").unwrap();
        assert_eq!(result.totals[playas], PeriodTotals { current: 17, previous: 7 });
        assert_eq!(result.totals[museos], PeriodTotals { current: 3, previous: 0 });
        assert_eq!(result.unclassified, PeriodTotals { current: 9, previous: 1 });
    }

    #[test]
    fn rows_outside_both_periods_are_discarded() {
        let (categories, _, batch) = classified();
        let current = DateRange::single(date(2025, 10, 13));
        let result = aggregate_totals(&batch.rows, &categories, &current, None);
        let playas = categories.lookup("playas").unwrap();
        assert_eq!(result.totals[playas].previous, 0);
        assert_eq!(result.totals[playas].current, 17);
    }

    #[test]
    fn series_sums_per_bucket() {
        let (categories, _, batch) = classified();
        let range = DateRange::new(date(2025, 10, 11), date(2025, 10, 13)).unwrap();
        let buckets = plan_buckets(&range, BucketUnit::Day);
        assert_eq!(aggregate_series(&batch.rows, &buckets, None), vec![0, 7, 20]);
        let museos = categories.lookup("museos");
        assert_eq!(aggregate_series(&batch.rows, &buckets, museos), vec![0, 0, 3]);
    }

    #[test]
    fn breakdown_covers_window_only() {
        let (categories, _, batch) = classified();
        let window = DateRange::single(date(2025, 10, 12));
        let table = aggregate_breakdown(&batch.rows, &categories, &window);
        assert_eq!(table[categories.lookup("playas").unwrap()], 7);
        assert_eq!(table[categories.lookup("museos").unwrap()], 0);
    }

    #[test]
    fn town_split_reconciles_with_category_total() {
        let (categories, towns, batch) = classified();
        let window = DateRange::single(date(2025, 10, 13));
        let playas = categories.lookup("playas").unwrap();
        let split = aggregate_towns(&batch.rows, &towns, playas, &window);
        assert_eq!(split.by_town[towns.lookup("mogan").unwrap()], 10);
        assert_eq!(split.by_town[towns.lookup("telde").unwrap()], 5);
        assert_eq!(split.unknown, 2);
        let totals = aggregate_totals(&batch.rows, &categories, &window, None);
        assert_eq!(split.total(), totals.totals[playas].current);
    }
}
