use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use std::collections::BTreeSet;
use visit_dashboard::buckets::{BucketUnit, plan_buckets};
use visit_dashboard::classify::{PathClassifier, normalize_path};
use visit_dashboard::delta::delta_pct;
use visit_dashboard::feed::SourceId;
use visit_dashboard::labels::normalize_label;
use visit_dashboard::merge::{LabeledTotals, SourceReport, merge_slices, merge_totals};
use visit_dashboard::models::{DateRange, DonutSlice, Granularity, RangeMode};
use visit_dashboard::range::{RangeContext, RangeSelection, derive_range};
use visit_dashboard::taxonomy::{EntityConfig, EntityKind, Taxonomy};

const LABELS: [&str; 6] = ["Playas", "playas ", "PLAYAS", "Museos", "Senderismo", "Gastronomía"];

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

fn arb_range(max_days: i64) -> impl Strategy<Value = DateRange> {
    (0i64..3000, 1i64..=max_days).prop_map(|(offset, days)| {
        let start = base() + Duration::days(offset);
        DateRange::new(start, start + Duration::days(days - 1)).unwrap()
    })
}

fn arb_unit() -> impl Strategy<Value = BucketUnit> {
    prop_oneof![
        Just(BucketUnit::Day),
        Just(BucketUnit::Week),
        Just(BucketUnit::Month),
        Just(BucketUnit::Year),
    ]
}

fn arb_granularity() -> impl Strategy<Value = Granularity> {
    prop_oneof![
        Just(Granularity::Day),
        Just(Granularity::Week),
        Just(Granularity::Month),
        Just(Granularity::Year),
    ]
}

fn arb_mode() -> impl Strategy<Value = RangeMode> {
    prop_oneof![Just(RangeMode::Rolling), Just(RangeMode::CalendarComplete)]
}

fn month_end(year: i32, month: u32) -> NaiveDate {
    let (year, month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap().pred_opt().unwrap()
}

/// Any day from 1990 to about 2099, with month ends and leap days drawn often.
fn arb_reference() -> impl Strategy<Value = NaiveDate> {
    prop_oneof![
        (0i64..40_000).prop_map(|offset| NaiveDate::from_ymd_opt(1990, 1, 1).unwrap() + Duration::days(offset)),
        (1990i32..2100, 1u32..=12).prop_map(|(year, month)| month_end(year, month)),
        (0i32..28).prop_map(|n| NaiveDate::from_ymd_opt(1992 + 4 * n, 2, 29).unwrap()),
    ]
}

fn arb_report(source: SourceId) -> impl Strategy<Value = SourceReport> {
    proptest::collection::vec((0usize..LABELS.len(), 0u64..10_000, 0u64..10_000), 0..12).prop_map(
        move |entries| SourceReport {
            source,
            entries: entries
                .into_iter()
                .map(|(label, current, previous)| LabeledTotals::new(LABELS[label], current, previous))
                .collect(),
        },
    )
}

fn categories() -> Taxonomy {
    let entity = |id: &str, tokens: &[&str]| EntityConfig {
        id: id.to_string(),
        label: id.to_string(),
        tokens: tokens.iter().map(|t| t.to_string()).collect(),
        legacy_tokens: vec!["agenda".to_string()],
    };
    Taxonomy::new(
        EntityKind::Category,
        &[entity("playas", &["playas", "beaches"]), entity("museos", &["museos"])],
    )
    .unwrap()
}

proptest! {
    #[test]
    fn custom_previous_is_adjacent_and_same_length(current in arb_range(1095)) {
        let ctx = RangeContext::new(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());
        let selection = RangeSelection::Custom { start: current.start, end: current.end };
        let plan = derive_range(&selection, &ctx).unwrap();
        let previous = plan.previous().unwrap();
        prop_assert_eq!(previous.len_days(), current.len_days());
        prop_assert_eq!(previous.end + Duration::days(1), current.start);
    }

    #[test]
    fn preset_previous_is_adjacent_and_same_length(
        granularity in arb_granularity(),
        mode in arb_mode(),
        reference in arb_reference(),
    ) {
        let ctx = RangeContext::new(NaiveDate::from_ymd_opt(2200, 1, 1).unwrap());
        let selection = RangeSelection::Preset { granularity, reference: Some(reference), mode };
        let plan = derive_range(&selection, &ctx).unwrap();
        let current = plan.current;
        let previous = plan.previous().unwrap();
        prop_assert_eq!(previous.len_days(), current.len_days());
        prop_assert_eq!(previous.end + Duration::days(1), current.start);
        prop_assert!(current.end <= reference);
        prop_assert_eq!(derive_range(&selection, &ctx), Ok(plan));
    }

    #[test]
    fn buckets_tile_the_range(range in arb_range(800), unit in arb_unit()) {
        let buckets = plan_buckets(&range, unit);
        prop_assert!(!buckets.is_empty());
        prop_assert_eq!(buckets[0].start, range.start);
        prop_assert_eq!(buckets[buckets.len() - 1].end, range.end);
        for pair in buckets.windows(2) {
            prop_assert_eq!(pair[0].end + Duration::days(1), pair[1].start);
        }
        for (i, bucket) in buckets.iter().enumerate() {
            prop_assert_eq!(bucket.id, i);
            prop_assert!(bucket.start <= bucket.end);
        }
    }

    #[test]
    fn delta_needs_positive_baseline(current in any::<f64>(), previous in any::<f64>()) {
        let delta = delta_pct(current, previous);
        let baseline = if previous.is_finite() { previous } else { 0.0 };
        prop_assert_eq!(delta.is_none(), baseline <= 0.0);
        if let Some(value) = delta {
            prop_assert!(value.is_finite());
        }
    }

    #[test]
    fn merge_keeps_every_entity_and_sums(
        a in arb_report(SourceId::Analytics),
        b in arb_report(SourceId::Chatbot),
    ) {
        let merged = merge_totals(&a, &b);
        let keys: BTreeSet<String> = a
            .entries
            .iter()
            .chain(&b.entries)
            .map(|entry| normalize_label(&entry.label))
            .collect();
        prop_assert_eq!(merged.len(), keys.len());

        let expected: u64 = a.entries.iter().chain(&b.entries).map(|e| e.totals.current).sum();
        let combined: u64 = merged.iter().map(|e| e.combined_current).sum();
        prop_assert_eq!(combined, expected);

        for result in &merged {
            let shares: u64 = result.sources.iter().map(|share| share.current).sum();
            prop_assert_eq!(shares, result.combined_current);
        }
        for pair in merged.windows(2) {
            prop_assert!(pair[0].combined_current >= pair[1].combined_current);
        }
    }

    #[test]
    fn slices_preserve_total(
        values in proptest::collection::vec((0usize..LABELS.len(), 0u64..1_000), 0..20),
        top_n in 1usize..6,
    ) {
        let slices: Vec<DonutSlice> = values
            .iter()
            .map(|(label, value)| DonutSlice::new(LABELS[*label], *value))
            .collect();
        let merged = merge_slices(&slices, &[], Some(top_n));
        let expected: u64 = values.iter().map(|(_, value)| value).sum();
        prop_assert_eq!(merged.iter().map(|s| s.value).sum::<u64>(), expected);
        prop_assert!(merged.len() <= top_n + 1);
        prop_assert!(merged.iter().all(|slice| slice.value > 0));
    }

    #[test]
    fn classification_is_deterministic(path in "(https://host)?/[a-z_/-]{0,30}(\\?q=[a-z]{0,5})?") {
        let classifier = PathClassifier::new(&categories());
        let normalized = normalize_path(&path);
        prop_assert_eq!(normalize_path(&normalized), normalized.clone());
        prop_assert_eq!(classifier.classify(&normalized), classifier.classify_raw(&path));
        prop_assert_eq!(classifier.classify_raw(&path), classifier.classify_raw(&path));
    }
}
