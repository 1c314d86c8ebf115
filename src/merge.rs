use crate::delta::{DeltaTrend, delta_counts};
use crate::feed::SourceId;
use crate::labels::normalize_label;
use crate::models::{CombinedEntityResult, DonutSlice, PeriodTotals, SourceShare};
use std::collections::BTreeMap;

/// Label of the slice that absorbs everything past the top N.
pub const OTHERS_LABEL: &str = "Others";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledTotals {
    pub label: String,
    pub totals: PeriodTotals,
}

impl LabeledTotals {
    pub fn new(label: impl Into<String>, current: u64, previous: u64) -> Self {
        Self {
            label: label.into(),
            totals: PeriodTotals { current, previous },
        }
    }
}

/// Per-entity totals of one source, labelled the way that source spells them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: SourceId,
    pub entries: Vec<LabeledTotals>,
}

impl SourceReport {
    /// Report contributing nothing, used when a source's fetch failed.
    pub fn empty(source: SourceId) -> Self {
        Self {
            source,
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct MergeSlot {
    label_a: Option<String>,
    label_b: Option<String>,
    a: PeriodTotals,
    b: PeriodTotals,
}

/// Combine two sources' totals by normalized label. Deltas are computed on the
/// combined sums, and entities reported by one source only are kept.
pub fn merge_totals(a: &SourceReport, b: &SourceReport) -> Vec<CombinedEntityResult> {
    let mut slots: BTreeMap<String, MergeSlot> = BTreeMap::new();
    for entry in &a.entries {
        let slot = slots.entry(normalize_label(&entry.label)).or_default();
        slot.label_a.get_or_insert_with(|| entry.label.trim().to_string());
        slot.a.add(entry.totals);
    }
    for entry in &b.entries {
        let slot = slots.entry(normalize_label(&entry.label)).or_default();
        slot.label_b.get_or_insert_with(|| entry.label.trim().to_string());
        slot.b.add(entry.totals);
    }

    let mut results: Vec<CombinedEntityResult> = slots
        .into_iter()
        .map(|(key, slot)| {
            let mut combined = slot.a;
            combined.add(slot.b);
            let delta_pct = delta_counts(combined.current, combined.previous);
            CombinedEntityResult {
                label: slot.label_a.or(slot.label_b).unwrap_or_else(|| key.clone()),
                entity_id: key,
                combined_current: combined.current,
                combined_previous: combined.previous,
                delta_pct,
                trend: DeltaTrend::from_delta(delta_pct),
                sources: vec![share(a.source, slot.a), share(b.source, slot.b)],
            }
        })
        .collect();
    results.sort_by(|x, y| {
        y.combined_current
            .cmp(&x.combined_current)
            .then_with(|| x.entity_id.cmp(&y.entity_id))
    });
    results
}

fn share(source: SourceId, totals: PeriodTotals) -> SourceShare {
    SourceShare {
        source,
        current: totals.current,
        previous: totals.previous,
    }
}

/// Point-wise sum of two aligned series. A shorter series counts as zero past its end.
pub fn merge_series(a: &[u64], b: &[u64]) -> Vec<u64> {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let left = a.get(i).copied().unwrap_or(0);
            let right = b.get(i).copied().unwrap_or(0);
            left.saturating_add(right)
        })
        .collect()
}

/// Group slices by normalized label, sum, sort descending and optionally keep
/// the top `top_n` with the rest folded into an "Others" slice. Empty slices
/// are dropped.
pub fn merge_slices(a: &[DonutSlice], b: &[DonutSlice], top_n: Option<usize>) -> Vec<DonutSlice> {
    let mut groups: BTreeMap<(bool, String), DonutSlice> = BTreeMap::new();
    for slice in a.iter().chain(b) {
        let group = groups
            .entry((slice.synthetic, normalize_label(&slice.label)))
            .or_insert_with(|| DonutSlice {
                label: slice.label.trim().to_string(),
                value: 0,
                synthetic: slice.synthetic,
            });
        group.value = group.value.saturating_add(slice.value);
    }

    let mut slices: Vec<((bool, String), DonutSlice)> = groups.into_iter().filter(|(_, s)| s.value > 0).collect();
    slices.sort_by(|(kx, x), (ky, y)| y.value.cmp(&x.value).then_with(|| kx.cmp(ky)));
    let mut slices: Vec<DonutSlice> = slices.into_iter().map(|(_, slice)| slice).collect();

    if let Some(limit) = top_n {
        if slices.len() > limit {
            let rest: u64 = slices.drain(limit..).map(|slice| slice.value).sum();
            slices.push(DonutSlice::synthetic(OTHERS_LABEL, rest));
        }
    }
    slices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(source: SourceId, entries: &[(&str, u64, u64)]) -> SourceReport {
        SourceReport {
            source,
            entries: entries
                .iter()
                .map(|(label, current, previous)| LabeledTotals::new(*label, *current, *previous))
                .collect(),
        }
    }

    #[test]
    fn same_entity_with_different_spelling_is_summed() {
        let a = report(SourceId::Analytics, &[("playas", 50, 0)]);
        let b = report(SourceId::Chatbot, &[("Playas", 30, 0)]);
        let merged = merge_totals(&a, &b);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].entity_id, "playas");
        assert_eq!(merged[0].combined_current, 80);
        assert_eq!(merged[0].delta_pct, None);
        assert_eq!(merged[0].trend, DeltaTrend::NoData);
    }

    #[test]
    fn source_a_spelling_wins() {
        let a = report(SourceId::Analytics, &[("Mogán", 1, 1)]);
        let b = report(SourceId::Chatbot, &[("mogan", 1, 1), ("Telde", 4, 2)]);
        let merged = merge_totals(&a, &b);
        let mogan = merged.iter().find(|r| r.entity_id == "mogan").unwrap();
        assert_eq!(mogan.label, "Mogán");
        let telde = merged.iter().find(|r| r.entity_id == "telde").unwrap();
        assert_eq!(telde.label, "Telde");
    }

    #[test]
    fn one_sided_entities_are_kept_with_zero_share() {
        let a = report(SourceId::Analytics, &[("Museos", 10, 5)]);
        let b = report(SourceId::Chatbot, &[]);
        let merged = merge_totals(&a, &b);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].combined_current, 10);
        assert_eq!(merged[0].sources[1].source, SourceId::Chatbot);
        assert_eq!(merged[0].sources[1].current, 0);
    }

    #[test]
    fn delta_is_computed_on_combined_totals() {
        // A: 100 -> 200 (+100%), B: 1 -> 0 (-100%); averaging would say 0%
        let a = report(SourceId::Analytics, &[("Rutas", 200, 100)]);
        let b = report(SourceId::Chatbot, &[("rutas", 0, 1)]);
        let merged = merge_totals(&a, &b);
        let delta = merged[0].delta_pct.unwrap();
        assert!((delta - (200.0 - 101.0) / 101.0).abs() < 1e-12);
        assert_eq!(merged[0].trend, DeltaTrend::Up);
    }

    #[test]
    fn results_sorted_by_combined_current() {
        let a = report(SourceId::Analytics, &[("b", 5, 0), ("a", 5, 0), ("c", 9, 0)]);
        let merged = merge_totals(&a, &SourceReport::empty(SourceId::Chatbot));
        let keys: Vec<_> = merged.iter().map(|r| r.entity_id.as_str()).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }

    #[test]
    fn series_are_summed_point_wise() {
        assert_eq!(merge_series(&[1, 2, 3], &[10, 20, 30]), vec![11, 22, 33]);
        assert_eq!(merge_series(&[1, 2, 3], &[]), vec![1, 2, 3]);
    }

    #[test]
    fn slices_group_sort_and_fold_into_others() {
        let a = vec![
            DonutSlice::new("Playas", 50),
            DonutSlice::new("Museos", 10),
            DonutSlice::new("Rutas", 5),
        ];
        let b = vec![
            DonutSlice::new("playas", 30),
            DonutSlice::new("Gastronomía", 12),
            DonutSlice::new("Vacío", 0),
        ];
        let merged = merge_slices(&a, &b, Some(2));
        assert_eq!(
            merged,
            vec![
                DonutSlice::new("Playas", 80),
                DonutSlice::new("Gastronomía", 12),
                DonutSlice::synthetic(OTHERS_LABEL, 15),
            ]
        );
        let all = merge_slices(&a, &b, None);
        assert_eq!(all.len(), 4);
        assert_eq!(all.iter().map(|s| s.value).sum::<u64>(), 107);
    }

    #[test]
    fn entities_named_like_folded_slices_stay_separate() {
        let a = vec![
            DonutSlice::new("Others", 40),
            DonutSlice::new("Unknown Town", 7),
            DonutSlice::synthetic("Unknown town", 3),
        ];
        let b = vec![DonutSlice::synthetic("unknown town", 2), DonutSlice::new("Playas", 1)];
        let merged = merge_slices(&a, &b, Some(2));
        assert_eq!(
            merged,
            vec![
                DonutSlice::new("Others", 40),
                DonutSlice::new("Unknown Town", 7),
                DonutSlice::synthetic(OTHERS_LABEL, 6),
            ]
        );
        let all = merge_slices(&a, &b, None);
        assert_eq!(all.len(), 4);
        assert!(all.contains(&DonutSlice::synthetic("Unknown town", 5)));
        assert!(all.contains(&DonutSlice::new("Unknown Town", 7)));
    }
}
