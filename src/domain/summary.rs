use std::collections::BTreeMap;
use super::detection::Detection;

/// Per-class counts in class-id order, e.g. `2 persons, 1 dog`.
pub fn summarize_detections(detections: &[Detection]) -> String {
    let mut counts: BTreeMap<usize, (&str, usize)> = BTreeMap::new();
    for det in detections {
        counts.entry(det.class_id).or_insert((&det.label, 0)).1 += 1;
    }
    counts
        .values()
        .map(|(label, count)| {
            let plural = if *count > 1 { "s" } else { "" };
            format!("{count} {label}{plural}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}
