//! Coalescing of fragmented detections into contiguous spans.

use std::collections::HashMap;

use bwatch_models::{Behavior, Detection, Modality};

/// Round to 3 decimals, the precision of all emitted timestamps.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Merge spans of the same `(behavior, modality)` key whose gap does not
/// exceed `gap_seconds`.
///
/// Input is sorted by start (stable, so ties keep input order); each key
/// tracks its last merged span, and an item within the gap extends that span's
/// end to the max of the two. Different behaviors or modalities never merge.
pub fn merge_detections(mut items: Vec<Detection>, gap_seconds: f64) -> Vec<Detection> {
    items.sort_by(|a, b| {
        a.start_sec
            .partial_cmp(&b.start_sec)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut merged: Vec<Detection> = Vec::new();
    let mut last_for_key: HashMap<(Behavior, Modality), usize> = HashMap::new();

    for item in items {
        if let Some(&index) = last_for_key.get(&item.key()) {
            let last = &mut merged[index];
            if item.start_sec <= last.end_sec + gap_seconds {
                last.end_sec = last.end_sec.max(item.end_sec);
                append_notes(&mut last.notes, &item.notes);
                continue;
            }
        }
        last_for_key.insert(item.key(), merged.len());
        merged.push(item);
    }

    for item in &mut merged {
        item.start_sec = round3(item.start_sec);
        item.end_sec = round3(item.end_sec);
    }

    merged
}

/// Append incoming notes unless the existing notes already contain them
/// (case-insensitive substring match).
fn append_notes(existing: &mut String, incoming: &str) {
    let incoming = incoming.trim();
    if incoming.is_empty() {
        return;
    }
    if existing
        .to_lowercase()
        .contains(&incoming.to_lowercase())
    {
        return;
    }
    if existing.is_empty() {
        *existing = incoming.to_string();
    } else {
        existing.push_str("; ");
        existing.push_str(incoming);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(behavior: Behavior, start: f64, end: f64) -> Detection {
        Detection::new(behavior, start, end)
    }

    #[test]
    fn test_fragments_within_gap_merge() {
        let items = vec![
            span(Behavior::BodyRocking, 10.0, 11.0),
            span(Behavior::BodyRocking, 11.5, 12.5),
            span(Behavior::BodyRocking, 13.0, 14.0),
            span(Behavior::BodyRocking, 14.5, 15.0),
        ];
        let merged = merge_detections(items, 2.5);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].start_sec, 10.0);
        assert_eq!(merged[0].end_sec, 15.0);
    }

    #[test]
    fn test_gap_beyond_threshold_opens_new_span() {
        let items = vec![
            span(Behavior::Spinning, 0.0, 1.0),
            span(Behavior::Spinning, 4.0, 5.0),
        ];
        let merged = merge_detections(items, 2.5);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_different_keys_never_merge() {
        let items = vec![
            span(Behavior::BodyRocking, 0.0, 2.0),
            span(Behavior::HandFlapping, 2.1, 4.0),
            span(Behavior::Crying, 2.2, 4.5),
        ];
        let merged = merge_detections(items, 2.5);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() {
        let items = vec![
            span(Behavior::Humming, 20.0, 21.0),
            span(Behavior::Humming, 0.0, 1.0),
            span(Behavior::Humming, 1.5, 3.0),
        ];
        let merged = merge_detections(items, 2.5);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].start_sec, 0.0);
        assert_eq!(merged[0].end_sec, 3.0);
    }

    #[test]
    fn test_contained_span_does_not_shrink_end() {
        let items = vec![
            span(Behavior::Jumping, 0.0, 10.0),
            span(Behavior::Jumping, 2.0, 4.0),
        ];
        let merged = merge_detections(items, 2.5);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].end_sec, 10.0);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let items = vec![
            span(Behavior::BodyRocking, 10.0, 11.0),
            span(Behavior::BodyRocking, 11.5, 12.5),
            span(Behavior::Crying, 11.0, 12.0),
            span(Behavior::BodyRocking, 30.0, 31.0),
            span(Behavior::Crying, 15.0, 16.0),
        ];
        let once = merge_detections(items, 2.5);
        let twice = merge_detections(once.clone(), 2.5);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_notes_deduplicated_by_substring() {
        let mut a = span(Behavior::Echolalia, 0.0, 1.0);
        a.notes = "repeats the therapist's phrase".to_string();
        let mut b = span(Behavior::Echolalia, 1.5, 2.5);
        b.notes = "Repeats the therapist's phrase".to_string();
        let mut c = span(Behavior::Echolalia, 3.0, 4.0);
        c.notes = "delayed repetition".to_string();

        let merged = merge_detections(vec![a, b, c], 2.5);
        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged[0].notes,
            "repeats the therapist's phrase; delayed repetition"
        );
    }

    #[test]
    fn test_times_rounded_to_three_decimals() {
        let items = vec![span(Behavior::Humming, 1.000133, 2.999966)];
        let merged = merge_detections(items, 2.5);
        assert_eq!(merged[0].start_sec, 1.0);
        assert_eq!(merged[0].end_sec, 3.0);
    }
}
