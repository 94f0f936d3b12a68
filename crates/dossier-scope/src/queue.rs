//! Dirty-section queue.
//!
//! A value type: [`DirtyQueue::add`], [`DirtyQueue::remove`] and
//! [`DirtyQueue::clear`] leave `self` untouched and return the next queue.
//! There is at most one entry per section id.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Difference ratio below which an edit is light.
pub const LIGHT_RATIO: f64 = 0.2;

/// Difference ratio below which an edit is moderate.
pub const MODERATE_RATIO: f64 = 0.5;

const FINGERPRINT_EDGE_CHARS: usize = 16;

/// How much of a section an edit changed. Ordered by severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMagnitude {
    /// Under 20% of characters changed.
    Light,
    /// Under 50% of characters changed.
    Moderate,
    /// Half or more of the section changed.
    Heavy,
}

impl EditMagnitude {
    /// Classify a difference ratio in `[0, 1]`.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < LIGHT_RATIO {
            Self::Light
        } else if ratio < MODERATE_RATIO {
            Self::Moderate
        } else {
            Self::Heavy
        }
    }

    /// Classify the edit from `before` to `after`.
    pub fn classify(before: &str, after: &str) -> Self {
        Self::from_ratio(difference_ratio(before, after))
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Heavy => "heavy",
        }
    }
}

impl fmt::Display for EditMagnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fraction of characters changed between `before` and `after`.
///
/// Strips the common prefix and suffix; whatever remains of the longer text
/// counts as changed. Two empty strings differ by 0.
pub fn difference_ratio(before: &str, after: &str) -> f64 {
    let a: Vec<char> = before.chars().collect();
    let b: Vec<char> = after.chars().collect();
    let longer = a.len().max(b.len());
    if longer == 0 {
        return 0.0;
    }
    let shorter = a.len().min(b.len());

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take(shorter - prefix)
        .take_while(|(x, y)| x == y)
        .count();

    (longer - prefix - suffix) as f64 / longer as f64
}

/// Cheap change-detection digest: `"{char_len}:{head16}:{tail16}"`.
///
/// Not collision resistant.
pub fn fingerprint(content: &str) -> String {
    let len = content.chars().count();
    let head: String = content.chars().take(FINGERPRINT_EDGE_CHARS).collect();
    let tail: String = content
        .chars()
        .skip(len.saturating_sub(FINGERPRINT_EDGE_CHARS))
        .collect();
    format!("{len}:{head}:{tail}")
}

/// One edited section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirtyQueueEntry {
    /// Section id.
    pub section_id: u32,
    /// Time of the latest edit.
    pub edited_at: DateTime<Utc>,
    /// Most severe magnitude seen since the last review.
    pub magnitude: EditMagnitude,
    /// Fingerprint of the content before the first unreviewed edit.
    pub before_fingerprint: String,
    /// Fingerprint of the current content.
    pub after_fingerprint: String,
}

/// Sections edited since their last review.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "QueueRepr")]
pub struct DirtyQueue {
    entries: Vec<DirtyQueueEntry>,
    oldest_edit: Option<DateTime<Utc>>,
    newest_edit: Option<DateTime<Utc>>,
}

// Only the entries are trusted on input; timestamps are re-derived.
#[derive(Deserialize)]
struct QueueRepr {
    #[serde(default)]
    entries: Vec<DirtyQueueEntry>,
}

impl From<QueueRepr> for DirtyQueue {
    fn from(repr: QueueRepr) -> Self {
        repr.entries
            .into_iter()
            .fold(Self::new(), |queue, entry| queue.upsert(entry))
    }
}

impl DirtyQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries in first-edit order.
    pub fn entries(&self) -> &[DirtyQueueEntry] {
        &self.entries
    }

    /// Entry for `section_id`, if dirty.
    pub fn get(&self, section_id: u32) -> Option<&DirtyQueueEntry> {
        self.entries.iter().find(|e| e.section_id == section_id)
    }

    /// Dirty section ids, sorted.
    pub fn section_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.entries.iter().map(|e| e.section_id).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of dirty sections.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Whether no section is dirty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest entry timestamp.
    pub fn oldest_edit(&self) -> Option<DateTime<Utc>> {
        self.oldest_edit
    }

    /// Latest entry timestamp.
    pub fn newest_edit(&self) -> Option<DateTime<Utc>> {
        self.newest_edit
    }

    /// Record an edit of `section_id` from `before` to `after`.
    #[must_use]
    pub fn add(&self, section_id: u32, before: &str, after: &str, edited_at: DateTime<Utc>) -> Self {
        self.clone().upsert(DirtyQueueEntry {
            section_id,
            edited_at,
            magnitude: EditMagnitude::classify(before, after),
            before_fingerprint: fingerprint(before),
            after_fingerprint: fingerprint(after),
        })
    }

    /// Drop `section_id` (its review finished).
    #[must_use]
    pub fn remove(&self, section_id: u32) -> Self {
        let mut next = self.clone();
        next.entries.retain(|e| e.section_id != section_id);
        next.recompute();
        next
    }

    /// Drop every entry.
    #[must_use]
    pub fn clear(&self) -> Self {
        Self::new()
    }

    /// Keep only entries for which `keep` holds.
    #[must_use]
    pub fn retain(&self, keep: impl Fn(&DirtyQueueEntry) -> bool) -> Self {
        let mut next = self.clone();
        next.entries.retain(keep);
        next.recompute();
        next
    }

    fn upsert(mut self, entry: DirtyQueueEntry) -> Self {
        match self.entries.iter_mut().find(|e| e.section_id == entry.section_id) {
            Some(existing) => {
                existing.edited_at = existing.edited_at.max(entry.edited_at);
                existing.magnitude = existing.magnitude.max(entry.magnitude);
                existing.after_fingerprint = entry.after_fingerprint;
            }
            None => self.entries.push(entry),
        }
        self.recompute();
        self
    }

    fn recompute(&mut self) {
        self.oldest_edit = self.entries.iter().map(|e| e.edited_at).min();
        self.newest_edit = self.entries.iter().map(|e| e.edited_at).max();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    // ── magnitude ──

    #[test]
    fn identical_text_is_light() {
        assert_eq!(difference_ratio("same", "same"), 0.0);
        assert_eq!(EditMagnitude::classify("same", "same"), EditMagnitude::Light);
    }

    #[test]
    fn both_empty_is_light() {
        assert_eq!(EditMagnitude::classify("", ""), EditMagnitude::Light);
    }

    #[test]
    fn small_append_is_light() {
        let before = "The client shall provide audited accounts annually.";
        let after = "The client shall provide audited accounts annually. ";
        assert_eq!(EditMagnitude::classify(before, after), EditMagnitude::Light);
    }

    #[test]
    fn one_of_three_chars_is_moderate() {
        assert!((difference_ratio("abc", "abd") - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(EditMagnitude::classify("abc", "abd"), EditMagnitude::Moderate);
    }

    #[test]
    fn rewrite_is_heavy() {
        assert_eq!(EditMagnitude::classify("", "hello"), EditMagnitude::Heavy);
        assert_eq!(
            EditMagnitude::classify("liability is capped", "no cap applies whatsoever"),
            EditMagnitude::Heavy
        );
    }

    #[test]
    fn prefix_and_suffix_do_not_overlap() {
        // "aa" -> "aaa": prefix 2, suffix limited to 0, one char changed of three
        assert!((difference_ratio("aa", "aaa") - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn magnitude_orders_by_severity() {
        assert!(EditMagnitude::Light < EditMagnitude::Moderate);
        assert!(EditMagnitude::Moderate < EditMagnitude::Heavy);
    }

    // ── fingerprint ──

    #[test]
    fn fingerprint_short_text() {
        assert_eq!(fingerprint("abc"), "3:abc:abc");
    }

    #[test]
    fn fingerprint_long_text_uses_edges() {
        let text = "0123456789abcdefXYZ0123456789ABCDEF";
        assert_eq!(fingerprint(text), "35:0123456789abcdef:0123456789ABCDEF");
    }

    #[test]
    fn fingerprint_counts_chars_not_bytes() {
        assert!(fingerprint("héllo").starts_with("5:"));
    }

    // ── queue ──

    #[test]
    fn add_does_not_touch_original() {
        let q = DirtyQueue::new();
        let q2 = q.add(1, "a", "b", at(0));
        assert!(q.is_empty());
        assert_eq!(q2.count(), 1);
    }

    #[test]
    fn upsert_keeps_first_before_and_worst_magnitude() {
        let q = DirtyQueue::new()
            .add(3, "", "completely new text", at(0))
            .add(3, "completely new text", "completely new text!", at(5));
        assert_eq!(q.count(), 1);
        let e = q.get(3).unwrap();
        assert_eq!(e.magnitude, EditMagnitude::Heavy);
        assert_eq!(e.before_fingerprint, fingerprint(""));
        assert_eq!(e.after_fingerprint, fingerprint("completely new text!"));
        assert_eq!(e.edited_at, at(5));
    }

    #[test]
    fn timestamps_track_entries() {
        let q = DirtyQueue::new()
            .add(2, "a", "b", at(10))
            .add(1, "a", "b", at(3))
            .add(5, "a", "b", at(7));
        assert_eq!(q.oldest_edit(), Some(at(3)));
        assert_eq!(q.newest_edit(), Some(at(10)));

        let q = q.remove(2);
        assert_eq!(q.newest_edit(), Some(at(7)));
        assert_eq!(q.section_ids(), vec![1, 5]);
    }

    #[test]
    fn clear_resets_timestamps() {
        let q = DirtyQueue::new().add(1, "a", "b", at(0)).clear();
        assert!(q.is_empty());
        assert_eq!(q.oldest_edit(), None);
        assert_eq!(q.newest_edit(), None);
    }

    #[test]
    fn deserialize_rederives_timestamps_and_dedups() {
        let json = serde_json::json!({
            "entries": [
                {"sectionId": 1, "editedAt": "2024-01-01T00:00:00Z", "magnitude": "light",
                 "beforeFingerprint": "0::", "afterFingerprint": "1:a:a"},
                {"sectionId": 1, "editedAt": "2024-01-02T00:00:00Z", "magnitude": "heavy",
                 "beforeFingerprint": "1:a:a", "afterFingerprint": "1:b:b"}
            ],
            "newestEdit": "1999-01-01T00:00:00Z"
        });
        let q: DirtyQueue = serde_json::from_value(json).unwrap();
        assert_eq!(q.count(), 1);
        assert_eq!(q.get(1).unwrap().magnitude, EditMagnitude::Heavy);
        assert_eq!(q.newest_edit().unwrap().to_rfc3339(), "2024-01-02T00:00:00+00:00");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn upsert_is_idempotent_per_section(
                edits in proptest::collection::vec((0u32..6, 0i64..10_000, ".{0,20}", ".{0,20}"), 1..24)
            ) {
                let q = edits.iter().fold(DirtyQueue::new(), |q, (id, t, b, a)| q.add(*id, b, a, at(*t)));

                let mut ids: Vec<u32> = edits.iter().map(|e| e.0).collect();
                ids.sort_unstable();
                ids.dedup();
                prop_assert_eq!(q.section_ids(), ids);

                let newest = q.entries().iter().map(|e| e.edited_at).max();
                prop_assert_eq!(q.newest_edit(), newest);
                let latest_input = edits.iter().map(|e| at(e.1)).max();
                prop_assert_eq!(q.newest_edit(), latest_input);
            }

            #[test]
            fn ratio_is_a_fraction(before in ".{0,40}", after in ".{0,40}") {
                let r = difference_ratio(&before, &after);
                prop_assert!((0.0..=1.0).contains(&r));
            }
        }
    }
}
