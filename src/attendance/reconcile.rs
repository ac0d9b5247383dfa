use crate::attendance::percentage;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, RecognitionMethod};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::warn;
use utoipa::ToSchema;

/// Best-available "last modified" time of a record: `marked_at`, then
/// `updated_at`, then `created_at`.
pub fn recency_of(record: &AttendanceRecord) -> Option<DateTime<Utc>> {
    record
        .marked_at
        .or(record.updated_at)
        .or(record.created_at)
}

/// Strictly-later wins, so exact ties keep the record seen first. A record
/// without any timestamp never displaces one that has been chosen already.
fn supersedes(incoming: Option<DateTime<Utc>>, best: Option<DateTime<Utc>>) -> bool {
    match (incoming, best) {
        (Some(incoming), Some(best)) => incoming > best,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Keeps the most recent record per key, in the order keys were first seen.
/// Records whose key cannot be derived are dropped; the count of dropped
/// records is returned alongside the survivors.
pub(crate) fn select_latest<K, F>(records: Vec<AttendanceRecord>, key_of: F) -> (Vec<AttendanceRecord>, usize)
where
    K: Eq + Hash,
    F: Fn(&AttendanceRecord) -> Option<K>,
{
    let mut slots: HashMap<K, usize> = HashMap::with_capacity(records.len());
    let mut chosen: Vec<AttendanceRecord> = Vec::with_capacity(records.len());
    let mut discarded = 0usize;

    for record in records {
        let Some(key) = key_of(&record) else {
            warn!(record_id = record.id, date = %record.date, "Discarding attendance record without a student reference");
            discarded += 1;
            continue;
        };

        match slots.get(&key) {
            None => {
                slots.insert(key, chosen.len());
                chosen.push(record);
            }
            Some(&slot) => {
                if supersedes(recency_of(&record), recency_of(&chosen[slot])) {
                    chosen[slot] = record;
                }
            }
        }
    }

    (chosen, discarded)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DayStats {
    pub total: u64,
    pub present: u64,
    pub absent: u64,
    pub late: u64,
    pub leave: u64,
    /// Records captured by face recognition
    pub recognized: u64,
    /// `round(100 * present / total)`, `0` for an empty day
    pub rate: u32,
}

impl DayStats {
    pub fn from_records(records: &[AttendanceRecord]) -> Self {
        let mut stats = DayStats {
            total: records.len() as u64,
            ..DayStats::default()
        };

        for record in records {
            match record.status {
                AttendanceStatus::Present => stats.present += 1,
                AttendanceStatus::Absent => stats.absent += 1,
                AttendanceStatus::Late => stats.late += 1,
                AttendanceStatus::Leave => stats.leave += 1,
                AttendanceStatus::Other(_) => {}
            }
            if record.recognition_method == RecognitionMethod::Face {
                stats.recognized += 1;
            }
        }

        stats.rate = percentage(stats.present, stats.total);
        stats
    }
}

/// One authoritative record per student for a single date.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ReconciledDay {
    pub records: Vec<AttendanceRecord>,
    /// Records dropped because their student could not be resolved
    pub discarded: usize,
    pub stats: DayStats,
}

impl ReconciledDay {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, student_id: u64) -> Option<&AttendanceRecord> {
        self.records
            .iter()
            .find(|r| r.student_id == Some(student_id))
    }
}

/// Collapses the raw records of one date into the latest record per student
/// and computes the day's counts.
pub fn reconcile(records: Vec<AttendanceRecord>) -> ReconciledDay {
    let (records, discarded) = select_latest(records, |r| r.student_id);
    let stats = DayStats::from_records(&records);

    ReconciledDay {
        records,
        discarded,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::fixtures::{record, ts};

    #[test]
    fn recency_falls_back_through_updated_then_created() {
        let mut r = record(1, Some(1), "present", "2024-03-01T08:00:00Z");
        assert_eq!(recency_of(&r), Some(ts("2024-03-01T08:00:00Z")));

        r.marked_at = None;
        r.updated_at = Some(ts("2024-03-01T09:00:00Z"));
        r.created_at = Some(ts("2024-03-01T07:00:00Z"));
        assert_eq!(recency_of(&r), Some(ts("2024-03-01T09:00:00Z")));

        r.updated_at = None;
        assert_eq!(recency_of(&r), Some(ts("2024-03-01T07:00:00Z")));

        r.created_at = None;
        assert_eq!(recency_of(&r), None);
    }

    #[test]
    fn empty_input_yields_zeroed_stats() {
        let day = reconcile(Vec::new());
        assert!(day.is_empty());
        assert_eq!(day.discarded, 0);
        assert_eq!(day.stats, DayStats::default());
        assert_eq!(day.stats.rate, 0);
    }

    #[test]
    fn exact_timestamp_tie_keeps_first_seen() {
        let records = vec![
            record(1, Some(7), "absent", "2024-03-01T08:00:00Z"),
            record(2, Some(7), "present", "2024-03-01T08:00:00Z"),
        ];

        let day = reconcile(records);

        assert_eq!(day.records.len(), 1);
        assert_eq!(day.records[0].id, 1);
        assert_eq!(day.records[0].status, AttendanceStatus::Absent);
    }

    #[test]
    fn latest_of_three_duplicates_wins() {
        let records = vec![
            record(1, Some(3), "absent", "2024-03-01T08:00:00Z"),
            record(2, Some(3), "present", "2024-03-01T08:05:00Z"),
            record(3, Some(3), "late", "2024-03-01T08:02:00Z"),
        ];

        let day = reconcile(records);

        assert_eq!(day.records.len(), 1);
        let chosen = day.get(3).unwrap();
        assert_eq!(chosen.id, 2);
        assert_eq!(chosen.marked_at, Some(ts("2024-03-01T08:05:00Z")));
        assert_eq!(day.stats.present, 1);
        assert_eq!(day.stats.rate, 100);
    }

    #[test]
    fn unresolvable_records_are_dropped_and_not_counted() {
        let records = vec![
            record(1, None, "present", "2024-03-01T08:00:00Z"),
            record(2, Some(1), "absent", "2024-03-01T08:00:00Z"),
            record(3, None, "absent", "2024-03-01T09:00:00Z"),
        ];

        let day = reconcile(records);

        assert_eq!(day.discarded, 2);
        assert_eq!(day.records.len(), 1);
        assert!(day.records.iter().all(|r| r.student_id.is_some()));
        assert_eq!(day.stats.total, 1);
        assert_eq!(day.stats.present, 0);
        assert_eq!(day.stats.absent, 1);
    }

    #[test]
    fn late_leave_and_unknown_count_only_toward_total() {
        let records = vec![
            record(1, Some(1), "present", "2024-03-01T08:00:00Z"),
            record(2, Some(2), "late", "2024-03-01T08:00:00Z"),
            record(3, Some(3), "leave", "2024-03-01T08:00:00Z"),
            record(4, Some(4), "excused", "2024-03-01T08:00:00Z"),
        ];

        let stats = reconcile(records).stats;

        assert_eq!(stats.total, 4);
        assert_eq!(stats.present, 1);
        assert_eq!(stats.absent, 0);
        assert_eq!(stats.late, 1);
        assert_eq!(stats.leave, 1);
        assert!(stats.present + stats.absent <= stats.total);
        assert_eq!(stats.rate, 25);
    }

    #[test]
    fn reconciling_twice_changes_nothing() {
        let records = vec![
            record(1, Some(1), "absent", "2024-03-01T08:00:00Z"),
            record(2, Some(2), "present", "2024-03-01T08:01:00Z"),
            record(3, Some(1), "present", "2024-03-01T08:03:00Z"),
            record(4, Some(3), "leave", "2024-03-01T08:00:00Z"),
        ];

        let once = reconcile(records);
        let twice = reconcile(once.records.clone());

        assert_eq!(once, twice);
    }

    #[test]
    fn output_keeps_first_seen_student_order() {
        let records = vec![
            record(1, Some(5), "absent", "2024-03-01T08:00:00Z"),
            record(2, Some(2), "present", "2024-03-01T08:00:00Z"),
            record(3, Some(5), "present", "2024-03-01T08:10:00Z"),
        ];

        let ids: Vec<_> = reconcile(records).records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn timestamped_record_beats_untimestamped_but_not_the_reverse() {
        let mut bare = record(1, Some(1), "absent", "2024-03-01T08:00:00Z");
        bare.marked_at = None;
        let stamped = record(2, Some(1), "present", "2024-03-01T08:00:00Z");

        let day = reconcile(vec![bare.clone(), stamped.clone()]);
        assert_eq!(day.records[0].id, 2);

        let day = reconcile(vec![stamped, bare]);
        assert_eq!(day.records[0].id, 2);
    }

    #[test]
    fn updated_at_competes_with_marked_at() {
        let first = record(1, Some(1), "absent", "2024-03-01T08:00:00Z");
        let mut edited = record(2, Some(1), "present", "2024-03-01T08:00:00Z");
        edited.marked_at = None;
        edited.updated_at = Some(ts("2024-03-01T10:00:00Z"));

        let day = reconcile(vec![first, edited]);
        assert_eq!(day.records[0].id, 2);
    }

    #[test]
    fn counts_face_captures() {
        let mut face = record(1, Some(1), "present", "2024-03-01T08:00:00Z");
        face.recognition_method = RecognitionMethod::Face;
        face.confidence = Some(0.88);
        let manual = record(2, Some(2), "absent", "2024-03-01T08:00:00Z");

        let stats = reconcile(vec![face, manual]).stats;
        assert_eq!(stats.recognized, 1);
        assert_eq!(stats.rate, 50);
    }
}
