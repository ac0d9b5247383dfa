use crate::gateway::Candidate;
use crate::model::attendance::{AttendanceStatus, RecognitionMethod};
use crate::model::student::RosterEntry;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use utoipa::ToSchema;

/// One student's entry in a manual or replayed submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MarkEntry {
    #[schema(example = 7)]
    pub student_id: u64,
    #[schema(example = "present", value_type = String)]
    pub status: AttendanceStatus,
    #[schema(nullable = true)]
    pub remarks: Option<String>,
    #[schema(example = 0.92, nullable = true)]
    pub confidence: Option<f64>,
}

/// A record ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedMark {
    pub student_id: u64,
    pub status: AttendanceStatus,
    pub confidence: Option<f64>,
    pub method: RecognitionMethod,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RejectedEntry {
    pub student_id: u64,
    pub reason: String,
}

/// One entry per student: a later entry replaces an earlier one but keeps
/// its position.
pub fn collapse_duplicates(entries: Vec<MarkEntry>) -> Vec<MarkEntry> {
    let mut slot_of: HashMap<u64, usize> = HashMap::with_capacity(entries.len());
    let mut collapsed: Vec<MarkEntry> = Vec::with_capacity(entries.len());

    for entry in entries {
        match slot_of.get(&entry.student_id) {
            Some(&slot) => collapsed[slot] = entry,
            None => {
                slot_of.insert(entry.student_id, collapsed.len());
                collapsed.push(entry);
            }
        }
    }
    collapsed
}

/// Splits submitted entries into those that can be stored and those that
/// cannot: unknown statuses and students outside the roster are rejected
/// individually. A student listed more than once is planned once, from the
/// last entry.
pub fn plan_manual(
    entries: Vec<MarkEntry>,
    roster: &[RosterEntry],
    method: RecognitionMethod,
) -> (Vec<PlannedMark>, Vec<RejectedEntry>) {
    let on_roster: HashSet<u64> = roster.iter().map(|s| s.id).collect();
    let entries = collapse_duplicates(entries);
    let mut planned = Vec::with_capacity(entries.len());
    let mut rejected = Vec::new();

    for entry in entries {
        if !entry.status.is_known() {
            rejected.push(RejectedEntry {
                student_id: entry.student_id,
                reason: format!("Invalid status '{}'", entry.status),
            });
            continue;
        }
        if !on_roster.contains(&entry.student_id) {
            rejected.push(RejectedEntry {
                student_id: entry.student_id,
                reason: "Student not found or not in class".to_string(),
            });
            continue;
        }

        planned.push(PlannedMark {
            student_id: entry.student_id,
            status: entry.status,
            confidence: entry.confidence.map(|c| c.clamp(0.0, 1.0)),
            method,
            remarks: entry.remarks,
        });
    }

    (planned, rejected)
}

/// Turns gateway candidates into a full class register: roster students
/// matched above `threshold` are present (best score kept), everyone else on
/// the roster is absent. Candidates that are not on the roster are ignored.
pub fn plan_recognition(candidates: &[Candidate], roster: &[RosterEntry], threshold: f64) -> Vec<PlannedMark> {
    let on_roster: HashSet<u64> = roster.iter().map(|s| s.id).collect();
    let mut best: HashMap<u64, f64> = HashMap::new();

    for candidate in candidates {
        let Ok(student_id) = candidate.student_id.trim().parse::<u64>() else {
            continue;
        };
        if candidate.confidence <= threshold || !on_roster.contains(&student_id) {
            continue;
        }
        let score = best.entry(student_id).or_insert(candidate.confidence);
        if candidate.confidence > *score {
            *score = candidate.confidence;
        }
    }

    roster
        .iter()
        .map(|student| match best.get(&student.id) {
            Some(&confidence) => PlannedMark {
                student_id: student.id,
                status: AttendanceStatus::Present,
                confidence: Some(confidence.clamp(0.0, 1.0)),
                method: RecognitionMethod::Face,
                remarks: None,
            },
            None => PlannedMark {
                student_id: student.id,
                status: AttendanceStatus::Absent,
                confidence: Some(0.0),
                method: RecognitionMethod::Face,
                remarks: None,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(ids: &[u64]) -> Vec<RosterEntry> {
        ids.iter()
            .map(|&id| RosterEntry {
                id,
                roll_number: id.to_string(),
                first_name: format!("S{id}"),
                last_name: None,
            })
            .collect()
    }

    fn candidate(student_id: &str, confidence: f64) -> Candidate {
        Candidate {
            student_id: student_id.to_string(),
            confidence,
            bbox: [0.0, 0.0, 10.0, 10.0],
        }
    }

    #[test]
    fn recognized_students_present_rest_absent() {
        let candidates = vec![candidate("1", 0.95), candidate("3", 0.65), candidate("99", 0.99)];
        let plan = plan_recognition(&candidates, &roster(&[1, 2, 3]), 0.7);

        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].status, AttendanceStatus::Present);
        assert_eq!(plan[0].confidence, Some(0.95));
        assert_eq!(plan[1].status, AttendanceStatus::Absent);
        assert_eq!(plan[2].status, AttendanceStatus::Absent);
        assert!(plan.iter().all(|p| p.method == RecognitionMethod::Face));
        assert!(plan.iter().all(|p| p.student_id != 99));
    }

    #[test]
    fn best_score_is_kept_for_repeated_faces() {
        let candidates = vec![candidate("2", 0.8), candidate("2", 0.91), candidate("2", 0.75)];
        let plan = plan_recognition(&candidates, &roster(&[2]), 0.7);
        assert_eq!(plan[0].confidence, Some(0.91));
    }

    #[test]
    fn threshold_is_exclusive_and_bad_ids_are_skipped() {
        let candidates = vec![candidate("1", 0.7), candidate("abc", 0.99)];
        let plan = plan_recognition(&candidates, &roster(&[1]), 0.7);
        assert_eq!(plan[0].status, AttendanceStatus::Absent);
    }

    #[test]
    fn manual_entries_outside_roster_or_with_bad_status_are_rejected() {
        let entries = vec![
            MarkEntry {
                student_id: 1,
                status: AttendanceStatus::Late,
                remarks: Some("bus".to_string()),
                confidence: None,
            },
            MarkEntry {
                student_id: 5,
                status: AttendanceStatus::Present,
                remarks: None,
                confidence: None,
            },
            MarkEntry {
                student_id: 2,
                status: AttendanceStatus::parse("sleeping"),
                remarks: None,
                confidence: None,
            },
        ];

        let (planned, rejected) = plan_manual(entries, &roster(&[1, 2]), RecognitionMethod::Manual);

        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].student_id, 1);
        assert_eq!(planned[0].remarks.as_deref(), Some("bus"));
        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].student_id, 5);
        assert!(rejected[1].reason.contains("sleeping"));
    }

    fn entry(student_id: u64, status: &str) -> MarkEntry {
        MarkEntry {
            student_id,
            status: AttendanceStatus::parse(status),
            remarks: None,
            confidence: None,
        }
    }

    #[test]
    fn repeated_student_is_planned_once_from_the_last_entry() {
        let entries = vec![entry(1, "absent"), entry(2, "present"), entry(1, "late")];

        let (planned, rejected) = plan_manual(entries, &roster(&[1, 2]), RecognitionMethod::Manual);

        assert!(rejected.is_empty());
        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].student_id, 1);
        assert_eq!(planned[0].status, AttendanceStatus::Late);
        assert_eq!(planned[1].student_id, 2);
    }

    #[test]
    fn last_entry_wins_even_when_it_is_rejected() {
        let entries = vec![entry(1, "present"), entry(1, "sleeping")];

        let (planned, rejected) = plan_manual(entries, &roster(&[1]), RecognitionMethod::Manual);

        assert!(planned.is_empty());
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].student_id, 1);
    }
}
