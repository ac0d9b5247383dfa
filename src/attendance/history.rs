use crate::attendance::monthly::StatusCount;
use crate::attendance::percentage;
use crate::attendance::reconcile::select_latest;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StudentSummary {
    /// Days with one of the four known statuses
    pub total_days: u64,
    /// Present and late days
    pub present_days: u64,
    pub attendance_percentage: u32,
    pub breakdown: Vec<StatusCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StudentHistory {
    pub summary: StudentSummary,
    /// Newest first, one record per date
    pub history: Vec<AttendanceRecord>,
}

/// Builds one student's series. Duplicates on the same date collapse with the
/// same recency rule used for daily reconciliation.
pub fn student_history(records: Vec<AttendanceRecord>) -> StudentHistory {
    let (mut history, _) = select_latest(records, |r| Some(r.date));
    history.sort_by(|a, b| b.date.cmp(&a.date));

    let known = [
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::Late,
        AttendanceStatus::Leave,
    ];

    let breakdown: Vec<StatusCount> = known
        .iter()
        .map(|status| StatusCount {
            status: status.as_str().to_string(),
            count: history.iter().filter(|r| &r.status == status).count() as u64,
        })
        .filter(|c| c.count > 0)
        .collect();

    let total_days = breakdown.iter().map(|c| c.count).sum();
    let present_days = history
        .iter()
        .filter(|r| matches!(r.status, AttendanceStatus::Present | AttendanceStatus::Late))
        .count() as u64;

    StudentHistory {
        summary: StudentSummary {
            total_days,
            present_days,
            attendance_percentage: percentage(present_days, total_days),
            breakdown,
        },
        history,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::fixtures::{day, record};

    fn on(date: &str, id: u64, status: &str, marked_at: &str) -> AttendanceRecord {
        let mut r = record(id, Some(8), status, marked_at);
        r.date = day(date);
        r
    }

    #[test]
    fn history_is_newest_first_with_one_record_per_day() {
        let records = vec![
            on("2024-03-01", 1, "absent", "2024-03-01T08:00:00Z"),
            on("2024-03-03", 2, "present", "2024-03-03T08:00:00Z"),
            on("2024-03-01", 3, "present", "2024-03-01T08:20:00Z"),
            on("2024-03-02", 4, "late", "2024-03-02T08:40:00Z"),
        ];

        let result = student_history(records);
        let ids: Vec<_> = result.history.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 4, 3]);
    }

    #[test]
    fn late_counts_as_present_for_a_student() {
        let records = vec![
            on("2024-03-01", 1, "present", "2024-03-01T08:00:00Z"),
            on("2024-03-02", 2, "late", "2024-03-02T08:00:00Z"),
            on("2024-03-03", 3, "absent", "2024-03-03T08:00:00Z"),
            on("2024-03-04", 4, "leave", "2024-03-04T08:00:00Z"),
            on("2024-03-05", 5, "excused", "2024-03-05T08:00:00Z"),
        ];

        let summary = student_history(records).summary;
        assert_eq!(summary.total_days, 4);
        assert_eq!(summary.present_days, 2);
        assert_eq!(summary.attendance_percentage, 50);
        assert_eq!(summary.breakdown.len(), 4);
    }

    #[test]
    fn no_history_means_zero_percent() {
        let result = student_history(Vec::new());
        assert!(result.history.is_empty());
        assert_eq!(result.summary.total_days, 0);
        assert_eq!(result.summary.attendance_percentage, 0);
        assert!(result.summary.breakdown.is_empty());
    }
}
