//! Attendance computation: the normalization boundary, reconciliation of
//! duplicate submissions, monthly and per-student aggregation, statistics,
//! CSV export and recognition planning. Nothing in here performs I/O.

pub mod export;
pub mod history;
pub mod ingest;
pub mod monthly;
pub mod normalize;
pub mod reconcile;
pub mod stats;

/// Whole-number percentage, `0` when there is nothing to divide by.
pub fn percentage(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 * 100.0 / whole as f64).round() as u32
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::model::attendance::{AttendanceRecord, AttendanceStatus, RecognitionMethod};
    use chrono::{DateTime, NaiveDate, Utc};

    pub fn ts(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .expect("valid rfc3339 timestamp")
            .with_timezone(&Utc)
    }

    pub fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
    }

    /// Manual record for `2024-03-01` marked at the given instant.
    pub fn record(id: u64, student: Option<u64>, status: &str, marked_at: &str) -> AttendanceRecord {
        AttendanceRecord {
            id,
            student_id: student,
            student_name: student.map(|s| format!("Student {s}")),
            roll_number: student.map(|s| s.to_string()),
            class_id: Some(3),
            class_name: Some("Grade 5".to_string()),
            date: day("2024-03-01"),
            status: AttendanceStatus::parse(status),
            confidence: None,
            recognition_method: RecognitionMethod::Manual,
            marked_at: Some(ts(marked_at)),
            updated_at: None,
            created_at: None,
            remarks: None,
            offline_id: None,
        }
    }
}
