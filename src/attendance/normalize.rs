use crate::model::attendance::{
    AttendanceRecord, AttendanceRow, AttendanceStatus, RecognitionMethod,
};

/// Converts a store row into the canonical record. This is the only place
/// the row shape is interpreted.
pub fn normalize(row: AttendanceRow) -> AttendanceRecord {
    let student_name = row.first_name.as_deref().map(|first| {
        format!("{} {}", first, row.last_name.as_deref().unwrap_or(""))
            .trim()
            .to_string()
    });

    let recognition_method = RecognitionMethod::from_store(&row.recognition_method);
    // older rows stored confidence as a 0-100 score
    let confidence = row
        .confidence
        .map(|c| if c > 1.0 { c / 100.0 } else { c })
        .map(|c| c.clamp(0.0, 1.0));

    AttendanceRecord {
        id: row.id,
        student_id: row.student_id,
        student_name,
        roll_number: row.roll_number,
        class_id: row.class_id,
        class_name: row.class_name,
        date: row.date,
        status: AttendanceStatus::parse(&row.status),
        confidence,
        recognition_method,
        marked_at: row.marked_at,
        updated_at: row.updated_at,
        created_at: row.created_at,
        remarks: row.remarks.filter(|r| !r.trim().is_empty()),
        offline_id: row.offline_id,
    }
}

pub fn normalize_all(rows: Vec<AttendanceRow>) -> Vec<AttendanceRecord> {
    rows.into_iter().map(normalize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::fixtures::{day, ts};

    fn row() -> AttendanceRow {
        AttendanceRow {
            id: 9,
            student_id: Some(4),
            first_name: Some("Ravi".to_string()),
            last_name: None,
            roll_number: Some("4".to_string()),
            class_id: Some(2),
            class_name: None,
            date: day("2024-03-01"),
            status: "Present".to_string(),
            confidence: Some(0.91),
            recognition_method: "auto".to_string(),
            marked_at: Some(ts("2024-03-01T08:00:00Z")),
            updated_at: None,
            created_at: None,
            remarks: Some("  ".to_string()),
            offline_id: None,
        }
    }

    #[test]
    fn builds_canonical_record() {
        let record = normalize(row());
        assert_eq!(record.student_name.as_deref(), Some("Ravi"));
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.recognition_method, RecognitionMethod::Face);
        assert_eq!(record.trusted_confidence(), Some(0.91));
        assert_eq!(record.class_display(), "Unknown");
        assert_eq!(record.remarks, None);
    }

    #[test]
    fn unresolved_student_stays_unresolved() {
        let mut raw = row();
        raw.student_id = None;
        raw.first_name = None;
        let record = normalize(raw);
        assert_eq!(record.student_id, None);
        assert_eq!(record.student_display(), "Unknown");
    }

    #[test]
    fn manual_records_carry_no_trusted_confidence() {
        let mut raw = row();
        raw.recognition_method = "manual".to_string();
        let record = normalize(raw);
        assert_eq!(record.confidence, Some(0.91));
        assert_eq!(record.trusted_confidence(), None);
    }
}
