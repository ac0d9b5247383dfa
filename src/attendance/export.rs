use crate::attendance::monthly::DayRate;
use crate::attendance::reconcile::recency_of;
use crate::model::attendance::AttendanceRecord;
use chrono::{DateTime, FixedOffset, Local, NaiveDate};
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

/// Source of the "Report Generated" instant. Production uses the wall clock;
/// tests pin it.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().into()
    }
}

pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExportError {
    #[error("No data found for the selected report")]
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ReportKind {
    Daily,
    Monthly,
    Student,
}

pub struct Column<T> {
    pub header: &'static str,
    value: Box<dyn Fn(&T) -> String + Send + Sync>,
}

impl<T> Column<T> {
    pub fn new(header: &'static str, value: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        Self {
            header,
            value: Box::new(value),
        }
    }
}

const GENERATED_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";
const TIME_FORMAT: &str = "%-I:%M:%S %p";

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn quote_if_needed(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        quote(field)
    } else {
        field.to_string()
    }
}

/// Renders rows as CSV preceded by a quoted generation line and a blank
/// quoted line. Every data field is quoted.
pub fn to_csv<T>(rows: &[T], columns: &[Column<T>], clock: &dyn Clock) -> Result<String, ExportError> {
    if rows.is_empty() {
        return Err(ExportError::NoData);
    }

    let generated = clock.now().format(GENERATED_FORMAT).to_string();

    let mut lines = Vec::with_capacity(rows.len() + 3);
    lines.push(quote(&format!("Report Generated: {generated}")));
    lines.push(quote(""));
    lines.push(
        columns
            .iter()
            .map(|c| quote_if_needed(c.header))
            .collect::<Vec<_>>()
            .join(","),
    );

    for row in rows {
        lines.push(
            columns
                .iter()
                .map(|c| quote(&(c.value)(row)))
                .collect::<Vec<_>>()
                .join(","),
        );
    }

    Ok(lines.join("\n"))
}

/// Columns of the daily verification export. Times render in `offset`.
pub fn daily_columns(offset: FixedOffset) -> Vec<Column<AttendanceRecord>> {
    vec![
        Column::new("Date", |r: &AttendanceRecord| r.date.format("%Y-%m-%d").to_string()),
        Column::new("Class", |r: &AttendanceRecord| r.class_display().to_string()),
        Column::new("Roll No", |r: &AttendanceRecord| r.roll_number.clone().unwrap_or_default()),
        Column::new("Student Name", |r: &AttendanceRecord| r.student_display().to_string()),
        Column::new("Status", |r: &AttendanceRecord| r.status.to_string()),
        Column::new("Confidence", |r: &AttendanceRecord| match r.trusted_confidence() {
            Some(c) => format!("{}%", (c * 100.0).round() as u32),
            None => "N/A".to_string(),
        }),
        Column::new("Time", move |r: &AttendanceRecord| {
            recency_of(r)
                .map(|t| t.with_timezone(&offset).format(TIME_FORMAT).to_string())
                .unwrap_or_default()
        }),
    ]
}

pub fn monthly_columns() -> Vec<Column<DayRate>> {
    vec![
        Column::new("Date", |d: &DayRate| d.date.clone()),
        Column::new("Present", |d: &DayRate| d.present.to_string()),
        Column::new("Absent", |d: &DayRate| d.absent.to_string()),
        Column::new("Total", |d: &DayRate| d.total.to_string()),
        Column::new("Rate", |d: &DayRate| format!("{}%", d.rate)),
    ]
}

pub fn student_columns() -> Vec<Column<AttendanceRecord>> {
    vec![
        Column::new("Date", |r: &AttendanceRecord| r.date.format("%Y-%m-%d").to_string()),
        Column::new("Class", |r: &AttendanceRecord| r.class_display().to_string()),
        Column::new("Status", |r: &AttendanceRecord| r.status.to_string()),
        Column::new("Remarks", |r: &AttendanceRecord| r.remarks.clone().unwrap_or_default()),
    ]
}

/// `daily_report_2024-03-01.csv` or `monthly_report_2024-03-01_to_2024-03-31.csv`.
pub fn report_filename(kind: ReportKind, start: NaiveDate, end: NaiveDate) -> String {
    let start_str = start.format("%Y-%m-%d");
    if start == end {
        format!("{kind}_report_{start_str}.csv")
    } else {
        format!("{kind}_report_{start_str}_to_{}.csv", end.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::fixtures::{day, record};
    use crate::model::attendance::RecognitionMethod;

    fn clock() -> FixedClock {
        FixedClock(DateTime::parse_from_rfc3339("2024-03-01T14:30:05+00:00").unwrap())
    }

    fn two_students() -> Vec<AttendanceRecord> {
        let mut first = record(1, Some(1), "present", "2024-03-01T08:00:00Z");
        first.recognition_method = RecognitionMethod::Face;
        first.confidence = Some(0.934);
        let second = record(2, Some(2), "absent", "2024-03-01T08:05:00Z");
        vec![first, second]
    }

    #[test]
    fn daily_export_is_byte_exact_under_fixed_clock() {
        let clock = clock();
        let csv = to_csv(&two_students(), &daily_columns(*clock.now().offset()), &clock).unwrap();

        let expected = [
            "\"Report Generated: 3/1/2024, 2:30:05 PM\"",
            "\"\"",
            "Date,Class,Roll No,Student Name,Status,Confidence,Time",
            "\"2024-03-01\",\"Grade 5\",\"1\",\"Student 1\",\"present\",\"93%\",\"8:00:00 AM\"",
            "\"2024-03-01\",\"Grade 5\",\"2\",\"Student 2\",\"absent\",\"N/A\",\"8:05:00 AM\"",
        ]
        .join("\n");

        assert_eq!(csv, expected);
    }

    #[test]
    fn body_does_not_depend_on_clock() {
        let later = FixedClock(DateTime::parse_from_rfc3339("2025-01-09T23:59:59+00:00").unwrap());
        let offset = FixedOffset::east_opt(0).unwrap();
        let a = to_csv(&two_students(), &daily_columns(offset), &clock()).unwrap();
        let b = to_csv(&two_students(), &daily_columns(offset), &later).unwrap();

        assert_ne!(a.lines().next(), b.lines().next());
        assert_eq!(a.lines().skip(1).collect::<Vec<_>>(), b.lines().skip(1).collect::<Vec<_>>());
    }

    #[test]
    fn quotes_and_delimiters_are_escaped() {
        let mut r = record(1, Some(1), "present", "2024-03-01T08:00:00Z");
        r.student_name = Some("Rao, \"Ash\"".to_string());
        let csv = to_csv(&[r], &student_columns(), &clock()).unwrap();
        let body = csv.lines().last().unwrap();
        assert_eq!(body, "\"2024-03-01\",\"Grade 5\",\"present\",\"\"");

        let mut r = record(1, Some(1), "present", "2024-03-01T08:00:00Z");
        r.student_name = Some("Rao, \"Ash\"".to_string());
        let csv = to_csv(&[r], &daily_columns(FixedOffset::east_opt(0).unwrap()), &clock()).unwrap();
        assert!(csv.contains("\"Rao, \"\"Ash\"\"\""));
    }

    #[test]
    fn empty_export_is_rejected() {
        let rows: Vec<AttendanceRecord> = Vec::new();
        assert_eq!(to_csv(&rows, &student_columns(), &clock()), Err(ExportError::NoData));
    }

    #[test]
    fn monthly_rows_render_rates() {
        let rows = vec![DayRate {
            date: "2024-03-04".to_string(),
            present: 18,
            absent: 2,
            total: 20,
            rate: 90,
        }];
        let csv = to_csv(&rows, &monthly_columns(), &clock()).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[2], "Date,Present,Absent,Total,Rate");
        assert_eq!(lines[3], "\"2024-03-04\",\"18\",\"2\",\"20\",\"90%\"");
    }

    #[test]
    fn times_follow_the_given_offset() {
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let csv = to_csv(&two_students()[..1], &daily_columns(ist), &clock()).unwrap();
        assert!(csv.ends_with("\"1:30:00 PM\""));
    }

    #[test]
    fn filenames_name_kind_and_range() {
        assert_eq!(
            report_filename(ReportKind::Daily, day("2024-03-01"), day("2024-03-01")),
            "daily_report_2024-03-01.csv"
        );
        assert_eq!(
            report_filename(ReportKind::Monthly, day("2024-03-01"), day("2024-03-31")),
            "monthly_report_2024-03-01_to_2024-03-31.csv"
        );
    }
}
