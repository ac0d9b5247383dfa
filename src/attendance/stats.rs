use crate::attendance::monthly::{DayRate, aggregate, daily_point};
use crate::attendance::percentage;
use crate::attendance::reconcile::{DayStats, ReconciledDay};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use utoipa::ToSchema;

/// Students need at least this many recorded days to be ranked.
pub const MIN_RANKED_DAYS: u64 = 10;
pub const TOP_STUDENTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ClassRate {
    pub class_id: u64,
    #[schema(example = "Grade 5")]
    pub class_name: String,
    /// Present and late days
    pub present: u64,
    pub total: u64,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StudentRate {
    pub student_id: u64,
    #[schema(example = "Asha Rao")]
    pub student_name: String,
    #[schema(nullable = true)]
    pub roll_number: Option<String>,
    pub present_days: u64,
    pub total_days: u64,
    pub percentage: u32,
}

/// Rollup behind the report statistics and the school dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReportStatistics {
    #[schema(format = "date", value_type = String)]
    pub date: NaiveDate,
    pub today: DayStats,
    /// Ascending, one entry per day with data
    pub month: Vec<DayRate>,
    /// Ordered by class name
    pub classes: Vec<ClassRate>,
    /// Best month attendance among students with enough recorded days
    pub best_attendance: Vec<StudentRate>,
}

fn attended(record: &AttendanceRecord) -> bool {
    matches!(record.status, AttendanceStatus::Present | AttendanceStatus::Late)
}

#[derive(Default)]
struct Tally {
    present: u64,
    total: u64,
}

impl Tally {
    fn add(&mut self, record: &AttendanceRecord) {
        self.total += 1;
        if attended(record) {
            self.present += 1;
        }
    }
}

/// Builds the statistics for `date` from the reconciled days of its month.
/// Class and student rates count late as attended.
pub fn statistics(date: NaiveDate, month: &BTreeMap<NaiveDate, ReconciledDay>) -> ReportStatistics {
    let points: Vec<_> = month.iter().map(|(day, reconciled)| daily_point(*day, reconciled)).collect();

    let mut classes: HashMap<u64, (String, Tally)> = HashMap::new();
    let mut students: HashMap<u64, (&AttendanceRecord, Tally)> = HashMap::new();

    for record in month.values().flat_map(|day| day.records.iter()) {
        if let Some(class_id) = record.class_id {
            classes
                .entry(class_id)
                .or_insert_with(|| (record.class_display().to_string(), Tally::default()))
                .1
                .add(record);
        }
        if let Some(student_id) = record.student_id {
            students
                .entry(student_id)
                .or_insert_with(|| (record, Tally::default()))
                .1
                .add(record);
        }
    }

    let mut classes: Vec<ClassRate> = classes
        .into_iter()
        .map(|(class_id, (class_name, tally))| ClassRate {
            class_id,
            class_name,
            present: tally.present,
            total: tally.total,
            percentage: percentage(tally.present, tally.total),
        })
        .collect();
    classes.sort_by(|a, b| a.class_name.cmp(&b.class_name).then(a.class_id.cmp(&b.class_id)));

    let mut ranked: Vec<StudentRate> = students
        .into_iter()
        .filter(|(_, (_, tally))| tally.total >= MIN_RANKED_DAYS)
        .map(|(student_id, (first, tally))| StudentRate {
            student_id,
            student_name: first.student_display().to_string(),
            roll_number: first.roll_number.clone(),
            present_days: tally.present,
            total_days: tally.total,
            percentage: percentage(tally.present, tally.total),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.percentage
            .cmp(&a.percentage)
            .then(b.present_days.cmp(&a.present_days))
            .then(a.student_id.cmp(&b.student_id))
    });
    ranked.truncate(TOP_STUDENTS);

    ReportStatistics {
        date,
        today: month.get(&date).map(|day| day.stats).unwrap_or_default(),
        month: aggregate(&points).rates(),
        classes,
        best_attendance: ranked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::fixtures::{day, record};
    use crate::attendance::monthly::reconcile_month;

    fn on(date: &str, id: u64, student: u64, class_id: u64, status: &str) -> AttendanceRecord {
        let mut r = record(id, Some(student), status, &format!("{date}T08:00:00Z"));
        r.date = day(date);
        r.class_id = Some(class_id);
        r.class_name = Some(format!("Class {class_id}"));
        r
    }

    /// `days` school days in March for one student, the first `absent` of
    /// them absent.
    fn days_for(student: u64, class_id: u64, days: u32, absent: u32, next_id: &mut u64) -> Vec<AttendanceRecord> {
        (1..=days)
            .map(|d| {
                *next_id += 1;
                let status = if d <= absent { "absent" } else { "present" };
                on(&format!("2024-03-{d:02}"), *next_id, student, class_id, status)
            })
            .collect()
    }

    #[test]
    fn today_and_month_come_from_reconciled_days() {
        let records = vec![
            on("2024-03-01", 1, 1, 3, "present"),
            on("2024-03-01", 2, 2, 3, "absent"),
            on("2024-03-04", 3, 1, 3, "late"),
            on("2024-03-04", 4, 2, 3, "present"),
        ];
        let month = reconcile_month(records);

        let stats = statistics(day("2024-03-04"), &month);

        assert_eq!(stats.today.total, 2);
        assert_eq!(stats.today.present, 1);
        assert_eq!(stats.today.late, 1);
        assert_eq!(stats.month.len(), 2);
        assert_eq!(stats.month[0].date, "2024-03-01");
        assert_eq!(stats.month[0].rate, 50);

        assert_eq!(stats.classes.len(), 1);
        assert_eq!(stats.classes[0].present, 3);
        assert_eq!(stats.classes[0].total, 4);
        assert_eq!(stats.classes[0].percentage, 75);
    }

    #[test]
    fn a_day_without_data_reads_as_empty() {
        let month = reconcile_month(vec![on("2024-03-01", 1, 1, 3, "present")]);
        let stats = statistics(day("2024-03-02"), &month);
        assert_eq!(stats.today, DayStats::default());
    }

    #[test]
    fn ranking_needs_enough_days_and_orders_by_rate() {
        let mut next_id = 0;
        let mut records = Vec::new();
        records.extend(days_for(1, 3, 10, 2, &mut next_id));
        records.extend(days_for(2, 3, 12, 0, &mut next_id));
        records.extend(days_for(3, 4, 9, 0, &mut next_id));
        records.extend(days_for(4, 4, 10, 1, &mut next_id));

        let stats = statistics(day("2024-03-12"), &reconcile_month(records));

        let order: Vec<u64> = stats.best_attendance.iter().map(|s| s.student_id).collect();
        assert_eq!(order, vec![2, 4, 1]);
        assert_eq!(stats.best_attendance[0].percentage, 100);
        assert_eq!(stats.best_attendance[1].total_days, 10);
        assert_eq!(stats.best_attendance[1].student_name, "Student 4");

        let names: Vec<&str> = stats.classes.iter().map(|c| c.class_name.as_str()).collect();
        assert_eq!(names, vec!["Class 3", "Class 4"]);
    }

    #[test]
    fn only_the_top_students_are_listed() {
        let mut next_id = 0;
        let records: Vec<_> = (1..=7).flat_map(|s| days_for(s, 3, 10, 0, &mut next_id)).collect();

        let stats = statistics(day("2024-03-10"), &reconcile_month(records));

        assert_eq!(stats.best_attendance.len(), TOP_STUDENTS);
        let order: Vec<u64> = stats.best_attendance.iter().map(|s| s.student_id).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5]);
    }
}
