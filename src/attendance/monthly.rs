use crate::attendance::reconcile::{ReconciledDay, reconcile};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusCount {
    #[schema(example = "present")]
    pub status: String,
    #[schema(example = 18)]
    pub count: u64,
}

/// Per-day summary in the store's `{_id, attendance, total}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DailyPoint {
    #[serde(rename = "_id")]
    #[schema(example = "2024-03-01")]
    pub date: String,
    pub attendance: Vec<StatusCount>,
    #[schema(example = 20)]
    pub total: u64,
}

impl DailyPoint {
    fn count_of(&self, status: &str) -> u64 {
        self.attendance
            .iter()
            .filter(|c| c.status == status)
            .map(|c| c.count)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DayCounts {
    pub present: u64,
    pub absent: u64,
    pub total: u64,
}

impl DayCounts {
    /// The denominator is floored at 1 so a day with no resolvable total
    /// reads as 0 instead of dividing by zero.
    pub fn rate(&self) -> u32 {
        (self.present as f64 * 100.0 / self.total.max(1) as f64).round() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DayRate {
    #[schema(example = "2024-03-01")]
    pub date: String,
    pub present: u64,
    pub absent: u64,
    pub total: u64,
    #[schema(example = 90)]
    pub rate: u32,
}

/// Date string to counts. Days without data have no entry at all, which is
/// not the same as a day with zero attendance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonthlyBucket {
    days: BTreeMap<String, DayCounts>,
}

impl MonthlyBucket {
    pub fn get(&self, date: &str) -> Option<&DayCounts> {
        self.days.get(date)
    }

    pub fn rate(&self, date: &str) -> Option<u32> {
        self.days.get(date).map(DayCounts::rate)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Chart series in ascending date order.
    pub fn rates(&self) -> Vec<DayRate> {
        self.days
            .iter()
            .map(|(date, counts)| DayRate {
                date: date.clone(),
                present: counts.present,
                absent: counts.absent,
                total: counts.total,
                rate: counts.rate(),
            })
            .collect()
    }
}

/// Response shape of the monthly endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MonthlySummary {
    /// Newest date first
    pub summary: Vec<DailyPoint>,
    /// Ascending, one entry per day with data
    pub chart: Vec<DayRate>,
}

/// Renders daily points and their aggregate into the monthly response.
pub fn summary(mut points: Vec<DailyPoint>) -> MonthlySummary {
    let chart = aggregate(&points).rates();
    points.sort_by(|a, b| b.date.cmp(&a.date));
    MonthlySummary {
        summary: points,
        chart,
    }
}

pub fn aggregate(points: &[DailyPoint]) -> MonthlyBucket {
    let mut days: BTreeMap<String, DayCounts> = BTreeMap::new();

    for point in points {
        let entry = days.entry(point.date.clone()).or_default();
        entry.present += point.count_of(AttendanceStatus::Present.as_str());
        entry.absent += point.count_of(AttendanceStatus::Absent.as_str());
        entry.total += point.total;
    }

    MonthlyBucket { days }
}

/// Summarizes a reconciled day into a `DailyPoint`. Status counts follow the
/// order present, absent, late, leave, then any literal statuses by name.
pub fn daily_point(date: NaiveDate, day: &ReconciledDay) -> DailyPoint {
    let mut counts: BTreeMap<(u8, String), u64> = BTreeMap::new();

    for record in &day.records {
        let rank = match record.status {
            AttendanceStatus::Present => 0,
            AttendanceStatus::Absent => 1,
            AttendanceStatus::Late => 2,
            AttendanceStatus::Leave => 3,
            AttendanceStatus::Other(_) => 4,
        };
        *counts
            .entry((rank, record.status.as_str().to_string()))
            .or_default() += 1;
    }

    DailyPoint {
        date: date.format("%Y-%m-%d").to_string(),
        attendance: counts
            .into_iter()
            .map(|((_, status), count)| StatusCount { status, count })
            .collect(),
        total: day.stats.total,
    }
}

/// Groups a month of raw records by date and reconciles every day.
pub fn reconcile_month(records: Vec<AttendanceRecord>) -> BTreeMap<NaiveDate, ReconciledDay> {
    let mut by_date: BTreeMap<NaiveDate, Vec<AttendanceRecord>> = BTreeMap::new();
    for record in records {
        by_date.entry(record.date).or_default().push(record);
    }

    by_date
        .into_iter()
        .map(|(date, records)| (date, reconcile(records)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::fixtures::{day, record};

    fn point(date: &str, present: u64, absent: u64, total: u64) -> DailyPoint {
        DailyPoint {
            date: date.to_string(),
            attendance: vec![
                StatusCount {
                    status: "present".to_string(),
                    count: present,
                },
                StatusCount {
                    status: "absent".to_string(),
                    count: absent,
                },
            ],
            total,
        }
    }

    #[test]
    fn day_rate_matches_present_share() {
        let bucket = aggregate(&[point("2024-03-04", 18, 2, 20)]);
        let counts = bucket.get("2024-03-04").unwrap();
        assert_eq!(counts.present, 18);
        assert_eq!(counts.absent, 2);
        assert_eq!(counts.total, 20);
        assert_eq!(bucket.rate("2024-03-04"), Some(90));
    }

    #[test]
    fn zero_total_day_reads_as_zero_rate() {
        let empty = DailyPoint {
            date: "2024-03-05".to_string(),
            attendance: Vec::new(),
            total: 0,
        };
        let bucket = aggregate(&[empty]);
        assert_eq!(bucket.rate("2024-03-05"), Some(0));
    }

    #[test]
    fn days_without_data_are_absent_from_bucket() {
        let bucket = aggregate(&[point("2024-03-04", 1, 0, 1)]);
        assert!(bucket.get("2024-03-06").is_none());
        assert_eq!(bucket.rate("2024-03-06"), None);
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn late_and_leave_only_raise_total() {
        let mut p = point("2024-03-04", 3, 1, 6);
        p.attendance.push(StatusCount {
            status: "late".to_string(),
            count: 2,
        });
        let bucket = aggregate(&[p]);
        let counts = bucket.get("2024-03-04").unwrap();
        assert_eq!((counts.present, counts.absent, counts.total), (3, 1, 6));
        assert_eq!(counts.rate(), 50);
    }

    #[test]
    fn repeated_dates_are_summed() {
        let bucket = aggregate(&[point("2024-03-04", 4, 1, 5), point("2024-03-04", 5, 0, 5)]);
        assert_eq!(bucket.rate("2024-03-04"), Some(90));
    }

    #[test]
    fn rates_are_in_date_order() {
        let bucket = aggregate(&[point("2024-03-09", 1, 1, 2), point("2024-03-02", 2, 0, 2)]);
        let dates: Vec<_> = bucket.rates().into_iter().map(|r| r.date).collect();
        assert_eq!(dates, vec!["2024-03-02", "2024-03-09"]);
    }

    #[test]
    fn summary_lists_newest_day_first() {
        let rendered = summary(vec![point("2024-03-02", 1, 1, 2), point("2024-03-09", 2, 0, 2)]);
        assert_eq!(rendered.summary[0].date, "2024-03-09");
        assert_eq!(rendered.chart[0].date, "2024-03-02");
        assert_eq!(rendered.chart[1].rate, 100);
    }

    #[test]
    fn month_reconciles_each_day_before_counting() {
        let mut later = record(3, Some(1), "present", "2024-03-02T08:30:00Z");
        later.date = day("2024-03-02");
        let mut earlier = record(4, Some(1), "absent", "2024-03-02T08:00:00Z");
        earlier.date = day("2024-03-02");

        let records = vec![
            record(1, Some(1), "present", "2024-03-01T08:00:00Z"),
            record(2, Some(2), "absent", "2024-03-01T08:00:00Z"),
            later,
            earlier,
        ];

        let days = reconcile_month(records);
        let points: Vec<_> = days.iter().map(|(d, r)| daily_point(*d, r)).collect();
        let bucket = aggregate(&points);

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, "2024-03-01");
        assert_eq!(
            points[0].attendance,
            vec![
                StatusCount {
                    status: "present".to_string(),
                    count: 1
                },
                StatusCount {
                    status: "absent".to_string(),
                    count: 1
                },
            ]
        );
        assert_eq!(bucket.rate("2024-03-01"), Some(50));
        assert_eq!(bucket.get("2024-03-02").unwrap().total, 1);
        assert_eq!(bucket.rate("2024-03-02"), Some(100));
    }
}
