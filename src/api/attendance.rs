use crate::{
    api::class::load_class,
    api::student::load_student,
    attendance::{
        history::{StudentHistory, student_history},
        ingest::{MarkEntry, PlannedMark, RejectedEntry, plan_manual, plan_recognition},
        monthly::{MonthlySummary, daily_point, reconcile_month, summary},
        normalize::{normalize, normalize_all},
        reconcile::{DayStats, reconcile},
    },
    auth::auth::AuthUser,
    config::Config,
    error::{AppError, AppResult, Violation, violation},
    gateway::{Candidate, luxand::LuxandClient},
    model::attendance::{AttendanceRecord, AttendanceRow, AttendanceStatus, RecognitionMethod},
    sync::{OfflineQueue, QueuedSubmission, Submitter, SyncReport},
    utils::roster_cache::RosterCache,
};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{debug, error, info, warn};
use utoipa::{IntoParams, ToSchema};

const RECORD_SELECT: &str = r#"
    SELECT a.id, s.id AS student_id, s.first_name, s.last_name, s.roll_number,
           c.id AS class_id, c.name AS class_name, a.date, a.status, a.confidence,
           a.recognition_method, a.marked_at, a.updated_at, a.created_at,
           a.remarks, a.offline_id
    FROM attendance a
    LEFT JOIN students s ON s.id = a.student_id
    LEFT JOIN classes c ON c.id = a.class_id
"#;

/// Which raw records to read. Rows come back in insertion order within a
/// date, which is the first-seen order reconciliation preserves.
#[derive(Debug, Default)]
pub(crate) struct RecordFilter {
    pub school_id: Option<u64>,
    pub class_id: Option<u64>,
    pub student_id: Option<u64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl RecordFilter {
    pub fn for_caller(auth: &AuthUser) -> Self {
        Self {
            school_id: auth.school_id,
            ..Self::default()
        }
    }
}

pub(crate) async fn fetch_records(pool: &MySqlPool, filter: &RecordFilter) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    let mut conditions = Vec::new();
    if filter.school_id.is_some() {
        conditions.push("a.school_id = ?");
    }
    if filter.class_id.is_some() {
        conditions.push("a.class_id = ?");
    }
    if filter.student_id.is_some() {
        conditions.push("a.student_id = ?");
    }
    if filter.from.is_some() {
        conditions.push("a.date >= ?");
    }
    if filter.to.is_some() {
        conditions.push("a.date <= ?");
    }

    let where_sql = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    let sql = format!("{RECORD_SELECT} {where_sql} ORDER BY a.date, a.id");

    let mut q = sqlx::query_as::<_, AttendanceRow>(&sql);
    if let Some(v) = filter.school_id {
        q = q.bind(v);
    }
    if let Some(v) = filter.class_id {
        q = q.bind(v);
    }
    if let Some(v) = filter.student_id {
        q = q.bind(v);
    }
    if let Some(v) = filter.from {
        q = q.bind(v);
    }
    if let Some(v) = filter.to {
        q = q.bind(v);
    }

    let rows = q.fetch_all(pool).await?;
    debug!(rows = rows.len(), ?filter, "Attendance rows fetched");
    Ok(normalize_all(rows))
}

/// First and last day of a calendar month.
pub(crate) fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((start, next.pred_opt()?))
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Where and when a batch of marks is written.
struct MarkTarget {
    class_id: u64,
    school_id: u64,
    date: NaiveDate,
    marked_by: u64,
    marked_at: DateTime<Utc>,
}

async fn insert_mark(
    conn: &mut MySqlConnection,
    target: &MarkTarget,
    mark: &PlannedMark,
    offline_id: Option<&str>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendance
            (student_id, class_id, school_id, date, status, confidence,
             recognition_method, remarks, marked_by, offline_id,
             marked_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(mark.student_id)
    .bind(target.class_id)
    .bind(target.school_id)
    .bind(target.date)
    .bind(mark.status.as_str())
    .bind(mark.confidence)
    .bind(mark.method.to_string())
    .bind(&mark.remarks)
    .bind(target.marked_by)
    .bind(offline_id)
    .bind(target.marked_at)
    .bind(target.marked_at)
    .bind(target.marked_at)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_id())
}

// ---------------------------------------------------------------------------
// Mark
// ---------------------------------------------------------------------------

#[derive(Deserialize, ToSchema)]
pub struct MarkRequest {
    #[schema(example = 3)]
    pub class_id: u64,
    /// Defaults to today
    #[schema(example = "2024-03-01", format = "date", value_type = Option<String>)]
    pub date: Option<NaiveDate>,
    pub entries: Vec<MarkEntry>,
    /// `manual` unless the client captured the entries automatically
    #[schema(value_type = Option<String>, example = "manual")]
    pub mode: Option<RecognitionMethod>,
}

#[derive(Serialize, ToSchema)]
pub struct MarkResponse {
    pub message: String,
    /// Entries stored
    pub success: usize,
    /// Entries rejected or not stored
    pub failed: usize,
    pub rejected: Vec<RejectedEntry>,
}

#[utoipa::path(
    post,
    path = "/api/attendance/mark",
    request_body = MarkRequest,
    responses(
        (status = 200, description = "Entries stored; rejected entries listed individually", body = MarkResponse),
        (status = 400, description = "No entries"),
        (status = 404, description = "Class not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn mark_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    rosters: web::Data<RosterCache>,
    payload: web::Json<MarkRequest>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    let payload = payload.into_inner();
    if payload.entries.is_empty() {
        return Err(AppError::BadRequest("At least one entry is required".to_string()));
    }

    let class = load_class(pool.get_ref(), payload.class_id, &auth).await?;
    let roster = rosters.roster(pool.get_ref(), class.id).await?;

    let method = payload.mode.unwrap_or(RecognitionMethod::Manual);
    let (planned, mut rejected) = plan_manual(payload.entries, &roster, method);

    let target = MarkTarget {
        class_id: class.id,
        school_id: class.school_id,
        date: payload.date.unwrap_or_else(today),
        marked_by: auth.user_id,
        marked_at: Utc::now(),
    };

    let mut conn = pool.acquire().await?;
    let mut success = 0;
    for mark in &planned {
        match insert_mark(&mut conn, &target, mark, None).await {
            Ok(_) => success += 1,
            Err(e) => {
                error!(error = %e, student_id = mark.student_id, "Failed to store attendance entry");
                rejected.push(RejectedEntry {
                    student_id: mark.student_id,
                    reason: "Failed to save".to_string(),
                });
            }
        }
    }

    info!(
        class_id = class.id,
        date = %target.date,
        success,
        failed = rejected.len(),
        "Attendance marked"
    );

    Ok(HttpResponse::Ok().json(MarkResponse {
        message: format!("Attendance marked for {success} students"),
        success,
        failed: rejected.len(),
        rejected,
    }))
}

// ---------------------------------------------------------------------------
// Recognize and mark
// ---------------------------------------------------------------------------

#[derive(Deserialize, ToSchema)]
pub struct RecognizeRequest {
    #[schema(example = 3)]
    pub class_id: u64,
    /// Base64 image or `data:` URL of the classroom photo
    pub image: String,
}

#[derive(Serialize, ToSchema)]
pub struct MarkedStudent {
    pub student_id: u64,
    #[schema(value_type = String, example = "present")]
    pub status: AttendanceStatus,
    pub confidence: Option<f64>,
}

#[derive(Serialize, ToSchema)]
pub struct RecognizeResponse {
    #[schema(format = "date", value_type = String)]
    pub date: NaiveDate,
    pub present: usize,
    pub absent: usize,
    /// Raw faces reported by the recognition service
    pub candidates: Vec<Candidate>,
    pub marked: Vec<MarkedStudent>,
}

#[utoipa::path(
    post,
    path = "/api/attendance/recognize",
    request_body = RecognizeRequest,
    responses(
        (status = 200, description = "Whole class marked from one photo", body = RecognizeResponse),
        (status = 400, description = "Image could not be decoded"),
        (status = 404, description = "Class not found"),
        (status = 502, description = "Recognition service failed"),
        (status = 503, description = "Recognition service not configured")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn recognize_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    rosters: web::Data<RosterCache>,
    gateway: web::Data<LuxandClient>,
    config: web::Data<Config>,
    payload: web::Json<RecognizeRequest>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    let class = load_class(pool.get_ref(), payload.class_id, &auth).await?;
    let roster = rosters.roster(pool.get_ref(), class.id).await?;

    let candidates = gateway.recognize(&payload.image).await?;
    let planned = plan_recognition(&candidates, &roster, config.recognition_threshold);

    let target = MarkTarget {
        class_id: class.id,
        school_id: class.school_id,
        date: today(),
        marked_by: auth.user_id,
        marked_at: Utc::now(),
    };

    let recognized: Vec<u64> = planned
        .iter()
        .filter(|m| m.status == AttendanceStatus::Present)
        .map(|m| m.student_id)
        .collect();

    let mut tx = pool.begin().await?;
    for mark in &planned {
        insert_mark(&mut tx, &target, mark, None).await?;
    }
    if !recognized.is_empty() {
        let placeholders = vec!["?"; recognized.len()].join(", ");
        let sql = format!("UPDATE students SET face_registered = TRUE WHERE id IN ({placeholders})");
        let mut q = sqlx::query(&sql);
        for id in &recognized {
            q = q.bind(*id);
        }
        q.execute(&mut *tx).await?;
    }
    tx.commit().await?;

    info!(
        class_id = class.id,
        faces = candidates.len(),
        present = recognized.len(),
        roster = roster.len(),
        "Recognition attendance stored"
    );

    Ok(HttpResponse::Ok().json(RecognizeResponse {
        date: target.date,
        present: recognized.len(),
        absent: planned.len() - recognized.len(),
        candidates,
        marked: planned
            .into_iter()
            .map(|m| MarkedStudent {
                student_id: m.student_id,
                status: m.status,
                confidence: m.confidence,
            })
            .collect(),
    }))
}

// ---------------------------------------------------------------------------
// Daily verification view
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DailyQuery {
    /// Defaults to today
    #[param(value_type = Option<String>, format = Date)]
    pub date: Option<NaiveDate>,
    pub class_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct DailyResponse {
    #[schema(format = "date", value_type = String)]
    pub date: NaiveDate,
    pub records: Vec<AttendanceRecord>,
    /// Records dropped because their student no longer resolves
    pub discarded: usize,
    pub stats: DayStats,
    #[schema(nullable = true)]
    pub message: Option<String>,
}

/// Reconciled records of one date for the caller's school.
pub(crate) async fn load_day(
    pool: &MySqlPool,
    auth: &AuthUser,
    date: NaiveDate,
    class_id: Option<u64>,
) -> AppResult<DailyResponse> {
    if let Some(class_id) = class_id {
        load_class(pool, class_id, auth).await?;
    }

    let filter = RecordFilter {
        class_id,
        from: Some(date),
        to: Some(date),
        ..RecordFilter::for_caller(auth)
    };
    let day = reconcile(fetch_records(pool, &filter).await?);

    let message = day
        .is_empty()
        .then(|| "No attendance records found for this date".to_string());

    Ok(DailyResponse {
        date,
        discarded: day.discarded,
        stats: day.stats,
        records: day.records,
        message,
    })
}

#[utoipa::path(
    get,
    path = "/api/attendance/daily",
    params(DailyQuery),
    responses(
        (status = 200, description = "One record per student; empty list when nothing was captured", body = DailyResponse),
        (status = 404, description = "Class not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn daily_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DailyQuery>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    let date = query.date.unwrap_or_else(today);
    let day = load_day(pool.get_ref(), &auth, date, query.class_id).await?;
    Ok(HttpResponse::Ok().json(day))
}

// ---------------------------------------------------------------------------
// Monthly summary
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MonthlyQuery {
    /// 1-12, defaults to the current month
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub class_id: Option<u64>,
}

impl MonthlyQuery {
    pub(crate) fn bounds(&self) -> AppResult<(NaiveDate, NaiveDate)> {
        let now = today();
        let month = self.month.unwrap_or(now.month());
        let year = self.year.unwrap_or(now.year());
        month_bounds(year, month)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid month {month}/{year}")))
    }
}

pub(crate) async fn load_month(
    pool: &MySqlPool,
    auth: &AuthUser,
    (start, end): (NaiveDate, NaiveDate),
    class_id: Option<u64>,
) -> AppResult<MonthlySummary> {
    if let Some(class_id) = class_id {
        load_class(pool, class_id, auth).await?;
    }

    let filter = RecordFilter {
        class_id,
        from: Some(start),
        to: Some(end),
        ..RecordFilter::for_caller(auth)
    };
    let days = reconcile_month(fetch_records(pool, &filter).await?);
    let points = days.iter().map(|(date, day)| daily_point(*date, day)).collect();

    Ok(summary(points))
}

#[utoipa::path(
    get,
    path = "/api/attendance/monthly",
    params(MonthlyQuery),
    responses(
        (status = 200, description = "Per-day counts and rates", body = MonthlySummary),
        (status = 400, description = "Invalid month"),
        (status = 404, description = "Class not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn monthly_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MonthlyQuery>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    let month = load_month(pool.get_ref(), &auth, query.bounds()?, query.class_id).await?;
    Ok(HttpResponse::Ok().json(month))
}

// ---------------------------------------------------------------------------
// Student history
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    #[param(value_type = Option<String>, format = Date)]
    pub start_date: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = Date)]
    pub end_date: Option<NaiveDate>,
    /// Most recent days to list; the summary always covers the full range
    pub limit: Option<usize>,
}

pub(crate) async fn load_history(
    pool: &MySqlPool,
    auth: &AuthUser,
    student_id: u64,
    query: &HistoryQuery,
) -> AppResult<StudentHistory> {
    let student = load_student(pool, student_id, auth).await?;

    let filter = RecordFilter {
        student_id: Some(student.id),
        from: query.start_date,
        to: query.end_date,
        ..RecordFilter::for_caller(auth)
    };
    let mut history = student_history(fetch_records(pool, &filter).await?);
    if let Some(limit) = query.limit {
        history.history.truncate(limit);
    }
    Ok(history)
}

#[utoipa::path(
    get,
    path = "/api/attendance/student/{id}",
    params(("id" = u64, Path, description = "Student id"), HistoryQuery),
    responses(
        (status = 200, description = "History newest first with a summary", body = StudentHistory),
        (status = 404, description = "Student not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn student_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<HistoryQuery>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    let history = load_history(pool.get_ref(), &auth, path.into_inner(), &query).await?;
    Ok(HttpResponse::Ok().json(history))
}

// ---------------------------------------------------------------------------
// Verification edit
// ---------------------------------------------------------------------------

#[derive(Deserialize, ToSchema)]
pub struct UpdateAttendance {
    #[schema(value_type = Option<String>, example = "late")]
    pub status: Option<AttendanceStatus>,
    /// A blank string clears the stored remarks
    #[schema(nullable = true)]
    pub remarks: Option<String>,
}

/// `None` leaves the stored remarks alone, `Some(None)` clears them.
pub(crate) fn remarks_change(remarks: Option<&str>) -> Option<Option<String>> {
    remarks.map(|r| Some(r.trim()).filter(|r| !r.is_empty()).map(str::to_string))
}

#[utoipa::path(
    patch,
    path = "/api/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance record id")),
    request_body = UpdateAttendance,
    responses(
        (status = 200, description = "Updated record", body = AttendanceRecord),
        (status = 400, description = "Nothing to update or invalid status"),
        (status = 404, description = "Record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn update_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateAttendance>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    let record_id = path.into_inner();

    if payload.status.is_none() && payload.remarks.is_none() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }
    if let Some(status) = payload.status.as_ref().filter(|s| !s.is_known()) {
        return Err(AppError::BadRequest(format!("Invalid status '{status}'")));
    }

    let owner = sqlx::query_scalar::<_, u64>("SELECT school_id FROM attendance WHERE id = ?")
        .bind(record_id)
        .fetch_optional(pool.get_ref())
        .await?;
    match owner {
        Some(school_id) if auth.can_access_school(school_id) => {}
        _ => return Err(AppError::NotFound("Attendance record not found".to_string())),
    }

    let remarks = remarks_change(payload.remarks.as_deref());

    // status and remarks change in place; marked_at keeps the capture time
    sqlx::query(
        r#"
        UPDATE attendance
        SET status = COALESCE(?, status),
            remarks = IF(?, ?, remarks),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(payload.status.as_ref().map(AttendanceStatus::as_str))
    .bind(remarks.is_some())
    .bind(remarks.flatten())
    .bind(Utc::now())
    .bind(record_id)
    .execute(pool.get_ref())
    .await?;

    let row = sqlx::query_as::<_, AttendanceRow>(&format!("{RECORD_SELECT} WHERE a.id = ?"))
        .bind(record_id)
        .fetch_one(pool.get_ref())
        .await?;

    info!(record_id, user_id = auth.user_id, "Attendance record updated");
    Ok(HttpResponse::Ok().json(normalize(row)))
}

// ---------------------------------------------------------------------------
// Offline sync
// ---------------------------------------------------------------------------

/// Writes replayed submissions to the store. A submission whose
/// `offline_id` is already stored counts as synced.
pub struct StoreSubmitter<'a> {
    pub pool: &'a MySqlPool,
    pub rosters: &'a RosterCache,
    pub auth: &'a AuthUser,
}

impl StoreSubmitter<'_> {
    async fn already_stored(&self, offline_id: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM attendance WHERE offline_id = ?)")
            .bind(offline_id)
            .fetch_one(self.pool)
            .await
    }
}

impl Submitter for StoreSubmitter<'_> {
    type Error = AppError;

    async fn submit(&self, submission: &QueuedSubmission) -> Result<(), AppError> {
        if self.already_stored(&submission.offline_id).await? {
            debug!(offline_id = %submission.offline_id, "Offline submission already stored");
            return Ok(());
        }

        let payload = &submission.payload;
        let class = load_class(self.pool, payload.class_id, self.auth).await?;
        let roster = self.rosters.roster(self.pool, class.id).await?;

        let (planned, rejected) = plan_manual(payload.entries.clone(), &roster, RecognitionMethod::Manual);
        for entry in &rejected {
            warn!(
                offline_id = %submission.offline_id,
                student_id = entry.student_id,
                reason = %entry.reason,
                "Offline entry skipped"
            );
        }

        let target = MarkTarget {
            class_id: class.id,
            school_id: class.school_id,
            date: payload.date,
            marked_by: self.auth.user_id,
            marked_at: submission.queued_at,
        };

        // planned marks hold one entry per student, so a duplicate key here
        // can only come from a concurrent replay of the same offline_id
        let mut tx = self.pool.begin().await?;
        for mark in &planned {
            match insert_mark(&mut tx, &target, mark, Some(submission.offline_id.as_str())).await {
                Ok(_) => {}
                Err(e) if violation(&e) == Some(Violation::Unique) => {
                    tx.rollback().await?;
                    if self.already_stored(&submission.offline_id).await? {
                        debug!(offline_id = %submission.offline_id, "Offline submission stored concurrently");
                        return Ok(());
                    }
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
        tx.commit().await?;

        Ok(())
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SyncRequest {
    pub submissions: Vec<QueuedSubmission>,
}

#[derive(Serialize, ToSchema)]
pub struct SyncResponse {
    pub report: SyncReport,
    /// Still to be retried by the client
    pub pending: Vec<QueuedSubmission>,
    /// Gave up after the maximum number of attempts
    pub failed: Vec<QueuedSubmission>,
}

#[utoipa::path(
    post,
    path = "/api/attendance/sync",
    request_body = SyncRequest,
    responses(
        (status = 200, description = "Replay report; unsent submissions are returned", body = SyncResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn sync_offline(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    rosters: web::Data<RosterCache>,
    config: web::Data<Config>,
    payload: web::Json<SyncRequest>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;

    let mut queue = OfflineQueue::from_submissions(payload.into_inner().submissions, config.sync_max_attempts);
    let submitter = StoreSubmitter {
        pool: pool.get_ref(),
        rosters: rosters.get_ref(),
        auth: &auth,
    };

    let report = queue.replay(&submitter).await;
    let (pending, failed) = queue.into_parts();

    Ok(HttpResponse::Ok().json(SyncResponse {
        report,
        pending,
        failed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_remarks_clear_and_missing_remarks_keep() {
        assert_eq!(remarks_change(None), None);
        assert_eq!(remarks_change(Some("   ")), Some(None));
        assert_eq!(remarks_change(Some("")), Some(None));
        assert_eq!(remarks_change(Some(" bus late ")), Some(Some("bus late".to_string())));
    }

    #[test]
    fn month_bounds_cover_whole_month() {
        let (start, end) = month_bounds(2024, 2).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let (_, end) = month_bounds(2023, 12).unwrap();
        assert_eq!(end, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());

        assert!(month_bounds(2024, 13).is_none());
        assert!(month_bounds(2024, 0).is_none());
    }

    #[test]
    fn monthly_query_rejects_bad_month() {
        let query = MonthlyQuery {
            month: Some(14),
            year: Some(2024),
            class_id: None,
        };
        assert!(query.bounds().is_err());

        let query = MonthlyQuery {
            month: Some(3),
            year: Some(2024),
            class_id: None,
        };
        let (start, end) = query.bounds().unwrap();
        assert_eq!((start.day(), end.day()), (1, 31));
    }
}
