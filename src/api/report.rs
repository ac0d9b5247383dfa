use crate::{
    api::attendance::{
        DailyQuery, HistoryQuery, MonthlyQuery, RecordFilter, fetch_records, load_day, load_history, load_month,
        month_bounds, today,
    },
    api::class::load_class,
    attendance::export::{
        Clock, ReportKind, daily_columns, monthly_columns, report_filename, student_columns, to_csv,
    },
    attendance::monthly::reconcile_month,
    attendance::stats::{ReportStatistics, statistics},
    auth::auth::AuthUser,
    error::{AppError, AppResult},
};
use chrono::{Datelike, NaiveDate};
use actix_web::{HttpResponse, http::header, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::IntoParams;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FormatQuery {
    /// `json` (default) or `csv`
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub format: ReportFormat,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatisticsQuery {
    /// Defaults to today
    #[param(value_type = Option<String>, format = Date)]
    pub date: Option<NaiveDate>,
    pub class_id: Option<u64>,
}

/// Statistics for `date` over its calendar month, for one school or, with
/// `school_id` unset, every school.
pub(crate) async fn load_statistics(
    pool: &MySqlPool,
    school_id: Option<u64>,
    class_id: Option<u64>,
    date: NaiveDate,
) -> AppResult<ReportStatistics> {
    let (start, _) = month_bounds(date.year(), date.month())
        .ok_or_else(|| AppError::BadRequest(format!("Invalid date {date}")))?;

    let filter = RecordFilter {
        school_id,
        class_id,
        from: Some(start),
        to: Some(date),
        ..RecordFilter::default()
    };
    let month = reconcile_month(fetch_records(pool, &filter).await?);
    Ok(statistics(date, &month))
}

fn csv_response(filename: &str, body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={filename}"),
        ))
        .body(body)
}

#[utoipa::path(
    get,
    path = "/api/reports/daily",
    params(DailyQuery, FormatQuery),
    responses(
        (status = 200, description = "Daily report as JSON or a CSV attachment"),
        (status = 404, description = "No data for a CSV export, or class not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn daily_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    clock: web::Data<dyn Clock>,
    query: web::Query<DailyQuery>,
    format: web::Query<FormatQuery>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    let date = query.date.unwrap_or_else(today);
    let day = load_day(pool.get_ref(), &auth, date, query.class_id).await?;

    match format.format {
        ReportFormat::Json => Ok(HttpResponse::Ok().json(day)),
        ReportFormat::Csv => {
            let clock = clock.get_ref();
            let csv = to_csv(&day.records, &daily_columns(*clock.now().offset()), clock)?;
            let filename = report_filename(ReportKind::Daily, date, date);
            info!(%filename, rows = day.records.len(), "Daily report exported");
            Ok(csv_response(&filename, csv))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/reports/monthly",
    params(MonthlyQuery, FormatQuery),
    responses(
        (status = 200, description = "Monthly report as JSON or a CSV attachment"),
        (status = 400, description = "Invalid month"),
        (status = 404, description = "No data for a CSV export, or class not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn monthly_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    clock: web::Data<dyn Clock>,
    query: web::Query<MonthlyQuery>,
    format: web::Query<FormatQuery>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    let (start, end) = query.bounds()?;
    let month = load_month(pool.get_ref(), &auth, (start, end), query.class_id).await?;

    match format.format {
        ReportFormat::Json => Ok(HttpResponse::Ok().json(month)),
        ReportFormat::Csv => {
            let csv = to_csv(&month.chart, &monthly_columns(), clock.get_ref())?;
            let filename = report_filename(ReportKind::Monthly, start, end);
            info!(%filename, days = month.chart.len(), "Monthly report exported");
            Ok(csv_response(&filename, csv))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/reports/student/{id}",
    params(("id" = u64, Path, description = "Student id"), HistoryQuery, FormatQuery),
    responses(
        (status = 200, description = "Student report as JSON or a CSV attachment"),
        (status = 404, description = "No data for a CSV export, or student not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn student_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    clock: web::Data<dyn Clock>,
    path: web::Path<u64>,
    query: web::Query<HistoryQuery>,
    format: web::Query<FormatQuery>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    let history = load_history(pool.get_ref(), &auth, path.into_inner(), &query).await?;

    match format.format {
        ReportFormat::Json => Ok(HttpResponse::Ok().json(history)),
        ReportFormat::Csv => {
            let csv = to_csv(&history.history, &student_columns(), clock.get_ref())?;
            // history is newest first and non-empty past to_csv
            let newest = history.history.first().map(|r| r.date).unwrap_or_else(today);
            let oldest = history.history.last().map(|r| r.date).unwrap_or(newest);
            let filename = report_filename(ReportKind::Student, oldest, newest);
            info!(%filename, days = history.history.len(), "Student report exported");
            Ok(csv_response(&filename, csv))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/reports/statistics",
    params(StatisticsQuery),
    responses(
        (status = 200, description = "Today, month-to-date, per-class and best-attendance rollup", body = ReportStatistics),
        (status = 404, description = "Class not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn report_statistics(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<StatisticsQuery>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    if let Some(class_id) = query.class_id {
        load_class(pool.get_ref(), class_id, &auth).await?;
    }

    let date = query.date.unwrap_or_else(today);
    let stats = load_statistics(pool.get_ref(), auth.school_id, query.class_id, date).await?;
    info!(%date, classes = stats.classes.len(), "Report statistics computed");
    Ok(HttpResponse::Ok().json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn format_defaults_to_json() {
        let q: FormatQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.format, ReportFormat::Json);
        let q: FormatQuery = serde_json::from_str(r#"{"format": "csv"}"#).unwrap();
        assert_eq!(q.format, ReportFormat::Csv);
    }

    #[actix_web::test]
    async fn csv_is_served_as_an_attachment() {
        let resp = csv_response("daily_report_2024-03-01.csv", "a,b".to_string());
        assert_eq!(
            resp.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=daily_report_2024-03-01.csv"
        );
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/csv; charset=utf-8"
        );
        let body = to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(&body[..], b"a,b");
    }
}
