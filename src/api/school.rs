use crate::{
    api::attendance::today,
    api::report::load_statistics,
    attendance::reconcile::DayStats,
    attendance::stats::ClassRate,
    auth::auth::AuthUser,
    auth::handlers::normalize_school_code,
    error::{AppError, AppResult, Violation, violation},
    model::{role::Role, school::School},
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

const SCHOOL_SELECT: &str = "SELECT id, name, code FROM schools";

#[derive(Deserialize, ToSchema)]
pub struct CreateSchool {
    #[schema(example = "Lakeside Primary")]
    pub name: String,
    #[schema(example = "LSP01")]
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow, ToSchema)]
pub struct ClassSize {
    pub id: u64,
    #[schema(example = "Grade 5")]
    pub name: String,
    pub grade: u8,
    #[schema(nullable = true)]
    pub section: Option<String>,
    /// Active students
    pub student_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct FaceRegistration {
    pub registered: u64,
    pub pending: u64,
    pub total: u64,
}

impl FaceRegistration {
    /// Counts come straight from `COUNT(..)`, which MySQL returns signed.
    pub fn from_counts(registered: i64, total: i64) -> Self {
        let total = total.max(0) as u64;
        let registered = (registered.max(0) as u64).min(total);
        Self {
            registered,
            pending: total - registered,
            total,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SchoolDashboard {
    pub school: School,
    pub today: DayStats,
    pub classes: Vec<ClassSize>,
    /// Month-to-date attendance per class
    pub class_rates: Vec<ClassRate>,
    /// Active teachers
    pub teachers: i64,
    pub face_registration: FaceRegistration,
}

async fn load_school(pool: &MySqlPool, school_id: u64, auth: &AuthUser) -> AppResult<School> {
    let school = sqlx::query_as::<_, School>(&format!("{SCHOOL_SELECT} WHERE id = ?"))
        .bind(school_id)
        .fetch_optional(pool)
        .await?;

    match school {
        Some(school) if auth.can_access_school(school.id) => Ok(school),
        _ => Err(AppError::NotFound("School not found".to_string())),
    }
}

#[utoipa::path(
    post,
    path = "/api/schools",
    request_body = CreateSchool,
    responses(
        (status = 201, description = "School created", body = School),
        (status = 400, description = "Missing name or invalid code"),
        (status = 403, description = "Only admins without a school may create schools"),
        (status = 409, description = "School code already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Schools"
)]
pub async fn create_school(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateSchool>,
) -> AppResult<HttpResponse> {
    if !auth.is_global_admin() {
        return Err(AppError::Forbidden(
            "Only admins without a school may create schools".to_string(),
        ));
    }

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("School name is required".to_string()));
    }
    let code = normalize_school_code(&payload.code)?;

    let result = sqlx::query("INSERT INTO schools (name, code) VALUES (?, ?)")
        .bind(name)
        .bind(&code)
        .execute(pool.get_ref())
        .await;
    let id = match result {
        Ok(done) => done.last_insert_id(),
        Err(e) if violation(&e) == Some(Violation::Unique) => {
            return Ok(HttpResponse::Conflict().json(json!({
                "message": "School with this code already exists"
            })));
        }
        Err(e) => return Err(e.into()),
    };

    info!(school_id = id, code = %code, "School created");
    Ok(HttpResponse::Created().json(School {
        id,
        name: name.to_string(),
        code,
    }))
}

#[utoipa::path(
    get,
    path = "/api/schools",
    responses((status = 200, description = "Every school for an admin without a school, else the caller's own", body = [School])),
    security(("bearer_auth" = [])),
    tag = "Schools"
)]
pub async fn list_schools(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;

    let schools = match auth.school_id {
        Some(school_id) => {
            sqlx::query_as::<_, School>(&format!("{SCHOOL_SELECT} WHERE id = ?"))
                .bind(school_id)
                .fetch_all(pool.get_ref())
                .await?
        }
        None => {
            sqlx::query_as::<_, School>(&format!("{SCHOOL_SELECT} ORDER BY name"))
                .fetch_all(pool.get_ref())
                .await?
        }
    };

    Ok(HttpResponse::Ok().json(schools))
}

#[utoipa::path(
    get,
    path = "/api/schools/{id}",
    params(("id" = u64, Path, description = "School id")),
    responses(
        (status = 200, description = "School", body = School),
        (status = 404, description = "School not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Schools"
)]
pub async fn get_school(auth: AuthUser, pool: web::Data<MySqlPool>, path: web::Path<u64>) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    let school = load_school(pool.get_ref(), path.into_inner(), &auth).await?;
    Ok(HttpResponse::Ok().json(school))
}

#[utoipa::path(
    get,
    path = "/api/schools/{id}/dashboard",
    params(("id" = u64, Path, description = "School id")),
    responses(
        (status = 200, description = "Today's attendance, classes, teachers and face registration progress", body = SchoolDashboard),
        (status = 404, description = "School not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Schools"
)]
pub async fn school_dashboard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    let pool = pool.get_ref();
    let school = load_school(pool, path.into_inner(), &auth).await?;

    let stats = load_statistics(pool, Some(school.id), None, today()).await?;

    let classes = sqlx::query_as::<_, ClassSize>(
        r#"
        SELECT c.id, c.name, c.grade, c.section, COUNT(s.id) AS student_count
        FROM classes c
        LEFT JOIN students s ON s.class_id = c.id AND s.is_active
        WHERE c.school_id = ?
        GROUP BY c.id, c.name, c.grade, c.section
        ORDER BY c.grade, c.name, c.section
        "#,
    )
    .bind(school.id)
    .fetch_all(pool)
    .await?;

    let teachers = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM users WHERE school_id = ? AND role_id = ? AND is_active",
    )
    .bind(school.id)
    .bind(Role::Teacher as u8)
    .fetch_one(pool)
    .await?;

    let (registered, total) = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT COUNT(CASE WHEN face_registered THEN 1 END), COUNT(*)
        FROM students
        WHERE school_id = ? AND is_active
        "#,
    )
    .bind(school.id)
    .fetch_one(pool)
    .await?;

    Ok(HttpResponse::Ok().json(SchoolDashboard {
        school,
        today: stats.today,
        classes,
        class_rates: stats.classes,
        teachers,
        face_registration: FaceRegistration::from_counts(registered, total),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_registration_splits_registered_and_pending() {
        assert_eq!(
            FaceRegistration::from_counts(7, 20),
            FaceRegistration {
                registered: 7,
                pending: 13,
                total: 20
            }
        );
        assert_eq!(FaceRegistration::from_counts(0, 0).pending, 0);
        assert_eq!(FaceRegistration::from_counts(5, 3).pending, 0);
    }
}
