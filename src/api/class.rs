use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::class::Class,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

const GRADES: std::ops::RangeInclusive<u8> = 1..=12;

#[derive(Deserialize, ToSchema)]
pub struct CreateClass {
    #[schema(example = "Grade 5")]
    pub name: String,
    #[schema(example = 5)]
    pub grade: u8,
    #[schema(example = "A", nullable = true)]
    pub section: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateClass {
    #[schema(example = "Grade 5", nullable = true)]
    pub name: Option<String>,
    #[schema(example = 5, nullable = true)]
    pub grade: Option<u8>,
    /// A blank string clears the section
    #[schema(example = "B", nullable = true)]
    pub section: Option<String>,
}

fn check_grade(grade: u8) -> AppResult<u8> {
    if GRADES.contains(&grade) {
        Ok(grade)
    } else {
        Err(AppError::BadRequest("Grade must be between 1 and 12".to_string()))
    }
}

fn clean_section(section: Option<&str>) -> Option<String> {
    section.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Validated change set of an update: `None` keeps the stored value, and
/// `section: Some(None)` clears it.
#[derive(Debug, PartialEq)]
pub(crate) struct ClassChange {
    pub name: Option<String>,
    pub grade: Option<u8>,
    pub section: Option<Option<String>>,
}

impl UpdateClass {
    pub(crate) fn change(&self) -> AppResult<ClassChange> {
        if self.name.is_none() && self.grade.is_none() && self.section.is_none() {
            return Err(AppError::BadRequest("Nothing to update".to_string()));
        }
        let name = match self.name.as_deref().map(str::trim) {
            Some("") => return Err(AppError::BadRequest("Class name cannot be empty".to_string())),
            other => other.map(str::to_string),
        };
        Ok(ClassChange {
            name,
            grade: self.grade.map(check_grade).transpose()?,
            section: self.section.as_deref().map(|s| clean_section(Some(s))),
        })
    }
}

/// Loads a class the caller is allowed to see. Classes of other schools read
/// as missing.
pub(crate) async fn load_class(pool: &MySqlPool, class_id: u64, auth: &AuthUser) -> AppResult<Class> {
    let class = sqlx::query_as::<_, Class>(
        "SELECT id, name, grade, section, school_id FROM classes WHERE id = ?",
    )
    .bind(class_id)
    .fetch_optional(pool)
    .await?;

    match class {
        Some(class) if auth.can_access_school(class.school_id) => Ok(class),
        _ => Err(AppError::NotFound("Class not found".to_string())),
    }
}

#[utoipa::path(
    post,
    path = "/api/classes",
    request_body = CreateClass,
    responses(
        (status = 201, description = "Class created", body = Class),
        (status = 400, description = "Invalid class"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Classes"
)]
pub async fn create_class(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateClass>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let school_id = auth.owning_school()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Class name is required".to_string()));
    }
    check_grade(payload.grade)?;
    let section = clean_section(payload.section.as_deref());

    let result = sqlx::query(
        "INSERT INTO classes (name, grade, section, school_id) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(payload.grade)
    .bind(&section)
    .bind(school_id)
    .execute(pool.get_ref())
    .await?;

    let class = Class {
        id: result.last_insert_id(),
        name: name.to_string(),
        grade: payload.grade,
        section,
        school_id,
    };
    info!(class_id = class.id, school_id, "Class created");

    Ok(HttpResponse::Created().json(class))
}

#[utoipa::path(
    get,
    path = "/api/classes",
    responses((status = 200, description = "Classes of the caller's school", body = [Class])),
    security(("bearer_auth" = [])),
    tag = "Classes"
)]
pub async fn list_classes(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;

    let classes = match auth.school_id {
        Some(school_id) => {
            sqlx::query_as::<_, Class>(
                r#"
                SELECT id, name, grade, section, school_id
                FROM classes
                WHERE school_id = ?
                ORDER BY grade, name, section
                "#,
            )
            .bind(school_id)
            .fetch_all(pool.get_ref())
            .await?
        }
        None => {
            sqlx::query_as::<_, Class>(
                "SELECT id, name, grade, section, school_id FROM classes ORDER BY school_id, grade, name, section",
            )
            .fetch_all(pool.get_ref())
            .await?
        }
    };

    Ok(HttpResponse::Ok().json(classes))
}

#[utoipa::path(
    get,
    path = "/api/classes/{id}",
    params(("id" = u64, Path, description = "Class id")),
    responses(
        (status = 200, description = "Class", body = Class),
        (status = 404, description = "Class not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Classes"
)]
pub async fn get_class(auth: AuthUser, pool: web::Data<MySqlPool>, path: web::Path<u64>) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    let class = load_class(pool.get_ref(), path.into_inner(), &auth).await?;
    Ok(HttpResponse::Ok().json(class))
}

#[utoipa::path(
    put,
    path = "/api/classes/{id}",
    params(("id" = u64, Path, description = "Class id")),
    request_body = UpdateClass,
    responses(
        (status = 200, description = "Updated class", body = Class),
        (status = 400, description = "Nothing to update or invalid grade"),
        (status = 404, description = "Class not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Classes"
)]
pub async fn update_class(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateClass>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    let change = payload.change()?;
    let class = load_class(pool.get_ref(), path.into_inner(), &auth).await?;

    sqlx::query(
        r#"
        UPDATE classes
        SET name = COALESCE(?, name),
            grade = COALESCE(?, grade),
            section = IF(?, ?, section)
        WHERE id = ?
        "#,
    )
    .bind(&change.name)
    .bind(change.grade)
    .bind(change.section.is_some())
    .bind(change.section.flatten())
    .bind(class.id)
    .execute(pool.get_ref())
    .await?;

    let class = load_class(pool.get_ref(), class.id, &auth).await?;
    info!(class_id = class.id, user_id = auth.user_id, "Class updated");
    Ok(HttpResponse::Ok().json(class))
}

#[utoipa::path(
    delete,
    path = "/api/classes/{id}",
    params(("id" = u64, Path, description = "Class id")),
    responses(
        (status = 200, description = "Class deleted"),
        (status = 404, description = "Class not found"),
        (status = 409, description = "Class still has students")
    ),
    security(("bearer_auth" = [])),
    tag = "Classes"
)]
pub async fn delete_class(auth: AuthUser, pool: web::Data<MySqlPool>, path: web::Path<u64>) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let class = load_class(pool.get_ref(), path.into_inner(), &auth).await?;

    // deactivated students still reference the class
    let students = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM students WHERE class_id = ?")
        .bind(class.id)
        .fetch_one(pool.get_ref())
        .await?;
    if students > 0 {
        return Ok(HttpResponse::Conflict().json(json!({
            "message": "Cannot delete a class with students; reassign them first"
        })));
    }

    sqlx::query("DELETE FROM classes WHERE id = ?")
        .bind(class.id)
        .execute(pool.get_ref())
        .await?;

    info!(class_id = class.id, "Class deleted");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Class deleted"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(name: Option<&str>, grade: Option<u8>, section: Option<&str>) -> UpdateClass {
        UpdateClass {
            name: name.map(str::to_string),
            grade,
            section: section.map(str::to_string),
        }
    }

    #[test]
    fn grades_outside_one_to_twelve_are_rejected() {
        assert!(check_grade(1).is_ok());
        assert!(check_grade(12).is_ok());
        assert!(check_grade(0).is_err());
        assert!(check_grade(13).is_err());
    }

    #[test]
    fn class_change_keeps_clears_and_validates() {
        let change = update(Some(" Grade 6 "), None, Some("  ")).change().unwrap();
        assert_eq!(
            change,
            ClassChange {
                name: Some("Grade 6".to_string()),
                grade: None,
                section: Some(None),
            }
        );

        let change = update(None, Some(4), None).change().unwrap();
        assert_eq!(change.section, None);
        assert_eq!(change.grade, Some(4));

        assert!(update(None, None, None).change().is_err());
        assert!(update(Some("  "), None, None).change().is_err());
        assert!(update(None, Some(14), None).change().is_err());
    }
}
