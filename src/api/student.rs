use crate::{
    api::class::load_class,
    auth::auth::AuthUser,
    error::{AppError, AppResult, Violation, violation},
    gateway::{Registration, Verification, luxand::LuxandClient},
    model::student::Student,
    utils::db_utils::{build_update_sql, execute_update},
    utils::roster_cache::RosterCache,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

const UPDATABLE_COLUMNS: [&str; 5] = ["roll_number", "first_name", "last_name", "class_id", "is_active"];

const STUDENT_SELECT: &str = r#"
    SELECT id, roll_number, first_name, last_name, class_id, school_id,
           is_active, face_registered, face_person_id
    FROM students
"#;

#[derive(Deserialize, ToSchema)]
pub struct CreateStudent {
    #[schema(example = "12")]
    pub roll_number: String,
    #[schema(example = "Asha")]
    pub first_name: String,
    #[schema(example = "Rao", nullable = true)]
    pub last_name: Option<String>,
    #[schema(example = 3)]
    pub class_id: u64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StudentQuery {
    /// Restrict to one class
    pub class_id: Option<u64>,
    /// Include deactivated students
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct FaceImage {
    /// Base64 image or `data:` URL
    pub image: String,
}

/// Target class of a PUT body. A `class_id` that is present must be a
/// non-negative integer.
pub(crate) fn requested_class_id(payload: &Value) -> AppResult<Option<u64>> {
    match payload.get("class_id") {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| AppError::BadRequest("class_id must be an integer".to_string())),
    }
}

fn roll_number_taken() -> HttpResponse {
    HttpResponse::Conflict().json(json!({
        "message": "Roll number already used in this class"
    }))
}

pub(crate) async fn load_student(pool: &MySqlPool, student_id: u64, auth: &AuthUser) -> AppResult<Student> {
    let student = sqlx::query_as::<_, Student>(&format!("{STUDENT_SELECT} WHERE id = ?"))
        .bind(student_id)
        .fetch_optional(pool)
        .await?;

    match student {
        Some(student) if auth.can_access_school(student.school_id) => Ok(student),
        _ => Err(AppError::NotFound("Student not found".to_string())),
    }
}

#[utoipa::path(
    post,
    path = "/api/students",
    request_body = CreateStudent,
    responses(
        (status = 201, description = "Student created", body = Student),
        (status = 404, description = "Class not found"),
        (status = 409, description = "Roll number already used in the class")
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
pub async fn create_student(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    rosters: web::Data<RosterCache>,
    payload: web::Json<CreateStudent>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    let class = load_class(pool.get_ref(), payload.class_id, &auth).await?;

    let roll_number = payload.roll_number.trim();
    let first_name = payload.first_name.trim();
    if roll_number.is_empty() || first_name.is_empty() {
        return Err(AppError::BadRequest(
            "Roll number and first name are required".to_string(),
        ));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO students (roll_number, first_name, last_name, class_id, school_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(roll_number)
    .bind(first_name)
    .bind(&payload.last_name)
    .bind(class.id)
    .bind(class.school_id)
    .execute(pool.get_ref())
    .await;

    let result = match result {
        Ok(r) => r,
        Err(e) if violation(&e) == Some(Violation::Unique) => return Ok(roll_number_taken()),
        Err(e) => return Err(e.into()),
    };

    rosters.invalidate(class.id).await;

    let student = Student {
        id: result.last_insert_id(),
        roll_number: roll_number.to_string(),
        first_name: first_name.to_string(),
        last_name: payload.last_name.clone(),
        class_id: class.id,
        school_id: class.school_id,
        is_active: true,
        face_registered: false,
        face_person_id: None,
    };
    info!(student_id = student.id, class_id = class.id, "Student created");

    Ok(HttpResponse::Created().json(student))
}

#[utoipa::path(
    get,
    path = "/api/students",
    params(StudentQuery),
    responses((status = 200, description = "Students ordered by class and roll number", body = [Student])),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
pub async fn list_students(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<StudentQuery>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;

    let mut conditions = Vec::new();
    if auth.school_id.is_some() {
        conditions.push("school_id = ?");
    }
    if query.class_id.is_some() {
        conditions.push("class_id = ?");
    }
    if !query.include_inactive {
        conditions.push("is_active = TRUE");
    }

    let where_sql = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    let sql = format!("{STUDENT_SELECT} {where_sql} ORDER BY class_id, roll_number");
    debug!(sql = %sql, "Listing students");

    let mut q = sqlx::query_as::<_, Student>(&sql);
    if let Some(school_id) = auth.school_id {
        q = q.bind(school_id);
    }
    if let Some(class_id) = query.class_id {
        q = q.bind(class_id);
    }

    let students = q.fetch_all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(students))
}

#[utoipa::path(
    get,
    path = "/api/students/{id}",
    params(("id" = u64, Path, description = "Student id")),
    responses(
        (status = 200, description = "Student", body = Student),
        (status = 404, description = "Student not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
pub async fn get_student(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    let student = load_student(pool.get_ref(), path.into_inner(), &auth).await?;
    Ok(HttpResponse::Ok().json(student))
}

#[utoipa::path(
    put,
    path = "/api/students/{id}",
    params(("id" = u64, Path, description = "Student id")),
    request_body(content = Object, description = "Any of roll_number, first_name, last_name, class_id, is_active"),
    responses(
        (status = 200, description = "Updated student", body = Student),
        (status = 400, description = "Unknown or invalid field"),
        (status = 404, description = "Student or target class not found"),
        (status = 409, description = "Roll number already used in the class")
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
pub async fn update_student(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    rosters: web::Data<RosterCache>,
    path: web::Path<u64>,
    payload: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    let student_id = path.into_inner();
    let before = load_student(pool.get_ref(), student_id, &auth).await?;

    // moving a student must not cross into another school's class
    let target_class = requested_class_id(&payload)?;
    if let Some(class_id) = target_class {
        let class = load_class(pool.get_ref(), class_id, &auth).await?;
        if class.school_id != before.school_id {
            return Err(AppError::BadRequest("Class belongs to another school".to_string()));
        }
    }

    let update = build_update_sql("students", &payload, &UPDATABLE_COLUMNS, "id", student_id)?;
    match execute_update(pool.get_ref(), update).await {
        Ok(_) => {}
        Err(e) if violation(&e) == Some(Violation::Unique) => return Ok(roll_number_taken()),
        Err(e) => return Err(e.into()),
    }

    rosters.invalidate(before.class_id).await;
    if let Some(class_id) = target_class {
        rosters.invalidate(class_id).await;
    }

    let after = load_student(pool.get_ref(), student_id, &auth).await?;
    Ok(HttpResponse::Ok().json(after))
}

#[utoipa::path(
    delete,
    path = "/api/students/{id}",
    params(("id" = u64, Path, description = "Student id")),
    responses(
        (status = 200, description = "Student deactivated; attendance history is kept"),
        (status = 404, description = "Student not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
pub async fn delete_student(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    rosters: web::Data<RosterCache>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let student = load_student(pool.get_ref(), path.into_inner(), &auth).await?;

    sqlx::query("UPDATE students SET is_active = FALSE WHERE id = ?")
        .bind(student.id)
        .execute(pool.get_ref())
        .await?;
    rosters.invalidate(student.class_id).await;

    info!(student_id = student.id, "Student deactivated");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Student deactivated"
    })))
}

#[utoipa::path(
    post,
    path = "/api/students/{id}/face",
    params(("id" = u64, Path, description = "Student id")),
    request_body = FaceImage,
    responses(
        (status = 200, description = "Face registered with the recognition service", body = Registration),
        (status = 400, description = "Image could not be decoded"),
        (status = 502, description = "Recognition service failed"),
        (status = 503, description = "Recognition service not configured")
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
pub async fn register_face(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    gateway: web::Data<LuxandClient>,
    path: web::Path<u64>,
    payload: web::Json<FaceImage>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    let student = load_student(pool.get_ref(), path.into_inner(), &auth).await?;

    // recognition results carry this name back as the student id
    let registration = gateway
        .register_person(&student.id.to_string(), &payload.image)
        .await?;

    sqlx::query("UPDATE students SET face_person_id = ?, face_registered = TRUE WHERE id = ?")
        .bind(&registration.person_id)
        .bind(student.id)
        .execute(pool.get_ref())
        .await?;

    info!(
        student_id = student.id,
        person_id = %registration.person_id,
        "Face registered"
    );
    Ok(HttpResponse::Ok().json(registration))
}

#[utoipa::path(
    post,
    path = "/api/students/{id}/face/verify",
    params(("id" = u64, Path, description = "Student id")),
    request_body = FaceImage,
    responses(
        (status = 200, description = "Verification verdict", body = Verification),
        (status = 400, description = "Student has no registered face"),
        (status = 502, description = "Recognition service failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
pub async fn verify_face(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    gateway: web::Data<LuxandClient>,
    path: web::Path<u64>,
    payload: web::Json<FaceImage>,
) -> AppResult<HttpResponse> {
    auth.require_teacher_or_admin()?;
    let student = load_student(pool.get_ref(), path.into_inner(), &auth).await?;

    let person_id = student
        .face_person_id
        .as_deref()
        .filter(|_| student.face_registered)
        .ok_or_else(|| AppError::BadRequest("Student has no registered face".to_string()))?;

    let verdict = gateway.verify(person_id, &payload.image).await?;
    debug!(student_id = student.id, matched = verdict.matched, "Face verified");

    Ok(HttpResponse::Ok().json(verdict))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_id_must_be_an_integer_when_present() {
        assert_eq!(requested_class_id(&json!({"first_name": "Asha"})).unwrap(), None);
        assert_eq!(requested_class_id(&json!({"class_id": 5})).unwrap(), Some(5));

        for bad in [json!({"class_id": "5"}), json!({"class_id": null}), json!({"class_id": -1}), json!({"class_id": 2.5})] {
            let err = requested_class_id(&bad).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)));
        }
    }
}
