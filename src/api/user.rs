use crate::{
    auth::auth::AuthUser,
    auth::handlers::is_username_available,
    auth::password::hash_password,
    error::{AppError, AppResult, Violation, violation},
    model::{role::Role, user::User},
    utils::username_filter::UsernameFilter,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

const USER_SELECT: &str = "SELECT id, username, role_id, school_id, is_active FROM users";

#[derive(Deserialize, ToSchema)]
pub struct CreateUser {
    #[schema(example = "ravi.teacher")]
    pub username: String,
    pub password: String,
    /// 2 (teacher, default) or 1 (admin, only for admins without a school)
    #[schema(example = 2, nullable = true)]
    pub role_id: Option<u8>,
    /// Required for admins without a school, else must be the admin's own
    #[schema(example = 1, nullable = true)]
    pub school_id: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateUser {
    /// New password
    #[schema(nullable = true)]
    pub password: Option<String>,
    #[schema(nullable = true)]
    pub is_active: Option<bool>,
}

/// School a new account is created under.
pub(crate) fn target_school(auth: &AuthUser, requested: Option<u64>) -> AppResult<u64> {
    match (auth.school_id, requested) {
        (Some(own), Some(other)) if own != other => Err(AppError::Forbidden(
            "Accounts can only be created in your own school".to_string(),
        )),
        (Some(own), _) => Ok(own),
        (None, Some(school_id)) => Ok(school_id),
        (None, None) => Err(AppError::BadRequest("school_id is required".to_string())),
    }
}

/// Role of a new account. School admins create teachers; admins without a
/// school may also create a school's admin.
pub(crate) fn created_role(auth: &AuthUser, role_id: Option<u8>) -> AppResult<Role> {
    match role_id.map(Role::from_id) {
        None | Some(Some(Role::Teacher)) => Ok(Role::Teacher),
        Some(Some(Role::Admin)) if auth.is_global_admin() => Ok(Role::Admin),
        Some(Some(Role::Admin)) => Err(AppError::Forbidden(
            "Only admins without a school may create admins".to_string(),
        )),
        Some(None) => Err(AppError::BadRequest("Unknown role id".to_string())),
    }
}

/// Accounts without a school are visible only to admins without a school.
pub(crate) fn can_manage(auth: &AuthUser, user: &User) -> bool {
    match user.school_id {
        Some(school_id) => auth.can_access_school(school_id),
        None => auth.is_global_admin(),
    }
}

async fn load_user(pool: &MySqlPool, user_id: u64, auth: &AuthUser) -> AppResult<User> {
    let user = sqlx::query_as::<_, User>(&format!("{USER_SELECT} WHERE id = ?"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    match user {
        Some(user) if can_manage(auth, &user) => Ok(user),
        _ => Err(AppError::NotFound("User not found".to_string())),
    }
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "Account created", body = User),
        (status = 400, description = "Missing fields or unknown role"),
        (status = 403, description = "Admin only, or outside the admin's school"),
        (status = 404, description = "School not found"),
        (status = 409, description = "Username already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    filter: web::Data<UsernameFilter>,
    payload: web::Json<CreateUser>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let school_id = target_school(&auth, payload.school_id)?;
    let role = created_role(&auth, payload.role_id)?;

    let username = payload.username.trim();
    if username.is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username and password must not be empty".to_string(),
        ));
    }

    if !is_username_available(username, &filter, pool.get_ref()).await? {
        return Ok(HttpResponse::Conflict().json(json!({
            "message": "Username already taken"
        })));
    }

    let hashed = hash_password(&payload.password)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;

    let result = sqlx::query("INSERT INTO users (username, password, role_id, school_id) VALUES (?, ?, ?, ?)")
        .bind(username)
        .bind(hashed)
        .bind(role as u8)
        .bind(school_id)
        .execute(pool.get_ref())
        .await;

    let id = match result {
        Ok(done) => done.last_insert_id(),
        Err(e) => {
            return match violation(&e) {
                Some(Violation::Unique) => {
                    filter.insert(username);
                    Ok(HttpResponse::Conflict().json(json!({
                        "message": "Username already taken"
                    })))
                }
                Some(Violation::ForeignKey) => Err(AppError::NotFound("School not found".to_string())),
                None => Err(e.into()),
            };
        }
    };

    filter.insert(username);
    info!(user_id = id, role = %role, school_id, created_by = auth.user_id, "Account created");

    Ok(HttpResponse::Created().json(User {
        id,
        username: username.to_string(),
        role_id: role as u8,
        school_id: Some(school_id),
        is_active: true,
    }))
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses((status = 200, description = "Accounts the caller manages", body = [User])),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let users = match auth.school_id {
        Some(school_id) => {
            sqlx::query_as::<_, User>(&format!("{USER_SELECT} WHERE school_id = ? ORDER BY username"))
                .bind(school_id)
                .fetch_all(pool.get_ref())
                .await?
        }
        None => {
            sqlx::query_as::<_, User>(&format!("{USER_SELECT} ORDER BY school_id, username"))
                .fetch_all(pool.get_ref())
                .await?
        }
    };

    Ok(HttpResponse::Ok().json(users))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "Account", body = User),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(auth: AuthUser, pool: web::Data<MySqlPool>, path: web::Path<u64>) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let user = load_user(pool.get_ref(), path.into_inner(), &auth).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User id")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "Updated account", body = User),
        (status = 400, description = "Nothing to update, empty password, or deactivating yourself"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateUser>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let user = load_user(pool.get_ref(), path.into_inner(), &auth).await?;

    if payload.password.is_none() && payload.is_active.is_none() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }
    if user.id == auth.user_id && payload.is_active == Some(false) {
        return Err(AppError::BadRequest("Cannot deactivate your own account".to_string()));
    }

    let hashed = match payload.password.as_deref() {
        Some("") => return Err(AppError::BadRequest("Password must not be empty".to_string())),
        Some(password) => Some(
            hash_password(password).map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?,
        ),
        None => None,
    };

    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE users SET password = COALESCE(?, password), is_active = COALESCE(?, is_active) WHERE id = ?")
        .bind(&hashed)
        .bind(payload.is_active)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

    // a password reset or deactivation ends existing sessions
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = ?")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let user = load_user(pool.get_ref(), user.id, &auth).await?;
    info!(user_id = user.id, updated_by = auth.user_id, "Account updated");
    Ok(HttpResponse::Ok().json(user))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "Account deleted; attendance it marked is kept"),
        (status = 400, description = "Cannot delete your own account"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn delete_user(auth: AuthUser, pool: web::Data<MySqlPool>, path: web::Path<u64>) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let user = load_user(pool.get_ref(), path.into_inner(), &auth).await?;
    if user.id == auth.user_id {
        return Err(AppError::BadRequest("Cannot delete your own account".to_string()));
    }

    // refresh tokens cascade; attendance.marked_by is set to NULL
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user.id)
        .execute(pool.get_ref())
        .await?;

    info!(user_id = user.id, deleted_by = auth.user_id, "Account deleted");
    Ok(HttpResponse::Ok().json(json!({
        "message": "User deleted"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin(school_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "admin".to_string(),
            role: Role::Admin,
            school_id,
        }
    }

    fn account(school_id: Option<u64>) -> User {
        User {
            id: 9,
            username: "ravi".to_string(),
            role_id: Role::Teacher as u8,
            school_id,
            is_active: true,
        }
    }

    #[test]
    fn school_admins_create_only_in_their_school() {
        let school_admin = admin(Some(1));
        assert_eq!(target_school(&school_admin, None).unwrap(), 1);
        assert_eq!(target_school(&school_admin, Some(1)).unwrap(), 1);
        assert!(matches!(target_school(&school_admin, Some(2)), Err(AppError::Forbidden(_))));

        let global = admin(None);
        assert_eq!(target_school(&global, Some(2)).unwrap(), 2);
        assert!(matches!(target_school(&global, None), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn only_global_admins_create_admins() {
        assert_eq!(created_role(&admin(Some(1)), None).unwrap(), Role::Teacher);
        assert!(matches!(created_role(&admin(Some(1)), Some(1)), Err(AppError::Forbidden(_))));
        assert_eq!(created_role(&admin(None), Some(1)).unwrap(), Role::Admin);
        assert!(matches!(created_role(&admin(None), Some(5)), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn accounts_are_managed_within_the_school() {
        assert!(can_manage(&admin(Some(1)), &account(Some(1))));
        assert!(!can_manage(&admin(Some(1)), &account(Some(2))));
        assert!(!can_manage(&admin(Some(1)), &account(None)));
        assert!(can_manage(&admin(None), &account(None)));
        assert!(can_manage(&admin(None), &account(Some(2))));
    }
}
