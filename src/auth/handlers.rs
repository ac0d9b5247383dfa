use crate::{
    auth::jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
    auth::password::{hash_password, verify_password},
    config::Config,
    error::{AppError, AppResult, Violation, violation},
    model::{role::Role, school::School},
    models::{Claims, LoginReqDto, RegisterReq, RegisterSchoolReq, TokenType, UserSql},
    utils::username_filter::UsernameFilter,
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    access_token: String,
    refresh_token: String,
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn token_error(e: jsonwebtoken::errors::Error) -> AppError {
    AppError::Internal(format!("token encoding failed: {e}"))
}

/// Stores a refresh token so it can later be rotated or revoked.
async fn store_refresh_token(pool: &MySqlPool, claims: &Claims) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(claims.user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool)
    .await?;
    Ok(())
}

async fn issue_pair(pool: &MySqlPool, config: &Config, subject: &TokenSubject) -> AppResult<LoginResponse> {
    let access_token =
        generate_access_token(subject, &config.jwt_secret, config.access_token_ttl).map_err(token_error)?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl).map_err(token_error)?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");
    store_refresh_token(pool, &refresh_claims).await?;

    Ok(LoginResponse {
        access_token,
        refresh_token,
    })
}

/// true  => username AVAILABLE
/// false => username TAKEN
pub async fn is_username_available(username: &str, filter: &UsernameFilter, pool: &MySqlPool) -> AppResult<bool> {
    // a filter miss is definitive
    if !filter.might_exist(username) {
        return Ok(true);
    }

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER(?) LIMIT 1)",
    )
    .bind(username)
    .fetch_one(pool)
    .await?;

    Ok(!exists)
}

/// Role granted by public self-registration. Admins are created only through
/// school onboarding or seeding.
pub(crate) fn self_registration_role(role_id: Option<u8>) -> AppResult<Role> {
    match role_id.map(Role::from_id) {
        None | Some(Some(Role::Teacher)) => Ok(Role::Teacher),
        Some(Some(Role::Admin)) => Err(AppError::Forbidden(
            "Admin accounts cannot be self-registered".to_string(),
        )),
        Some(None) => Err(AppError::BadRequest(format!(
            "Unknown role id {}",
            role_id.unwrap_or_default()
        ))),
    }
}

fn require_credentials<'a>(username: &'a str, password: &str) -> AppResult<&'a str> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AppError::BadRequest(
            "Username and password must not be empty".to_string(),
        ));
    }
    Ok(username)
}

/// School codes are stored upper-case; 2 to 20 letters, digits, `-` or `_`.
pub(crate) fn normalize_school_code(code: &str) -> AppResult<String> {
    let code = code.trim().to_ascii_uppercase();
    let valid = (2..=20).contains(&code.len())
        && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(AppError::BadRequest(
            "School code must be 2-20 letters, digits, '-' or '_'".to_string(),
        ));
    }
    Ok(code)
}

fn username_taken() -> HttpResponse {
    HttpResponse::Conflict().json(json!({
        "message": "Username already taken"
    }))
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Teacher registered", body = Object, example = json!({
            "message": "User registered successfully"
        })),
        (status = 400, description = "Missing username or password, or unknown role"),
        (status = 403, description = "Admin accounts cannot be self-registered"),
        (status = 404, description = "School not found"),
        (status = 409, description = "Username already taken")
    ),
    tag = "Auth"
)]
pub async fn register(
    user: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
    filter: web::Data<UsernameFilter>,
) -> AppResult<HttpResponse> {
    let username = require_credentials(&user.username, &user.password)?;
    let role = self_registration_role(user.role_id)?;

    let school_exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM schools WHERE id = ?)")
        .bind(user.school_id)
        .fetch_one(pool.get_ref())
        .await?;
    if !school_exists {
        return Err(AppError::NotFound("School not found".to_string()));
    }

    if !is_username_available(username, &filter, pool.get_ref()).await? {
        return Ok(username_taken());
    }

    let hashed = hash_password(&user.password)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;

    let result = sqlx::query(
        r#"INSERT INTO users (username, password, role_id, school_id) VALUES (?, ?, ?, ?)"#,
    )
    .bind(username)
    .bind(hashed)
    .bind(role as u8)
    .bind(user.school_id)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => {
            filter.insert(username);
            info!(username, role = %role, school_id = user.school_id, "User registered");
            Ok(HttpResponse::Created().json(json!({
                "message": "User registered successfully"
            })))
        }
        Err(e) => match violation(&e) {
            Some(Violation::Unique) => {
                filter.insert(username);
                Ok(username_taken())
            }
            // school removed between the check and the insert
            Some(Violation::ForeignKey) => Err(AppError::NotFound("School not found".to_string())),
            None => Err(e.into()),
        },
    }
}

#[utoipa::path(
    post,
    path = "/auth/register-school",
    request_body = RegisterSchoolReq,
    responses(
        (status = 201, description = "School and its admin created", body = School),
        (status = 400, description = "Missing or invalid fields"),
        (status = 409, description = "School code or username already taken")
    ),
    tag = "Auth"
)]
pub async fn register_school(
    req: web::Json<RegisterSchoolReq>,
    pool: web::Data<MySqlPool>,
    filter: web::Data<UsernameFilter>,
) -> AppResult<HttpResponse> {
    let name = req.school_name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("School name is required".to_string()));
    }
    let code = normalize_school_code(&req.school_code)?;
    let username = require_credentials(&req.admin_username, &req.admin_password)?;

    if !is_username_available(username, &filter, pool.get_ref()).await? {
        return Ok(username_taken());
    }

    let hashed = hash_password(&req.admin_password)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;

    let mut tx = pool.begin().await?;

    let school_id = match sqlx::query("INSERT INTO schools (name, code) VALUES (?, ?)")
        .bind(name)
        .bind(&code)
        .execute(&mut *tx)
        .await
    {
        Ok(done) => done.last_insert_id(),
        Err(e) if violation(&e) == Some(Violation::Unique) => {
            return Ok(HttpResponse::Conflict().json(json!({
                "message": "School with this code already exists"
            })));
        }
        Err(e) => return Err(e.into()),
    };

    let admin = sqlx::query("INSERT INTO users (username, password, role_id, school_id) VALUES (?, ?, ?, ?)")
        .bind(username)
        .bind(hashed)
        .bind(Role::Admin as u8)
        .bind(school_id)
        .execute(&mut *tx)
        .await;
    match admin {
        Ok(_) => {}
        Err(e) if violation(&e) == Some(Violation::Unique) => {
            filter.insert(username);
            return Ok(username_taken());
        }
        Err(e) => return Err(e.into()),
    }

    tx.commit().await?;
    filter.insert(username);
    info!(school_id, code = %code, admin = username, "School registered");

    Ok(HttpResponse::Created().json(School {
        id: school_id,
        name: name.to_string(),
        code,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair issued", body = LoginResponse),
        (status = 400, description = "Username or password required"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(AppError::BadRequest("Username or password required".to_string()));
    }

    let db_user = sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, username, password, role_id, school_id, is_active
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim())
    .fetch_optional(pool.get_ref())
    .await?;

    let db_user = match db_user {
        Some(u) if u.is_active => u,
        Some(_) => {
            info!("Invalid credentials: account disabled");
            return Ok(HttpResponse::Unauthorized().json(json!({"message": "Invalid credentials"})));
        }
        None => {
            info!("Invalid credentials: user not found");
            return Ok(HttpResponse::Unauthorized().json(json!({"message": "Invalid credentials"})));
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Ok(HttpResponse::Unauthorized().json(json!({"message": "Invalid credentials"})));
    }

    let subject = TokenSubject {
        user_id: db_user.id,
        username: db_user.username.clone(),
        role: db_user.role_id,
        school_id: db_user.school_id,
    };
    let tokens = issue_pair(pool.get_ref(), &config, &subject).await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // not fatal for the login itself
        error!(error = %e, "Failed to update last_login_at");
    }

    info!("Login successful");
    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Rotated token pair", body = LoginResponse),
        (status = 401, description = "Missing, invalid or revoked refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let Some(token) = bearer(&req) else {
        return Ok(HttpResponse::Unauthorized().json(json!({"message": "No token"})));
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return Ok(HttpResponse::Unauthorized().finish()),
    };

    let record = sqlx::query_as::<_, (u64, bool)>(
        r#"
        SELECT id, revoked
        FROM refresh_tokens
        WHERE jti = ?
        "#,
    )
    .bind(&claims.jti)
    .fetch_optional(pool.get_ref())
    .await?;

    let token_id = match record {
        Some((id, false)) => id,
        _ => return Ok(HttpResponse::Unauthorized().finish()),
    };

    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
        .bind(token_id)
        .execute(pool.get_ref())
        .await?;

    let tokens = issue_pair(pool.get_ref(), &config, &TokenSubject::from(&claims)).await?;
    debug!(user_id = claims.user_id, "Refresh token rotated");

    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Refresh token revoked, if it existed")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    // idempotent
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;
    use actix_web::http::StatusCode;

    #[test]
    fn self_registration_never_grants_admin() {
        assert_eq!(self_registration_role(None).unwrap(), Role::Teacher);
        assert_eq!(self_registration_role(Some(2)).unwrap(), Role::Teacher);

        let err = self_registration_role(Some(1)).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        let err = self_registration_role(Some(9)).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn registration_requires_a_school() {
        let without_school = r#"{"username": "priya", "password": "pw", "role_id": 1}"#;
        assert!(serde_json::from_str::<RegisterReq>(without_school).is_err());

        let with_school = r#"{"username": "priya", "password": "pw", "school_id": 4}"#;
        let req: RegisterReq = serde_json::from_str(with_school).unwrap();
        assert_eq!(req.school_id, 4);
        assert_eq!(req.role_id, None);
    }

    #[test]
    fn blank_credentials_are_rejected() {
        assert_eq!(require_credentials("  priya ", "pw").unwrap(), "priya");
        assert!(require_credentials("   ", "pw").is_err());
        assert!(require_credentials("priya", "").is_err());
    }

    #[test]
    fn school_codes_are_upper_cased_and_checked() {
        assert_eq!(normalize_school_code(" lsp-01 ").unwrap(), "LSP-01");
        assert!(normalize_school_code("x").is_err());
        assert!(normalize_school_code("has space").is_err());
        assert!(normalize_school_code(&"A".repeat(21)).is_err());
    }
}
