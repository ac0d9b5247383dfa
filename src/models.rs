use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Public self-registration. Always creates a teacher of an existing school.
#[derive(Deserialize, ToSchema)]
pub struct RegisterReq {
    #[schema(example = "priya.teacher")]
    pub username: String,
    pub password: String,
    /// Only 2 (teacher) is accepted; omitted means teacher
    #[schema(example = 2, nullable = true)]
    pub role_id: Option<u8>,
    #[schema(example = 1)]
    pub school_id: u64,
}

/// Public school onboarding: a new school plus its first admin.
#[derive(Deserialize, ToSchema)]
pub struct RegisterSchoolReq {
    #[schema(example = "Lakeside Primary")]
    pub school_name: String,
    #[schema(example = "LSP01")]
    pub school_code: String,
    #[schema(example = "lakeside.admin")]
    pub admin_username: String,
    pub admin_password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "priya.teacher")]
    pub username: String,
    pub password: String,
}

#[derive(FromRow)]
pub struct UserSql {
    pub id: u64,
    pub username: String,
    pub password: String,
    pub role_id: u8,
    pub school_id: Option<u64>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    pub role: u8, // role id
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
    /// School the account is scoped to; admins without one see every school
    pub school_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TokenType {
    Access,
    Refresh,
}
