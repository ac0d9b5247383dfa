use serde::Serialize;
use utoipa::ToSchema;

/// Account as listed to admins; never carries the password hash.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct User {
    #[schema(example = 5)]
    pub id: u64,
    #[schema(example = "priya.teacher")]
    pub username: String,
    /// 1 = admin, 2 = teacher
    #[schema(example = 2)]
    pub role_id: u8,
    #[schema(example = 1, nullable = true)]
    pub school_id: Option<u64>,
    pub is_active: bool,
}
