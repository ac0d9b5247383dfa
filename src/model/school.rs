use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct School {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Lakeside Primary")]
    pub name: String,
    /// Unique upper-case code
    #[schema(example = "LSP01")]
    pub code: String,
}
