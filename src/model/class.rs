use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Class {
    #[schema(example = 3)]
    pub id: u64,
    #[schema(example = "Grade 5")]
    pub name: String,
    #[schema(example = 5)]
    pub grade: u8,
    #[schema(example = "A", nullable = true)]
    pub section: Option<String>,
    #[schema(example = 1)]
    pub school_id: u64,
}
