use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 7,
        "roll_number": "12",
        "first_name": "Asha",
        "last_name": "Rao",
        "class_id": 3,
        "school_id": 1,
        "is_active": true,
        "face_registered": false,
        "face_person_id": null
    })
)]
pub struct Student {
    #[schema(example = 7)]
    pub id: u64,

    #[schema(example = "12")]
    pub roll_number: String,

    #[schema(example = "Asha")]
    pub first_name: String,

    #[schema(example = "Rao", nullable = true)]
    pub last_name: Option<String>,

    #[schema(example = 3)]
    pub class_id: u64,

    #[schema(example = 1)]
    pub school_id: u64,

    pub is_active: bool,

    pub face_registered: bool,

    /// Subject id at the recognition gateway
    #[schema(nullable = true)]
    pub face_person_id: Option<String>,
}

/// Minimal roster entry used while ingesting attendance.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RosterEntry {
    pub id: u64,
    pub roll_number: String,
    pub first_name: String,
    pub last_name: Option<String>,
}
