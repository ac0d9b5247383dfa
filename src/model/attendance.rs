use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Attendance status as stored. Unknown literals are kept verbatim so they
/// still render, but they never count as present or absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Leave,
    #[strum(default)]
    Other(String),
}

impl AttendanceStatus {
    pub fn parse(value: &str) -> Self {
        Self::from_str(value.trim()).unwrap_or_else(|_| Self::Other(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Leave => "leave",
            AttendanceStatus::Other(literal) => literal,
        }
    }

    /// One of the four enumerated values.
    pub fn is_known(&self) -> bool {
        !matches!(self, AttendanceStatus::Other(_))
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AttendanceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AttendanceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(AttendanceStatus::parse(&raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecognitionMethod {
    Face,
    Manual,
}

impl RecognitionMethod {
    /// Maps every store spelling of an automatic capture onto `Face`.
    pub fn from_store(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "face" | "auto" | "online" | "offline_auto" => RecognitionMethod::Face,
            _ => RecognitionMethod::Manual,
        }
    }
}

/// Row shape returned by the attendance queries. Student columns come from a
/// LEFT JOIN, so `student_id` is NULL when the student no longer resolves.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttendanceRow {
    pub id: u64,
    pub student_id: Option<u64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roll_number: Option<String>,
    pub class_id: Option<u64>,
    pub class_name: Option<String>,
    pub date: NaiveDate,
    pub status: String,
    pub confidence: Option<f64>,
    pub recognition_method: String,
    pub marked_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
    pub offline_id: Option<String>,
}

/// Canonical attendance record. Everything downstream of the store works on
/// this shape only.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AttendanceRecord {
    #[schema(example = 41)]
    pub id: u64,
    #[schema(example = 7, nullable = true)]
    pub student_id: Option<u64>,
    #[schema(example = "Asha Rao", nullable = true)]
    pub student_name: Option<String>,
    #[schema(example = "12", nullable = true)]
    pub roll_number: Option<String>,
    #[schema(example = 3, nullable = true)]
    pub class_id: Option<u64>,
    #[schema(example = "Grade 5", nullable = true)]
    pub class_name: Option<String>,
    #[schema(example = "2024-03-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "present", value_type = String)]
    pub status: AttendanceStatus,
    #[schema(example = 0.93, nullable = true)]
    pub confidence: Option<f64>,
    #[schema(example = "face", value_type = String)]
    pub recognition_method: RecognitionMethod,
    #[schema(example = "2024-03-01T08:05:00Z", format = "date-time", value_type = String, nullable = true)]
    pub marked_at: Option<DateTime<Utc>>,
    #[schema(format = "date-time", value_type = String, nullable = true)]
    pub updated_at: Option<DateTime<Utc>>,
    #[schema(format = "date-time", value_type = String, nullable = true)]
    pub created_at: Option<DateTime<Utc>>,
    #[schema(nullable = true)]
    pub remarks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(nullable = true)]
    pub offline_id: Option<String>,
}

impl AttendanceRecord {
    /// Confidence only means something for face captures.
    pub fn trusted_confidence(&self) -> Option<f64> {
        match self.recognition_method {
            RecognitionMethod::Face => self.confidence,
            RecognitionMethod::Manual => None,
        }
    }

    pub fn class_display(&self) -> &str {
        self.class_name.as_deref().unwrap_or("Unknown")
    }

    pub fn student_display(&self) -> &str {
        self.student_name.as_deref().unwrap_or("Unknown")
    }
}
