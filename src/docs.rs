use crate::api::attendance::{
    DailyResponse, MarkRequest, MarkResponse, MarkedStudent, RecognizeRequest, RecognizeResponse,
    SyncRequest, SyncResponse, UpdateAttendance,
};
use crate::api::class::{CreateClass, UpdateClass};
use crate::api::school::{ClassSize, CreateSchool, FaceRegistration, SchoolDashboard};
use crate::api::student::{CreateStudent, FaceImage};
use crate::api::user::{CreateUser, UpdateUser};
use crate::attendance::history::{StudentHistory, StudentSummary};
use crate::attendance::ingest::{MarkEntry, RejectedEntry};
use crate::attendance::monthly::{DailyPoint, DayRate, MonthlySummary, StatusCount};
use crate::attendance::reconcile::DayStats;
use crate::attendance::stats::{ClassRate, ReportStatistics, StudentRate};
use crate::auth::handlers::LoginResponse;
use crate::gateway::{Candidate, Registration, Verification};
use crate::model::attendance::AttendanceRecord;
use crate::model::class::Class;
use crate::model::school::School;
use crate::model::user::User;
use crate::model::student::Student;
use crate::models::{LoginReqDto, RegisterReq, RegisterSchoolReq};
use crate::sync::queue::SyncFailure;
use crate::sync::{OfflinePayload, QueuedSubmission, SyncReport};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "School Attendance API",
        version = "1.0.0",
        description = r#"
## School Attendance Service

Backend for classroom attendance: capture by hand or from a class photo,
verify and correct the day's register, and report by day, month or student.

### Key Features
- **Attendance capture**
  - Manual marking per student, or one photo matched by the face recognition service
  - Replay of submissions captured while a device was offline
- **Verification**
  - One authoritative record per student per day, latest submission wins
- **Reports**
  - Daily, monthly and per-student views as JSON or CSV downloads
- **Schools, staff, students and classes**
  - School onboarding, teacher accounts, rosters and face registration
  - Statistics and a per-school dashboard

### Security
Endpoints under `/api` need a JWT access token (`Authorization: Bearer ...`).
Tokens are issued by `/auth/login` and rotated with `/auth/refresh`.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::register_school,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::attendance::mark_attendance,
        crate::api::attendance::recognize_attendance,
        crate::api::attendance::daily_attendance,
        crate::api::attendance::monthly_attendance,
        crate::api::attendance::student_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::sync_offline,

        crate::api::report::daily_report,
        crate::api::report::monthly_report,
        crate::api::report::student_report,
        crate::api::report::report_statistics,

        crate::api::student::create_student,
        crate::api::student::list_students,
        crate::api::student::get_student,
        crate::api::student::update_student,
        crate::api::student::delete_student,
        crate::api::student::register_face,
        crate::api::student::verify_face,

        crate::api::class::create_class,
        crate::api::class::list_classes,
        crate::api::class::get_class,
        crate::api::class::update_class,
        crate::api::class::delete_class,

        crate::api::school::create_school,
        crate::api::school::list_schools,
        crate::api::school::get_school,
        crate::api::school::school_dashboard,

        crate::api::user::create_user,
        crate::api::user::list_users,
        crate::api::user::get_user,
        crate::api::user::update_user,
        crate::api::user::delete_user
    ),
    components(
        schemas(
            LoginReqDto,
            RegisterReq,
            RegisterSchoolReq,
            LoginResponse,
            AttendanceRecord,
            MarkEntry,
            MarkRequest,
            MarkResponse,
            RejectedEntry,
            RecognizeRequest,
            RecognizeResponse,
            MarkedStudent,
            Candidate,
            DailyResponse,
            DayStats,
            MonthlySummary,
            DailyPoint,
            DayRate,
            StatusCount,
            StudentHistory,
            StudentSummary,
            UpdateAttendance,
            SyncRequest,
            SyncResponse,
            SyncReport,
            SyncFailure,
            OfflinePayload,
            QueuedSubmission,
            Student,
            CreateStudent,
            FaceImage,
            Registration,
            Verification,
            Class,
            CreateClass,
            UpdateClass,
            School,
            CreateSchool,
            SchoolDashboard,
            ClassSize,
            FaceRegistration,
            ReportStatistics,
            ClassRate,
            StudentRate,
            User,
            CreateUser,
            UpdateUser
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and token rotation"),
        (name = "Attendance", description = "Capture, verification and offline replay"),
        (name = "Reports", description = "JSON and CSV reports"),
        (name = "Students", description = "Student roster and face registration"),
        (name = "Classes", description = "Class management"),
        (name = "Schools", description = "Schools and their dashboard"),
        (name = "Users", description = "Teacher and admin accounts"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/attendance/daily"));
        assert!(doc.paths.paths.contains_key("/api/reports/student/{id}"));
        assert!(doc.paths.paths.contains_key("/api/reports/statistics"));
        assert!(doc.paths.paths.contains_key("/api/schools/{id}/dashboard"));
        assert!(doc.paths.paths.contains_key("/api/users/{id}"));
        assert!(doc.paths.paths.contains_key("/auth/register-school"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
