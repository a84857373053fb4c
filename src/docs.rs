use crate::api::admin::{OverviewResponse, PurgeRequest, UserOverviewRow};
use crate::api::attendance::PunchRequest;
use crate::api::student::{StudentSummaryResponse, SubjectAttendanceRow};
use crate::api::teacher::{LatestPunchRow, TeacherSummaryResponse};
use crate::attendance::aggregate::{StudentSummary, SubjectAttendance, TeacherSummary};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::subject::Subject;
use crate::models::{LoginReqDto, RegisterReq};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendify API",
        version = "1.0.0",
        description = r#"
## Attendify — biometric-style attendance tracking

This API powers a role-based attendance tracker for an educational
institution. Students, teachers and an administrator interact with a shared
attendance store; class sessions are inferred from punch timestamps rather
than stored explicitly.

### 🔹 Key Features
- **Punch-in / Punch-out**
  - Simulated biometric punches grouped into class sessions
  - 1-hour gap starts a new session, 5-minute grace for Present vs Late
- **Student Dashboard**
  - Per-subject and overall attendance percentages, 75% alert threshold
- **Teacher Dashboard**
  - Session counts, present totals, live view of the latest class
- **Reports**
  - CSV attendance report per subject
- **Administration**
  - System overview and bulk purge of attendance records

### 🔐 Security
Most endpoints are protected using **JWT Bearer authentication**; punches
are recorded by the **Teacher** role, summaries are role-scoped.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::punch_in,
        crate::api::attendance::punch_out,

        crate::api::student::summary,
        crate::api::student::update_details,

        crate::api::teacher::summary,

        crate::api::report::download,

        crate::api::admin::overview,
        crate::api::admin::list_users,
        crate::api::admin::purge_attendance,

        crate::api::subject::list
    ),
    components(
        schemas(
            PunchRequest,
            AttendanceRecord,
            AttendanceStatus,
            StudentSummary,
            SubjectAttendance,
            TeacherSummary,
            StudentSummaryResponse,
            SubjectAttendanceRow,
            TeacherSummaryResponse,
            LatestPunchRow,
            OverviewResponse,
            UserOverviewRow,
            PurgeRequest,
            Subject,
            RegisterReq,
            LoginReqDto
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Punch-in/punch-out APIs"),
        (name = "Student", description = "Student dashboard APIs"),
        (name = "Teacher", description = "Teacher dashboard APIs"),
        (name = "Report", description = "CSV report APIs"),
        (name = "Admin", description = "Administration APIs"),
        (name = "Subject", description = "Subject catalogue APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
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
}
