use crate::attendance::AttendanceAggregator;
use crate::attendance::store::{AttendanceStore, MySqlAttendanceStore};
use crate::auth::auth::AuthUser;
use crate::model::role::Role;
use crate::model::subject::Subject;
use actix_web::{HttpResponse, Responder, web};
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use sqlx::MySqlPool;
use tracing::error;
use utoipa::ToSchema;

/// Students can join up to 30 minutes after the session anchor, so the live
/// view sweeps that far forward; 5 minutes back covers queueing variance.
const LIVE_WINDOW_BACK_SECS: i64 = 300;
const LIVE_WINDOW_FORWARD_SECS: i64 = 1_800;

#[derive(Serialize, sqlx::FromRow, ToSchema)]
pub struct LatestPunchRow {
    pub enrollment_number: String,
    pub full_name: String,
    #[schema(value_type = String, format = "date-time")]
    pub punch_in_time: NaiveDateTime,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub punch_out_time: Option<NaiveDateTime>,
    pub status: String,
}

#[derive(Serialize, ToSchema)]
pub struct TeacherSummaryResponse {
    pub subject: Subject,
    pub enrolled_students: u64,
    pub distinct_sessions: u64,
    pub total_present: u64,
    pub total_present_percentage: f64,
    /// Records of the most recent session, newest punch first
    pub latest_attendance: Vec<LatestPunchRow>,
}

fn internal_error(e: impl std::fmt::Display, context: &'static str) -> actix_web::Error {
    error!(error = %e, "{}", context);
    actix_web::error::ErrorInternalServerError("Internal Server Error")
}

/// Teacher dashboard summary endpoint
#[utoipa::path(
    get,
    path = "/api/v1/teacher/summary",
    responses(
        (status = 200, description = "Subject rollup and latest session", body = TeacherSummaryResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden or no subject assigned"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Teacher"
)]
pub async fn summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let subject_id = auth.require_assigned_subject()?;
    let teacher_id = auth.user_id;

    let subject = sqlx::query_as::<_, Subject>(
        "SELECT id, course, branch, name, code, semester FROM subjects WHERE id = ?",
    )
    .bind(subject_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Failed to fetch subject"))?
    .ok_or_else(|| actix_web::error::ErrorNotFound("Subject not found"))?;

    // Enrollment is everyone in the subject's course+branch; derived here,
    // not owned by the aggregator.
    let enrolled_students = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM users WHERE role_id = ? AND course = ? AND branch = ?",
    )
    .bind(Role::Student as u8)
    .bind(&subject.course)
    .bind(&subject.branch)
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Failed to count enrolled students"))? as u64;

    let store = MySqlAttendanceStore::new(pool.get_ref().clone());
    let aggregator = AttendanceAggregator::new(&store);
    let rollup = aggregator
        .summarize_teacher_subject(teacher_id, subject_id, enrolled_students)
        .await
        .map_err(|e| internal_error(e, "Failed to summarize subject"))?;

    // Live view of the most recent session
    let latest_punch_in = store
        .latest_punch_in(teacher_id, subject_id)
        .await
        .map_err(|e| internal_error(e, "Failed to fetch latest session anchor"))?;

    let latest_attendance = match latest_punch_in {
        Some(anchor) => sqlx::query_as::<_, LatestPunchRow>(
            r#"
            SELECT u.enrollment_number, u.full_name,
                   a.punch_in_time, a.punch_out_time, a.status
            FROM attendance a
            JOIN users u ON u.id = a.student_id
            WHERE a.teacher_id = ? AND a.subject_id = ?
            AND a.punch_in_time >= ?
            AND a.punch_in_time <= ?
            ORDER BY a.punch_in_time DESC
            "#,
        )
        .bind(teacher_id)
        .bind(subject_id)
        .bind(anchor - Duration::seconds(LIVE_WINDOW_BACK_SECS))
        .bind(anchor + Duration::seconds(LIVE_WINDOW_FORWARD_SECS))
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to fetch latest session records"))?,
        None => Vec::new(),
    };

    Ok(HttpResponse::Ok().json(TeacherSummaryResponse {
        subject,
        enrolled_students,
        distinct_sessions: rollup.distinct_sessions,
        total_present: rollup.total_present,
        total_present_percentage: rollup.total_present_percentage,
        latest_attendance,
    }))
}
