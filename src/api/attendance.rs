use crate::attendance::store::MySqlAttendanceStore;
use crate::attendance::{PunchError, SessionFinalizer, SessionWindowEngine};
use crate::auth::auth::AuthUser;
use crate::model::role::Role;
use crate::model::user::StudentRef;
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct PunchRequest {
    /// Enrollment number read from the simulated biometric device
    #[schema(example = "STU2025001")]
    pub enrollment_number: String,
}

async fn find_student(
    pool: &MySqlPool,
    enrollment_number: &str,
) -> Result<StudentRef, PunchError> {
    sqlx::query_as::<_, StudentRef>(
        r#"
        SELECT id, full_name, enrollment_number
        FROM users
        WHERE enrollment_number = ? AND role_id = ?
        "#,
    )
    .bind(enrollment_number.trim())
    .bind(Role::Student as u8)
    .fetch_optional(pool)
    .await?
    .ok_or(PunchError::StudentNotFound)
}

fn punch_error_response(err: PunchError) -> actix_web::Result<HttpResponse> {
    match err {
        PunchError::StudentNotFound => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "User not found or is not a student"
        }))),
        PunchError::AlreadyPunched => Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Already punched in for the current session"
        }))),
        PunchError::NoActiveSession => Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "No active class session found to punch out from"
        }))),
        PunchError::Storage(e) => {
            tracing::error!(error = %e, "Punch operation failed");
            Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ))
        }
    }
}

/// Punch-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/punch-in",
    request_body = PunchRequest,
    responses(
        (status = 200, description = "Punch recorded", body = Object, example = json!({
            "message": "Priya Kumar PUNCH IN recorded at 10:00:03",
            "status": "Present",
            "started_new_session": true
        })),
        (status = 400, description = "Already punched in for the current session"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Student not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn punch_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<PunchRequest>,
) -> actix_web::Result<impl Responder> {
    let subject_id = auth.require_assigned_subject()?;
    let teacher_id = auth.user_id;

    let student = match find_student(pool.get_ref(), &payload.enrollment_number).await {
        Ok(s) => s,
        Err(e) => return punch_error_response(e),
    };

    let store = MySqlAttendanceStore::new(pool.get_ref().clone());
    let engine = SessionWindowEngine::new(&store);
    let now = chrono::Local::now().naive_local();

    match engine.punch_in(teacher_id, subject_id, student.id, now).await {
        Ok(outcome) => {
            let message = if outcome.started_new_session {
                format!(
                    "New Class Session STARTED. {} PUNCH IN recorded at {}",
                    student.full_name,
                    now.format("%H:%M:%S")
                )
            } else {
                format!(
                    "{} PUNCH IN recorded at {}",
                    student.full_name,
                    now.format("%H:%M:%S")
                )
            };
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "message": message,
                "status": outcome.record.status.as_str(),
                "started_new_session": outcome.started_new_session
            })))
        }
        Err(e) => punch_error_response(e),
    }
}

/// Punch-out endpoint: finalizes the active session
#[utoipa::path(
    put,
    path = "/api/v1/attendance/punch-out",
    responses(
        (status = 200, description = "Session finalized", body = Object, example = json!({
            "message": "Class Session ENDED. All 2 attendance records finalized at 10:20:00",
            "finalized": 2
        })),
        (status = 400, description = "No active class session found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn punch_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let subject_id = auth.require_assigned_subject()?;
    let teacher_id = auth.user_id;

    let store = MySqlAttendanceStore::new(pool.get_ref().clone());
    let finalizer = SessionFinalizer::new(&store);
    let now = chrono::Local::now().naive_local();

    match finalizer.punch_out(teacher_id, subject_id, now).await {
        Ok(summary) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": format!(
                "Class Session ENDED. All {} attendance records finalized at {}",
                summary.finalized,
                summary.punched_out_at.format("%H:%M:%S")
            ),
            "finalized": summary.finalized
        }))),
        Err(e) => punch_error_response(e),
    }
}
