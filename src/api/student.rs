use crate::attendance::AttendanceAggregator;
use crate::attendance::store::MySqlAttendanceStore;
use crate::auth::auth::AuthUser;
use crate::utils::db_utils::{build_update_sql, execute_update};
use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::error;
use utoipa::ToSchema;

/// Columns a student may change about themselves. Everything else on the
/// users row (role, enrollment number, credentials) stays out of reach.
const UPDATABLE_DETAIL_COLUMNS: &[&str] = &[
    "fathers_name",
    "mothers_name",
    "dob",
    "blood_group",
    "address",
    "district",
    "state",
    "pin_code",
    "contact_no",
];

#[derive(Serialize, ToSchema)]
pub struct SubjectAttendanceRow {
    pub subject_id: u64,
    pub subject_name: String,
    pub subject_code: String,
    pub attended: u64,
    pub total: u64,
    pub percentage: f64,
}

#[derive(Serialize, ToSchema)]
pub struct StudentSummaryResponse {
    pub subjects: Vec<SubjectAttendanceRow>,
    pub attended_classes: u64,
    pub total_classes: u64,
    pub overall_percentage: f64,
    pub low_attendance: bool,
}

#[derive(sqlx::FromRow)]
struct SubjectMeta {
    id: u64,
    name: String,
    code: String,
}

/// Student attendance summary endpoint
#[utoipa::path(
    get,
    path = "/api/v1/student/summary",
    responses(
        (status = 200, description = "Per-subject and overall attendance", body = StudentSummaryResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Student"
)]
pub async fn summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_student()?;

    let store = MySqlAttendanceStore::new(pool.get_ref().clone());
    let aggregator = AttendanceAggregator::new(&store);

    let summary = aggregator.summarize_student(auth.user_id).await.map_err(|e| {
        error!(error = %e, student_id = auth.user_id, "Failed to summarize attendance");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    // Attach subject names/codes for display
    let mut subjects = Vec::with_capacity(summary.subjects.len());
    if !summary.subjects.is_empty() {
        let placeholders = vec!["?"; summary.subjects.len()].join(", ");
        let sql = format!("SELECT id, name, code FROM subjects WHERE id IN ({placeholders})");
        let mut q = sqlx::query_as::<_, SubjectMeta>(&sql);
        for s in &summary.subjects {
            q = q.bind(s.subject_id);
        }
        let meta = q.fetch_all(pool.get_ref()).await.map_err(|e| {
            error!(error = %e, "Failed to fetch subject metadata");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

        for s in &summary.subjects {
            let m = meta.iter().find(|m| m.id == s.subject_id);
            subjects.push(SubjectAttendanceRow {
                subject_id: s.subject_id,
                subject_name: m.map(|m| m.name.clone()).unwrap_or_default(),
                subject_code: m.map(|m| m.code.clone()).unwrap_or_default(),
                attended: s.attended,
                total: s.total,
                percentage: s.percentage,
            });
        }
    }

    Ok(HttpResponse::Ok().json(StudentSummaryResponse {
        subjects,
        attended_classes: summary.attended_classes,
        total_classes: summary.total_classes,
        overall_percentage: summary.overall_percentage,
        low_attendance: summary.low_attendance,
    }))
}

/// Partial update of a student's personal details
#[utoipa::path(
    put,
    path = "/api/v1/student/details",
    request_body(
        content = Object,
        description = "Subset of personal-detail fields to change",
        content_type = "application/json",
        example = json!({ "district": "Bhopal", "contact_no": "9876543210" })
    ),
    responses(
        (status = 200, description = "Details updated", body = Object, example = json!({
            "message": "Personal details updated successfully"
        })),
        (status = 400, description = "Unknown field or empty payload"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Student"
)]
pub async fn update_details(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_student()?;

    let update = build_update_sql(
        "users",
        &payload,
        UPDATABLE_DETAIL_COLUMNS,
        "id",
        auth.user_id as i64,
    )?;

    execute_update(pool.get_ref(), update).await.map_err(|e| {
        error!(error = %e, student_id = auth.user_id, "Failed to update details");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Personal details updated successfully"
    })))
}
