use crate::attendance::store::{AttendanceStore, MySqlAttendanceStore};
use crate::auth::auth::AuthUser;
use crate::model::role::Role;
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{error, warn};
use utoipa::ToSchema;

/// Literal phrase the admin must send before the purge runs.
const PURGE_CONFIRMATION: &str = "CONFIRM DELETE";

#[derive(Serialize, ToSchema)]
pub struct OverviewResponse {
    pub total_users: i64,
    pub total_students: i64,
    pub total_teachers: i64,
    pub total_subjects: i64,
}

#[derive(Serialize, sqlx::FromRow, ToSchema)]
pub struct UserOverviewRow {
    pub id: u64,
    pub full_name: String,
    pub enrollment_number: String,
    pub role_id: u8,
    pub course: Option<String>,
    pub branch: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct PurgeRequest {
    /// Must be exactly "CONFIRM DELETE"
    #[schema(example = "CONFIRM DELETE")]
    pub confirm: String,
}

async fn count(pool: &MySqlPool, sql: &str, role: Option<Role>) -> Result<i64, sqlx::Error> {
    let mut q = sqlx::query_scalar::<_, i64>(sql);
    if let Some(role) = role {
        q = q.bind(role as u8);
    }
    q.fetch_one(pool).await
}

/// System overview counts
#[utoipa::path(
    get,
    path = "/api/v1/admin/overview",
    responses(
        (status = 200, description = "System overview", body = OverviewResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Admin"
)]
pub async fn overview(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let pool = pool.get_ref();
    let result = async {
        Ok::<_, sqlx::Error>(OverviewResponse {
            total_users: count(pool, "SELECT COUNT(*) FROM users", None).await?,
            total_students: count(
                pool,
                "SELECT COUNT(*) FROM users WHERE role_id = ?",
                Some(Role::Student),
            )
            .await?,
            total_teachers: count(
                pool,
                "SELECT COUNT(*) FROM users WHERE role_id = ?",
                Some(Role::Teacher),
            )
            .await?,
            total_subjects: count(pool, "SELECT COUNT(*) FROM subjects", None).await?,
        })
    }
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to build admin overview");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(result))
}

/// All users for detailed viewing
#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    responses(
        (status = 200, description = "All users", body = [UserOverviewRow]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Admin"
)]
pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let users = sqlx::query_as::<_, UserOverviewRow>(
        r#"
        SELECT id, full_name, enrollment_number, role_id, course, branch
        FROM users
        ORDER BY role_id, enrollment_number
        "#,
    )
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to list users");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(users))
}

/// Bulk purge of ALL attendance records, unconditionally
#[utoipa::path(
    delete,
    path = "/api/v1/admin/attendance",
    request_body = PurgeRequest,
    responses(
        (status = 200, description = "Records purged", body = Object, example = json!({
            "message": "All attendance records have been permanently deleted",
            "deleted": 128
        })),
        (status = 400, description = "Confirmation phrase was incorrect"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Admin"
)]
pub async fn purge_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<PurgeRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    if payload.confirm != PURGE_CONFIRMATION {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Deletion failed. Confirmation phrase was incorrect"
        })));
    }

    let store = MySqlAttendanceStore::new(pool.get_ref().clone());
    let deleted = store.purge_all().await.map_err(|e| {
        error!(error = %e, "Attendance purge failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    warn!(deleted, admin_id = auth.user_id, "All attendance records purged");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "All attendance records have been permanently deleted",
        "deleted": deleted
    })))
}
