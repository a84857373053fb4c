use crate::model::subject::Subject;
use actix_web::{HttpResponse, Responder, web};
use sqlx::MySqlPool;
use tracing::error;

/// Subject catalogue, used by registration to pick a teacher's subject.
/// Public: served before anyone has a token.
#[utoipa::path(
    get,
    path = "/subjects",
    responses(
        (status = 200, description = "All subjects", body = [Subject]),
        (status = 500, description = "Internal server error")
    ),
    tag = "Subject"
)]
pub async fn list(pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let subjects = sqlx::query_as::<_, Subject>(
        r#"
        SELECT id, course, branch, name, code, semester
        FROM subjects
        ORDER BY course, branch, semester, code
        "#,
    )
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to list subjects");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(subjects))
}
