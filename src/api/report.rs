use crate::auth::auth::AuthUser;
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDateTime;
use sqlx::MySqlPool;
use tracing::error;

/// One CSV line of the subject report, joined with the student row.
#[derive(sqlx::FromRow)]
pub struct ReportRow {
    pub punch_in_time: NaiveDateTime,
    pub enrollment_number: String,
    pub full_name: String,
    pub punch_out_time: Option<NaiveDateTime>,
    pub status: String,
}

/// Quote a field the way spreadsheet importers expect.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render the report. Rows are expected sorted by punch-in descending; an
/// open punch-out is written as "N/A".
pub fn render_report_csv(subject_code: &str, rows: &[ReportRow]) -> String {
    let mut out = String::from(
        "Date,Subject Code,Enrollment Number,Student Name,Punch In Time,Punch Out Time,Status\n",
    );
    for row in rows {
        let punch_out = row
            .punch_out_time
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let fields = [
            row.punch_in_time.format("%Y-%m-%d").to_string(),
            subject_code.to_string(),
            row.enrollment_number.clone(),
            row.full_name.clone(),
            row.punch_in_time.format("%H:%M:%S").to_string(),
            punch_out,
            row.status.clone(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// CSV attendance report for a subject
#[utoipa::path(
    get,
    path = "/api/v1/report/{subject_id}",
    params(
        ("subject_id" = u64, Path, description = "Subject to report on")
    ),
    responses(
        (status = 200, description = "CSV report", content_type = "text/csv"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not this teacher's subject"),
        (status = 404, description = "Subject not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Report"
)]
pub async fn download(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let assigned_subject = auth.require_assigned_subject()?;
    let subject_id = path.into_inner();

    if assigned_subject != subject_id {
        return Err(actix_web::error::ErrorForbidden("Not your subject"));
    }

    let subject_code = sqlx::query_scalar::<_, String>("SELECT code FROM subjects WHERE id = ?")
        .bind(subject_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, subject_id, "Failed to fetch subject");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?
        .ok_or_else(|| actix_web::error::ErrorNotFound("Subject not found"))?;

    let rows = sqlx::query_as::<_, ReportRow>(
        r#"
        SELECT a.punch_in_time, u.enrollment_number, u.full_name,
               a.punch_out_time, a.status
        FROM attendance a
        JOIN users u ON u.id = a.student_id
        WHERE a.subject_id = ?
        ORDER BY a.punch_in_time DESC
        "#,
    )
    .bind(subject_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, subject_id, "Failed to fetch report rows");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let body = render_report_csv(&subject_code, &rows);
    let filename = format!(
        "attendance_report_{}_{}.csv",
        subject_code,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );

    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename={filename}"),
        ))
        .body(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(
        student: (&str, &str),
        punch_in: NaiveDateTime,
        punch_out: Option<NaiveDateTime>,
        status: &str,
    ) -> ReportRow {
        ReportRow {
            punch_in_time: punch_in,
            enrollment_number: student.0.to_string(),
            full_name: student.1.to_string(),
            punch_out_time: punch_out,
            status: status.to_string(),
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 17)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn renders_header_and_rows() {
        let rows = vec![
            row(("STU2025002", "Arjun Verma"), at(10, 3, 0), Some(at(10, 20, 0)), "Present"),
            row(("STU2025001", "Priya Kumar"), at(10, 0, 0), None, "Present"),
        ];

        let csv = render_report_csv("SA1CS", &rows);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "Date,Subject Code,Enrollment Number,Student Name,Punch In Time,Punch Out Time,Status"
        );
        assert_eq!(
            lines[1],
            "2025-03-17,SA1CS,STU2025002,Arjun Verma,10:03:00,10:20:00,Present"
        );
        // Open record keeps the N/A sentinel.
        assert_eq!(
            lines[2],
            "2025-03-17,SA1CS,STU2025001,Priya Kumar,10:00:00,N/A,Present"
        );
    }

    #[test]
    fn quotes_fields_containing_commas() {
        let rows = vec![row(
            ("STU2025003", "Kumar, Ravi"),
            at(10, 0, 0),
            None,
            "Late",
        )];

        let csv = render_report_csv("SA1CS", &rows);
        assert!(csv.contains("\"Kumar, Ravi\""));
    }
}
