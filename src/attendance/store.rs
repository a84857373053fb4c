use chrono::NaiveDateTime;
use sqlx::MySqlPool;

use crate::attendance::error::PunchError;
use crate::attendance::session::{NEW_SESSION_GAP_SECS, session_opening};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, NewPunch};

/// Persistence collaborator for attendance records.
///
/// The engine, finalizer and aggregator only ever talk to this trait, so the
/// production MySQL store can be swapped for an in-memory one in tests — or
/// later for an explicit-session model — without touching the callers.
pub trait AttendanceStore {
    /// Max punch-in time over all records for (teacher, subject). Anchors
    /// the finalization window and the live view of the latest class.
    /// None if no record was ever made.
    async fn latest_punch_in(
        &self,
        teacher_id: u64,
        subject_id: u64,
    ) -> Result<Option<NaiveDateTime>, PunchError>;

    /// Opening punch-in of the most recent session for (teacher, subject).
    ///
    /// Sessions are reconstructed from timestamp clustering alone: replaying
    /// punch times in order, a punch at or beyond one hour from the current
    /// session's opening punch opens the next session. The punch that opened
    /// the last cluster is the one returned; gap checks, duplicate checks
    /// and the on-time grace are all measured from it. None if no record
    /// was ever made.
    async fn active_session_start(
        &self,
        teacher_id: u64,
        subject_id: u64,
    ) -> Result<Option<NaiveDateTime>, PunchError>;

    /// Whether the student already has a record for (teacher, subject) with
    /// `punch_in_time >= since`.
    async fn student_has_punch_since(
        &self,
        student_id: u64,
        teacher_id: u64,
        subject_id: u64,
        since: NaiveDateTime,
    ) -> Result<bool, PunchError>;

    async fn insert_record(&self, punch: NewPunch) -> Result<AttendanceRecord, PunchError>;

    /// Stamp `punched_out_at` on every open record for (teacher, subject)
    /// with `punch_in_time >= since`, returning how many were touched.
    ///
    /// Implementations must apply this as a single statement or transaction:
    /// a partially finalized session must never be observable.
    async fn finalize_open_since(
        &self,
        teacher_id: u64,
        subject_id: u64,
        since: NaiveDateTime,
        punched_out_at: NaiveDateTime,
    ) -> Result<u64, PunchError>;

    async fn records_for_student(
        &self,
        student_id: u64,
    ) -> Result<Vec<AttendanceRecord>, PunchError>;

    async fn records_for_teacher_subject(
        &self,
        teacher_id: u64,
        subject_id: u64,
    ) -> Result<Vec<AttendanceRecord>, PunchError>;

    /// Bulk administrative purge: deletes every attendance record,
    /// unconditionally. Returns the number of deleted rows.
    async fn purge_all(&self) -> Result<u64, PunchError>;
}

/// MySQL-backed store. All queries are runtime-checked so the crate builds
/// without a live database.
#[derive(Clone)]
pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

/// Raw row shape: status travels as a string, exactly as stored.
#[derive(sqlx::FromRow)]
struct AttendanceRow {
    id: u64,
    student_id: u64,
    subject_id: u64,
    teacher_id: u64,
    punch_in_time: NaiveDateTime,
    punch_out_time: Option<NaiveDateTime>,
    status: String,
}

impl AttendanceRow {
    fn into_record(self) -> Result<AttendanceRecord, PunchError> {
        let status = AttendanceStatus::from_db(&self.status).ok_or_else(|| {
            PunchError::Storage(sqlx::Error::Decode(
                format!("unknown attendance status '{}'", self.status).into(),
            ))
        })?;
        Ok(AttendanceRecord {
            id: self.id,
            student_id: self.student_id,
            subject_id: self.subject_id,
            teacher_id: self.teacher_id,
            punch_in_time: self.punch_in_time,
            punch_out_time: self.punch_out_time,
            status,
        })
    }
}

const SELECT_RECORD: &str = r#"
    SELECT id, student_id, subject_id, teacher_id,
           punch_in_time, punch_out_time, status
    FROM attendance
"#;

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_records(
        &self,
        where_sql: &str,
        binds: &[u64],
    ) -> Result<Vec<AttendanceRecord>, PunchError> {
        let sql = format!("{SELECT_RECORD} {where_sql} ORDER BY punch_in_time");
        let mut q = sqlx::query_as::<_, AttendanceRow>(&sql);
        for b in binds {
            q = q.bind(*b);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(AttendanceRow::into_record).collect()
    }
}

impl AttendanceStore for MySqlAttendanceStore {
    async fn latest_punch_in(
        &self,
        teacher_id: u64,
        subject_id: u64,
    ) -> Result<Option<NaiveDateTime>, PunchError> {
        let latest = sqlx::query_scalar::<_, Option<NaiveDateTime>>(
            r#"
            SELECT MAX(punch_in_time)
            FROM attendance
            WHERE teacher_id = ? AND subject_id = ?
            "#,
        )
        .bind(teacher_id)
        .bind(subject_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(latest)
    }

    async fn active_session_start(
        &self,
        teacher_id: u64,
        subject_id: u64,
    ) -> Result<Option<NaiveDateTime>, PunchError> {
        // Latest punch with no other punch in the hour before it. Everything
        // earlier belongs to fully separated sessions, so the cluster replay
        // can start here instead of at the first record ever.
        let replay_from = sqlx::query_scalar::<_, Option<NaiveDateTime>>(
            r#"
            SELECT MAX(a.punch_in_time)
            FROM attendance a
            WHERE a.teacher_id = ? AND a.subject_id = ?
            AND NOT EXISTS (
                SELECT 1 FROM attendance b
                WHERE b.teacher_id = a.teacher_id
                AND b.subject_id = a.subject_id
                AND b.punch_in_time < a.punch_in_time
                AND b.punch_in_time > a.punch_in_time - INTERVAL ? SECOND
            )
            "#,
        )
        .bind(teacher_id)
        .bind(subject_id)
        .bind(NEW_SESSION_GAP_SECS)
        .fetch_one(&self.pool)
        .await?;

        let Some(replay_from) = replay_from else {
            return Ok(None);
        };

        let times = sqlx::query_scalar::<_, NaiveDateTime>(
            r#"
            SELECT DISTINCT punch_in_time
            FROM attendance
            WHERE teacher_id = ? AND subject_id = ?
            AND punch_in_time >= ?
            ORDER BY punch_in_time
            "#,
        )
        .bind(teacher_id)
        .bind(subject_id)
        .bind(replay_from)
        .fetch_all(&self.pool)
        .await?;

        Ok(session_opening(&times))
    }

    async fn student_has_punch_since(
        &self,
        student_id: u64,
        teacher_id: u64,
        subject_id: u64,
        since: NaiveDateTime,
    ) -> Result<bool, PunchError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM attendance
                WHERE student_id = ? AND teacher_id = ? AND subject_id = ?
                AND punch_in_time >= ?
                LIMIT 1
            )
            "#,
        )
        .bind(student_id)
        .bind(teacher_id)
        .bind(subject_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_record(&self, punch: NewPunch) -> Result<AttendanceRecord, PunchError> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance
                (student_id, subject_id, teacher_id, punch_in_time, status)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(punch.student_id)
        .bind(punch.subject_id)
        .bind(punch.teacher_id)
        .bind(punch.punch_in_time)
        .bind(punch.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(AttendanceRecord {
            id: result.last_insert_id(),
            student_id: punch.student_id,
            subject_id: punch.subject_id,
            teacher_id: punch.teacher_id,
            punch_in_time: punch.punch_in_time,
            punch_out_time: None,
            status: punch.status,
        })
    }

    async fn finalize_open_since(
        &self,
        teacher_id: u64,
        subject_id: u64,
        since: NaiveDateTime,
        punched_out_at: NaiveDateTime,
    ) -> Result<u64, PunchError> {
        // Single UPDATE: the whole session closes or none of it does.
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET punch_out_time = ?
            WHERE teacher_id = ? AND subject_id = ?
            AND punch_in_time >= ?
            AND punch_out_time IS NULL
            "#,
        )
        .bind(punched_out_at)
        .bind(teacher_id)
        .bind(subject_id)
        .bind(since)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn records_for_student(
        &self,
        student_id: u64,
    ) -> Result<Vec<AttendanceRecord>, PunchError> {
        self.fetch_records("WHERE student_id = ?", &[student_id]).await
    }

    async fn records_for_teacher_subject(
        &self,
        teacher_id: u64,
        subject_id: u64,
    ) -> Result<Vec<AttendanceRecord>, PunchError> {
        self.fetch_records("WHERE teacher_id = ? AND subject_id = ?", &[teacher_id, subject_id])
            .await
    }

    async fn purge_all(&self) -> Result<u64, PunchError> {
        let result = sqlx::query("DELETE FROM attendance")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
