use std::collections::{BTreeMap, HashSet};

use chrono::Timelike;
use serde::Serialize;
use utoipa::ToSchema;

use crate::attendance::error::PunchError;
use crate::attendance::store::AttendanceStore;
use crate::model::attendance::AttendanceStatus;

/// Overall percentage below which a student is flagged.
pub const LOW_ATTENDANCE_THRESHOLD: f64 = 75.0;

/// Per-subject rollup for one student. Only finalized records count: an
/// open punch is an in-progress session, not settled attendance.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubjectAttendance {
    pub subject_id: u64,
    pub attended: u64,
    pub total: u64,
    pub percentage: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StudentSummary {
    pub subjects: Vec<SubjectAttendance>,
    pub attended_classes: u64,
    pub total_classes: u64,
    pub overall_percentage: f64,
    /// True when the overall percentage is below the 75% policy threshold.
    pub low_attendance: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TeacherSummary {
    /// Distinct (date, hour) buckets over the teacher's records for the
    /// subject — an approximation of how many classes were held, since
    /// sessions are not stored explicitly.
    pub distinct_sessions: u64,
    pub total_present: u64,
    pub enrolled_students: u64,
    pub total_present_percentage: f64,
}

/// A subject with zero recorded classes is never penalized.
fn percentage(attended: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        attended as f64 / total as f64 * 100.0
    }
}

/// Rolls finalized records up into per-subject and overall percentages.
pub struct AttendanceAggregator<'a, S: AttendanceStore> {
    store: &'a S,
}

impl<'a, S: AttendanceStore> AttendanceAggregator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn summarize_student(&self, student_id: u64) -> Result<StudentSummary, PunchError> {
        let records = self.store.records_for_student(student_id).await?;

        // BTreeMap keeps subject order stable across calls.
        let mut per_subject: BTreeMap<u64, (u64, u64)> = BTreeMap::new();
        for rec in records.iter().filter(|r| r.is_finalized()) {
            let entry = per_subject.entry(rec.subject_id).or_insert((0, 0));
            if rec.status.counts_as_attended() {
                entry.0 += 1;
            }
            entry.1 += 1;
        }

        let mut attended_classes = 0;
        let mut total_classes = 0;
        let subjects = per_subject
            .into_iter()
            .map(|(subject_id, (attended, total))| {
                attended_classes += attended;
                total_classes += total;
                SubjectAttendance {
                    subject_id,
                    attended,
                    total,
                    percentage: percentage(attended, total),
                }
            })
            .collect();

        let overall_percentage = percentage(attended_classes, total_classes);
        Ok(StudentSummary {
            subjects,
            attended_classes,
            total_classes,
            overall_percentage,
            low_attendance: overall_percentage < LOW_ATTENDANCE_THRESHOLD,
        })
    }

    /// Subject-wide rollup for a teacher. `enrolled_students` is derived
    /// externally (all students sharing the subject's course and branch);
    /// this component does not own enrollment.
    pub async fn summarize_teacher_subject(
        &self,
        teacher_id: u64,
        subject_id: u64,
        enrolled_students: u64,
    ) -> Result<TeacherSummary, PunchError> {
        let records = self
            .store
            .records_for_teacher_subject(teacher_id, subject_id)
            .await?;

        let sessions: HashSet<_> = records
            .iter()
            .map(|r| (r.punch_in_time.date(), r.punch_in_time.hour()))
            .collect();
        let distinct_sessions = sessions.len() as u64;

        let total_present = records
            .iter()
            .filter(|r| r.status == AttendanceStatus::Present)
            .count() as u64;

        let denominator = distinct_sessions * enrolled_students;
        let total_present_percentage = if denominator == 0 {
            0.0
        } else {
            total_present as f64 / denominator as f64 * 100.0
        };

        Ok(TeacherSummary {
            distinct_sessions,
            total_present,
            enrolled_students,
            total_present_percentage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::finalize::SessionFinalizer;
    use crate::attendance::memory::MemoryStore;
    use crate::attendance::session::SessionWindowEngine;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    const TEACHER: u64 = 10;
    const SUBJECT: u64 = 20;

    fn ten_am() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 17)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn percentage_conventions() {
        assert_eq!(percentage(0, 0), 100.0);
        assert_eq!(percentage(3, 3), 100.0);
        assert_eq!(percentage(0, 4), 0.0);
        assert_eq!(percentage(3, 4), 75.0);
    }

    #[actix_web::test]
    async fn student_with_no_records_is_not_penalized() {
        let store = MemoryStore::new();
        let aggregator = AttendanceAggregator::new(&store);

        let summary = aggregator.summarize_student(1).await.unwrap();

        assert_eq!(summary.total_classes, 0);
        assert_eq!(summary.overall_percentage, 100.0);
        assert!(!summary.low_attendance);
        assert!(summary.subjects.is_empty());
    }

    #[actix_web::test]
    async fn open_punches_are_not_settled_attendance() {
        let store = MemoryStore::new();
        let engine = SessionWindowEngine::new(&store);
        let finalizer = SessionFinalizer::new(&store);
        let aggregator = AttendanceAggregator::new(&store);

        // One finalized session, one still open.
        engine.punch_in(TEACHER, SUBJECT, 1, ten_am()).await.unwrap();
        finalizer
            .punch_out(TEACHER, SUBJECT, ten_am() + Duration::minutes(40))
            .await
            .unwrap();
        engine
            .punch_in(TEACHER, SUBJECT, 1, ten_am() + Duration::hours(3))
            .await
            .unwrap();

        let summary = aggregator.summarize_student(1).await.unwrap();

        assert_eq!(summary.total_classes, 1);
        assert_eq!(summary.attended_classes, 1);
    }

    #[actix_web::test]
    async fn late_records_count_as_attended() {
        let store = MemoryStore::new();
        let engine = SessionWindowEngine::new(&store);
        let finalizer = SessionFinalizer::new(&store);
        let aggregator = AttendanceAggregator::new(&store);

        engine.punch_in(TEACHER, SUBJECT, 1, ten_am()).await.unwrap();
        // Student 2 arrives 40 minutes in: Late, but attended.
        engine
            .punch_in(TEACHER, SUBJECT, 2, ten_am() + Duration::minutes(40))
            .await
            .unwrap();
        finalizer
            .punch_out(TEACHER, SUBJECT, ten_am() + Duration::minutes(50))
            .await
            .unwrap();

        let summary = aggregator.summarize_student(2).await.unwrap();

        assert_eq!(summary.attended_classes, 1);
        assert_eq!(summary.total_classes, 1);
        assert_eq!(summary.overall_percentage, 100.0);
    }

    #[actix_web::test]
    async fn subjects_are_rolled_up_separately_and_overall() {
        let store = MemoryStore::new();
        let engine = SessionWindowEngine::new(&store);
        let finalizer = SessionFinalizer::new(&store);
        let aggregator = AttendanceAggregator::new(&store);

        let other_subject = SUBJECT + 1;
        engine.punch_in(TEACHER, SUBJECT, 1, ten_am()).await.unwrap();
        finalizer
            .punch_out(TEACHER, SUBJECT, ten_am() + Duration::minutes(45))
            .await
            .unwrap();

        let later = ten_am() + Duration::hours(2);
        engine.punch_in(TEACHER, other_subject, 1, later).await.unwrap();
        finalizer
            .punch_out(TEACHER, other_subject, later + Duration::minutes(45))
            .await
            .unwrap();

        let summary = aggregator.summarize_student(1).await.unwrap();

        assert_eq!(summary.subjects.len(), 2);
        assert_eq!(summary.total_classes, 2);
        assert_eq!(summary.attended_classes, 2);
        assert_eq!(summary.overall_percentage, 100.0);
    }

    #[actix_web::test]
    async fn teacher_summary_counts_distinct_session_buckets() {
        let store = MemoryStore::new();
        let engine = SessionWindowEngine::new(&store);
        let aggregator = AttendanceAggregator::new(&store);

        // Two students at 10:00-ish, one class two hours later: two
        // distinct (date, hour) buckets.
        engine.punch_in(TEACHER, SUBJECT, 1, ten_am()).await.unwrap();
        engine
            .punch_in(TEACHER, SUBJECT, 2, ten_am() + Duration::minutes(3))
            .await
            .unwrap();
        engine
            .punch_in(TEACHER, SUBJECT, 1, ten_am() + Duration::hours(2))
            .await
            .unwrap();

        let summary = aggregator
            .summarize_teacher_subject(TEACHER, SUBJECT, 2)
            .await
            .unwrap();

        assert_eq!(summary.distinct_sessions, 2);
        assert_eq!(summary.total_present, 3);
        assert_eq!(summary.total_present_percentage, 75.0);
    }

    #[actix_web::test]
    async fn teacher_summary_zero_denominator_is_zero_percent() {
        let store = MemoryStore::new();
        let aggregator = AttendanceAggregator::new(&store);

        let summary = aggregator
            .summarize_teacher_subject(TEACHER, SUBJECT, 0)
            .await
            .unwrap();

        assert_eq!(summary.distinct_sessions, 0);
        assert_eq!(summary.total_present_percentage, 0.0);
    }

    /// The walkthrough scenario: A opens at 10:00, B joins at 10:03, A's
    /// second punch is rejected, punch-out at 10:20 closes both.
    #[actix_web::test]
    async fn classroom_walkthrough() {
        let store = MemoryStore::new();
        let engine = SessionWindowEngine::new(&store);
        let finalizer = SessionFinalizer::new(&store);
        let aggregator = AttendanceAggregator::new(&store);

        let a = engine.punch_in(TEACHER, SUBJECT, 1, ten_am()).await.unwrap();
        assert!(a.started_new_session);
        assert_eq!(a.record.status, AttendanceStatus::Present);

        let b = engine
            .punch_in(TEACHER, SUBJECT, 2, ten_am() + Duration::minutes(3))
            .await
            .unwrap();
        assert_eq!(b.record.status, AttendanceStatus::Present);

        let dup = engine
            .punch_in(TEACHER, SUBJECT, 1, ten_am() + Duration::minutes(10))
            .await
            .unwrap_err();
        assert!(matches!(dup, PunchError::AlreadyPunched));

        let end = ten_am() + Duration::minutes(20);
        let closed = finalizer.punch_out(TEACHER, SUBJECT, end).await.unwrap();
        assert_eq!(closed.finalized, 2);
        for rec in store.all_records().await {
            assert_eq!(rec.punch_out_time, Some(end));
        }

        let summary = aggregator
            .summarize_teacher_subject(TEACHER, SUBJECT, 2)
            .await
            .unwrap();
        assert_eq!(summary.distinct_sessions, 1);
        assert_eq!(summary.total_present, 2);
        assert_eq!(summary.total_present_percentage, 100.0);
    }
}
