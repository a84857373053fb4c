use chrono::NaiveDateTime;

use crate::attendance::error::PunchError;
use crate::attendance::store::AttendanceStore;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, NewPunch};

/// Gap after which the previous session is considered over and the next
/// punch opens a brand-new one.
pub const NEW_SESSION_GAP_SECS: i64 = 3_600;

/// Grace period from the session's first punch within which arrivals are
/// still marked Present rather than Late.
pub const ON_TIME_GRACE_SECS: i64 = 300;

/// Opening punch of the last session in `times`, which must be distinct
/// punch-in times in ascending order.
///
/// Replays the times in order: the first is an opener, and each later time
/// at or beyond [`NEW_SESSION_GAP_SECS`] from the current opener opens the
/// next session. Membership cannot be decided by looking backwards from the
/// end alone (a punch one minute after its predecessor may still be an
/// opener when the predecessor's own session began an hour earlier), hence
/// the forward replay.
pub(crate) fn session_opening(times: &[NaiveDateTime]) -> Option<NaiveDateTime> {
    let mut opener = *times.first()?;
    for &t in &times[1..] {
        if (t - opener).num_seconds() >= NEW_SESSION_GAP_SECS {
            opener = t;
        }
    }
    Some(opener)
}

/// Result of a successful punch-in.
#[derive(Debug)]
pub struct PunchOutcome {
    pub record: AttendanceRecord,
    /// True when this punch opened a new class session rather than joining
    /// the active one.
    pub started_new_session: bool,
}

/// Decides, per punch event, whether a new class session starts, the punch
/// joins the active session, or it is a duplicate.
pub struct SessionWindowEngine<'a, S: AttendanceStore> {
    store: &'a S,
}

impl<'a, S: AttendanceStore> SessionWindowEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Record a student punch-in at `now`.
    ///
    /// A punch at or beyond [`NEW_SESSION_GAP_SECS`] from the active
    /// session's opening punch (or the first punch ever) opens a new session
    /// with status Present — there is no separate teacher-initiated session
    /// start. Later punches join the active session: Present within
    /// [`ON_TIME_GRACE_SECS`] of the opening punch, Late after that, right
    /// up to the 1-hour boundary. The opening punch stays the anchor for the
    /// whole session; joiners never move it.
    ///
    /// The read-then-insert sequence here is a logical transaction. Two
    /// punches racing on the new-session boundary can both observe a stale
    /// anchor and each open a session; deployments that care should
    /// serialize per (teacher, subject) or add a uniqueness constraint on a
    /// session bucket.
    pub async fn punch_in(
        &self,
        teacher_id: u64,
        subject_id: u64,
        student_id: u64,
        now: NaiveDateTime,
    ) -> Result<PunchOutcome, PunchError> {
        let session_start = self.store.active_session_start(teacher_id, subject_id).await?;

        let active_start = match session_start {
            Some(start) if (now - start).num_seconds() < NEW_SESSION_GAP_SECS => start,
            _ => {
                // First-ever punch for the pairing, or the previous session
                // aged out: this punch opens the class.
                let record = self
                    .store
                    .insert_record(NewPunch {
                        student_id,
                        subject_id,
                        teacher_id,
                        punch_in_time: now,
                        status: AttendanceStatus::Present,
                    })
                    .await?;
                return Ok(PunchOutcome {
                    record,
                    started_new_session: true,
                });
            }
        };

        if self
            .store
            .student_has_punch_since(student_id, teacher_id, subject_id, active_start)
            .await?
        {
            return Err(PunchError::AlreadyPunched);
        }

        let status = if (now - active_start).num_seconds() > ON_TIME_GRACE_SECS {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        };

        let record = self
            .store
            .insert_record(NewPunch {
                student_id,
                subject_id,
                teacher_id,
                punch_in_time: now,
                status,
            })
            .await?;

        Ok(PunchOutcome {
            record,
            started_new_session: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::memory::MemoryStore;
    use chrono::{Duration, NaiveDate};

    const TEACHER: u64 = 10;
    const SUBJECT: u64 = 20;

    fn ten_am() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 17)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[actix_web::test]
    async fn first_punch_opens_session_as_present() {
        let store = MemoryStore::new();
        let engine = SessionWindowEngine::new(&store);

        let outcome = engine.punch_in(TEACHER, SUBJECT, 1, ten_am()).await.unwrap();

        assert!(outcome.started_new_session);
        assert_eq!(outcome.record.status, AttendanceStatus::Present);
        assert_eq!(outcome.record.punch_in_time, ten_am());
        assert!(outcome.record.punch_out_time.is_none());
    }

    #[actix_web::test]
    async fn punch_within_grace_joins_session_as_present() {
        let store = MemoryStore::new();
        let engine = SessionWindowEngine::new(&store);

        engine.punch_in(TEACHER, SUBJECT, 1, ten_am()).await.unwrap();
        let outcome = engine
            .punch_in(TEACHER, SUBJECT, 2, ten_am() + Duration::minutes(3))
            .await
            .unwrap();

        assert!(!outcome.started_new_session);
        assert_eq!(outcome.record.status, AttendanceStatus::Present);
    }

    #[actix_web::test]
    async fn grace_boundary_is_inclusive() {
        let store = MemoryStore::new();
        let engine = SessionWindowEngine::new(&store);

        engine.punch_in(TEACHER, SUBJECT, 1, ten_am()).await.unwrap();

        // Exactly 5 minutes after the anchor is still on time.
        let on_time = engine
            .punch_in(TEACHER, SUBJECT, 2, ten_am() + Duration::seconds(300))
            .await
            .unwrap();
        assert_eq!(on_time.record.status, AttendanceStatus::Present);

        // One second past the grace is Late.
        let late = engine
            .punch_in(TEACHER, SUBJECT, 3, ten_am() + Duration::seconds(301))
            .await
            .unwrap();
        assert_eq!(late.record.status, AttendanceStatus::Late);
    }

    #[actix_web::test]
    async fn very_late_punch_still_joins_the_session() {
        let store = MemoryStore::new();
        let engine = SessionWindowEngine::new(&store);

        engine.punch_in(TEACHER, SUBJECT, 1, ten_am()).await.unwrap();
        // 55 minutes in: within the 1-hour join window, marked Late.
        let outcome = engine
            .punch_in(TEACHER, SUBJECT, 2, ten_am() + Duration::minutes(55))
            .await
            .unwrap();

        assert!(!outcome.started_new_session);
        assert_eq!(outcome.record.status, AttendanceStatus::Late);
    }

    #[actix_web::test]
    async fn joiners_do_not_move_the_session_anchor() {
        let store = MemoryStore::new();
        let engine = SessionWindowEngine::new(&store);

        // Session spread well past the grace: 10:00, 10:04, 10:06.
        engine.punch_in(TEACHER, SUBJECT, 1, ten_am()).await.unwrap();
        engine
            .punch_in(TEACHER, SUBJECT, 2, ten_am() + Duration::minutes(4))
            .await
            .unwrap();

        // 6 minutes after the opening punch, 2 after the latest one: the
        // grace runs from the opener, so this is Late.
        let third = engine
            .punch_in(TEACHER, SUBJECT, 3, ten_am() + Duration::minutes(6))
            .await
            .unwrap();
        assert_eq!(third.record.status, AttendanceStatus::Late);

        // The opener re-punching at 10:10 is still a duplicate even though
        // others punched after them.
        let err = engine
            .punch_in(TEACHER, SUBJECT, 1, ten_am() + Duration::minutes(10))
            .await
            .unwrap_err();
        assert!(matches!(err, PunchError::AlreadyPunched));
        assert_eq!(store.record_count().await, 3);

        // One hour after the opener a new session starts, even though the
        // last accepted punch was only 54 minutes ago. A chain of joiners
        // never extends the session.
        let next = engine
            .punch_in(TEACHER, SUBJECT, 4, ten_am() + Duration::hours(1))
            .await
            .unwrap();
        assert!(next.started_new_session);
        assert_eq!(next.record.status, AttendanceStatus::Present);
    }

    #[test]
    fn session_opening_replays_clusters_forward() {
        let t = |m: i64| ten_am() + Duration::minutes(m);

        assert_eq!(session_opening(&[]), None);
        assert_eq!(session_opening(&[t(0)]), Some(t(0)));

        // 10:59 joins the 10:00 session, so 11:00 is a full hour from the
        // opener and opens the next one.
        assert_eq!(session_opening(&[t(0), t(59), t(60)]), Some(t(60)));

        // With a 10:30 opener instead, 11:00 is only 30 minutes in and the
        // same trailing pair stays in one session.
        assert_eq!(session_opening(&[t(30), t(59), t(60)]), Some(t(30)));

        // Three separated sessions: the last opener wins.
        assert_eq!(
            session_opening(&[t(0), t(10), t(120), t(125), t(240)]),
            Some(t(240))
        );
    }

    #[actix_web::test]
    async fn duplicate_punch_in_same_session_is_rejected() {
        let store = MemoryStore::new();
        let engine = SessionWindowEngine::new(&store);

        engine.punch_in(TEACHER, SUBJECT, 1, ten_am()).await.unwrap();
        let err = engine
            .punch_in(TEACHER, SUBJECT, 1, ten_am() + Duration::minutes(10))
            .await
            .unwrap_err();

        assert!(matches!(err, PunchError::AlreadyPunched));
        // Rejection writes nothing.
        assert_eq!(store.record_count().await, 1);
    }

    #[actix_web::test]
    async fn hour_gap_starts_a_new_session() {
        let store = MemoryStore::new();
        let engine = SessionWindowEngine::new(&store);

        engine.punch_in(TEACHER, SUBJECT, 1, ten_am()).await.unwrap();

        // Exactly one hour later the old session is over, so the same
        // student may punch again and is Present, not a duplicate.
        let outcome = engine
            .punch_in(TEACHER, SUBJECT, 1, ten_am() + Duration::seconds(3600))
            .await
            .unwrap();

        assert!(outcome.started_new_session);
        assert_eq!(outcome.record.status, AttendanceStatus::Present);
        assert_eq!(store.record_count().await, 2);
    }

    #[actix_web::test]
    async fn sessions_with_hour_gaps_stay_distinct() {
        let store = MemoryStore::new();
        let engine = SessionWindowEngine::new(&store);

        let mut at = ten_am();
        for _ in 0..3 {
            let outcome = engine.punch_in(TEACHER, SUBJECT, 1, at).await.unwrap();
            assert!(outcome.started_new_session);
            at += Duration::hours(2);
        }
    }

    #[actix_web::test]
    async fn other_subject_pairing_does_not_share_the_session() {
        let store = MemoryStore::new();
        let engine = SessionWindowEngine::new(&store);

        engine.punch_in(TEACHER, SUBJECT, 1, ten_am()).await.unwrap();

        // Same student, different subject: its own first-ever session.
        let outcome = engine
            .punch_in(TEACHER, SUBJECT + 1, 1, ten_am() + Duration::minutes(10))
            .await
            .unwrap();

        assert!(outcome.started_new_session);
        assert_eq!(outcome.record.status, AttendanceStatus::Present);
    }
}
