//! In-memory [`AttendanceStore`] used by the core tests in place of MySQL.

use std::sync::Mutex;

use chrono::NaiveDateTime;

use crate::attendance::error::PunchError;
use crate::attendance::session::session_opening;
use crate::attendance::store::AttendanceStore;
use crate::model::attendance::{AttendanceRecord, NewPunch};

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<AttendanceRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_count(&self) -> usize {
        self.records.lock().expect("memory store poisoned").len()
    }

    /// All records in insertion order.
    pub async fn all_records(&self) -> Vec<AttendanceRecord> {
        self.records.lock().expect("memory store poisoned").clone()
    }
}

impl AttendanceStore for MemoryStore {
    async fn latest_punch_in(
        &self,
        teacher_id: u64,
        subject_id: u64,
    ) -> Result<Option<NaiveDateTime>, PunchError> {
        let records = self.records.lock().expect("memory store poisoned");
        Ok(records
            .iter()
            .filter(|r| r.teacher_id == teacher_id && r.subject_id == subject_id)
            .map(|r| r.punch_in_time)
            .max())
    }

    async fn active_session_start(
        &self,
        teacher_id: u64,
        subject_id: u64,
    ) -> Result<Option<NaiveDateTime>, PunchError> {
        let records = self.records.lock().expect("memory store poisoned");
        let mut times: Vec<NaiveDateTime> = records
            .iter()
            .filter(|r| r.teacher_id == teacher_id && r.subject_id == subject_id)
            .map(|r| r.punch_in_time)
            .collect();
        times.sort();
        times.dedup();
        Ok(session_opening(&times))
    }

    async fn student_has_punch_since(
        &self,
        student_id: u64,
        teacher_id: u64,
        subject_id: u64,
        since: NaiveDateTime,
    ) -> Result<bool, PunchError> {
        let records = self.records.lock().expect("memory store poisoned");
        Ok(records.iter().any(|r| {
            r.student_id == student_id
                && r.teacher_id == teacher_id
                && r.subject_id == subject_id
                && r.punch_in_time >= since
        }))
    }

    async fn insert_record(&self, punch: NewPunch) -> Result<AttendanceRecord, PunchError> {
        let mut records = self.records.lock().expect("memory store poisoned");
        let record = AttendanceRecord {
            id: records.len() as u64 + 1,
            student_id: punch.student_id,
            subject_id: punch.subject_id,
            teacher_id: punch.teacher_id,
            punch_in_time: punch.punch_in_time,
            punch_out_time: None,
            status: punch.status,
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn finalize_open_since(
        &self,
        teacher_id: u64,
        subject_id: u64,
        since: NaiveDateTime,
        punched_out_at: NaiveDateTime,
    ) -> Result<u64, PunchError> {
        let mut records = self.records.lock().expect("memory store poisoned");
        let mut finalized = 0;
        for r in records.iter_mut() {
            if r.teacher_id == teacher_id
                && r.subject_id == subject_id
                && r.punch_in_time >= since
                && r.punch_out_time.is_none()
            {
                r.punch_out_time = Some(punched_out_at);
                finalized += 1;
            }
        }
        Ok(finalized)
    }

    async fn records_for_student(
        &self,
        student_id: u64,
    ) -> Result<Vec<AttendanceRecord>, PunchError> {
        let records = self.records.lock().expect("memory store poisoned");
        Ok(records
            .iter()
            .filter(|r| r.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn records_for_teacher_subject(
        &self,
        teacher_id: u64,
        subject_id: u64,
    ) -> Result<Vec<AttendanceRecord>, PunchError> {
        let records = self.records.lock().expect("memory store poisoned");
        Ok(records
            .iter()
            .filter(|r| r.teacher_id == teacher_id && r.subject_id == subject_id)
            .cloned()
            .collect())
    }

    async fn purge_all(&self) -> Result<u64, PunchError> {
        let mut records = self.records.lock().expect("memory store poisoned");
        let n = records.len() as u64;
        records.clear();
        Ok(n)
    }
}
