use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Attendance status fixed at punch-in time. Absence is implicit: a student
/// with no record for a held session was absent, nothing is stored for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AttendanceStatus {
    Present,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Late => "Late",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "Present" => Some(AttendanceStatus::Present),
            "Late" => Some(AttendanceStatus::Late),
            _ => None,
        }
    }

    /// Whether a record with this status counts toward a student's
    /// attended total. Late arrivals still attended the class.
    pub fn counts_as_attended(&self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }
}

/// One punch record. `punch_out_time` is null while the session is open and
/// is stamped exactly once when the session is finalized; `status` never
/// changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub student_id: u64,
    pub subject_id: u64,
    pub teacher_id: u64,
    #[schema(value_type = String, format = "date-time")]
    pub punch_in_time: NaiveDateTime,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub punch_out_time: Option<NaiveDateTime>,
    pub status: AttendanceStatus,
}

impl AttendanceRecord {
    pub fn is_finalized(&self) -> bool {
        self.punch_out_time.is_some()
    }
}

/// Insert payload for a new punch-in record.
#[derive(Debug, Clone)]
pub struct NewPunch {
    pub student_id: u64,
    pub subject_id: u64,
    pub teacher_id: u64,
    pub punch_in_time: NaiveDateTime,
    pub status: AttendanceStatus,
}
