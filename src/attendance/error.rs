use derive_more::Display;

/// Failures surfaced by the punch and summary operations. None of these is
/// retried internally; callers decide what to show and what to roll back.
#[derive(Debug, Display)]
pub enum PunchError {
    /// Punch referenced an enrollment number that is not a known student.
    #[display(fmt = "student not found")]
    StudentNotFound,

    /// The student already has a record inside the active session window.
    #[display(fmt = "already punched in for the current session")]
    AlreadyPunched,

    /// Punch-out with no punch-in history for the (teacher, subject) pair.
    #[display(fmt = "no active class session found")]
    NoActiveSession,

    /// Any persistence failure: constraint violations, connection errors.
    #[display(fmt = "storage error: {}", _0)]
    Storage(sqlx::Error),
}

impl std::error::Error for PunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PunchError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for PunchError {
    fn from(e: sqlx::Error) -> Self {
        PunchError::Storage(e)
    }
}
