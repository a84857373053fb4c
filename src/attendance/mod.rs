//! Class-session inference and attendance finalization.
//!
//! Sessions are never stored: a session is the cluster of punch records for
//! one (teacher, subject) pair whose punch-in times sit within a window
//! anchored to the latest punch-in. The engine decides whether a punch opens
//! a new session, joins the active one, or is a duplicate; the finalizer
//! stamps punch-out times over the active window; the aggregator rolls
//! finalized records up into percentages.

pub mod aggregate;
pub mod error;
pub mod finalize;
pub mod session;
pub mod store;

#[cfg(test)]
pub mod memory;

pub use aggregate::AttendanceAggregator;
pub use error::PunchError;
pub use finalize::SessionFinalizer;
pub use session::SessionWindowEngine;
pub use store::AttendanceStore;
