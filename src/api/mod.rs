pub mod admin;
pub mod attendance;
pub mod report;
pub mod student;
pub mod subject;
pub mod teacher;
