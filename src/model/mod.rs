pub mod attendance;
pub mod role;
pub mod subject;
pub mod user;
