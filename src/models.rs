use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct RegisterReq {
    #[schema(example = "Priya Kumar")]
    pub full_name: String,
    #[schema(example = "STU2025001")]
    pub enrollment_number: String,
    pub password: String,
    pub confirm_password: String,
    /// 1: Admin, 2: Teacher, 3: Student
    #[schema(example = 3)]
    pub role_id: u8,

    // Student registration fields
    #[schema(example = "B.Tech")]
    pub course: Option<String>,
    #[schema(example = "CSE")]
    pub branch: Option<String>,
    #[schema(example = 2025)]
    pub batch: Option<u32>,

    /// Teacher registration: the subject this teacher will run
    pub subject_id: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "STU2025001")]
    pub enrollment_number: String,
    pub password: String,
    /// Role the user is logging in as; must match the stored role
    #[schema(example = 3)]
    pub role_id: u8,
}

/// Slim credential row fetched at login.
#[derive(FromRow)]
pub struct UserSql {
    pub id: u64,
    pub enrollment_number: String,
    pub password_hash: String,
    pub role_id: u8,
    pub subject_id: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// Enrollment number
    pub sub: String,
    pub role: u8,
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
    /// Present only if this user is a teacher with an assigned subject
    pub subject_id: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}
