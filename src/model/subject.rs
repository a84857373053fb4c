use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "course": "B.Tech",
        "branch": "CSE",
        "name": "CSE - Subject A1",
        "code": "SA1CS",
        "semester": 1
    })
)]
pub struct Subject {
    pub id: u64,
    pub course: String,
    pub branch: String,
    pub name: String,
    /// Unique subject code, e.g. "SA1CS"
    pub code: String,
    /// 1 to 8 (4 years, 2 semesters/year)
    pub semester: u8,
}
