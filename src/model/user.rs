use serde::Serialize;

/// Slim `users` projection used by punch handling and report rows. Handlers
/// never need the whole row; each reads its own projection.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct StudentRef {
    pub id: u64,
    pub full_name: String,
    pub enrollment_number: String,
}
