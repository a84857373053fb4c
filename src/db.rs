use anyhow::{Context, Result};
use sqlx::MySqlPool;
use tracing::info;

use crate::auth::password::hash_password;
use crate::model::role::Role;

pub async fn init_db(database_url: &str) -> MySqlPool {
    MySqlPool::connect(database_url)
        .await
        .expect("Failed to connect to database")
}

const DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        full_name VARCHAR(100) NOT NULL,
        enrollment_number VARCHAR(20) NOT NULL UNIQUE,
        password_hash VARCHAR(255) NOT NULL,
        role_id TINYINT UNSIGNED NOT NULL,
        course VARCHAR(50),
        branch VARCHAR(50),
        batch INT UNSIGNED,
        fathers_name VARCHAR(100),
        mothers_name VARCHAR(100),
        dob DATE,
        blood_group VARCHAR(10),
        address VARCHAR(255),
        district VARCHAR(50),
        state VARCHAR(50),
        pin_code VARCHAR(10),
        contact_no VARCHAR(15),
        fingerprint_data TEXT,
        subject_id BIGINT UNSIGNED,
        last_login_at DATETIME
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS subjects (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        course VARCHAR(50) NOT NULL,
        branch VARCHAR(50) NOT NULL,
        name VARCHAR(100) NOT NULL,
        code VARCHAR(20) NOT NULL UNIQUE,
        semester TINYINT UNSIGNED NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attendance (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        student_id BIGINT UNSIGNED NOT NULL,
        subject_id BIGINT UNSIGNED NOT NULL,
        teacher_id BIGINT UNSIGNED NOT NULL,
        punch_in_time DATETIME NOT NULL,
        punch_out_time DATETIME,
        status VARCHAR(10) NOT NULL DEFAULT 'Present',
        INDEX idx_session_lookup (teacher_id, subject_id, punch_in_time),
        INDEX idx_student (student_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS refresh_tokens (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        user_id BIGINT UNSIGNED NOT NULL,
        jti VARCHAR(36) NOT NULL UNIQUE,
        expires_at DATETIME NOT NULL,
        revoked BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
];

pub async fn init_schema(pool: &MySqlPool) -> Result<()> {
    for ddl in DDL {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .context("Failed to run schema DDL")?;
    }
    Ok(())
}

fn simulated_fingerprints(label: &str) -> String {
    let prints: Vec<String> = (1..=5).map(|i| format!("Simulated {label} Finger {i}")).collect();
    serde_json::to_string(&prints).unwrap_or_else(|_| "[]".to_string())
}

async fn role_exists(pool: &MySqlPool, role: Role) -> Result<bool> {
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE role_id = ?)")
            .bind(role as u8)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

async fn seed_user(
    pool: &MySqlPool,
    full_name: &str,
    enrollment_number: &str,
    password: &str,
    role: Role,
    subject_id: Option<u64>,
    course_branch_batch: Option<(&str, &str, u32)>,
) -> Result<()> {
    let hashed =
        hash_password(password).map_err(|e| anyhow::anyhow!("password hash failed: {e}"))?;
    let (course, branch, batch) = match course_branch_batch {
        Some((c, b, y)) => (Some(c), Some(b), Some(y)),
        None => (None, None, None),
    };

    sqlx::query(
        r#"
        INSERT INTO users
            (full_name, enrollment_number, password_hash, role_id,
             course, branch, batch, subject_id, fingerprint_data)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(full_name)
    .bind(enrollment_number)
    .bind(hashed)
    .bind(role as u8)
    .bind(course)
    .bind(branch)
    .bind(batch)
    .bind(subject_id)
    .bind(simulated_fingerprints(role.name()))
    .execute(pool)
    .await?;

    Ok(())
}

/// First-run seeding: a default admin, the B.Tech subject grid, and one demo
/// teacher/student pair. Each block is skipped when data already exists.
pub async fn seed(pool: &MySqlPool) -> Result<()> {
    if !role_exists(pool, Role::Admin).await? {
        seed_user(pool, "Super Admin", "ADMIN001", "adminpass", Role::Admin, None, None).await?;
        info!("Seeded default admin");
    }

    let have_subjects =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM subjects)").fetch_one(pool).await?;
    if !have_subjects {
        // 4 branches x 8 semesters x 2 subjects, as the institution runs it
        for branch in ["CSE", "ECE", "MECH", "CIVIL"] {
            for year in 1..=4u8 {
                for semester in 1..=2u8 {
                    let sem_num = (year - 1) * 2 + semester;
                    for (tag, prefix) in [("A", "SA"), ("B", "SB")] {
                        sqlx::query(
                            r#"
                            INSERT INTO subjects (course, branch, name, code, semester)
                            VALUES (?, ?, ?, ?, ?)
                            "#,
                        )
                        .bind("B.Tech")
                        .bind(branch)
                        .bind(format!("{branch} - Subject {tag}{sem_num}"))
                        .bind(format!("{prefix}{sem_num}{}", &branch[..2]))
                        .bind(sem_num)
                        .execute(pool)
                        .await?;
                    }
                }
            }
        }
        info!("Seeded subject grid");
    }

    if !role_exists(pool, Role::Teacher).await? {
        let subject_id = sqlx::query_scalar::<_, Option<u64>>(
            "SELECT MIN(id) FROM subjects WHERE name = 'CSE - Subject A1'",
        )
        .fetch_one(pool)
        .await?;
        if let Some(subject_id) = subject_id {
            seed_user(
                pool,
                "Dr. Anjali Sharma",
                "TCH101",
                "teacherpass",
                Role::Teacher,
                Some(subject_id),
                None,
            )
            .await?;
            info!("Seeded demo teacher");
        }
    }

    if !role_exists(pool, Role::Student).await? {
        seed_user(
            pool,
            "Priya Kumar",
            "STU2025001",
            "studentpass",
            Role::Student,
            None,
            Some(("B.Tech", "CSE", 2025)),
        )
        .await?;
        info!("Seeded demo student");
    }

    Ok(())
}
