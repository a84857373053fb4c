use crate::{
    auth::{
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    model::role::Role,
    models::{LoginReqDto, RegisterReq, TokenType, UserSql},
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

use crate::utils::enrollment_cache;
use crate::utils::enrollment_filter;

/// Five opaque simulated fingerprint entries, set up at registration. Real
/// biometric hardware is out of scope; punches carry the enrollment number.
fn simulated_fingerprints(enrollment_number: &str) -> String {
    let prints: Vec<String> = (1..=5)
        .map(|i| format!("Simulated Finger {i} for {enrollment_number}"))
        .collect();
    serde_json::to_string(&prints).unwrap_or_else(|_| "[]".to_string())
}

/// Inserts a new user and updates the enrollment filter/cache
async fn insert_user(payload: &RegisterReq, pool: &MySqlPool) -> Result<(), HttpResponse> {
    let hashed = match hash_password(&payload.password) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "Password hashing failed");
            return Err(HttpResponse::InternalServerError().json(json!({
                "error": "Failed to register user"
            })));
        }
    };

    let enrollment = payload.enrollment_number.trim();
    let result = sqlx::query(
        r#"
        INSERT INTO users
            (full_name, enrollment_number, password_hash, role_id,
             course, branch, batch, subject_id, fingerprint_data)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.full_name.trim())
    .bind(enrollment)
    .bind(hashed)
    .bind(payload.role_id)
    .bind(payload.course.as_deref())
    .bind(payload.branch.as_deref())
    .bind(payload.batch)
    .bind(payload.subject_id)
    .bind(simulated_fingerprints(enrollment))
    .execute(pool)
    .await;

    match result {
        Ok(_) => {
            // keep the filter and cache in step with the unique column
            enrollment_filter::insert(enrollment);
            enrollment_cache::mark_taken(enrollment).await;
            Ok(())
        }
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code() == Some("23000".into()) {
                    return Err(HttpResponse::Conflict().json(json!({
                        "error": "Enrollment number already registered"
                    })));
                }
            }

            error!(error = %e, "Failed to insert user");
            Err(HttpResponse::InternalServerError().json(json!({
                "error": "Failed to register user"
            })))
        }
    }
}

/// true  => enrollment number AVAILABLE
/// false => enrollment number TAKEN
pub async fn is_enrollment_available(enrollment_number: &str, pool: &MySqlPool) -> bool {
    // 1️⃣ Cuckoo filter — fast negative
    if !enrollment_filter::might_exist(enrollment_number) {
        return true;
    }

    // 2️⃣ Moka cache — fast positive
    if enrollment_cache::is_taken(enrollment_number).await {
        return false;
    }

    // 3️⃣ Database fallback
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE enrollment_number = ? LIMIT 1)",
    )
    .bind(enrollment_number.trim().to_uppercase())
    .fetch_one(pool)
    .await
    .unwrap_or(true); // fail-safe

    !exists
}

/// Registration handler: students carry course/branch/batch, teachers a
/// subject assignment.
pub async fn register(payload: web::Json<RegisterReq>, pool: web::Data<MySqlPool>) -> impl Responder {
    let enrollment = payload.enrollment_number.trim();

    if payload.full_name.trim().is_empty() || enrollment.is_empty() || payload.password.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "error": "Name, enrollment number and password must not be empty"
        }));
    }

    if payload.password != payload.confirm_password {
        return HttpResponse::BadRequest().json(json!({
            "error": "Passwords do not match"
        }));
    }

    let role = match Role::from_id(payload.role_id) {
        Some(r) => r,
        None => {
            return HttpResponse::BadRequest().json(json!({
                "error": "Unknown role"
            }));
        }
    };

    if role == Role::Teacher && payload.subject_id.is_none() {
        return HttpResponse::BadRequest().json(json!({
            "error": "Teacher registration requires a subject"
        }));
    }

    if !is_enrollment_available(enrollment, pool.get_ref()).await {
        return HttpResponse::Conflict().json(json!({
            "error": "Enrollment number already registered"
        }));
    }

    match insert_user(&payload, pool.get_ref()).await {
        Ok(_) => HttpResponse::Created().json(json!({
            "message": format!("{} registered successfully", role.name())
        })),
        Err(err_resp) => err_resp,
    }
}

#[derive(Serialize, Deserialize)]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
}

#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(enrollment_number = %user.enrollment_number)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    if user.enrollment_number.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty enrollment number or password");
        return HttpResponse::BadRequest().body("Enrollment number or password required");
    }

    debug!("Fetching user from database");

    // Login identity is the (enrollment number, role) pair
    let db_user = match sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, enrollment_number, password_hash, role_id, subject_id
        FROM users
        WHERE enrollment_number = ? AND role_id = ?
        "#,
    )
    .bind(user.enrollment_number.trim())
    .bind(user.role_id)
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(user)) => {
            debug!(user_id = user.id, "User found");
            user
        }
        Ok(None) => {
            info!("Invalid credentials: user not found for role");
            return HttpResponse::Unauthorized().body("Invalid credentials");
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    debug!("Verifying password");

    if let Err(e) = verify_password(&user.password, &db_user.password_hash) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().body("Invalid credentials");
    }

    debug!("Generating access token");

    let access_token = match generate_access_token(
        db_user.id,
        db_user.enrollment_number.clone(),
        db_user.role_id,
        db_user.subject_id,
        &config.jwt_secret,
        config.access_token_ttl,
    ) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "Failed to sign access token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    debug!("Generating refresh token");

    let (refresh_token, refresh_claims) = match generate_refresh_token(
        db_user.id,
        db_user.enrollment_number.clone(),
        db_user.role_id,
        db_user.subject_id,
        &config.jwt_secret,
        config.refresh_token_ttl,
    ) {
        Ok(pair) => pair,
        Err(e) => {
            error!(error = %e, "Failed to sign refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    debug!(
        user_id = db_user.id,
        jti = %refresh_claims.jti,
        "Storing refresh token"
    );

    if let Err(e) = sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(db_user.id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool.get_ref())
    .await
    {
        error!(error = %e, "Failed to store refresh token");
        return HttpResponse::InternalServerError().finish();
    }

    debug!("Updating last_login_at");

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
        // intentionally not failing login
    }

    info!("Login successful");

    HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token,
    })
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: u64,
    user_id: u64,
    revoked: bool,
}

pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let header = match req.headers().get("Authorization") {
        Some(h) => h.to_str().unwrap_or(""),
        None => return HttpResponse::Unauthorized().body("No token"),
    };

    let token = match header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return HttpResponse::Unauthorized().body("Invalid token"),
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::Unauthorized().finish(),
    };

    if claims.token_type != TokenType::Refresh {
        return HttpResponse::Unauthorized().finish();
    }

    // 🔍 find refresh token in DB
    let record = match sqlx::query_as::<_, RefreshTokenRow>(
        r#"
        SELECT id, user_id, revoked
        FROM refresh_tokens
        WHERE jti = ?
        "#,
    )
    .bind(&claims.jti)
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "Failed to look up refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let record = match record {
        Some(r) if !r.revoked => r,
        _ => return HttpResponse::Unauthorized().finish(),
    };

    // 🔥 revoke old refresh token
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
        .bind(record.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
        return HttpResponse::InternalServerError().finish();
    }

    // 🔄 issue new refresh token
    let (new_refresh_token, new_claims) = match generate_refresh_token(
        claims.user_id,
        claims.sub.clone(),
        claims.role,
        claims.subject_id,
        &config.jwt_secret,
        config.refresh_token_ttl,
    ) {
        Ok(pair) => pair,
        Err(e) => {
            error!(error = %e, "Failed to sign refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(record.user_id)
    .bind(&new_claims.jti)
    .bind(new_claims.exp as i64)
    .execute(pool.get_ref())
    .await
    {
        error!(error = %e, "Failed to store refresh token");
        return HttpResponse::InternalServerError().finish();
    }

    // 🎫 new access token
    let access_token = match generate_access_token(
        claims.user_id,
        claims.sub.clone(),
        claims.role,
        claims.subject_id,
        &config.jwt_secret,
        config.access_token_ttl,
    ) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "Failed to sign access token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    HttpResponse::Ok().json(serde_json::json!({
        "access_token": access_token,
        "refresh_token": new_refresh_token
    }))
}

pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let header = match req.headers().get("Authorization") {
        Some(h) => h.to_str().unwrap_or(""),
        None => return HttpResponse::NoContent().finish(),
    };

    let token = match header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return HttpResponse::NoContent().finish(),
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::NoContent().finish(),
    };

    // only refresh tokens can logout
    if claims.token_type != TokenType::Refresh {
        return HttpResponse::NoContent().finish();
    }

    // revoke refresh token (idempotent)
    let _ = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = 1
        WHERE jti = ?
        "#,
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await;

    // success (even if token didn't exist)
    HttpResponse::NoContent().finish()
}
