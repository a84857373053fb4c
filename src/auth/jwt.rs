use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::{Claims, TokenType};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs() as usize
}

fn make_claims(
    user_id: u64,
    enrollment_number: String,
    role: u8,
    subject_id: Option<u64>,
    ttl: usize,
    token_type: TokenType,
) -> Claims {
    Claims {
        user_id,
        sub: enrollment_number,
        role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
        subject_id,
    }
}

pub fn generate_access_token(
    user_id: u64,
    enrollment_number: String,
    role: u8,
    subject_id: Option<u64>,
    secret: &str,
    ttl: usize,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = make_claims(user_id, enrollment_number, role, subject_id, ttl, TokenType::Access);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn generate_refresh_token(
    user_id: u64,
    enrollment_number: String,
    role: u8,
    subject_id: Option<u64>,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), jsonwebtoken::errors::Error> {
    let claims = make_claims(user_id, enrollment_number, role, subject_id, ttl, TokenType::Refresh);

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_roundtrip() {
        let token =
            generate_access_token(7, "TCH101".into(), 2, Some(3), "test-secret", 900).unwrap();
        let claims = verify_token(&token, "test-secret").unwrap();

        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.sub, "TCH101");
        assert_eq!(claims.role, 2);
        assert_eq!(claims.subject_id, Some(3));
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_access_token(7, "TCH101".into(), 2, None, "test-secret", 900).unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
    }
}
