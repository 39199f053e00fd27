use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use beacon_db::{users, DbError, DbPool};
use beacon_models::user::PublicUser;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("malformed token")]
    InvalidFormat,
    #[error("unknown user")]
    NotFound,
    #[error("signature mismatch")]
    BadSignature,
    #[error("database error: {0}")]
    Database(#[from] DbError),
}

/// Resolve a session token to a secret-stripped user record.
///
/// Token form: an optional `"Bot "` / `"User "` role prefix, then
/// `<base64-user-id>.<signature>` where the signature is
/// HMAC-SHA256(token_secret, base64-user-id), base64url-encoded.
pub async fn verify_token(pool: &DbPool, token: &str) -> Result<PublicUser, AuthError> {
    let token = token
        .strip_prefix("Bot ")
        .or_else(|| token.strip_prefix("User "))
        .unwrap_or(token);

    let (encoded_id, signature) = token.split_once('.').ok_or(AuthError::InvalidFormat)?;
    let raw_id = STANDARD
        .decode(encoded_id)
        .map_err(|_| AuthError::InvalidFormat)?;
    let user_id = std::str::from_utf8(&raw_id)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(AuthError::InvalidFormat)?;

    let user = users::get_user(pool, user_id)
        .await?
        .ok_or(AuthError::NotFound)?;

    let sig_bytes = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| AuthError::BadSignature)?;
    let mut mac = HmacSha256::new_from_slice(user.token_secret.as_bytes())
        .expect("hmac accepts keys of any length");
    mac.update(encoded_id.as_bytes());
    mac.verify_slice(&sig_bytes)
        .map_err(|_| AuthError::BadSignature)?;

    Ok(user.into_public())
}

/// Mint a token for the given user. The issuing surface lives elsewhere in
/// the system; the gateway only verifies, but tests and tooling need both
/// halves.
pub fn sign_token(user_id: i64, token_secret: &str) -> String {
    let encoded_id = STANDARD.encode(user_id.to_string());
    let mut mac = HmacSha256::new_from_slice(token_secret.as_bytes())
        .expect("hmac accepts keys of any length");
    mac.update(encoded_id.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    format!("{encoded_id}.{signature}")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_pool() -> DbPool {
        let pool = beacon_db::create_pool("sqlite::memory:", 1).await.unwrap();
        beacon_db::run_migrations(&pool).await.unwrap();
        users::create_user(&pool, 42, "ana", 1, "a@example.com", "hash", "top-secret")
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn valid_token_resolves_user() {
        let pool = seeded_pool().await;
        let token = sign_token(42, "top-secret");
        let user = verify_token(&pool, &token).await.unwrap();
        assert_eq!(user.id, 42);
        assert_eq!(user.username, "ana");
    }

    #[tokio::test]
    async fn role_prefix_is_stripped() {
        let pool = seeded_pool().await;
        let token = format!("Bot {}", sign_token(42, "top-secret"));
        assert!(verify_token(&pool, &token).await.is_ok());
        let token = format!("User {}", sign_token(42, "top-secret"));
        assert!(verify_token(&pool, &token).await.is_ok());
    }

    #[tokio::test]
    async fn token_without_separator_is_malformed() {
        let pool = seeded_pool().await;
        let err = verify_token(&pool, "no-dot-here").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidFormat));
    }

    #[tokio::test]
    async fn unknown_user_id_is_not_found() {
        let pool = seeded_pool().await;
        let token = sign_token(999, "whatever");
        let err = verify_token(&pool, &token).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn wrong_secret_is_bad_signature() {
        let pool = seeded_pool().await;
        let token = sign_token(42, "some-other-secret");
        let err = verify_token(&pool, &token).await.unwrap_err();
        assert!(matches!(err, AuthError::BadSignature));
    }
}
