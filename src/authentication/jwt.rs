use chrono::Duration;
use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::error::ApiError;
use crate::schema::{Id, User};
use crate::store::Store;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    /// Key under which the token is stored; deleting it revokes the token.
    pub jti: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(user_id: Id, ttl: Duration) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + ttl).timestamp();

        Self {
            user_id,
            jti: Uuid::new_v4().to_string(),
            iat,
            exp,
        }
    }

    pub fn is_expired(&self) -> bool {
        (self.exp - Utc::now().timestamp()).is_negative()
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct SessionData {
    pub user: User,
}

impl SessionData {
    pub fn user_id(&self) -> Id {
        self.user.id
    }
}

#[derive(Clone)]
pub struct TokenSigner {
    key: Hmac<Sha256>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_hours: i64) -> Result<Self, ApiError> {
        let key = Hmac::new_from_slice(secret.as_bytes())
            .map_err(|e| ApiError::Internal(format!("Invalid signing key: {e}")))?;

        Ok(Self {
            key,
            ttl: Duration::hours(ttl_hours),
        })
    }

    pub fn sign(&self, claims: &JwtSessionData) -> Result<String, ApiError> {
        claims
            .sign_with_key(&self.key)
            .map_err(|e| ApiError::Internal(format!("Could not sign token: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<JwtSessionData, ApiError> {
        let session: JwtSessionData = token
            .verify_with_key(&self.key)
            .map_err(|_| ApiError::Unauthenticated)?;

        if session.is_expired() {
            return Err(ApiError::Unauthenticated);
        }
        Ok(session)
    }
}

/// Signs a token for `user`. A user holds one stored key at a time; later
/// logins reuse it with a fresh expiry until logout revokes it.
pub async fn issue_token<S: Store>(
    store: &S,
    signer: &TokenSigner,
    user: &User,
) -> Result<String, ApiError> {
    let mut claims = JwtSessionData::new(user.id, signer.ttl);
    claims.jti = store.get_or_create_token(user.id, &claims.jti).await?;
    let token = signer.sign(&claims)?;

    log::debug!("> Issued token for user {}", user.id);
    Ok(token)
}

pub async fn revoke_tokens<S: Store>(store: &S, user_id: Id) -> Result<(), ApiError> {
    let revoked = store.delete_tokens(user_id).await?;
    log::debug!("> Revoked {revoked} token(s) of user {user_id}");
    Ok(())
}

/// Resolves a presented token to its user. Fails for bad signatures, expired
/// or revoked tokens and deleted users.
pub async fn verify_session<S: Store>(
    store: &S,
    signer: &TokenSigner,
    token: &str,
) -> Result<SessionData, ApiError> {
    let claims = signer.verify(token)?;

    match store.find_token(&claims.jti).await? {
        Some(owner) if owner == claims.user_id => {}
        _ => return Err(ApiError::Unauthenticated),
    }

    let user = store
        .get_user(claims.user_id)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    Ok(SessionData { user })
}
