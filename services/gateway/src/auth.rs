use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use chrono::{DateTime, Utc};
use headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;
use types::ids::UserId;
use types::user::{PublicUser, Role};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub role: Role,
    pub iat: u64,
    pub exp: u64,
}

/// Signed access token handed out at login
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// HS256 signing and verification keys
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, user: &PublicUser, now: DateTime<Utc>) -> Result<IssuedToken, AppError> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("token ttl out of range: {}", e)))?;
        let expires_at = now + ttl;
        let claims = Claims {
            sub: user.id,
            role: user.role,
            iat: now.timestamp().max(0) as u64,
            exp: expires_at.timestamp().max(0) as u64,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("token signing failed: {}", e)))?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Check signature and expiry
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                warn!(error = %e, "rejected access token");
                AppError::Unauthorized("Invalid or expired token".to_string())
            })
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Bearer token from the Authorization header, or the `token` query
/// parameter (browsers cannot set headers on websocket upgrades).
fn bearer_token(parts: &Parts) -> Option<String> {
    if let Some(Authorization(bearer)) = parts.headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }
    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if self.role != role {
            return Err(AppError::Forbidden(format!(
                "Only {} accounts may do this",
                role
            )));
        }
        Ok(())
    }

    async fn from_token(token: &str, state: &AppState) -> Result<Self, AppError> {
        let claims = state.tokens.verify(token)?;
        // The account must still exist
        let user = state
            .market
            .read()
            .await
            .user(claims.sub)
            .map_err(|_| AppError::Unauthorized("Account no longer exists".to_string()))?;
        Ok(AuthenticatedUser {
            user_id: user.id,
            role: user.role,
        })
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            AppError::Unauthorized("Missing authentication credentials".to_string())
        })?;
        Self::from_token(&token, state).await
    }
}

/// Caller identity on public routes. Absent credentials are fine, bad ones are not.
#[derive(Debug, Clone, Copy)]
pub struct OptionalUser(pub Option<AuthenticatedUser>);

impl OptionalUser {
    pub fn user_id(&self) -> Option<UserId> {
        self.0.map(|u| u.user_id)
    }
}

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) => AuthenticatedUser::from_token(&token, state)
                .await
                .map(|u| OptionalUser(Some(u))),
            None => Ok(OptionalUser(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn keys() -> TokenKeys {
        TokenKeys::new(b"test-secret-0123456789", Duration::from_secs(3600))
    }

    fn user(role: Role) -> PublicUser {
        PublicUser {
            id: UserId::new(),
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            role,
            company: None,
            phone: None,
            avatar_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let keys = keys();
        let user = user(Role::Owner);
        let issued = keys.issue(&user, Utc::now()).unwrap();
        let claims = keys.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Owner);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issued = keys().issue(&user(Role::Owner), Utc::now()).unwrap();
        let other = TokenKeys::new(b"another-secret-abcdefgh", Duration::from_secs(3600));
        assert!(matches!(
            other.verify(&issued.token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = keys();
        let long_ago = Utc::now() - chrono::Duration::days(2);
        let issued = keys.issue(&user(Role::Advertiser), long_ago).unwrap();
        assert!(keys.verify(&issued.token).is_err());
    }

    #[test]
    fn test_bearer_token_sources() {
        let (parts, _) = Request::builder()
            .uri("/v1/users/me")
            .header("Authorization", "Bearer abc.def.ghi")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts).as_deref(), Some("abc.def.ghi"));

        let (parts, _) = Request::builder()
            .uri("/v1/ws?token=xyz")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts).as_deref(), Some("xyz"));

        let (parts, _) = Request::builder()
            .uri("/v1/ws")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts), None);
    }

    #[test]
    fn test_require_role() {
        let caller = AuthenticatedUser {
            user_id: UserId::new(),
            role: Role::Advertiser,
        };
        assert!(caller.require_role(Role::Advertiser).is_ok());
        assert!(matches!(
            caller.require_role(Role::Owner),
            Err(AppError::Forbidden(_))
        ));
    }
}
