use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::error::MarketError;
use crate::models::Role;

/// Bearer token claims: identity + role, expiring `exp` seconds after epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

impl Claims {
    pub fn require_role(&self, role: Role, message: &str) -> Result<(), MarketError> {
        if self.role == role {
            Ok(())
        } else {
            Err(MarketError::Forbidden(message.to_string()))
        }
    }
}

/// Issues and verifies the signed, time-limited tokens gating mutating routes.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn issue(&self, identifier: &str, role: Role) -> Result<String, MarketError> {
        let claims = Claims {
            sub: identifier.to_string(),
            role,
            exp: (Utc::now() + self.ttl).timestamp() as usize,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
            .map_err(MarketError::internal)
    }

    /// Malformed, expired, and badly signed tokens all fail the same way.
    pub fn verify(&self, token: &str) -> Result<Claims, MarketError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| MarketError::Unauthorized("Invalid or expired token!".to_string()))
    }
}

pub fn hash_secret(secret: &str) -> Result<String, MarketError> {
    bcrypt::hash(secret, bcrypt::DEFAULT_COST).map_err(MarketError::internal)
}

pub fn verify_secret(secret: &str, hash: &str) -> Result<bool, MarketError> {
    bcrypt::verify(secret, hash).map_err(MarketError::internal)
}

/// Uniform gate for every mutating route: verified claims land in request
/// extensions, handlers decide role and ownership from there.
pub async fn require_token(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, MarketError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| MarketError::Unauthorized("Missing bearer token!".to_string()))?;
    let claims = state.tokens.verify(token)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test-secret", 30)
    }

    #[test]
    fn issued_token_round_trips() {
        let tokens = issuer();
        let token = tokens.issue("alice", Role::Farmer).unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.role, Role::Farmer);
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let tokens = issuer();
        // Encode directly with an exp far enough in the past to clear the
        // default validation leeway.
        let claims = Claims {
            sub: "alice".to_string(),
            role: Role::Client,
            exp: (Utc::now() - Duration::minutes(10)).timestamp() as usize,
        };
        let token =
            jsonwebtoken::encode(&Header::default(), &claims, &tokens.encoding).unwrap();
        assert!(matches!(
            tokens.verify(&token),
            Err(MarketError::Unauthorized(_))
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_unauthorized() {
        let token = TokenIssuer::new("other-secret", 30)
            .issue("alice", Role::Client)
            .unwrap();
        assert!(matches!(
            issuer().verify(&token),
            Err(MarketError::Unauthorized(_))
        ));
    }

    #[test]
    fn malformed_token_is_unauthorized() {
        assert!(matches!(
            issuer().verify("not-a-token"),
            Err(MarketError::Unauthorized(_))
        ));
    }

    #[test]
    fn role_mismatch_is_forbidden() {
        let tokens = issuer();
        let token = tokens.issue("bob", Role::Client).unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert!(claims.require_role(Role::Client, "no").is_ok());
        assert!(matches!(
            claims.require_role(Role::Farmer, "Only farmers can manage products!"),
            Err(MarketError::Forbidden(_))
        ));
    }

    #[test]
    fn secret_hashing_verifies_and_rejects() {
        let hash = hash_secret("pass123").unwrap();
        assert_ne!(hash, "pass123");
        assert!(verify_secret("pass123", &hash).unwrap());
        assert!(!verify_secret("wrong", &hash).unwrap());
    }
}
