//! Authentication
//!
//! Bearer tokens are HS256 JWTs. A verified subject is mapped to a user
//! record, created on first sight.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use vault_core::{Identity, IdentityVerifier, Role, User, VaultError};

use crate::config::AuthConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Claims we read from the identity token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    pub exp: usize,
}

/// HS256 token verifier
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match &config.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        if let Some(iss) = &config.issuer {
            validation.set_issuer(&[iss]);
        }

        Self {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> vault_core::Result<Identity> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "Token rejected");
            VaultError::Unauthorized(e.to_string())
        })?;

        let claims = data.claims;
        Ok(Identity {
            subject: claims.sub,
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
        })
    }
}

/// Extract the token from `Authorization: Bearer <token>`
fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Unauthorized: No token provided"))?
        .to_str()
        .map_err(|_| ApiError::unauthorized("Unauthorized: Invalid token"))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Unauthorized: No token provided"))
}

/// Authenticated user
#[derive(Clone, Debug)]
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let identity = state
            .identity
            .verify(token)
            .await
            .map_err(|_| ApiError::unauthorized("Unauthorized: Invalid token"))?;

        if let Some(user) = state.users.find_by_subject(&identity.subject)? {
            return Ok(Self(user));
        }

        let role = if state.config.is_admin_email(&identity.email) {
            Role::Admin
        } else {
            Role::User
        };
        let user = state.users.find_or_create(identity.to_user(role))?;
        Ok(Self(user))
    }
}

/// Authenticated user holding the admin role
#[derive(Clone, Debug)]
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, "Admin route denied");
            return Err(ApiError::forbidden("Forbidden: Admin access required"));
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
pub mod test_support {
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::Claims;

    pub const SECRET: &str = "test-secret";

    /// Mint a token valid for an hour
    pub fn token(subject: &str, email: &str) -> String {
        let claims = Claims {
            sub: subject.into(),
            email: email.into(),
            name: None,
            picture: None,
            exp: usize::try_from(chrono::Utc::now().timestamp() + 3600).unwrap_or(usize::MAX),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_verify_token() {
        let verifier = JwtVerifier::new(&AuthConfig::new(test_support::SECRET));
        let identity = verifier
            .verify(&test_support::token("uid-1", "reader@example.com"))
            .await
            .unwrap();

        assert_eq!(identity.subject, "uid-1");
        assert_eq!(identity.display_name(), "reader");
    }

    #[tokio::test]
    async fn test_rejects_wrong_secret() {
        let verifier = JwtVerifier::new(&AuthConfig::new("another-secret"));
        let result = verifier.verify(&test_support::token("uid-1", "a@example.com")).await;
        assert!(matches!(result, Err(VaultError::Unauthorized(_))));
        assert!(verifier.verify("garbage").await.is_err());
    }
}
