//! Identity Provider Contract
//!
//! Token verification is delegated to an external provider. The vault only
//! needs the verified subject and profile claims.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::user::{Role, User};

/// Claims extracted from a verified bearer token
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Identity {
    /// Stable subject identifier
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl Identity {
    /// Display name, falling back to the email local part
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.email.split('@').next().unwrap_or_default().to_string())
    }

    /// Build the record created on first sign-in
    pub fn to_user(&self, role: Role) -> User {
        let mut user = User::new(&self.subject, &self.email, self.display_name());
        user.photo_url = self.picture.clone().unwrap_or_default();
        user.role = role;
        user
    }
}

/// Verifies bearer tokens issued by the identity provider
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify a token; failures are `VaultError::Unauthorized`
    async fn verify(&self, token: &str) -> Result<Identity>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_fallback() {
        let identity = Identity {
            subject: "uid".into(),
            email: "reader@example.com".into(),
            name: None,
            picture: None,
        };
        assert_eq!(identity.display_name(), "reader");

        let user = identity.to_user(Role::Admin);
        assert!(user.is_admin());
        assert_eq!(user.subject, "uid");
    }
}
