//! Server Configuration
//!
//! Everything is read from the environment (optionally seeded by `.env`).

use std::path::PathBuf;
use std::time::Duration;

/// HTTP server settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,

    /// Client application base URL (CORS origin, post-payment redirect)
    pub frontend_url: String,

    /// Where this server is reachable from the outside; the gateway return
    /// URL is built from it
    pub public_url: String,

    /// Root for uploaded PDFs and thumbnails
    pub upload_dir: PathBuf,

    /// Emails that become admins on first sign-in (lowercased)
    pub admin_emails: Vec<String>,

    /// How long a purchase session may stay unsettled
    pub order_ttl: Duration,

    /// Maximum upload size in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".into(),
            frontend_url: "http://localhost:3000".into(),
            public_url: "http://localhost:5000".into(),
            upload_dir: PathBuf::from("uploads"),
            admin_emails: Vec::new(),
            order_ttl: Duration::from_secs(24 * 60 * 60),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Create from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            frontend_url: std::env::var("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            public_url: std::env::var("PUBLIC_URL").unwrap_or(defaults.public_url),
            upload_dir: std::env::var("UPLOAD_DIR").map_or(defaults.upload_dir, PathBuf::from),
            admin_emails: std::env::var("VAULT_ADMIN_EMAILS")
                .map(|list| parse_emails(&list))
                .unwrap_or_default(),
            order_ttl: std::env::var("ORDER_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map_or(defaults.order_ttl, Duration::from_secs),
            max_upload_bytes: defaults.max_upload_bytes,
        }
    }

    /// Gateway return URL; order and document ids are appended per order
    pub fn payment_return_url(&self) -> String {
        format!("{}/api/payments/redirect", self.public_url.trim_end_matches('/'))
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }
}

fn parse_emails(list: &str) -> Vec<String> {
    list.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Bearer token verification settings
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// HS256 shared secret
    pub jwt_secret: String,

    /// Expected `aud` claim, if any
    pub audience: Option<String>,

    /// Expected `iss` claim, if any
    pub issuer: Option<String>,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            audience: None,
            issuer: None,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let secret = std::env::var("AUTH_JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("AUTH_JWT_SECRET not set"))?;

        Ok(Self {
            jwt_secret: secret,
            audience: std::env::var("AUTH_JWT_AUDIENCE").ok(),
            issuer: std::env::var("AUTH_JWT_ISSUER").ok(),
        })
    }
}
