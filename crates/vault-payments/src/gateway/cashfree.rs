//! Cashfree Payment Gateway Client
//!
//! Thin wrapper over the Cashfree PG REST API (`x-api-version: 2023-08-01`):
//!
//! - `POST /orders` opens an order and returns a `payment_session_id`
//! - `GET /orders/{id}/payments` lists payment attempts
//! - `GET /orders/{id}` returns the order itself

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{GatewaySession, PaymentAttempt, PaymentGateway, SessionRequest, Verification};
use crate::error::{PaymentError, Result};
use crate::order::OrderId;

/// Sandbox endpoint; production is `https://api.cashfree.com/pg`
pub const SANDBOX_BASE_URL: &str = "https://sandbox.cashfree.com/pg";

/// API version pinned by this client
pub const API_VERSION: &str = "2023-08-01";

/// Gateway configuration, passed explicitly to the client
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// API base URL
    pub base_url: String,

    /// `x-client-id` credential
    pub client_id: String,

    /// `x-client-secret` credential; also signs webhooks
    pub client_secret: String,

    /// `x-api-version` header
    pub api_version: String,

    /// Where the hosted checkout sends the browser afterwards
    pub return_url: String,

    /// Cashfree requires a phone number; used when users have none
    pub customer_phone: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>, return_url: impl Into<String>) -> Self {
        Self {
            base_url: SANDBOX_BASE_URL.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_version: API_VERSION.into(),
            return_url: return_url.into(),
            customer_phone: "9999999999".into(),
            timeout: Duration::from_secs(20),
        }
    }

    /// Create from environment variables
    ///
    /// `return_url` is supplied by the caller since it depends on where the
    /// server itself is reachable.
    pub fn from_env(return_url: impl Into<String>) -> Result<Self> {
        let client_id = std::env::var("CASHFREE_CLIENT_ID")
            .map_err(|_| PaymentError::Config("CASHFREE_CLIENT_ID not set".into()))?;
        let client_secret = std::env::var("CASHFREE_CLIENT_SECRET")
            .map_err(|_| PaymentError::Config("CASHFREE_CLIENT_SECRET not set".into()))?;

        let mut config = Self::new(client_id, client_secret, return_url);

        if let Ok(base_url) = std::env::var("CASHFREE_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(version) = std::env::var("CASHFREE_API_VERSION") {
            config.api_version = version;
        }
        if let Ok(phone) = std::env::var("CASHFREE_CUSTOMER_PHONE") {
            config.customer_phone = phone;
        }
        if let Some(secs) = std::env::var("CASHFREE_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()) {
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    #[serde(with = "rust_decimal::serde::float")]
    order_amount: Decimal,
    order_currency: &'a str,
    order_id: &'a str,
    customer_details: CustomerDetails<'a>,
    order_meta: OrderMeta,
    order_expiry_time: String,
}

#[derive(Serialize)]
struct CustomerDetails<'a> {
    customer_id: &'a str,
    customer_phone: &'a str,
    customer_name: &'a str,
    customer_email: &'a str,
}

#[derive(Serialize)]
struct OrderMeta {
    return_url: String,
}

#[derive(Deserialize)]
struct CreateOrderResponse {
    payment_session_id: String,
}

/// Cashfree client
pub struct CashfreeClient {
    http: Client,
    config: GatewayConfig,
}

impl CashfreeClient {
    /// Create a new client; the HTTP client carries the configured timeout
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Config(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables
    pub fn from_env(return_url: impl Into<String>) -> Result<Self> {
        Self::new(GatewayConfig::from_env(return_url)?)
    }

    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Return URL for an order, carrying both identifiers
    fn return_url(&self, request: &SessionRequest) -> Result<String> {
        let url = Url::parse_with_params(
            &self.config.return_url,
            &[
                ("order_id", request.order_id.as_str()),
                ("pdf_id", request.document_id.as_str()),
            ],
        )
        .map_err(|e| PaymentError::Config(format!("invalid return url: {e}")))?;
        Ok(url.into())
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("x-client-id", &self.config.client_id)
            .header("x-client-secret", &self.config.client_secret)
            .header("x-api-version", &self.config.api_version)
    }

    /// Turn a non-2xx response into a gateway error carrying the body
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), body = %body, "Cashfree request failed");
        Err(PaymentError::Gateway {
            status: status.as_u16(),
            body,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PaymentGateway for CashfreeClient {
    async fn create_session(&self, request: &SessionRequest) -> Result<GatewaySession> {
        let body = CreateOrderRequest {
            order_amount: request.amount,
            order_currency: &request.currency,
            order_id: request.order_id.as_str(),
            customer_details: CustomerDetails {
                customer_id: request.customer_id.as_str(),
                customer_phone: &self.config.customer_phone,
                customer_name: &request.customer_name,
                customer_email: &request.customer_email,
            },
            order_meta: OrderMeta {
                return_url: self.return_url(request)?,
            },
            order_expiry_time: request.expires_at.to_rfc3339(),
        };

        tracing::info!(
            order_id = %request.order_id,
            amount = %request.amount,
            currency = %request.currency,
            "Creating Cashfree order"
        );

        let response = self
            .authorized(self.http.post(self.url("/orders")))
            .json(&body)
            .send()
            .await?;
        let created: CreateOrderResponse = Self::check(response).await?.json().await?;

        Ok(GatewaySession {
            order_id: request.order_id.clone(),
            session_token: created.payment_session_id,
        })
    }

    async fn verify_session(&self, order_id: &OrderId) -> Result<Verification> {
        tracing::debug!(order_id = %order_id, "Fetching Cashfree payments");

        let response = self
            .authorized(self.http.get(self.url(&format!("/orders/{order_id}/payments"))))
            .send()
            .await?;
        let attempts: Vec<PaymentAttempt> = Self::check(response).await?.json().await?;

        let verification = Verification::from_attempts(attempts);
        tracing::info!(order_id = %order_id, settled = verification.settled, "Verified Cashfree order");
        Ok(verification)
    }

    async fn order_details(&self, order_id: &OrderId) -> Result<serde_json::Value> {
        let response = self
            .authorized(self.http.get(self.url(&format!("/orders/{order_id}"))))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    fn name(&self) -> &str {
        "Cashfree"
    }
}
