//! Payment Gateway Integration
//!
//! Abstraction over the hosted payment provider. The provider exposes two
//! operations we depend on: create an order/checkout session, and list the
//! payment attempts made against an order.

mod cashfree;
mod mock;

pub use cashfree::{CashfreeClient, GatewayConfig};
pub use mock::MockGateway;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vault_core::{DocumentId, UserId};

use crate::error::Result;
use crate::order::OrderId;

/// Everything the gateway needs to open a checkout session
#[derive(Clone, Debug)]
pub struct SessionRequest {
    pub order_id: OrderId,
    pub amount: Decimal,
    pub currency: String,
    pub customer_id: UserId,
    pub customer_email: String,
    pub customer_name: String,
    pub document_id: DocumentId,

    /// Gateway stops accepting payment after this instant
    pub expires_at: DateTime<Utc>,
}

/// A session opened by the gateway
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewaySession {
    pub order_id: OrderId,

    /// Provider-issued token consumed by the hosted checkout
    pub session_token: String,
}

/// Settlement status of one payment attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Success,
    Pending,
    Failed,
    Other(String),
}

impl PaymentStatus {
    /// Translate the provider's status literal. This is the only place the
    /// provider's success marker is interpreted.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "SUCCESS" => Self::Success,
            "PENDING" | "NOT_ATTEMPTED" => Self::Pending,
            "FAILED" | "USER_DROPPED" | "CANCELLED" | "VOID" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_settled(&self) -> bool {
        *self == Self::Success
    }
}

/// A payment attempt as reported by the provider
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub payment_status: String,

    /// Remaining provider fields, kept for diagnostics
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl PaymentAttempt {
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::from_provider(&self.payment_status)
    }
}

/// Outcome of querying an order's payments
#[derive(Clone, Debug, Serialize)]
pub struct Verification {
    pub settled: bool,

    /// The successful attempt, or the latest one when nothing settled
    pub payment: Option<PaymentAttempt>,
}

impl Verification {
    /// Settled iff at least one attempt succeeded
    pub fn from_attempts(mut attempts: Vec<PaymentAttempt>) -> Self {
        match attempts.iter().position(|a| a.status().is_settled()) {
            Some(index) => Self {
                settled: true,
                payment: Some(attempts.swap_remove(index)),
            },
            None => Self {
                settled: false,
                payment: attempts.pop(),
            },
        }
    }
}

/// Payment gateway client trait (Strategy pattern)
///
/// No implementation retries internally; callers decide.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a checkout session for an order
    async fn create_session(&self, request: &SessionRequest) -> Result<GatewaySession>;

    /// Query settlement of an order. Transport and auth failures are errors,
    /// "not settled yet" is `Ok` with `settled == false`.
    async fn verify_session(&self, order_id: &OrderId) -> Result<Verification>;

    /// Raw order details, for diagnostics
    async fn order_details(&self, order_id: &OrderId) -> Result<serde_json::Value>;

    /// Gateway name
    fn name(&self) -> &str;
}
