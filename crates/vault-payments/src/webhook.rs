//! Cashfree Webhook Handling
//!
//! Payment notifications are a second path to settlement next to the
//! redirect/verify flow. The notification itself is never trusted as proof of
//! payment: a valid success event only triggers the same gateway
//! verification `finalize_purchase` performs, so replays are harmless.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{PaymentError, Result};
use crate::order::OrderId;
use crate::purchase::{FinalizeOutcome, PurchaseOrchestrator};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the base64 signature
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Header carrying the signing timestamp
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// The gateway reports a successful payment
    PaymentSuccess { order_id: OrderId },

    /// A payment attempt failed
    PaymentFailed { order_id: OrderId },

    /// The customer abandoned the checkout
    PaymentDropped { order_id: OrderId },

    /// Unhandled event type
    Other { event_type: String },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Option<EnvelopeData>,
}

#[derive(Deserialize)]
struct EnvelopeData {
    order: EnvelopeOrder,
}

#[derive(Deserialize)]
struct EnvelopeOrder {
    order_id: String,
}

/// Webhook handler
pub struct WebhookHandler {
    orchestrator: Arc<PurchaseOrchestrator>,
    secret: String,
}

impl WebhookHandler {
    /// `secret` is the gateway client secret, which Cashfree signs with
    pub fn new(orchestrator: Arc<PurchaseOrchestrator>, secret: impl Into<String>) -> Self {
        Self {
            orchestrator,
            secret: secret.into(),
        }
    }

    /// Check `base64(HMAC-SHA256(secret, timestamp + payload))`
    pub fn verify_signature(&self, payload: &str, timestamp: &str, signature: &str) -> Result<()> {
        let expected = STANDARD
            .decode(signature.trim())
            .map_err(|_| PaymentError::WebhookSignature("signature is not base64".into()))?;

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| PaymentError::Config(e.to_string()))?;
        mac.update(timestamp.as_bytes());
        mac.update(payload.as_bytes());

        mac.verify_slice(&expected)
            .map_err(|_| PaymentError::WebhookSignature("signature mismatch".into()))
    }

    /// Sign a payload the way the gateway does
    pub fn sign(&self, payload: &str, timestamp: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| PaymentError::Config(e.to_string()))?;
        mac.update(timestamp.as_bytes());
        mac.update(payload.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Parse a webhook body into our event type
    pub fn parse_event(payload: &str) -> Result<WebhookEvent> {
        let envelope: Envelope =
            serde_json::from_str(payload).map_err(|e| PaymentError::WebhookParse(e.to_string()))?;

        let order_id = || {
            envelope
                .data
                .as_ref()
                .map(|d| OrderId::from_string(d.order.order_id.clone()))
                .ok_or_else(|| PaymentError::WebhookParse("missing data.order.order_id".into()))
        };

        Ok(match envelope.event_type.as_str() {
            "PAYMENT_SUCCESS_WEBHOOK" => WebhookEvent::PaymentSuccess { order_id: order_id()? },
            "PAYMENT_FAILED_WEBHOOK" => WebhookEvent::PaymentFailed { order_id: order_id()? },
            "PAYMENT_USER_DROPPED_WEBHOOK" => WebhookEvent::PaymentDropped { order_id: order_id()? },
            other => WebhookEvent::Other {
                event_type: other.to_string(),
            },
        })
    }

    /// Verify, parse and process a webhook delivery
    pub async fn handle(&self, payload: &str, timestamp: &str, signature: &str) -> Result<WebhookEvent> {
        self.verify_signature(payload, timestamp, signature)?;
        let event = Self::parse_event(payload)?;

        tracing::info!(event = ?event, "Processing Cashfree webhook");

        match &event {
            WebhookEvent::PaymentSuccess { order_id } => match self.orchestrator.settle_order(order_id).await {
                Ok(FinalizeOutcome::Granted { newly_granted, .. }) => {
                    tracing::info!(order_id = %order_id, newly_granted, "Webhook settled order");
                }
                Ok(outcome) => {
                    tracing::warn!(order_id = %order_id, outcome = ?outcome, "Webhook success not confirmed by gateway");
                }
                Err(PaymentError::NotFound(_)) => {
                    tracing::warn!(order_id = %order_id, "Webhook for unknown order");
                }
                Err(e) => return Err(e),
            },

            WebhookEvent::PaymentFailed { order_id } | WebhookEvent::PaymentDropped { order_id } => {
                tracing::info!(order_id = %order_id, "Payment attempt did not complete");
            }

            WebhookEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
            }
        }

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::order::MemoryOrderStore;
    use crate::purchase::PurchaseConfig;
    use rust_decimal_macros::dec;
    use vault_core::{
        CatalogStore, Document, EntitlementStore, MemoryCatalogStore, MemoryUserStore, User, UserStore,
    };

    const SECRET: &str = "cf_secret";
    const TIMESTAMP: &str = "1700000000000";

    fn success_payload(order_id: &OrderId) -> String {
        serde_json::json!({
            "data": {
                "order": { "order_id": order_id, "order_amount": 199.0 },
                "payment": { "payment_status": "SUCCESS" }
            },
            "type": "PAYMENT_SUCCESS_WEBHOOK"
        })
        .to_string()
    }

    fn handler() -> (WebhookHandler, Arc<PurchaseOrchestrator>, Arc<MemoryUserStore>, Arc<MockGateway>, Arc<MemoryCatalogStore>) {
        let catalog = Arc::new(MemoryCatalogStore::new());
        let users = Arc::new(MemoryUserStore::new());
        let gateway = Arc::new(MockGateway::new());
        let orchestrator = Arc::new(PurchaseOrchestrator::new(
            catalog.clone(),
            users.clone(),
            Arc::new(MemoryOrderStore::new()),
            gateway.clone(),
            PurchaseConfig::default(),
        ));
        (
            WebhookHandler::new(orchestrator.clone(), SECRET),
            orchestrator,
            users,
            gateway,
            catalog,
        )
    }

    #[test]
    fn test_signature_verification() {
        let (handler, ..) = handler();
        let payload = r#"{"type":"PAYMENT_SUCCESS_WEBHOOK"}"#;
        let signature = handler.sign(payload, TIMESTAMP).unwrap();

        assert!(handler.verify_signature(payload, TIMESTAMP, &signature).is_ok());
        assert!(matches!(
            handler.verify_signature(payload, "1700000000001", &signature),
            Err(PaymentError::WebhookSignature(_))
        ));
        assert!(matches!(
            handler.verify_signature(payload, TIMESTAMP, "not base64!"),
            Err(PaymentError::WebhookSignature(_))
        ));
    }

    #[test]
    fn test_parse_events() {
        let order_id = OrderId::from_string("abc123def456");
        assert_eq!(
            WebhookHandler::parse_event(&success_payload(&order_id)).unwrap(),
            WebhookEvent::PaymentSuccess { order_id }
        );
        assert_eq!(
            WebhookHandler::parse_event(r#"{"type":"REFUND_STATUS_WEBHOOK"}"#).unwrap(),
            WebhookEvent::Other {
                event_type: "REFUND_STATUS_WEBHOOK".into()
            }
        );
        assert!(WebhookHandler::parse_event(r#"{"type":"PAYMENT_SUCCESS_WEBHOOK"}"#).is_err());
        assert!(WebhookHandler::parse_event("not json").is_err());
    }

    #[tokio::test]
    async fn test_forged_success_grants_nothing() {
        let (handler, orchestrator, users, _gateway, catalog) = handler();
        let user = users.find_or_create(User::new("uid-1", "a@example.com", "A")).unwrap();
        let doc = Document::new("Guide", "", "pdfs/g.pdf", 10, dec!(199.00), user.id.clone()).unwrap();
        catalog.save(&doc).unwrap();
        let session = orchestrator.begin_purchase(&user, &doc.id).await.unwrap();

        // Correctly signed but the gateway has no successful attempt
        let payload = success_payload(&session.order_id);
        let signature = handler.sign(&payload, TIMESTAMP).unwrap();
        handler.handle(&payload, TIMESTAMP, &signature).await.unwrap();
        assert!(!users.has_entitlement(&user.id, &doc.id).unwrap());

        // Bad signature is rejected before anything else
        assert!(matches!(
            handler.handle(&payload, TIMESTAMP, "AAAA").await,
            Err(PaymentError::WebhookSignature(_))
        ));
    }

    #[tokio::test]
    async fn test_redelivery_grants_once() {
        let (handler, orchestrator, users, gateway, catalog) = handler();
        let user = users.find_or_create(User::new("uid-1", "a@example.com", "A")).unwrap();
        let doc = Document::new("Guide", "", "pdfs/g.pdf", 10, dec!(199.00), user.id.clone()).unwrap();
        catalog.save(&doc).unwrap();
        let session = orchestrator.begin_purchase(&user, &doc.id).await.unwrap();
        gateway.settle(&session.order_id).unwrap();

        let payload = success_payload(&session.order_id);
        let signature = handler.sign(&payload, TIMESTAMP).unwrap();
        for _ in 0..2 {
            handler.handle(&payload, TIMESTAMP, &signature).await.unwrap();
        }

        assert_eq!(users.entitlements(&user.id).unwrap(), vec![doc.id]);
    }

    #[tokio::test]
    async fn test_late_success_after_sweep_grants() {
        let (handler, orchestrator, users, gateway, catalog) = handler();
        let user = users.find_or_create(User::new("uid-1", "a@example.com", "A")).unwrap();
        let doc = Document::new("Guide", "", "pdfs/g.pdf", 10, dec!(199.00), user.id.clone()).unwrap();
        catalog.save(&doc).unwrap();
        let session = orchestrator.begin_purchase(&user, &doc.id).await.unwrap();

        let later = chrono::Utc::now() + chrono::Duration::hours(25);
        assert_eq!(orchestrator.expire_stale_orders(later).await.unwrap().len(), 1);

        gateway.settle(&session.order_id).unwrap();
        let payload = success_payload(&session.order_id);
        let signature = handler.sign(&payload, TIMESTAMP).unwrap();
        handler.handle(&payload, TIMESTAMP, &signature).await.unwrap();

        assert!(users.has_entitlement(&user.id, &doc.id).unwrap());
    }

    #[tokio::test]
    async fn test_unknown_order_is_ignored() {
        let (handler, ..) = handler();
        let payload = success_payload(&OrderId::generate());
        let signature = handler.sign(&payload, TIMESTAMP).unwrap();
        assert!(handler.handle(&payload, TIMESTAMP, &signature).await.is_ok());
    }
}
