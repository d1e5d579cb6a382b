//! Purchase Orchestration
//!
//! Coordinates checkout session creation, settlement verification and the
//! entitlement grant.
//!
//! ```text
//! NoSession ──begin──▶ Created ──finalize(success)──▶ Settled (entitled)
//!                        │  ▲                            ▲
//!                        │  └── finalize(pending)         │
//!                        └── ttl elapsed, no success ──▶ Expired
//!                                                         └── late success
//! ```
//!
//! An order only expires after the gateway was asked and reported no
//! successful payment, and an expired order is still re-checked on every
//! finalize so a late payment is never lost.
//!
//! Finalization is safe under at-least-once delivery: the grant is a set
//! insert and the settled transition is idempotent, so a redirect retried by
//! the browser, a client retry and a webhook can all race without creating a
//! second entitlement.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Url;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vault_core::{CatalogStore, DocumentId, EntitlementStore, User, UserId};

use crate::error::{PaymentError, Result};
use crate::gateway::{PaymentAttempt, PaymentGateway, SessionRequest};
use crate::order::{Order, OrderId, OrderStatus, OrderStore};

/// Attempts at finding an unused order ID before giving up
const ORDER_ID_ATTEMPTS: usize = 5;

/// Orchestrator settings
#[derive(Clone, Debug)]
pub struct PurchaseConfig {
    /// ISO currency code for every order
    pub currency: String,

    /// How long a session may stay unsettled
    pub order_ttl: chrono::Duration,

    /// Client application base URL for post-payment redirects
    pub frontend_url: String,
}

impl Default for PurchaseConfig {
    fn default() -> Self {
        Self {
            currency: "INR".into(),
            order_ttl: chrono::Duration::hours(24),
            frontend_url: "http://localhost:3000".into(),
        }
    }
}

/// Returned by `begin_purchase`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub order_id: OrderId,
    pub payment_session_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub expires_at: DateTime<Utc>,
}

/// Body of a finalize call
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FinalizeRequest {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub pdf_id: Option<String>,
}

/// Result of `finalize_purchase`
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FinalizeOutcome {
    /// Settlement confirmed; the user owns the document
    Granted {
        order_id: OrderId,
        document_id: DocumentId,
        /// False when a previous call already granted it
        newly_granted: bool,
        payment: Option<PaymentAttempt>,
    },

    /// The user already owned the document; nothing was checked or changed
    AlreadyOwned { document_id: DocumentId },

    /// The gateway reports no successful payment (yet)
    Pending {
        order_id: OrderId,
        /// The session passed its TTL and will not settle
        expired: bool,
    },
}

impl FinalizeOutcome {
    pub const fn is_entitled(&self) -> bool {
        matches!(self, Self::Granted { .. } | Self::AlreadyOwned { .. })
    }
}

/// Purchase orchestrator
pub struct PurchaseOrchestrator {
    catalog: Arc<dyn CatalogStore>,
    entitlements: Arc<dyn EntitlementStore>,
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    config: PurchaseConfig,
}

impl PurchaseOrchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        entitlements: Arc<dyn EntitlementStore>,
        orders: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: PurchaseConfig,
    ) -> Self {
        Self {
            catalog,
            entitlements,
            orders,
            gateway,
            config,
        }
    }

    pub const fn config(&self) -> &PurchaseConfig {
        &self.config
    }

    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.gateway.as_ref()
    }

    /// Open a checkout session for a paid document.
    ///
    /// Never grants access. A gateway failure leaves every store unchanged.
    pub async fn begin_purchase(&self, user: &User, document_id: &DocumentId) -> Result<SessionDescriptor> {
        let document = self
            .catalog
            .get(document_id)?
            .ok_or_else(|| PaymentError::NotFound("PDF".into()))?;

        if document.is_free() {
            return Err(PaymentError::InvalidRequest(
                "free document does not require payment".into(),
            ));
        }

        if self.entitlements.has_entitlement(&user.id, document_id)? {
            return Err(PaymentError::InvalidRequest(
                "You have already purchased this PDF".into(),
            ));
        }

        let order_id = self.unused_order_id()?;
        let expires_at = Utc::now() + self.config.order_ttl;
        let request = SessionRequest {
            order_id: order_id.clone(),
            amount: document.price(),
            currency: self.config.currency.clone(),
            customer_id: user.id.clone(),
            customer_email: user.email.clone(),
            customer_name: user.display_name.clone(),
            document_id: document_id.clone(),
            expires_at,
        };

        let session = self.gateway.create_session(&request).await.map_err(|e| {
            tracing::error!(order_id = %order_id, error = %e, "Gateway session creation failed");
            e
        })?;

        let order = Order::new(
            order_id.clone(),
            user.id.clone(),
            document_id.clone(),
            request.amount,
            &request.currency,
            &session.session_token,
        );
        if !self.orders.insert(&order)? {
            return Err(PaymentError::Storage(format!("order {order_id} already recorded")));
        }

        tracing::info!(
            order_id = %order_id,
            user_id = %user.id,
            document_id = %document_id,
            amount = %request.amount,
            gateway = self.gateway.name(),
            "Purchase session created"
        );

        Ok(SessionDescriptor {
            order_id,
            payment_session_id: session.session_token,
            amount: request.amount,
            currency: request.currency,
            expires_at,
        })
    }

    /// Verify settlement and grant the entitlement. Safe to call repeatedly.
    pub async fn finalize_purchase(&self, user_id: &UserId, request: &FinalizeRequest) -> Result<FinalizeOutcome> {
        let (order_id, document_id) = match (non_empty(&request.order_id), non_empty(&request.pdf_id)) {
            (Some(order), Some(pdf)) => (OrderId::from_string(order), DocumentId::from_string(pdf)),
            _ => {
                return Err(PaymentError::InvalidRequest(
                    "order_id and pdf_id are required".into(),
                ));
            }
        };

        if self.entitlements.has_entitlement(user_id, &document_id)? {
            tracing::debug!(user_id = %user_id, document_id = %document_id, "Finalize on owned document");
            return Ok(FinalizeOutcome::AlreadyOwned { document_id });
        }

        let order = self
            .orders
            .get(&order_id)?
            .ok_or_else(|| PaymentError::NotFound("Order".into()))?;

        if &order.user_id != user_id || order.document_id != document_id {
            tracing::warn!(
                order_id = %order_id,
                user_id = %user_id,
                document_id = %document_id,
                "Finalize does not match the order binding"
            );
            return Err(PaymentError::InvalidRequest(
                "order does not match this purchase".into(),
            ));
        }

        self.settle(order).await
    }

    /// Settle an order from a gateway notification, using the stored binding
    pub async fn settle_order(&self, order_id: &OrderId) -> Result<FinalizeOutcome> {
        let order = self
            .orders
            .get(order_id)?
            .ok_or_else(|| PaymentError::NotFound("Order".into()))?;
        self.settle(order).await
    }

    async fn settle(&self, order: Order) -> Result<FinalizeOutcome> {
        // A previous grant may have succeeded without its response arriving
        if order.status == OrderStatus::Settled {
            return self.grant(&order, None);
        }

        let verification = self.gateway.verify_session(&order.id).await?;

        if verification.settled {
            if order.status == OrderStatus::Expired {
                tracing::info!(order_id = %order.id, "Late payment on expired session");
            }
            self.orders.transition(&order.id, OrderStatus::Settled)?;
            return self.grant(&order, verification.payment);
        }

        let expired = order.status == OrderStatus::Expired || order.is_stale(Utc::now(), self.config.order_ttl);
        if order.status == OrderStatus::Created && expired {
            if !self.expire(&order.id)? {
                return self.grant(&order, None);
            }
            tracing::info!(order_id = %order.id, "Purchase session expired");
        } else if !expired {
            tracing::info!(order_id = %order.id, "Payment not settled yet");
        }

        Ok(FinalizeOutcome::Pending {
            order_id: order.id,
            expired,
        })
    }

    /// Mark an unsettled order expired; false if it settled in the meantime
    fn expire(&self, order_id: &OrderId) -> Result<bool> {
        match self.orders.transition(order_id, OrderStatus::Expired) {
            Ok(_) => Ok(true),
            Err(PaymentError::InvalidRequest(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn grant(&self, order: &Order, payment: Option<PaymentAttempt>) -> Result<FinalizeOutcome> {
        let newly_granted = self.entitlements.grant(&order.user_id, &order.document_id)?;

        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            document_id = %order.document_id,
            newly_granted,
            "Entitlement granted"
        );

        Ok(FinalizeOutcome::Granted {
            order_id: order.id.clone(),
            document_id: order.document_id.clone(),
            newly_granted,
            payment,
        })
    }

    /// Where the hosted checkout should send the browser. No verification,
    /// no mutation.
    pub fn redirect_url(&self, order_id: &str, document_id: &str) -> Result<String> {
        if order_id.is_empty() || document_id.is_empty() {
            return Err(PaymentError::InvalidRequest(
                "order_id and pdf_id are required".into(),
            ));
        }

        let base = format!("{}/payment-success", self.config.frontend_url.trim_end_matches('/'));
        let url = Url::parse_with_params(&base, &[("order_id", order_id), ("pdf_id", document_id)])
            .map_err(|e| PaymentError::Config(format!("invalid frontend url: {e}")))?;
        Ok(url.into())
    }

    /// Reconcile every session older than the TTL with the gateway.
    ///
    /// Orders the gateway reports as paid are settled and granted, the rest
    /// are expired. Orders that cannot be verified right now are left for the
    /// next sweep. Returns the IDs that were expired.
    pub async fn expire_stale_orders(&self, now: DateTime<Utc>) -> Result<Vec<OrderId>> {
        let stale = self.orders.created_before(now - self.config.order_ttl)?;
        let mut expired = Vec::new();

        for order in stale {
            let verification = match self.gateway.verify_session(&order.id).await {
                Ok(verification) => verification,
                Err(e) => {
                    tracing::warn!(order_id = %order.id, error = %e, "Sweep could not verify order, skipping");
                    continue;
                }
            };

            if verification.settled {
                tracing::info!(order_id = %order.id, "Sweep found settled payment");
                self.orders.transition(&order.id, OrderStatus::Settled)?;
                self.grant(&order, verification.payment)?;
            } else if self.expire(&order.id)? {
                expired.push(order.id);
            }
        }

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Expired stale purchase sessions");
        }
        Ok(expired)
    }

    fn unused_order_id(&self) -> Result<OrderId> {
        for _ in 0..ORDER_ID_ATTEMPTS {
            let candidate = OrderId::generate();
            if self.orders.get(&candidate)?.is_none() {
                return Ok(candidate);
            }
            tracing::warn!(order_id = %candidate, "Order ID collision, regenerating");
        }
        Err(PaymentError::Storage("could not allocate an order id".into()))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::order::MemoryOrderStore;
    use rust_decimal_macros::dec;
    use vault_core::{Document, MemoryCatalogStore, MemoryUserStore, UserStore};

    struct Fixture {
        catalog: Arc<MemoryCatalogStore>,
        users: Arc<MemoryUserStore>,
        orders: Arc<MemoryOrderStore>,
        gateway: Arc<MockGateway>,
        orchestrator: PurchaseOrchestrator,
        user: User,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_config(PurchaseConfig::default())
        }

        fn with_config(config: PurchaseConfig) -> Self {
            let catalog = Arc::new(MemoryCatalogStore::new());
            let users = Arc::new(MemoryUserStore::new());
            let orders = Arc::new(MemoryOrderStore::new());
            let gateway = Arc::new(MockGateway::new());
            let orchestrator = PurchaseOrchestrator::new(
                catalog.clone(),
                users.clone(),
                orders.clone(),
                gateway.clone(),
                config,
            );
            let user = users
                .find_or_create(User::new("uid-1", "user1@example.com", "User One"))
                .unwrap();

            Self {
                catalog,
                users,
                orders,
                gateway,
                orchestrator,
                user,
            }
        }

        fn document(&self, price: Decimal) -> DocumentId {
            let doc = Document::new("Guide", "A guide", "pdfs/guide.pdf", 1024, price, self.user.id.clone()).unwrap();
            self.catalog.save(&doc).unwrap();
            doc.id
        }

        fn finalize_request(order_id: &OrderId, doc: &DocumentId) -> FinalizeRequest {
            FinalizeRequest {
                order_id: Some(order_id.to_string()),
                pdf_id: Some(doc.to_string()),
            }
        }

        fn owned(&self) -> Vec<DocumentId> {
            self.users.entitlements(&self.user.id).unwrap()
        }
    }

    #[tokio::test]
    async fn test_free_document_rejected() {
        let f = Fixture::new();
        let doc = f.document(Decimal::ZERO);

        let err = f.orchestrator.begin_purchase(&f.user, &doc).await.unwrap_err();
        match err {
            PaymentError::InvalidRequest(msg) => assert_eq!(msg, "free document does not require payment"),
            other => panic!("unexpected error: {other}"),
        }

        // Also when already entitled
        f.users.grant(&f.user.id, &doc).unwrap();
        assert!(matches!(
            f.orchestrator.begin_purchase(&f.user, &doc).await,
            Err(PaymentError::InvalidRequest(_))
        ));
        assert_eq!(f.gateway.sessions_created(), 0);
    }

    #[tokio::test]
    async fn test_missing_document() {
        let f = Fixture::new();
        let result = f.orchestrator.begin_purchase(&f.user, &DocumentId::new()).await;
        assert!(matches!(result, Err(PaymentError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_pending_then_settled() {
        let f = Fixture::new();
        let doc = f.document(dec!(199.00));

        let session = f.orchestrator.begin_purchase(&f.user, &doc).await.unwrap();
        assert_eq!(session.order_id.as_str().len(), 12);
        assert!(session.order_id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(session.amount, dec!(199.00));
        assert_eq!(session.currency, "INR");
        assert!(f.owned().is_empty());

        let request = Fixture::finalize_request(&session.order_id, &doc);

        // Not yet settled
        let outcome = f.orchestrator.finalize_purchase(&f.user.id, &request).await.unwrap();
        assert!(matches!(outcome, FinalizeOutcome::Pending { expired: false, .. }));
        assert!(f.owned().is_empty());

        // One successful attempt
        f.gateway.settle(&session.order_id).unwrap();
        let outcome = f.orchestrator.finalize_purchase(&f.user.id, &request).await.unwrap();
        assert!(matches!(outcome, FinalizeOutcome::Granted { newly_granted: true, .. }));
        assert_eq!(f.owned(), vec![doc.clone()]);
        assert_eq!(
            f.orders.get(&session.order_id).unwrap().unwrap().status,
            OrderStatus::Settled
        );

        // Second finalize is a no-op
        let outcome = f.orchestrator.finalize_purchase(&f.user.id, &request).await.unwrap();
        assert!(matches!(outcome, FinalizeOutcome::AlreadyOwned { .. }));
        assert_eq!(f.owned(), vec![doc.clone()]);

        // And buying again is rejected
        assert!(matches!(
            f.orchestrator.begin_purchase(&f.user, &doc).await,
            Err(PaymentError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_finalize_grants_once() {
        let f = Fixture::new();
        let doc = f.document(dec!(50));
        let session = f.orchestrator.begin_purchase(&f.user, &doc).await.unwrap();
        f.gateway.settle(&session.order_id).unwrap();

        let request = Fixture::finalize_request(&session.order_id, &doc);
        let (a, b) = tokio::join!(
            f.orchestrator.finalize_purchase(&f.user.id, &request),
            f.orchestrator.settle_order(&session.order_id),
        );

        assert!(a.unwrap().is_entitled());
        assert!(b.unwrap().is_entitled());
        assert_eq!(f.owned(), vec![doc]);
    }

    #[tokio::test]
    async fn test_already_entitled_finalize_any_order() {
        let f = Fixture::new();
        let doc = f.document(dec!(10));
        f.users.grant(&f.user.id, &doc).unwrap();

        let request = FinalizeRequest {
            order_id: Some("unknown12345".into()),
            pdf_id: Some(doc.to_string()),
        };
        let outcome = f.orchestrator.finalize_purchase(&f.user.id, &request).await.unwrap();
        assert!(matches!(outcome, FinalizeOutcome::AlreadyOwned { .. }));
        assert_eq!(f.owned().len(), 1);
        assert_eq!(f.gateway.verifications(), 0);
    }

    #[tokio::test]
    async fn test_malformed_finalize() {
        let f = Fixture::new();
        for request in [
            FinalizeRequest::default(),
            FinalizeRequest { order_id: Some("abc".into()), pdf_id: None },
            FinalizeRequest { order_id: Some("  ".into()), pdf_id: Some("doc".into()) },
        ] {
            assert!(matches!(
                f.orchestrator.finalize_purchase(&f.user.id, &request).await,
                Err(PaymentError::InvalidRequest(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let f = Fixture::new();
        let doc = f.document(dec!(10));
        let request = Fixture::finalize_request(&OrderId::generate(), &doc);
        assert!(matches!(
            f.orchestrator.finalize_purchase(&f.user.id, &request).await,
            Err(PaymentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mismatched_binding_rejected() {
        let f = Fixture::new();
        let paid = f.document(dec!(10));
        let other = f.document(dec!(999));
        let session = f.orchestrator.begin_purchase(&f.user, &paid).await.unwrap();
        f.gateway.settle(&session.order_id).unwrap();

        // Same order, different document
        let request = Fixture::finalize_request(&session.order_id, &other);
        assert!(matches!(
            f.orchestrator.finalize_purchase(&f.user.id, &request).await,
            Err(PaymentError::InvalidRequest(_))
        ));

        // Same order, different user
        let intruder = f
            .users
            .find_or_create(User::new("uid-2", "user2@example.com", "User Two"))
            .unwrap();
        let request = Fixture::finalize_request(&session.order_id, &paid);
        assert!(matches!(
            f.orchestrator.finalize_purchase(&intruder.id, &request).await,
            Err(PaymentError::InvalidRequest(_))
        ));

        assert!(f.owned().is_empty());
        assert!(f.users.entitlements(&intruder.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_stores_unchanged() {
        let f = Fixture::new();
        let doc = f.document(dec!(10));

        f.gateway.set_unavailable(true);
        assert!(matches!(
            f.orchestrator.begin_purchase(&f.user, &doc).await,
            Err(PaymentError::Transport(_))
        ));
        assert!(f.orders.list().unwrap().is_empty());

        f.gateway.set_unavailable(false);
        let session = f.orchestrator.begin_purchase(&f.user, &doc).await.unwrap();
        f.gateway.settle(&session.order_id).unwrap();

        f.gateway.set_unavailable(true);
        let request = Fixture::finalize_request(&session.order_id, &doc);
        assert!(matches!(
            f.orchestrator.finalize_purchase(&f.user.id, &request).await,
            Err(PaymentError::Transport(_))
        ));
        assert!(f.owned().is_empty());
        assert_eq!(
            f.orders.get(&session.order_id).unwrap().unwrap().status,
            OrderStatus::Created
        );

        // Retrying after the outage succeeds
        f.gateway.set_unavailable(false);
        let outcome = f.orchestrator.finalize_purchase(&f.user.id, &request).await.unwrap();
        assert!(outcome.is_entitled());
    }

    #[tokio::test]
    async fn test_stale_order_expires() {
        let f = Fixture::with_config(PurchaseConfig {
            order_ttl: chrono::Duration::zero(),
            ..Default::default()
        });
        let doc = f.document(dec!(10));
        let session = f.orchestrator.begin_purchase(&f.user, &doc).await.unwrap();
        let request = Fixture::finalize_request(&session.order_id, &doc);

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let outcome = f.orchestrator.finalize_purchase(&f.user.id, &request).await.unwrap();
        assert!(matches!(outcome, FinalizeOutcome::Pending { expired: true, .. }));

        assert_eq!(
            f.orders.get(&session.order_id).unwrap().unwrap().status,
            OrderStatus::Expired
        );

        // Still expired while the gateway reports nothing
        let outcome = f.orchestrator.finalize_purchase(&f.user.id, &request).await.unwrap();
        assert!(matches!(outcome, FinalizeOutcome::Pending { expired: true, .. }));
        assert!(f.owned().is_empty());

        // A fresh session can be opened
        assert!(f.orchestrator.begin_purchase(&f.user, &doc).await.is_ok());

        // A late success on the expired session is still honoured
        f.gateway.settle(&session.order_id).unwrap();
        let outcome = f.orchestrator.finalize_purchase(&f.user.id, &request).await.unwrap();
        assert!(matches!(outcome, FinalizeOutcome::Granted { newly_granted: true, .. }));
        assert_eq!(f.owned(), vec![doc]);
        assert_eq!(
            f.orders.get(&session.order_id).unwrap().unwrap().status,
            OrderStatus::Settled
        );
    }

    #[tokio::test]
    async fn test_paid_order_survives_sweep() {
        let f = Fixture::new();
        let doc = f.document(dec!(199.00));
        let session = f.orchestrator.begin_purchase(&f.user, &doc).await.unwrap();

        // Paid, but the browser never came back
        f.gateway.settle(&session.order_id).unwrap();
        let later = Utc::now() + chrono::Duration::hours(25);
        assert!(f.orchestrator.expire_stale_orders(later).await.unwrap().is_empty());
        assert_eq!(f.gateway.verifications(), 1);
        assert_eq!(
            f.orders.get(&session.order_id).unwrap().unwrap().status,
            OrderStatus::Settled
        );
        assert_eq!(f.owned(), vec![doc.clone()]);

        // The late redirect then reports ownership
        let request = Fixture::finalize_request(&session.order_id, &doc);
        let outcome = f.orchestrator.finalize_purchase(&f.user.id, &request).await.unwrap();
        assert!(outcome.is_entitled());
    }

    #[tokio::test]
    async fn test_sweep_then_late_payment_grants() {
        let f = Fixture::new();
        let doc = f.document(dec!(199.00));
        let session = f.orchestrator.begin_purchase(&f.user, &doc).await.unwrap();

        let later = Utc::now() + chrono::Duration::hours(25);
        assert_eq!(
            f.orchestrator.expire_stale_orders(later).await.unwrap(),
            vec![session.order_id.clone()]
        );

        // Payment lands after the sweep
        f.gateway.settle(&session.order_id).unwrap();
        let request = Fixture::finalize_request(&session.order_id, &doc);
        let outcome = f.orchestrator.finalize_purchase(&f.user.id, &request).await.unwrap();
        assert!(matches!(outcome, FinalizeOutcome::Granted { newly_granted: true, .. }));
        assert_eq!(f.owned(), vec![doc]);
        assert_eq!(f.orders.sales().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_skips_unverifiable_orders() {
        let f = Fixture::new();
        let doc = f.document(dec!(10));
        let session = f.orchestrator.begin_purchase(&f.user, &doc).await.unwrap();

        f.gateway.set_unavailable(true);
        let later = Utc::now() + chrono::Duration::hours(25);
        assert!(f.orchestrator.expire_stale_orders(later).await.unwrap().is_empty());
        assert_eq!(
            f.orders.get(&session.order_id).unwrap().unwrap().status,
            OrderStatus::Created
        );
    }

    #[tokio::test]
    async fn test_expire_stale_orders_sweep() {
        let f = Fixture::new();
        let doc = f.document(dec!(10));
        let session = f.orchestrator.begin_purchase(&f.user, &doc).await.unwrap();

        assert!(f.orchestrator.expire_stale_orders(Utc::now()).await.unwrap().is_empty());
        assert_eq!(f.gateway.verifications(), 0);

        let later = Utc::now() + chrono::Duration::hours(25);
        assert_eq!(
            f.orchestrator.expire_stale_orders(later).await.unwrap(),
            vec![session.order_id.clone()]
        );
        assert_eq!(
            f.orders.get(&session.order_id).unwrap().unwrap().status,
            OrderStatus::Expired
        );

        // Expired orders are not swept again
        assert!(f.orchestrator.expire_stale_orders(later).await.unwrap().is_empty());
    }

    #[test]
    fn test_redirect_url() {
        let f = Fixture::with_config(PurchaseConfig {
            frontend_url: "https://vault.example.com/".into(),
            ..Default::default()
        });

        let url = f.orchestrator.redirect_url("abc123def456", "doc-1").unwrap();
        assert_eq!(
            url,
            "https://vault.example.com/payment-success?order_id=abc123def456&pdf_id=doc-1"
        );
        assert!(f.orchestrator.redirect_url("", "doc-1").is_err());
        assert!(f.orders.list().unwrap().is_empty());
    }
}
