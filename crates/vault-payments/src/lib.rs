//! # vault-payments
//!
//! Purchase flow for pdf-vault: checkout sessions, settlement verification
//! and entitlement grants.
//!
//! ## Purchase Flow
//!
//! Paid documents are bought through Cashfree's hosted checkout. The gateway
//! is the only authority on settlement: neither the browser redirect nor a
//! webhook grants anything on its own.
//!
//! ```text
//! ┌──────────┐ begin  ┌──────────────┐ POST /orders ┌──────────────┐
//! │  Client  │───────▶│ Orchestrator │─────────────▶│   Cashfree   │
//! └──────────┘        └──────────────┘              └──────────────┘
//!      │                 │  ▲     │                        │
//!      │  hosted checkout│  │     │ order ledger           │
//!      │◀────────────────┘  │     ▼                        │
//!      │             ┌──────────────┐ GET /orders/{id}/    │
//!      │  finalize   │  OrderStore  │     payments         │
//!      └────────────▶│ Entitlements │◀─────────────────────┘
//!                    └──────────────┘
//! ```
//!
//! 1. `begin_purchase` records an order bound to (user, document, amount)
//!    and returns the gateway's session token.
//! 2. The gateway redirects the browser to `/api/payments/redirect`, which
//!    forwards to the client app without touching any state.
//! 3. `finalize_purchase` (or a signed webhook) asks the gateway whether any
//!    payment attempt succeeded and, if so, grants the entitlement.
//!
//! Every step is idempotent. Repeating finalize after success is a no-op.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vault_payments::{CashfreeClient, PurchaseConfig, PurchaseOrchestrator};
//!
//! let gateway = Arc::new(CashfreeClient::from_env("https://api.example.com/api/payments/redirect")?);
//! let purchases = PurchaseOrchestrator::new(catalog, users, orders, gateway, PurchaseConfig::default());
//!
//! let session = purchases.begin_purchase(&user, &document_id).await?;
//! // Hand session.payment_session_id to the Cashfree JS SDK
//! ```

mod error;
mod gateway;
mod order;
mod purchase;
mod webhook;

pub use error::{PaymentError, Result};
pub use gateway::{
    CashfreeClient, GatewayConfig, GatewaySession, MockGateway, PaymentAttempt, PaymentGateway, PaymentStatus,
    SessionRequest, Verification,
};
pub use order::{MemoryOrderStore, ORDER_ID_LEN, Order, OrderId, OrderStatus, OrderStore};
pub use purchase::{FinalizeOutcome, FinalizeRequest, PurchaseConfig, PurchaseOrchestrator, SessionDescriptor};
pub use webhook::{SIGNATURE_HEADER, TIMESTAMP_HEADER, WebhookEvent, WebhookHandler};
