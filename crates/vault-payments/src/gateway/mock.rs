//! Mock Payment Gateway
//!
//! Scriptable in-process gateway for tests and local demos. Orders are
//! unsettled until a test records a payment attempt against them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{GatewaySession, PaymentAttempt, PaymentGateway, SessionRequest, Verification};
use crate::error::{poisoned, PaymentError, Result};
use crate::order::OrderId;

/// Mock gateway with scripted payment attempts
pub struct MockGateway {
    attempts: Mutex<HashMap<OrderId, Vec<PaymentAttempt>>>,
    unavailable: AtomicBool,
    sessions_created: AtomicUsize,
    verifications: AtomicUsize,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            sessions_created: AtomicUsize::new(0),
            verifications: AtomicUsize::new(0),
        }
    }

    /// Record a payment attempt with the given provider status
    pub fn record_attempt(&self, order_id: &OrderId, status: &str) -> Result<()> {
        let attempt = PaymentAttempt {
            payment_status: status.to_string(),
            details: serde_json::Map::new(),
        };
        self.attempts
            .lock()
            .map_err(poisoned)?
            .entry(order_id.clone())
            .or_default()
            .push(attempt);
        Ok(())
    }

    /// Record a successful payment
    pub fn settle(&self, order_id: &OrderId) -> Result<()> {
        self.record_attempt(order_id, "SUCCESS")
    }

    /// Simulate the provider being unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn sessions_created(&self) -> usize {
        self.sessions_created.load(Ordering::SeqCst)
    }

    pub fn verifications(&self) -> usize {
        self.verifications.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PaymentError::Transport("mock gateway unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_session(&self, request: &SessionRequest) -> Result<GatewaySession> {
        self.check_available()?;
        self.sessions_created.fetch_add(1, Ordering::SeqCst);

        Ok(GatewaySession {
            order_id: request.order_id.clone(),
            session_token: format!("session_{}", request.order_id),
        })
    }

    async fn verify_session(&self, order_id: &OrderId) -> Result<Verification> {
        self.check_available()?;
        self.verifications.fetch_add(1, Ordering::SeqCst);

        let attempts = self
            .attempts
            .lock()
            .map_err(poisoned)?
            .get(order_id)
            .cloned()
            .unwrap_or_default();
        Ok(Verification::from_attempts(attempts))
    }

    async fn order_details(&self, order_id: &OrderId) -> Result<serde_json::Value> {
        self.check_available()?;
        Ok(serde_json::json!({ "order_id": order_id, "order_status": "ACTIVE" }))
    }

    fn name(&self) -> &str {
        "MockGateway"
    }
}
