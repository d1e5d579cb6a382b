//! Order Ledger
//!
//! Durable record of every purchase session: which user is buying which
//! document, for how much, and where the order stands. Finalization
//! validates against this record instead of trusting the client.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;

use vault_core::{DocumentId, Sale, UserId};

use crate::error::{poisoned, PaymentError, Result};

/// Length of generated order identifiers (hex chars, 48 bits)
pub const ORDER_ID_LEN: usize = 12;

/// Gateway order identifier (12 lowercase hex chars when generated)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Generate a new order ID: SHA-256 of a random UUID, truncated
    pub fn generate() -> Self {
        let seed = uuid::Uuid::new_v4();
        let digest = Sha256::digest(seed.as_bytes());
        let hex = hex::encode(digest);
        Self(hex[..ORDER_ID_LEN].to_string())
    }

    /// Parse from string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the ID as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an order stands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Session created, no successful payment observed yet
    Created,
    /// Gateway confirmed settlement; entitlement granted
    Settled,
    /// No settlement observed within the session TTL
    Expired,
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Settled => "settled",
            Self::Expired => "expired",
        }
    }

    /// Settled is terminal. Expired may still settle if the gateway later
    /// reports a successful payment. Repeating a transition is allowed.
    pub fn can_transition_to(self, next: Self) -> bool {
        self == next || self == Self::Created || (self == Self::Expired && next == Self::Settled)
    }
}

/// A purchase session record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub document_id: DocumentId,
    pub amount: Decimal,
    pub currency: String,

    /// Opaque token the client's payment UI presents to the user
    pub session_token: String,

    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(
        id: OrderId,
        user_id: UserId,
        document_id: DocumentId,
        amount: Decimal,
        currency: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            id,
            user_id,
            document_id,
            amount,
            currency: currency.into(),
            session_token: session_token.into(),
            status: OrderStatus::Created,
            created_at: Utc::now(),
            settled_at: None,
        }
    }

    /// Still awaiting settlement and older than `ttl`
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        self.status == OrderStatus::Created && now - self.created_at > ttl
    }

    pub fn to_sale(&self) -> Option<Sale> {
        self.settled_at.map(|settled_at| Sale {
            document_id: self.document_id.clone(),
            amount: self.amount,
            settled_at,
        })
    }
}

/// Order storage trait
pub trait OrderStore: Send + Sync {
    /// Insert a new order; returns false (and stores nothing) if the ID is taken
    fn insert(&self, order: &Order) -> Result<bool>;

    /// Get order by ID
    fn get(&self, id: &OrderId) -> Result<Option<Order>>;

    /// Move an order to `next` (compare-and-set against terminal states)
    fn transition(&self, id: &OrderId, next: OrderStatus) -> Result<Order>;

    /// Every `Created` order created before `cutoff`
    fn created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>>;

    /// All orders, newest first
    fn list(&self) -> Result<Vec<Order>>;

    /// Settled orders as sales
    fn sales(&self) -> Result<Vec<Sale>> {
        Ok(self.list()?.iter().filter_map(Order::to_sale).collect())
    }
}

/// In-memory order store (for development)
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
        }
    }
}

impl OrderStore for MemoryOrderStore {
    fn insert(&self, order: &Order) -> Result<bool> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        if orders.contains_key(&order.id) {
            return Ok(false);
        }
        orders.insert(order.id.clone(), order.clone());
        Ok(true)
    }

    fn get(&self, id: &OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().map_err(poisoned)?;
        Ok(orders.get(id).cloned())
    }

    fn transition(&self, id: &OrderId, next: OrderStatus) -> Result<Order> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        let order = orders
            .get_mut(id)
            .ok_or_else(|| PaymentError::NotFound("Order".into()))?;

        if !order.status.can_transition_to(next) {
            return Err(PaymentError::InvalidRequest(format!(
                "order is already {}",
                order.status.as_str()
            )));
        }

        if order.status != next {
            order.status = next;
            if next == OrderStatus::Settled {
                order.settled_at = Some(Utc::now());
            }
        }
        Ok(order.clone())
    }

    fn created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>> {
        let orders = self.orders.read().map_err(poisoned)?;
        Ok(orders
            .values()
            .filter(|o| o.status == OrderStatus::Created && o.created_at < cutoff)
            .cloned()
            .collect())
    }

    fn list(&self) -> Result<Vec<Order>> {
        let orders = self.orders.read().map_err(poisoned)?;
        let mut result: Vec<_> = orders.values().cloned().collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order() -> Order {
        Order::new(
            OrderId::generate(),
            UserId::new(),
            DocumentId::new(),
            dec!(199.00),
            "INR",
            "session_abc",
        )
    }

    #[test]
    fn test_order_id_generation() {
        let id = OrderId::generate();
        assert_eq!(id.as_str().len(), ORDER_ID_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(id, OrderId::generate());
    }

    #[test]
    fn test_insert_does_not_overwrite() {
        let store = MemoryOrderStore::new();
        let first = order();
        let mut clash = order();
        clash.id = first.id.clone();

        assert!(store.insert(&first).unwrap());
        assert!(!store.insert(&clash).unwrap());
        assert_eq!(store.get(&first.id).unwrap().unwrap().user_id, first.user_id);
    }

    #[test]
    fn test_transitions() {
        let store = MemoryOrderStore::new();
        let settled = order();
        let expired = order();
        store.insert(&settled).unwrap();
        store.insert(&expired).unwrap();

        let result = store.transition(&settled.id, OrderStatus::Settled).unwrap();
        assert_eq!(result.status, OrderStatus::Settled);
        let settled_at = result.settled_at;
        assert!(settled_at.is_some());

        // Repeating is a no-op, not a new settlement
        let again = store.transition(&settled.id, OrderStatus::Settled).unwrap();
        assert_eq!(again.settled_at, settled_at);
        assert!(store.transition(&settled.id, OrderStatus::Expired).is_err());

        // A late success still settles an expired order
        store.transition(&expired.id, OrderStatus::Expired).unwrap();
        let late = store.transition(&expired.id, OrderStatus::Settled).unwrap();
        assert!(late.settled_at.is_some());
        assert!(store.transition(&expired.id, OrderStatus::Expired).is_err());

        assert_eq!(store.sales().unwrap().len(), 2);
    }

    #[test]
    fn test_created_before() {
        let store = MemoryOrderStore::new();
        let mut old = order();
        old.created_at = Utc::now() - chrono::Duration::hours(48);
        let fresh = order();
        store.insert(&old).unwrap();
        store.insert(&fresh).unwrap();

        let cutoff = Utc::now() - chrono::Duration::hours(24);
        assert!(old.is_stale(Utc::now(), chrono::Duration::hours(24)));
        let stale: Vec<_> = store.created_before(cutoff).unwrap().into_iter().map(|o| o.id).collect();
        assert_eq!(stale, vec![old.id.clone()]);

        // Read-only; settled orders are never listed
        assert_eq!(store.get(&old.id).unwrap().unwrap().status, OrderStatus::Created);
        store.transition(&old.id, OrderStatus::Settled).unwrap();
        assert!(store.created_before(cutoff).unwrap().is_empty());
        assert_eq!(store.get(&fresh.id).unwrap().unwrap().status, OrderStatus::Created);
    }
}
