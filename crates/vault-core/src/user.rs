//! Users and Entitlements
//!
//! User records are created lazily on first authenticated request and carry
//! the set of documents the user owns. The set is the entitlement store: a
//! grant is a set insert, so retried grants never duplicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

use crate::document::DocumentId;
use crate::error::{poisoned, Result, VaultError};

/// Unique user identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User role
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(VaultError::InvalidRequest(
                "Invalid role. Must be either \"user\" or \"admin\"".into(),
            )),
        }
    }
}

/// A user record
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,

    /// Subject issued by the identity provider
    pub subject: String,

    pub email: String,
    pub display_name: String,

    #[serde(rename = "photoURL")]
    pub photo_url: String,

    pub role: Role,

    /// Documents this user may download
    pub owned_documents: HashSet<DocumentId>,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new regular user
    pub fn new(subject: impl Into<String>, email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            subject: subject.into(),
            email: email.into(),
            display_name: display_name.into(),
            photo_url: String::new(),
            role: Role::User,
            owned_documents: HashSet::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn owns(&self, document: &DocumentId) -> bool {
        self.owned_documents.contains(document)
    }
}

/// Fields a user may change on their own profile
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,

    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

/// User storage trait
pub trait UserStore: Send + Sync {
    /// Get user by ID
    fn get(&self, id: &UserId) -> Result<Option<User>>;

    /// Get user by identity-provider subject
    fn find_by_subject(&self, subject: &str) -> Result<Option<User>>;

    /// Return the user with the candidate's subject, inserting the candidate
    /// if none exists (atomic check + insert)
    fn find_or_create(&self, candidate: User) -> Result<User>;

    /// All users, newest first
    fn list(&self) -> Result<Vec<User>>;

    /// Apply a profile update; empty fields are ignored
    fn update_profile(&self, id: &UserId, update: ProfileUpdate) -> Result<Option<User>>;

    /// Change a user's role
    fn set_role(&self, id: &UserId, role: Role) -> Result<Option<User>>;
}

/// Entitlement storage trait
///
/// `grant` must be idempotent: granting an already-held entitlement is a
/// no-op and reports `false`.
pub trait EntitlementStore: Send + Sync {
    fn has_entitlement(&self, user: &UserId, document: &DocumentId) -> Result<bool>;

    /// Grant, returning true if the entitlement was newly created
    fn grant(&self, user: &UserId, document: &DocumentId) -> Result<bool>;

    /// Every document the user owns
    fn entitlements(&self, user: &UserId) -> Result<Vec<DocumentId>>;
}

/// In-memory user store (for development)
///
/// Lock order is `users` then `by_subject` in every method.
pub struct MemoryUserStore {
    users: RwLock<HashMap<UserId, User>>,
    by_subject: RwLock<HashMap<String, UserId>>,
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            by_subject: RwLock::new(HashMap::new()),
        }
    }

    fn modify<F>(&self, id: &UserId, f: F) -> Result<Option<User>>
    where
        F: FnOnce(&mut User),
    {
        let mut users = self.users.write().map_err(poisoned)?;
        Ok(users.get_mut(id).map(|user| {
            f(user);
            user.clone()
        }))
    }
}

impl UserStore for MemoryUserStore {
    fn get(&self, id: &UserId) -> Result<Option<User>> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.get(id).cloned())
    }

    fn find_by_subject(&self, subject: &str) -> Result<Option<User>> {
        let users = self.users.read().map_err(poisoned)?;
        let by_subject = self.by_subject.read().map_err(poisoned)?;

        Ok(by_subject.get(subject).and_then(|id| users.get(id).cloned()))
    }

    fn find_or_create(&self, candidate: User) -> Result<User> {
        let mut users = self.users.write().map_err(poisoned)?;
        let mut by_subject = self.by_subject.write().map_err(poisoned)?;

        if let Some(existing) = by_subject.get(&candidate.subject).and_then(|id| users.get(id)) {
            return Ok(existing.clone());
        }

        tracing::info!(user_id = %candidate.id, email = %candidate.email, role = candidate.role.as_str(), "Created user");
        by_subject.insert(candidate.subject.clone(), candidate.id.clone());
        users.insert(candidate.id.clone(), candidate.clone());
        Ok(candidate)
    }

    fn list(&self) -> Result<Vec<User>> {
        let users = self.users.read().map_err(poisoned)?;
        let mut result: Vec<_> = users.values().cloned().collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    fn update_profile(&self, id: &UserId, update: ProfileUpdate) -> Result<Option<User>> {
        self.modify(id, |user| {
            if let Some(name) = update.display_name.filter(|n| !n.is_empty()) {
                user.display_name = name;
            }
            if let Some(photo) = update.photo_url.filter(|p| !p.is_empty()) {
                user.photo_url = photo;
            }
        })
    }

    fn set_role(&self, id: &UserId, role: Role) -> Result<Option<User>> {
        self.modify(id, |user| user.role = role)
    }
}

impl EntitlementStore for MemoryUserStore {
    fn has_entitlement(&self, user: &UserId, document: &DocumentId) -> Result<bool> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.get(user).is_some_and(|u| u.owns(document)))
    }

    fn grant(&self, user: &UserId, document: &DocumentId) -> Result<bool> {
        let mut users = self.users.write().map_err(poisoned)?;
        let record = users
            .get_mut(user)
            .ok_or_else(|| VaultError::NotFound("User".into()))?;
        Ok(record.owned_documents.insert(document.clone()))
    }

    fn entitlements(&self, user: &UserId) -> Result<Vec<DocumentId>> {
        let users = self.users.read().map_err(poisoned)?;
        let mut owned: Vec<_> = users
            .get(user)
            .map(|u| u.owned_documents.iter().cloned().collect())
            .unwrap_or_default();
        owned.sort();
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_find_or_create_is_stable() {
        let store = MemoryUserStore::new();
        let first = store.find_or_create(User::new("uid-1", "a@example.com", "a")).unwrap();
        let second = store.find_or_create(User::new("uid-1", "a@example.com", "a")).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.find_by_subject("uid-1").unwrap().unwrap().id, first.id);
    }

    #[test]
    fn test_grant_is_idempotent() {
        let store = MemoryUserStore::new();
        let user = store.find_or_create(User::new("uid-1", "a@example.com", "a")).unwrap();
        let doc = DocumentId::new();

        assert!(!store.has_entitlement(&user.id, &doc).unwrap());
        assert!(store.grant(&user.id, &doc).unwrap());
        assert!(!store.grant(&user.id, &doc).unwrap());
        assert!(store.has_entitlement(&user.id, &doc).unwrap());
        assert_eq!(store.entitlements(&user.id).unwrap(), vec![doc]);
    }

    #[test]
    fn test_concurrent_grants_yield_one_entitlement() {
        let store = Arc::new(MemoryUserStore::new());
        let user = store.find_or_create(User::new("uid-1", "a@example.com", "a")).unwrap();
        let doc = DocumentId::new();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let (user, doc) = (user.id.clone(), doc.clone());
                std::thread::spawn(move || store.grant(&user, &doc).unwrap())
            })
            .collect();
        let newly: usize = handles.into_iter().map(|h| usize::from(h.join().unwrap())).sum();

        assert_eq!(newly, 1);
        assert_eq!(store.entitlements(&user.id).unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_sign_ins_and_lookups() {
        let store = Arc::new(MemoryUserStore::new());
        let existing = store.find_or_create(User::new("existing", "e@example.com", "e")).unwrap();
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        for worker in 0..8 {
            let store = store.clone();
            let existing = existing.id.clone();
            let done_tx = done_tx.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    if worker % 2 == 0 {
                        let found = store.find_by_subject("existing").unwrap().unwrap();
                        assert_eq!(found.id, existing);
                    } else {
                        let subject = format!("new-{worker}-{i}");
                        store
                            .find_or_create(User::new(&subject, "n@example.com", "n"))
                            .unwrap();
                    }
                }
                done_tx.send(()).unwrap();
            });
        }
        drop(done_tx);

        let timeout = std::time::Duration::from_secs(10);
        let finished = (0..8).filter(|_| done_rx.recv_timeout(timeout).is_ok()).count();
        assert_eq!(finished, 8, "store operations did not complete");
        assert_eq!(store.list().unwrap().len(), 1 + 4 * 500);
    }

    #[test]
    fn test_grant_unknown_user() {
        let store = MemoryUserStore::new();
        let result = store.grant(&UserId::new(), &DocumentId::new());
        assert!(matches!(result, Err(VaultError::NotFound(_))));
    }

    #[test]
    fn test_profile_update_ignores_empty() {
        let store = MemoryUserStore::new();
        let user = store.find_or_create(User::new("uid-1", "a@example.com", "a")).unwrap();

        let updated = store
            .update_profile(
                &user.id,
                ProfileUpdate {
                    display_name: Some(String::new()),
                    photo_url: Some("https://img/p.png".into()),
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.display_name, "a");
        assert_eq!(updated.photo_url, "https://img/p.png");
    }
}
