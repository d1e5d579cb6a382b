//! Download History

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use uuid::Uuid;

use crate::document::DocumentId;
use crate::error::{poisoned, Result};
use crate::user::UserId;

/// A single recorded download
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Download {
    pub id: Uuid,
    pub user: UserId,
    pub document: DocumentId,
    pub downloaded_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Download {
    pub fn new(user: UserId, document: DocumentId) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            document,
            downloaded_at: Utc::now(),
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

/// Download history storage trait
pub trait DownloadStore: Send + Sync {
    fn record(&self, download: &Download) -> Result<()>;

    /// All downloads, newest first
    fn list(&self) -> Result<Vec<Download>>;

    /// Downloads by one user, newest first
    fn for_user(&self, user: &UserId) -> Result<Vec<Download>>;
}

/// In-memory download history
pub struct MemoryDownloadStore {
    downloads: RwLock<Vec<Download>>,
}

impl Default for MemoryDownloadStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDownloadStore {
    pub fn new() -> Self {
        Self {
            downloads: RwLock::new(Vec::new()),
        }
    }
}

impl DownloadStore for MemoryDownloadStore {
    fn record(&self, download: &Download) -> Result<()> {
        let mut downloads = self.downloads.write().map_err(poisoned)?;
        downloads.push(download.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<Download>> {
        let downloads = self.downloads.read().map_err(poisoned)?;
        let mut result = downloads.clone();
        result.sort_by(|a, b| b.downloaded_at.cmp(&a.downloaded_at));
        Ok(result)
    }

    fn for_user(&self, user: &UserId) -> Result<Vec<Download>> {
        Ok(self.list()?.into_iter().filter(|d| &d.user == user).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_per_user() {
        let store = MemoryDownloadStore::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let doc = DocumentId::new();

        store.record(&Download::new(alice.clone(), doc.clone())).unwrap();
        store
            .record(&Download::new(bob.clone(), doc).with_client(Some("127.0.0.1".into()), None))
            .unwrap();

        assert_eq!(store.list().unwrap().len(), 2);
        let bobs = store.for_user(&bob).unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].ip_address.as_deref(), Some("127.0.0.1"));
        assert_eq!(store.for_user(&alice).unwrap().len(), 1);
    }
}
