//! Catalog Documents
//!
//! Document metadata and the catalog store contract.
//!
//! Prices use `rust_decimal` in a single fixed currency. The free flag is
//! never stored: it is derived from the price, so a document can never be
//! both priced and free.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{poisoned, Result, VaultError};
use crate::user::UserId;

/// Placeholder thumbnail used when none is supplied
pub const DEFAULT_THUMBNAIL: &str = "https://via.placeholder.com/100x140";

/// Unique document identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
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

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A PDF in the catalog
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub description: String,

    /// Human readable size, e.g. "1.2 MB"
    pub size: String,

    /// Size in bytes
    pub file_size: u64,

    /// Storage path relative to the upload root, e.g. "pdfs/<file>"
    pub path: String,

    pub thumbnail: String,

    /// Price in the catalog currency; the only source of the free flag
    price: Decimal,

    pub tags: Vec<String>,
    pub created_by: UserId,
    pub download_count: u64,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Create a document with a validated price
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        path: impl Into<String>,
        file_size: u64,
        price: Decimal,
        created_by: UserId,
    ) -> Result<Self> {
        validate_price(price)?;

        Ok(Self {
            id: DocumentId::new(),
            title: title.into(),
            description: description.into(),
            size: format_size(file_size),
            file_size,
            path: path.into(),
            thumbnail: DEFAULT_THUMBNAIL.into(),
            price,
            tags: Vec::new(),
            created_by,
            download_count: 0,
            created_at: Utc::now(),
        })
    }

    pub const fn price(&self) -> Decimal {
        self.price
    }

    pub fn set_price(&mut self, price: Decimal) -> Result<()> {
        validate_price(price)?;
        self.price = price;
        Ok(())
    }

    /// True iff the price is zero
    pub fn is_free(&self) -> bool {
        self.price.is_zero()
    }

    pub fn is_paid(&self) -> bool {
        !self.is_free()
    }

    /// Apply a partial catalog edit
    pub fn apply(&mut self, update: DocumentUpdate) -> Result<()> {
        let price = match (update.price, update.is_free) {
            (Some(price), flag) => resolve_price(Some(price), flag)?,
            (None, Some(true)) => Decimal::ZERO,
            (None, flag) => resolve_price(Some(self.price), flag)?,
        };

        if let Some(title) = update.title.filter(|t| !t.trim().is_empty()) {
            self.title = title;
        }
        if let Some(description) = update.description.filter(|d| !d.trim().is_empty()) {
            self.description = description;
        }
        if let Some(thumbnail) = update.thumbnail {
            self.thumbnail = thumbnail;
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        self.price = price;
        Ok(())
    }

    /// Serializable view including the derived flags
    pub fn view(&self) -> DocumentView {
        DocumentView::from(self)
    }
}

/// Partial update of catalog metadata
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub is_free: Option<bool>,
    pub thumbnail: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// API representation of a document
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub id: DocumentId,
    pub title: String,
    pub description: String,
    pub size: String,
    pub file_size: u64,
    pub path: String,
    pub thumbnail: String,
    pub price: Decimal,
    pub is_free: bool,
    pub is_paid: bool,
    pub tags: Vec<String>,
    pub created_by: UserId,
    pub download_count: u64,
    pub created_at: DateTime<Utc>,
}

impl From<&Document> for DocumentView {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            description: doc.description.clone(),
            size: doc.size.clone(),
            file_size: doc.file_size,
            path: doc.path.clone(),
            thumbnail: doc.thumbnail.clone(),
            price: doc.price,
            is_free: doc.is_free(),
            is_paid: doc.is_paid(),
            tags: doc.tags.clone(),
            created_by: doc.created_by.clone(),
            download_count: doc.download_count,
            created_at: doc.created_at,
        }
    }
}

fn validate_price(price: Decimal) -> Result<()> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(VaultError::InvalidRequest("price must not be negative".into()));
    }
    Ok(())
}

/// Reconcile a requested price and free flag into the stored price.
///
/// A positive price always wins over `is_free = true`. A free flag with no
/// price means zero. Asking for a paid document without a positive price is
/// rejected.
pub fn resolve_price(price: Option<Decimal>, is_free: Option<bool>) -> Result<Decimal> {
    let resolved = match (price, is_free) {
        (Some(price), _) => price,
        (None, Some(false)) => {
            return Err(VaultError::InvalidRequest("a paid document requires a price".into()));
        }
        (None, _) => Decimal::ZERO,
    };
    validate_price(resolved)?;

    if is_free == Some(true) && !resolved.is_zero() {
        tracing::debug!(price = %resolved, "positive price overrides free flag");
    }
    if is_free == Some(false) && resolved.is_zero() {
        return Err(VaultError::InvalidRequest("a paid document requires a price".into()));
    }

    Ok(resolved)
}

/// Format a byte count as megabytes with one decimal place
pub fn format_size(bytes: u64) -> String {
    let mb = Decimal::from(bytes) / Decimal::from(1_048_576u64);
    format!("{mb:.1} MB")
}

/// Catalog storage trait
pub trait CatalogStore: Send + Sync {
    /// Save or update a document
    fn save(&self, document: &Document) -> Result<()>;

    /// Get document by ID
    fn get(&self, id: &DocumentId) -> Result<Option<Document>>;

    /// All documents, newest first
    fn list(&self) -> Result<Vec<Document>>;

    /// Remove a document, returning it if it existed
    fn delete(&self, id: &DocumentId) -> Result<Option<Document>>;

    /// Atomically bump the download counter, returning the new value
    fn increment_downloads(&self, id: &DocumentId) -> Result<u64>;
}

/// In-memory catalog store
pub struct MemoryCatalogStore {
    documents: RwLock<HashMap<DocumentId, Document>>,
}

impl Default for MemoryCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }
}

impl CatalogStore for MemoryCatalogStore {
    fn save(&self, document: &Document) -> Result<()> {
        let mut documents = self.documents.write().map_err(poisoned)?;
        documents.insert(document.id.clone(), document.clone());
        Ok(())
    }

    fn get(&self, id: &DocumentId) -> Result<Option<Document>> {
        let documents = self.documents.read().map_err(poisoned)?;
        Ok(documents.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Document>> {
        let documents = self.documents.read().map_err(poisoned)?;
        let mut result: Vec<_> = documents.values().cloned().collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    fn delete(&self, id: &DocumentId) -> Result<Option<Document>> {
        let mut documents = self.documents.write().map_err(poisoned)?;
        Ok(documents.remove(id))
    }

    fn increment_downloads(&self, id: &DocumentId) -> Result<u64> {
        let mut documents = self.documents.write().map_err(poisoned)?;
        let document = documents
            .get_mut(id)
            .ok_or_else(|| VaultError::NotFound("PDF".into()))?;
        document.download_count += 1;
        Ok(document.download_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn doc(price: Decimal) -> Document {
        Document::new("Title", "Desc", "pdfs/a.pdf", 1_048_576, price, UserId::new()).unwrap()
    }

    #[test]
    fn test_free_flag_derived_from_price() {
        assert!(doc(Decimal::ZERO).is_free());
        assert!(doc(dec!(199.00)).is_paid());
        assert!(!doc(dec!(199.00)).view().is_free);
    }

    #[test]
    fn test_negative_price_rejected() {
        let result = Document::new("T", "D", "p", 1, dec!(-1), UserId::new());
        assert!(matches!(result, Err(VaultError::InvalidRequest(_))));
    }

    #[test]
    fn test_resolve_price() {
        assert_eq!(resolve_price(Some(dec!(10)), Some(true)).unwrap(), dec!(10));
        assert_eq!(resolve_price(None, Some(true)).unwrap(), Decimal::ZERO);
        assert_eq!(resolve_price(None, None).unwrap(), Decimal::ZERO);
        assert!(resolve_price(None, Some(false)).is_err());
        assert!(resolve_price(Some(Decimal::ZERO), Some(false)).is_err());
    }

    #[test]
    fn test_apply_update() {
        let mut document = doc(dec!(50));

        document
            .apply(DocumentUpdate {
                is_free: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert!(document.is_free());

        document
            .apply(DocumentUpdate {
                price: Some(dec!(25)),
                title: Some("New".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(document.price(), dec!(25));
        assert_eq!(document.title, "New");

        // Untouched flags keep the current price
        document
            .apply(DocumentUpdate {
                description: Some("Other".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(document.price(), dec!(25));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(1_048_576), "1.0 MB");
        assert_eq!(format_size(1_572_864), "1.5 MB");
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCatalogStore::new();
        let document = doc(dec!(5));
        let id = document.id.clone();

        store.save(&document).unwrap();
        assert_eq!(store.increment_downloads(&id).unwrap(), 1);
        assert_eq!(store.increment_downloads(&id).unwrap(), 2);
        assert_eq!(store.get(&id).unwrap().unwrap().download_count, 2);

        assert!(store.delete(&id).unwrap().is_some());
        assert!(store.get(&id).unwrap().is_none());
        assert!(store.increment_downloads(&id).is_err());
    }
}
