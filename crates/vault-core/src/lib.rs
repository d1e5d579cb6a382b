//! # vault-core
//!
//! Domain model and store contracts for the PDF vault.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        vault-core                           │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌──────────────┐   │
//! │  │ CatalogStore │  │ UserStore +      │  │ DownloadStore│   │
//! │  │  (documents) │  │ EntitlementStore │  │  (history)   │   │
//! │  └──────────────┘  └──────────────────┘  └──────────────┘   │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌──────────────┐   │
//! │  │  FileStore   │  │ IdentityVerifier │  │    stats     │   │
//! │  └──────────────┘  └──────────────────┘  └──────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stores are traits so the in-memory implementations can be swapped for a
//! document database without touching the purchase flow or the handlers.

pub mod document;
pub mod download;
pub mod error;
pub mod identity;
pub mod stats;
pub mod storage;
pub mod user;

pub use document::{CatalogStore, Document, DocumentId, DocumentUpdate, DocumentView, MemoryCatalogStore};
pub use download::{Download, DownloadStore, MemoryDownloadStore};
pub use error::{Result, VaultError};
pub use identity::{Identity, IdentityVerifier};
pub use stats::Sale;
pub use storage::{FileStore, LocalFileStore};
pub use user::{EntitlementStore, MemoryUserStore, ProfileUpdate, Role, User, UserId, UserStore};
