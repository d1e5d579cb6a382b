//! Application State

use std::sync::Arc;

use vault_core::{
    CatalogStore, DownloadStore, EntitlementStore, FileStore, IdentityVerifier, LocalFileStore, MemoryCatalogStore,
    MemoryDownloadStore, MemoryUserStore, UserStore,
};
use vault_payments::{
    MemoryOrderStore, OrderStore, PaymentGateway, PurchaseConfig, PurchaseOrchestrator, WebhookHandler,
};

use crate::config::ServerConfig;

/// Payment gateway wiring (absent when the gateway is not configured)
pub struct Payments {
    pub gateway: Arc<dyn PaymentGateway>,

    /// Secret the gateway signs webhooks with
    pub webhook_secret: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,

    /// Bearer token verification
    pub identity: Arc<dyn IdentityVerifier>,

    pub catalog: Arc<dyn CatalogStore>,
    pub users: Arc<dyn UserStore>,
    pub entitlements: Arc<dyn EntitlementStore>,
    pub downloads: Arc<dyn DownloadStore>,
    pub orders: Arc<dyn OrderStore>,

    /// Uploaded PDFs and thumbnails
    pub files: Arc<dyn FileStore>,

    /// Purchase flow (optional - None if payments not configured)
    pub purchases: Option<Arc<PurchaseOrchestrator>>,

    /// Gateway notifications (present iff `purchases` is)
    pub webhooks: Option<Arc<WebhookHandler>>,
}

impl AppState {
    /// Wire in-memory stores and local file storage under `config.upload_dir`
    pub fn new(config: ServerConfig, identity: Arc<dyn IdentityVerifier>, payments: Option<Payments>) -> Self {
        let catalog = Arc::new(MemoryCatalogStore::new());
        let users = Arc::new(MemoryUserStore::new());
        let orders = Arc::new(MemoryOrderStore::new());
        let files = Arc::new(LocalFileStore::new(config.upload_dir.clone()));

        let (purchases, webhooks) = match payments {
            Some(payments) => {
                let purchase_config = PurchaseConfig {
                    order_ttl: chrono::Duration::from_std(config.order_ttl)
                        .unwrap_or_else(|_| chrono::Duration::hours(24)),
                    frontend_url: config.frontend_url.clone(),
                    ..Default::default()
                };
                let orchestrator = Arc::new(PurchaseOrchestrator::new(
                    catalog.clone(),
                    users.clone(),
                    orders.clone(),
                    payments.gateway,
                    purchase_config,
                ));
                let webhooks = Arc::new(WebhookHandler::new(orchestrator.clone(), payments.webhook_secret));
                (Some(orchestrator), Some(webhooks))
            }
            None => (None, None),
        };

        Self {
            config: Arc::new(config),
            identity,
            catalog,
            users: users.clone(),
            entitlements: users,
            downloads: Arc::new(MemoryDownloadStore::new()),
            orders,
            files,
            purchases,
            webhooks,
        }
    }
}
