//! pdf-vault HTTP Server
//!
//! Axum-based server for the document catalog, downloads and the paid
//! purchase flow.

mod auth;
mod config;
mod error;
mod handlers;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vault_payments::{CashfreeClient, PurchaseOrchestrator};

use crate::auth::JwtVerifier;
use crate::config::{AuthConfig, ServerConfig};
use crate::state::{AppState, Payments};

/// How often abandoned purchase sessions are swept
const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env();
    let auth = AuthConfig::from_env()?;

    for folder in ["pdfs", "thumbnails"] {
        tokio::fs::create_dir_all(config.upload_dir.join(folder)).await?;
    }

    // Initialize payments
    let payments = match CashfreeClient::from_env(config.payment_return_url()) {
        Ok(client) => {
            tracing::info!(base_url = %client.config().base_url, "✓ Cashfree configured");
            let webhook_secret = client.config().client_secret.clone();
            Some(Payments {
                gateway: Arc::new(client),
                webhook_secret,
            })
        }
        Err(e) => {
            tracing::warn!("⚠ Cashfree not configured - payments disabled ({e})");
            tracing::warn!("  Set CASHFREE_CLIENT_ID and CASHFREE_CLIENT_SECRET in .env");
            None
        }
    };

    if !config.admin_emails.is_empty() {
        tracing::info!(count = config.admin_emails.len(), "Admin emails configured");
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, Arc::new(JwtVerifier::new(&auth)), payments);

    if let Some(purchases) = state.purchases.clone() {
        spawn_order_sweeper(purchases, SWEEP_INTERVAL);
    }

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 pdf-vault server running on http://{}", bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                    - Health check");
    tracing::info!("  GET  /api/pdfs                  - Catalog");
    tracing::info!("  GET  /api/pdfs/download/{{id}}    - Download (entitlement checked)");
    tracing::info!("  POST /api/users/purchase/{{id}}   - Start checkout");
    tracing::info!("  POST /api/users/purchase/verify - Confirm payment");
    tracing::info!("  POST /api/payments/webhook      - Cashfree notifications");
    tracing::info!("");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// Periodically expire purchase sessions that outlived their TTL
fn spawn_order_sweeper(purchases: Arc<PurchaseOrchestrator>, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Err(e) = purchases.expire_stale_orders(chrono::Utc::now()).await {
                tracing::error!(error = %e, "Order sweep failed");
            }
        }
    })
}
