//! Router

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::handlers::{admin, health_check, payments, pdfs, root, users};
use crate::state::AppState;

/// Multipart framing allowance on top of the file size limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let pdf_routes = Router::new()
        .route("/", get(pdfs::list_pdfs).post(pdfs::upload_pdf))
        .route("/download/{id}", get(pdfs::download_pdf))
        .route("/{id}", get(pdfs::get_pdf).delete(pdfs::delete_pdf));

    let user_routes = Router::new()
        .route("/me", get(users::get_profile).put(users::update_profile))
        .route("/purchase/verify", post(users::verify_purchase))
        .route("/purchase/{id}", post(users::begin_purchase))
        .route("/purchases", get(users::list_purchases))
        .route("/downloads", get(users::list_downloads));

    let payment_routes = Router::new()
        .route("/redirect", get(payments::payment_redirect))
        .route("/webhook", post(payments::payment_webhook));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}/role", put(admin::set_role))
        .route("/pdfs", post(admin::create_pdf))
        .route("/pdfs/{id}", put(admin::update_pdf))
        .route("/stats/downloads", get(admin::download_stats))
        .route("/stats/monthly-downloads", get(admin::monthly_downloads))
        .route("/stats/revenue", get(admin::revenue))
        .route("/dashboard", get(admin::dashboard))
        .route("/orders/{id}", get(admin::order_details));

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Thumbnails are public; PDFs only leave through the download route
    let thumbnails = ServeDir::new(state.config.upload_dir.join("thumbnails"));
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/api/pdfs", pdf_routes)
        .nest("/api/users", user_routes)
        .nest("/api/payments", payment_routes)
        .nest("/api/admin", admin_routes)
        .nest_service("/thumbnails", thumbnails)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
