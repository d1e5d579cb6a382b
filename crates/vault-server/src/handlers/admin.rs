//! Admin Routes (`/api/admin`)

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vault_core::{
    Document, DocumentId, DocumentUpdate, DocumentView, Download, Role, User, UserId,
    document::resolve_price,
    stats::{self, DocumentDownloadStat, MonthlyCount, RevenueSummary},
};
use vault_payments::{Order, OrderId};

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::state::AppState;

/// Entries in the dashboard's recent-downloads list
const RECENT_DOWNLOADS: usize = 10;

/// Entries in the dashboard's top-documents list
const TOP_DOCUMENTS: usize = 5;

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    #[serde(default)]
    pub role: String,
}

/// Metadata-only document creation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub file_size: u64,
    pub path: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub is_free: Option<bool>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentDownload {
    #[serde(flatten)]
    pub download: Download,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub pdf_title: Option<String>,
    pub pdf_price: Option<Decimal>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_users: usize,
    pub total_pdfs: usize,
    pub total_downloads: usize,
    pub total_revenue: Decimal,
    pub recent_downloads: Vec<RecentDownload>,
    pub top_pdfs: Vec<DocumentView>,
}

#[derive(Debug, Serialize)]
pub struct OrderDetails {
    /// Our ledger entry, if the order was opened by this server
    pub order: Option<Order>,
    /// The gateway's view of the order
    pub gateway: serde_json::Value,
}

pub async fn list_users(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<User>>>> {
    Ok(Json(ApiResponse::list(state.users.list()?)))
}

pub async fn set_role(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RoleRequest>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let role: Role = request.role.parse()?;
    let user = state
        .users
        .set_role(&UserId::from_string(id), role)?
        .ok_or_else(|| ApiError::not_found("User"))?;

    tracing::info!(admin_id = %admin.id, user_id = %user.id, role = role.as_str(), "User role changed");
    Ok(Json(
        ApiResponse::data(user).with_message(format!("User role updated to {}", role.as_str())),
    ))
}

pub async fn create_pdf(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(request): Json<NewDocument>,
) -> ApiResult<(StatusCode, Json<ApiResponse<DocumentView>>)> {
    if request.title.trim().is_empty() || request.path.trim().is_empty() {
        return Err(ApiError::bad_request("title and path are required"));
    }

    let price = resolve_price(request.price, request.is_free)?;
    let mut document = Document::new(
        request.title,
        request.description,
        request.path,
        request.file_size,
        price,
        admin.id.clone(),
    )?;
    if let Some(thumbnail) = request.thumbnail.filter(|t| !t.is_empty()) {
        document.thumbnail = thumbnail;
    }
    document.tags = request.tags;
    state.catalog.save(&document)?;

    tracing::info!(document_id = %document.id, admin_id = %admin.id, "PDF created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::data(document.view()).with_message("PDF created successfully")),
    ))
}

pub async fn update_pdf(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<DocumentUpdate>,
) -> ApiResult<Json<ApiResponse<DocumentView>>> {
    let mut document = state
        .catalog
        .get(&DocumentId::from_string(id))?
        .ok_or_else(|| ApiError::not_found("PDF"))?;

    document.apply(update)?;
    state.catalog.save(&document)?;

    tracing::info!(document_id = %document.id, admin_id = %admin.id, price = %document.price(), "PDF updated");
    Ok(Json(
        ApiResponse::data(document.view()).with_message("PDF updated successfully"),
    ))
}

pub async fn download_stats(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<DocumentDownloadStat>>>> {
    let stats = stats::download_stats(&state.downloads.list()?, &state.catalog.list()?);
    Ok(Json(ApiResponse::list(stats)))
}

pub async fn monthly_downloads(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<MonthlyCount>>>> {
    let months = stats::monthly_downloads(&state.downloads.list()?);
    Ok(Json(ApiResponse::list(months)))
}

/// Revenue from settled orders (the amount actually paid)
pub async fn revenue(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<RevenueSummary>>> {
    let sales = state.orders.sales()?;
    let summary = stats::revenue_summary(&sales, &state.catalog.list()?);
    Ok(Json(ApiResponse::data(summary)))
}

pub async fn dashboard(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Dashboard>>> {
    let users = state.users.list()?;
    let mut catalog = state.catalog.list()?;
    let downloads = state.downloads.list()?;
    let total_revenue: Decimal = state
        .orders
        .sales()?
        .iter()
        .map(|sale| sale.amount)
        .sum();

    let recent_downloads: Vec<_> = downloads
        .iter()
        .take(RECENT_DOWNLOADS)
        .map(|download| {
            let user = users.iter().find(|u| u.id == download.user);
            let pdf = catalog.iter().find(|d| d.id == download.document);
            RecentDownload {
                download: download.clone(),
                user_name: user.map(|u| u.display_name.clone()),
                user_email: user.map(|u| u.email.clone()),
                pdf_title: pdf.map(|d| d.title.clone()),
                pdf_price: pdf.map(Document::price),
            }
        })
        .collect();

    let total_pdfs = catalog.len();
    catalog.sort_by(|a, b| b.download_count.cmp(&a.download_count));
    let top_pdfs: Vec<_> = catalog.iter().take(TOP_DOCUMENTS).map(Document::view).collect();

    Ok(Json(ApiResponse::data(Dashboard {
        total_users: users.len(),
        total_pdfs,
        total_downloads: downloads.len(),
        total_revenue,
        recent_downloads,
        top_pdfs,
    })))
}

/// Gateway order details, for support
pub async fn order_details(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<OrderDetails>>> {
    let purchases = state.purchases.as_ref().ok_or_else(ApiError::payments_disabled)?;
    let id = OrderId::from_string(id);

    let order = state.orders.get(&id)?;
    let gateway = purchases.gateway().order_details(&id).await?;

    Ok(Json(ApiResponse::data(OrderDetails { order, gateway })))
}
