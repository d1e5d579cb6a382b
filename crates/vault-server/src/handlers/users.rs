//! User Routes (`/api/users`)

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use vault_core::{DocumentId, DocumentView, Download, ProfileUpdate, User};
use vault_payments::{FinalizeOutcome, FinalizeRequest, PurchaseOrchestrator, SessionDescriptor};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::state::AppState;

/// A user with their purchased documents resolved
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    #[serde(flatten)]
    pub user: User,
    pub pdfs_purchased: Vec<DocumentView>,
}

/// A download with its document resolved (None once deleted)
#[derive(Debug, Serialize)]
pub struct DownloadView {
    #[serde(flatten)]
    pub download: Download,
    pub pdf: Option<DocumentView>,
}

fn purchases(state: &AppState) -> ApiResult<&Arc<PurchaseOrchestrator>> {
    state.purchases.as_ref().ok_or_else(ApiError::payments_disabled)
}

fn owned_documents(state: &AppState, user: &User) -> ApiResult<Vec<DocumentView>> {
    let mut documents = Vec::new();
    for id in state.entitlements.entitlements(&user.id)? {
        if let Some(document) = state.catalog.get(&id)? {
            documents.push(document.view());
        }
    }
    Ok(documents)
}

pub async fn get_profile(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<ProfileView>>> {
    let pdfs_purchased = owned_documents(&state, &user)?;
    Ok(Json(ApiResponse::data(ProfileView { user, pdfs_purchased })))
}

pub async fn update_profile(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let updated = state
        .users
        .update_profile(&user.id, update)?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(ApiResponse::data(updated).with_message("Profile updated successfully")))
}

/// Open a checkout session for a paid document
pub async fn begin_purchase(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<SessionDescriptor>>> {
    let session = purchases(&state)?
        .begin_purchase(&user, &DocumentId::from_string(id))
        .await?;

    Ok(Json(ApiResponse::data(session).with_message("Payment session created")))
}

/// Confirm settlement with the gateway and grant the document
pub async fn verify_purchase(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(request): Json<FinalizeRequest>,
) -> ApiResult<Json<ApiResponse<FinalizeOutcome>>> {
    let outcome = purchases(&state)?.finalize_purchase(&user.id, &request).await?;

    match outcome {
        FinalizeOutcome::Granted { .. } => {
            Ok(Json(ApiResponse::data(outcome).with_message("Payment verified and PDF purchased successfully")))
        }
        FinalizeOutcome::AlreadyOwned { .. } => {
            Ok(Json(ApiResponse::data(outcome).with_message("You have already purchased this PDF")))
        }
        FinalizeOutcome::Pending { expired: true, .. } => Err(ApiError::session_expired()),
        FinalizeOutcome::Pending { .. } => Err(ApiError::payment_pending()),
    }
}

pub async fn list_purchases(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<DocumentView>>>> {
    Ok(Json(ApiResponse::list(owned_documents(&state, &user)?)))
}

/// Own download history, newest first
pub async fn list_downloads(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<DownloadView>>>> {
    let mut history = Vec::new();
    for download in state.downloads.for_user(&user.id)? {
        let pdf = state.catalog.get(&download.document)?.map(|d| d.view());
        history.push(DownloadView { download, pdf });
    }
    Ok(Json(ApiResponse::list(history)))
}
