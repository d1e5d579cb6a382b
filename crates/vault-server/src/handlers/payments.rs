//! Payment Routes (`/api/payments`)

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
};
use serde::{Deserialize, Serialize};

use vault_payments::{SIGNATURE_HEADER, TIMESTAMP_HEADER};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub pdf_id: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
}

/// Gateway return URL: forward the browser to the client app, which then
/// calls verify. Nothing is checked or granted here.
pub async fn payment_redirect(
    State(state): State<AppState>,
    Query(query): Query<RedirectQuery>,
) -> ApiResult<Redirect> {
    let purchases = state.purchases.as_ref().ok_or_else(ApiError::payments_disabled)?;
    let url = purchases.redirect_url(&query.order_id, &query.pdf_id)?;

    tracing::debug!(order_id = %query.order_id, pdf_id = %query.pdf_id, "Redirecting after payment");
    Ok(Redirect::to(&url))
}

/// Signed gateway notification
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<WebhookResponse>> {
    let handler = state.webhooks.as_ref().ok_or_else(ApiError::payments_disabled)?;

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "MISSING_SIGNATURE", "Missing webhook signature"))
    };
    let signature = header(SIGNATURE_HEADER)?;
    let timestamp = header(TIMESTAMP_HEADER)?;

    handler.handle(&body, timestamp, signature).await.map_err(|e| {
        tracing::warn!(error = %e, "Webhook rejected");
        ApiError::from(e)
    })?;

    Ok(Json(WebhookResponse { received: true }))
}
