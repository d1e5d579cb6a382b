//! Catalog Routes (`/api/pdfs`)

use std::convert::Infallible;
use std::net::SocketAddr;
use std::str::FromStr;

use axum::{
    Json,
    extract::{ConnectInfo, FromRequestParts, Multipart, Path, State},
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;

use vault_core::{Document, DocumentId, DocumentView, Download, document::resolve_price};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::state::AppState;

/// Multipart field holding the file
const FILE_FIELD: &str = "pdfFile";

/// Best-effort client address and agent, for the download log
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_value = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let ip_address = header_value("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            });

        Ok(Self {
            ip_address,
            user_agent: header_value(header::USER_AGENT.as_str()),
        })
    }
}

/// List the catalog, newest first
pub async fn list_pdfs(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<DocumentView>>>> {
    let documents: Vec<_> = state.catalog.list()?.iter().map(Document::view).collect();
    Ok(Json(ApiResponse::list(documents)))
}

pub async fn get_pdf(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<DocumentView>>> {
    let document = state
        .catalog
        .get(&DocumentId::from_string(id))?
        .ok_or_else(|| ApiError::not_found("PDF"))?;
    Ok(Json(ApiResponse::data(document.view())))
}

#[derive(Default)]
struct UploadForm {
    file: Option<Vec<u8>>,
    title: Option<String>,
    description: Option<String>,
    price: Option<String>,
    is_free: Option<String>,
    tags: Option<String>,
}

async fn read_upload(mut multipart: Multipart, max_bytes: usize) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == FILE_FIELD {
            if field.content_type() != Some("application/pdf") {
                return Err(ApiError::bad_request("Only PDF files are allowed"));
            }
            let bytes = field.bytes().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
            if bytes.len() > max_bytes {
                return Err(ApiError::new(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "FILE_TOO_LARGE",
                    "File exceeds the 10 MB limit",
                ));
            }
            form.file = Some(bytes.to_vec());
            continue;
        }

        let value = field.text().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
        match name.as_str() {
            "title" => form.title = Some(value),
            "description" => form.description = Some(value),
            "price" => form.price = Some(value),
            "isFree" => form.is_free = Some(value),
            "tags" => form.tags = Some(value),
            _ => tracing::debug!(field = %name, "Ignoring unknown upload field"),
        }
    }

    Ok(form)
}

/// Split a comma-separated tag list
pub fn parse_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Multipart upload of a new PDF
pub async fn upload_pdf(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ApiResponse<DocumentView>>)> {
    let form = read_upload(multipart, state.config.max_upload_bytes).await?;

    let bytes = form.file.ok_or_else(|| ApiError::bad_request("No PDF file uploaded"))?;
    let title = form
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("title is required"))?;
    let price = form
        .price
        .filter(|p| !p.trim().is_empty())
        .map(|p| Decimal::from_str(p.trim()))
        .transpose()
        .map_err(|_| ApiError::bad_request("price must be a number"))?;
    let is_free = form.is_free.map(|f| f.trim() == "true");
    let price = resolve_price(price, is_free)?;

    let path = state.files.store("pdfs", "pdf", &bytes).await?;
    let mut document = Document::new(
        title,
        form.description.unwrap_or_default(),
        path,
        u64::try_from(bytes.len()).unwrap_or(u64::MAX),
        price,
        user.id.clone(),
    )?;
    document.tags = form.tags.as_deref().map(parse_tags).unwrap_or_default();
    state.catalog.save(&document)?;

    tracing::info!(
        document_id = %document.id,
        user_id = %user.id,
        bytes = bytes.len(),
        price = %document.price(),
        "PDF uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::data(document.view()).with_message("PDF uploaded successfully")),
    ))
}

/// Stream a PDF to a user entitled to it
pub async fn download_pdf(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    client: ClientInfo,
) -> ApiResult<Response> {
    let id = DocumentId::from_string(id);
    let document = state
        .catalog
        .get(&id)?
        .ok_or_else(|| ApiError::not_found("PDF"))?;

    if document.is_paid() && !state.entitlements.has_entitlement(&user.id, &id)? {
        return Err(ApiError::forbidden(
            "You need to purchase this PDF before downloading",
        ));
    }

    let bytes = state.files.read(&document.path).await?;

    let download = Download::new(user.id.clone(), id.clone()).with_client(client.ip_address, client.user_agent);
    state.downloads.record(&download)?;
    let count = state.catalog.increment_downloads(&id)?;

    tracing::info!(document_id = %id, user_id = %user.id, downloads = count, "PDF downloaded");

    let filename = document.title.replace(['"', '\\', '\r', '\n'], "");
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}.pdf\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Delete a PDF; only its creator or an admin may
pub async fn delete_pdf(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let id = DocumentId::from_string(id);
    let document = state
        .catalog
        .get(&id)?
        .ok_or_else(|| ApiError::not_found("PDF"))?;

    if document.created_by != user.id && !user.is_admin() {
        return Err(ApiError::forbidden("Unauthorized to delete this PDF"));
    }

    state.files.delete(&document.path).await?;
    state.catalog.delete(&id)?;

    tracing::info!(document_id = %id, user_id = %user.id, "PDF deleted");
    Ok(Json(ApiResponse::message("PDF deleted successfully")))
}
