//! Route handlers for the transfer API and the two browser pages.

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

use crate::error::TransferError;
use crate::events::TransferEvent;
use crate::store::{OnMissing, update_transfer};
use crate::transfer::{FileMeta, Transfer, TransferStatus};
use crate::vault::FileVault;

use super::AppState;
use super::qr;

const UPLOAD_HTML: &str = include_str!("static/upload.html");
const RECEIVE_HTML: &str = include_str!("static/receive.html");
const EXPIRED_HTML: &str = include_str!("static/expired.html");

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedResponse {
    pub transfer_id: String,
    pub expires_in_sec: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub transfer_id: String,
    pub status: TransferStatus,
    pub files: Vec<FileMeta>,
    pub created_at: chrono::DateTime<Utc>,
}

impl TransferResponse {
    fn from_transfer(id: String, t: Transfer) -> Self {
        Self {
            transfer_id: id,
            status: t.status,
            files: t.files,
            created_at: t.created_at,
        }
    }
}

/// POST /transfers
pub async fn create_transfer(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, TransferError> {
    let id = state.store.create().await?;
    tracing::info!("Created transfer {}", id);
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            transfer_id: id,
            expires_in_sec: state.config.expires_in_secs(),
        }),
    ))
}

/// GET /transfer/{id}, strict: an unknown id is a 404.
pub async fn get_transfer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TransferResponse>, TransferError> {
    let transfer = state.store.get(&id).await?.ok_or(TransferError::NotFound)?;
    Ok(Json(TransferResponse::from_transfer(id, transfer)))
}

/// GET /files/{id}, lenient: an unknown id is registered as a fresh open
/// transfer so a poll that beats the create call still gets a usable answer.
pub async fn get_files(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TransferResponse>, TransferError> {
    let transfer = match state.store.get(&id).await? {
        Some(t) => t,
        None => {
            update_transfer(state.store.as_ref(), &id, OnMissing::CreateOpen, |_| Ok(())).await?
        }
    };
    Ok(Json(TransferResponse::from_transfer(id, transfer)))
}

/// POST /upload/{id}, multipart with one or more `file` fields.
pub async fn upload(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Response, TransferError> {
    // Absent and terminal transfers get the same answer here: the link the
    // phone scanned is no longer usable.
    match state.store.get(&id).await? {
        Some(t) if t.is_open() => {}
        _ => return Err(TransferError::NotOpen),
    }

    let mut accepted = 0usize;
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| TransferError::PayloadRejected(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let name = FileVault::sanitize_name(field.file_name().unwrap_or("unnamed.bin"));
        let mimetype = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !state.config.is_mimetype_allowed(&mimetype) {
            tracing::warn!("Rejected {} on transfer {}: type {}", name, id, mimetype);
            return Ok(error_response(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "file type not allowed, expected PDF or XLSX",
            ));
        }

        let mut writer = state.vault.writer(&id, &name).await?;
        let mut written = 0u64;
        loop {
            let chunk = match field.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    writer.discard().await?;
                    return Err(TransferError::PayloadRejected(e.to_string()));
                }
            };
            written += chunk.len() as u64;
            if written > state.config.max_file_size {
                writer.discard().await?;
                tracing::warn!("Rejected {} on transfer {}: too large", name, id);
                return Ok(error_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "file exceeds the size limit",
                ));
            }
            writer.write_chunk(chunk).await?;
        }
        let size = writer.finish().await?;

        let meta = FileMeta {
            name: name.clone(),
            size,
            mimetype,
            uploaded_at: Utc::now(),
        };
        match state.registry.add_file(&id, meta).await {
            Ok(()) => accepted += 1,
            Err(TransferError::NotOpen) => {
                // The transfer closed while the bytes were streaming in.
                state.vault.remove(&id, &name).await?;
                return Err(TransferError::NotOpen);
            }
            Err(e) => return Err(e),
        }
    }

    if accepted == 0 {
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            "no file field in the request",
        ));
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// POST /complete/{id}
pub async fn complete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, TransferError> {
    state.sessions.complete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /cancel/{id}
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, TransferError> {
    state.sessions.cancel(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /delete-all/{id}
pub async fn delete_all(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, TransferError> {
    state.sessions.delete_all_files(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /events/{id}, server-sent events.
///
/// An unknown id yields an empty stream that ends immediately rather than
/// an error: the desktop page may reconnect after its transfer expired and
/// EventSource retries forever on HTTP errors.
pub async fn events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let snapshot = match state.store.get(&id).await {
        Ok(t) => t.map(|t| t.status),
        Err(e) => {
            tracing::error!("Snapshot load failed for transfer {}: {}", id, e);
            None
        }
    };
    let rx = state.broadcaster.subscribe(&id, snapshot).await;
    let stream = ReceiverStream::new(rx).map(|event: TransferEvent| Event::default().json_data(&event));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /content/{id}/{filename}, best-effort document extraction.
pub async fn file_content(
    State(state): State<AppState>,
    Path((id, filename)): Path<(String, String)>,
) -> Result<Response, TransferError> {
    let transfer = state.store.get(&id).await?.ok_or(TransferError::NotFound)?;
    let meta = transfer
        .files
        .iter()
        .find(|f| f.name == filename)
        .ok_or(TransferError::NotFound)?;
    let bytes = state
        .vault
        .read(&id, &filename)
        .await?
        .ok_or(TransferError::NotFound)?;

    let content = state.extractor.extract(&meta.name, &bytes, &meta.mimetype);
    Ok(Json(content).into_response())
}

#[derive(Deserialize)]
pub struct UploadPageQuery {
    #[serde(rename = "transferId")]
    transfer_id: Option<String>,
}

/// GET /upload?transferId=..., the page behind the QR code.
pub async fn upload_page(
    State(state): State<AppState>,
    Query(query): Query<UploadPageQuery>,
) -> Result<Response, TransferError> {
    let Some(id) = query.transfer_id else {
        return Ok(expired_page());
    };
    match state.store.get(&id).await? {
        Some(t) if t.is_open() => {
            Ok(Html(UPLOAD_HTML.replace("{{TRANSFER_ID}}", &id)).into_response())
        }
        _ => Ok(expired_page()),
    }
}

/// GET /receive, creates a transfer and renders the desktop page for it.
pub async fn receive_page(State(state): State<AppState>) -> Result<Response, TransferError> {
    let id = state.store.create().await?;
    let mobile_url = qr::upload_url(&state.config, &id);
    tracing::info!("Created transfer {} for receive page ({})", id, mobile_url);

    let page = RECEIVE_HTML
        .replace("{{TRANSFER_ID}}", &id)
        .replace("{{MOBILE_URL}}", &mobile_url);
    Ok(Html(page).into_response())
}

/// GET /qr/{id}, PNG image encoding the upload link.
pub async fn qr_code(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, TransferError> {
    state.store.get(&id).await?.ok_or(TransferError::NotFound)?;

    let url = qr::upload_url(&state.config, &id);
    match qr::qr_png(&url) {
        Ok(png) => Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response()),
        Err(e) => {
            tracing::error!("QR render failed for transfer {}: {}", id, e);
            Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "QR generation failed",
            ))
        }
    }
}

fn expired_page() -> Response {
    (StatusCode::GONE, Html(EXPIRED_HTML)).into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
