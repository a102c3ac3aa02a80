use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::io::SeekFrom;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    middleware_layer::auth::SessionHandle,
    repositories::activity as activity_repo,
    state::AppState,
    storage::{self, CaptionSidecar},
    validation::media::validate_filename,
};

/// How many recent generations the history panel shows.
const HISTORY_PANEL_LIMIT: i64 = 5;

/// Query parameters naming a generated file.
#[derive(Deserialize, Debug)]
pub struct FilenameQuery {
    pub filename: Option<String>,
}

/// The request payload for a caption edit.
#[derive(Deserialize, Debug)]
pub struct UpdateCaptionRequest {
    pub filename: Option<String>,
    pub caption: Option<String>,
}

/// The request payload for recording a download.
#[derive(Deserialize, Debug)]
pub struct RecordDownloadRequest {
    pub filename: Option<String>,
}

/// One row of the history panel.
#[derive(Serialize)]
pub struct HistoryItem {
    pub id: Uuid,
    pub prompt: String,
    pub filename: Option<String>,
    pub caption: Option<String>,
    pub caption_filename: Option<String>,
    pub created_at: String,
}

/// The response payload for the history panel.
#[derive(Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub history: Vec<HistoryItem>,
}

/// The response payload carrying a caption sidecar.
#[derive(Serialize)]
pub struct CaptionResponse {
    pub success: bool,
    pub caption: CaptionSidecar,
}

#[derive(Serialize)]
struct SimpleResponse {
    success: bool,
}

/// Lists the user's most recent generations.
#[axum::debug_handler]
pub async fn history(
    State(state): State<AppState>,
    Extension(handle): Extension<SessionHandle>,
) -> Result<Response> {
    let activities =
        activity_repo::recent(&state.db, &handle.session.user_id, HISTORY_PANEL_LIMIT).await?;

    let history = activities
        .into_iter()
        .map(|activity| HistoryItem {
            id: activity.id,
            prompt: activity.prompt,
            filename: activity.image_filename,
            caption: activity.generated_caption,
            caption_filename: activity.caption_filename,
            created_at: activity.created_at.to_rfc3339(),
        })
        .collect();

    Ok(Json(HistoryResponse {
        success: true,
        history,
    })
    .into_response())
}

/// Streams a generated image back to its owner.
///
/// The content type is sniffed from the first bytes of the file; images
/// are stored as PNG today but the sniff keeps old artifacts working if
/// the upstream format ever changes.
#[axum::debug_handler]
pub async fn get_image(
    State(state): State<AppState>,
    Extension(handle): Extension<SessionHandle>,
    Query(query): Query<FilenameQuery>,
) -> Result<Response> {
    let filename = query.filename.as_deref().unwrap_or("");
    if filename.is_empty() {
        return Err(AppError::Validation("Filename required".to_string()));
    }
    validate_filename(filename)?;

    let user_id = handle.session.user_id;
    if activity_repo::find_owned(&state.db, &user_id, filename)
        .await?
        .is_none()
    {
        return Err(AppError::AccessDenied);
    }

    let path = storage::image_path(&state.config.media_root, &user_id, filename);
    let mut file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(AppError::NotFound),
        Err(e) => return Err(e.into()),
    };

    let mut head = [0u8; 32];
    let read = file.read(&mut head).await?;
    let mime = infer::get(&head[..read])
        .map(|kind| kind.mime_type())
        .unwrap_or("image/png");
    file.seek(SeekFrom::Start(0)).await?;

    let body = Body::from_stream(ReaderStream::new(file));

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(mime));

    tracing::debug!("📤 Serving image {} for user {}", filename, user_id);

    Ok((response_headers, body).into_response())
}

/// Returns the caption sidecar for a generated image.
#[axum::debug_handler]
pub async fn get_caption(
    State(state): State<AppState>,
    Extension(handle): Extension<SessionHandle>,
    Query(query): Query<FilenameQuery>,
) -> Result<Response> {
    let filename = query.filename.as_deref().unwrap_or("");
    if filename.is_empty() {
        return Err(AppError::Validation("Filename required".to_string()));
    }
    validate_filename(filename)?;

    let user_id = handle.session.user_id;
    let caption_filename = activity_repo::find_owned(&state.db, &user_id, filename)
        .await?
        .and_then(|activity| activity.caption_filename)
        .ok_or(AppError::NotFound)?;

    let sidecar =
        storage::read_caption_sidecar(&state.config.media_root, &user_id, &caption_filename)
            .await?
            .ok_or(AppError::NotFound)?;

    Ok(Json(CaptionResponse {
        success: true,
        caption: sidecar,
    })
    .into_response())
}

/// Stores a user-edited caption, writing it through to the sidecar file
/// and the activity row. A missing sidecar is created on the spot.
#[axum::debug_handler]
pub async fn update_caption(
    State(state): State<AppState>,
    Extension(handle): Extension<SessionHandle>,
    Json(payload): Json<UpdateCaptionRequest>,
) -> Result<Response> {
    let filename = payload.filename.as_deref().unwrap_or("");
    if filename.is_empty() {
        return Err(AppError::Validation("Filename required".to_string()));
    }
    validate_filename(filename)?;
    let new_caption = payload.caption.as_deref().unwrap_or("").trim().to_string();

    let user_id = handle.session.user_id;
    let activity = activity_repo::find_owned(&state.db, &user_id, filename)
        .await?
        .ok_or(AppError::AccessDenied)?;

    let caption_filename = match activity.caption_filename {
        Some(caption_filename) => {
            storage::update_caption_sidecar(
                &state.config.media_root,
                &user_id,
                &caption_filename,
                &new_caption,
            )
            .await?;
            caption_filename
        }
        None => {
            storage::save_caption_sidecar(
                &state.config.media_root,
                &user_id,
                filename,
                &activity.prompt,
                &new_caption,
            )
            .await?
        }
    };

    activity_repo::update_caption(&state.db, &user_id, filename, &new_caption, &caption_filename)
        .await?;

    tracing::info!("✅ Caption updated for {} (user {})", filename, user_id);

    Ok(Json(SimpleResponse { success: true }).into_response())
}

/// Marks a generated image as downloaded.
#[axum::debug_handler]
pub async fn record_download(
    State(state): State<AppState>,
    Extension(handle): Extension<SessionHandle>,
    Json(payload): Json<RecordDownloadRequest>,
) -> Result<Response> {
    let filename = payload.filename.as_deref().unwrap_or("");
    if filename.is_empty() {
        return Err(AppError::Validation("Filename required".to_string()));
    }

    let user_id = handle.session.user_id;
    if !activity_repo::mark_downloaded(&state.db, &user_id, filename).await? {
        return Err(AppError::AccessDenied);
    }

    tracing::debug!("💾 Download recorded for {} (user {})", filename, user_id);

    Ok(Json(SimpleResponse { success: true }).into_response())
}
