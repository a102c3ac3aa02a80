use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    middleware_layer::auth::SessionHandle,
    models::session::HistoryStep,
    models::user::PointsSnapshot,
    services::{generation, session_store},
    state::AppState,
};

/// The request payload for a generation.
#[derive(Deserialize, Debug)]
pub struct GenerateRequest {
    pub prompt: Option<String>,
    pub tone: Option<String>,
    pub content_type: Option<String>,
    #[serde(default)]
    pub is_regeneration: bool,
}

/// The response payload for a successful generation.
#[derive(Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub caption: String,
    pub filename: String,
    pub image: String,
    pub points: PointsSnapshot,
}

/// The response payload for a back/forward step through the history.
#[derive(Serialize, Default)]
pub struct BrowseResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Generates an image and caption for the prompt, stores both, and appends
/// the result to the session's browsing history.
#[axum::debug_handler]
pub async fn generate(
    State(state): State<AppState>,
    Extension(mut handle): Extension<SessionHandle>,
    Json(payload): Json<GenerateRequest>,
) -> Result<Response> {
    let prompt = payload.prompt.as_deref().unwrap_or("").trim().to_string();
    if prompt.is_empty() {
        return Err(AppError::Validation("Prompt required".to_string()));
    }
    let tone = payload.tone.as_deref().unwrap_or("");
    let content_type = payload.content_type.as_deref().unwrap_or("");

    let result = generation::run(
        &state,
        &handle.session.user_id,
        &prompt,
        tone,
        content_type,
        payload.is_regeneration,
    )
    .await?;

    handle.session.history.push(result.entry.clone());
    session_store::save(&state, handle.id, &handle.session).await?;

    let response = GenerateResponse {
        success: true,
        caption: result.entry.caption,
        filename: result.entry.filename,
        image: result.image_b64,
        points: result.points,
    };

    Ok(Json(response).into_response())
}

/// Steps the session history back towards older generations.
#[axum::debug_handler]
pub async fn back(
    State(state): State<AppState>,
    Extension(mut handle): Extension<SessionHandle>,
) -> Result<Response> {
    match handle.session.history.back() {
        HistoryStep::Entry(entry) => {
            session_store::save(&state, handle.id, &handle.session).await?;
            Ok(Json(BrowseResponse {
                success: true,
                filename: Some(entry.filename),
                caption: Some(entry.caption),
                prompt: Some(entry.prompt),
                ..Default::default()
            })
            .into_response())
        }
        _ => Ok(Json(BrowseResponse {
            success: false,
            message: Some("No more previous images available".to_string()),
            ..Default::default()
        })
        .into_response()),
    }
}

/// Steps the session history forward towards newer generations. Stepping
/// past the newest entry lands back on the live view.
#[axum::debug_handler]
pub async fn forward(
    State(state): State<AppState>,
    Extension(mut handle): Extension<SessionHandle>,
) -> Result<Response> {
    match handle.session.history.forward() {
        HistoryStep::Entry(entry) => {
            session_store::save(&state, handle.id, &handle.session).await?;
            Ok(Json(BrowseResponse {
                success: true,
                filename: Some(entry.filename),
                caption: Some(entry.caption),
                prompt: Some(entry.prompt),
                ..Default::default()
            })
            .into_response())
        }
        HistoryStep::Live => {
            session_store::save(&state, handle.id, &handle.session).await?;
            Ok(Json(BrowseResponse {
                success: true,
                live: Some(true),
                ..Default::default()
            })
            .into_response())
        }
        HistoryStep::Exhausted => Ok(Json(BrowseResponse {
            success: false,
            message: Some("No more next images available".to_string()),
            ..Default::default()
        })
        .into_response()),
    }
}
