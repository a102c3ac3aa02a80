use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    middleware_layer::auth::SessionHandle,
    services::{
        challenge::{self, PrepareOutcome},
        publish::{self, PublishOrigin},
    },
    state::AppState,
    validation::media::validate_filename,
};

/// The request payload for a direct post.
#[derive(Deserialize, Debug)]
pub struct PostRequest {
    pub filename: Option<String>,
    pub caption: Option<String>,
}

/// The request payload for resolving an OTP challenge, optionally
/// finishing the post that raised it.
#[derive(Deserialize, Debug)]
pub struct VerifyOtpRequest {
    pub otp: Option<String>,
    pub filename: Option<String>,
    pub caption: Option<String>,
}

/// The request payload for verifying a prepared platform session.
#[derive(Deserialize, Debug)]
pub struct VerifySessionRequest {
    pub otp: Option<String>,
}

/// The response payload for a completed post.
#[derive(Serialize)]
pub struct PostResponse {
    pub success: bool,
    pub message: String,
    pub url: String,
}

/// The response payload for a resolved OTP challenge.
#[derive(Serialize)]
pub struct VerifyOtpResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The response payload for session preparation.
#[derive(Serialize)]
pub struct PrepareSessionResponse {
    pub success: bool,
    pub session_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_otp: Option<bool>,
}

/// The response payload for session verification.
#[derive(Serialize)]
pub struct VerifySessionResponse {
    pub success: bool,
    pub session_ready: bool,
    pub message: String,
}

/// Publishes a generated image to the platform right now.
#[axum::debug_handler]
pub async fn post(
    State(state): State<AppState>,
    Extension(handle): Extension<SessionHandle>,
    Json(payload): Json<PostRequest>,
) -> Result<Response> {
    let filename = payload.filename.unwrap_or_default();
    let caption = payload.caption.as_deref().unwrap_or("").trim().to_string();
    if filename.is_empty() || caption.is_empty() {
        return Err(AppError::Validation(
            "Filename and caption are required".to_string(),
        ));
    }
    validate_filename(&filename)?;

    let report = publish::execute(
        &state,
        &handle.session.user_id,
        &filename,
        &caption,
        false,
        PublishOrigin::Interactive,
    )
    .await?;

    let response = PostResponse {
        success: true,
        message: "Posted to Instagram successfully".to_string(),
        url: report.url,
    };

    Ok(Json(response).into_response())
}

/// Resolves a pending OTP challenge. When the request names a file, the
/// blocked post is retried with the fresh session.
#[axum::debug_handler]
pub async fn verify_otp(
    State(state): State<AppState>,
    Extension(handle): Extension<SessionHandle>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Response> {
    let otp = payload.otp.as_deref().unwrap_or("").trim().to_string();
    if otp.is_empty() {
        return Err(AppError::Validation("OTP is required".to_string()));
    }

    let filename = payload.filename.as_deref().filter(|f| !f.is_empty());
    if let Some(filename) = filename {
        validate_filename(filename)?;
    }
    let caption = payload.caption.as_deref().unwrap_or("");

    let report =
        challenge::verify_and_publish(&state, &handle.session.user_id, &otp, filename, caption)
            .await?;

    let response = match report {
        Some(report) => VerifyOtpResponse {
            success: true,
            message: "Posted to Instagram successfully".to_string(),
            url: Some(report.url),
        },
        None => VerifyOtpResponse {
            success: true,
            message: "OTP verified. Session saved.".to_string(),
            url: None,
        },
    };

    Ok(Json(response).into_response())
}

/// Logs in to the platform ahead of time so scheduled posts can reuse the
/// session without tripping a challenge at delivery time.
#[axum::debug_handler]
pub async fn prepare_session(
    State(state): State<AppState>,
    Extension(handle): Extension<SessionHandle>,
) -> Result<Response> {
    let response = match challenge::prepare_session(&state, &handle.session.user_id).await? {
        PrepareOutcome::Ready => PrepareSessionResponse {
            success: true,
            session_ready: true,
            require_otp: None,
        },
        PrepareOutcome::OtpNeeded => PrepareSessionResponse {
            success: true,
            session_ready: false,
            require_otp: Some(true),
        },
    };

    Ok(Json(response).into_response())
}

/// Resolves the challenge raised while preparing a platform session.
#[axum::debug_handler]
pub async fn verify_session(
    State(state): State<AppState>,
    Extension(handle): Extension<SessionHandle>,
    Json(payload): Json<VerifySessionRequest>,
) -> Result<Response> {
    let otp = payload.otp.as_deref().unwrap_or("").trim().to_string();
    if otp.is_empty() {
        return Err(AppError::Validation("OTP required".to_string()));
    }

    challenge::verify_session(&state, &handle.session.user_id, &otp).await?;

    let response = VerifySessionResponse {
        success: true,
        session_ready: true,
        message: "OTP verified. Session saved.".to_string(),
    };

    Ok(Json(response).into_response())
}
