use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    middleware_layer::auth::SessionHandle,
    repositories::{activity as activity_repo, scheduled_post as scheduled_repo, user as user_repo},
    services::{challenge, platform_session},
    state::AppState,
    validation::{media::validate_filename, schedule::parse_future_time},
};

/// The request payload for scheduling a post.
#[derive(Deserialize, Debug)]
pub struct SchedulePostRequest {
    pub caption: Option<String>,
    pub filename: Option<String>,
    pub scheduled_time: Option<String>,
    pub platform: Option<String>,
}

/// The request payload for resolving a challenge on a scheduled post.
#[derive(Deserialize, Debug)]
pub struct VerifyScheduledOtpRequest {
    pub otp: Option<String>,
    pub post_id: Option<String>,
}

/// One scheduled post as listed to the client.
#[derive(Serialize)]
pub struct ScheduledItem {
    pub id: Uuid,
    pub caption: String,
    pub image_filename: Option<String>,
    pub scheduled_time: String,
    pub status: String,
    pub error_message: Option<String>,
    pub platform: String,
}

/// The response payload for the scheduled post listing.
#[derive(Serialize)]
pub struct ScheduledListResponse {
    pub success: bool,
    pub posts: Vec<ScheduledItem>,
}

#[derive(Serialize)]
struct MessageResponse {
    success: bool,
    message: String,
}

#[derive(Serialize)]
struct DeleteErrorResponse {
    success: bool,
    error: String,
}

/// Lists the user's scheduled posts, soonest first.
#[axum::debug_handler]
pub async fn list_scheduled(
    State(state): State<AppState>,
    Extension(handle): Extension<SessionHandle>,
) -> Result<Response> {
    let posts = scheduled_repo::list_for_user(&state.db, &handle.session.user_id).await?;

    let posts = posts
        .into_iter()
        .map(|post| ScheduledItem {
            id: post.id,
            caption: post.caption,
            image_filename: post.image_filename,
            scheduled_time: post.scheduled_time.to_rfc3339(),
            status: post.status.as_str().to_string(),
            error_message: post.error_message,
            platform: post.platform,
        })
        .collect();

    Ok(Json(ScheduledListResponse {
        success: true,
        posts,
    })
    .into_response())
}

/// Queues a post for the delivery loop.
///
/// Requires a prepared platform session so the loop has a saved login to
/// publish with when the time comes.
#[axum::debug_handler]
pub async fn schedule_post(
    State(state): State<AppState>,
    Extension(handle): Extension<SessionHandle>,
    Json(payload): Json<SchedulePostRequest>,
) -> Result<Response> {
    let caption = payload.caption.as_deref().unwrap_or("").trim().to_string();
    let filename = payload.filename.as_deref().unwrap_or("").trim().to_string();
    let scheduled_time = payload.scheduled_time.as_deref().unwrap_or("");
    let platform = payload.platform.as_deref().unwrap_or("instagram");

    if caption.is_empty() || scheduled_time.is_empty() {
        return Err(AppError::Validation(
            "Caption and scheduled time are required".to_string(),
        ));
    }
    let scheduled_time = parse_future_time(scheduled_time)?;

    let user_id = handle.session.user_id;
    if !filename.is_empty() {
        validate_filename(&filename)?;
        if activity_repo::find_owned(&state.db, &user_id, &filename)
            .await?
            .is_none()
        {
            return Err(AppError::AccessDenied);
        }
    }

    let user = user_repo::find_by_id(&state.db, &user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if platform_session::load_artifact(&state.vault, &user).is_none() {
        return Err(AppError::Validation(
            "Instagram session not ready. Please verify OTP first.".to_string(),
        ));
    }

    let image_filename = (!filename.is_empty()).then_some(filename.as_str());
    let post = scheduled_repo::create(
        &state.db,
        &user_id,
        &caption,
        image_filename,
        &scheduled_time,
        platform,
    )
    .await?;

    tracing::info!("⏰ Post {} scheduled for {} by user {}", post.id, post.scheduled_time, user_id);

    Ok(Json(MessageResponse {
        success: true,
        message: "Post scheduled successfully".to_string(),
    })
    .into_response())
}

/// Removes a scheduled post owned by the user.
#[axum::debug_handler]
pub async fn delete_scheduled(
    State(state): State<AppState>,
    Extension(handle): Extension<SessionHandle>,
    Path(post_id): Path<Uuid>,
) -> Result<Response> {
    if !scheduled_repo::delete_for_user(&state.db, &handle.session.user_id, &post_id).await? {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(DeleteErrorResponse {
                success: false,
                error: "Post not found or access denied".to_string(),
            }),
        )
            .into_response());
    }

    tracing::info!("🗑️ Scheduled post {} deleted by user {}", post_id, handle.session.user_id);

    Ok(Json(MessageResponse {
        success: true,
        message: "Scheduled post deleted".to_string(),
    })
    .into_response())
}

/// Resolves the challenge that blocked a scheduled post; the post goes
/// back in the queue, due immediately.
#[axum::debug_handler]
pub async fn verify_scheduled_otp(
    State(state): State<AppState>,
    Extension(handle): Extension<SessionHandle>,
    Json(payload): Json<VerifyScheduledOtpRequest>,
) -> Result<Response> {
    let otp = payload.otp.as_deref().unwrap_or("").trim().to_string();
    let post_id = payload.post_id.as_deref().unwrap_or("");
    if otp.is_empty() || post_id.is_empty() {
        return Err(AppError::Validation("OTP and post_id required".to_string()));
    }
    let post_id = Uuid::parse_str(post_id).map_err(|_| AppError::NotFound)?;

    challenge::verify_scheduled(&state, &handle.session.user_id, &post_id, &otp).await?;

    Ok(Json(MessageResponse {
        success: true,
        message: "OTP verified. Post will be published shortly.".to_string(),
    })
    .into_response())
}
