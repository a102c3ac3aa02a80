//! The verification-code flow around platform logins.
//!
//! A login can come back demanding a one-time code. The publish executor
//! persists that as the user's pending challenge; this module resolves it:
//! resume with the code, cache the granted session, clear the pending
//! context. `prepare_session` runs the login ahead of time so the challenge
//! surfaces while the user is still at the keyboard instead of at a
//! scheduled posting time.

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::user::User;
use crate::platform::client::{AuthOutcome, SessionArtifact};
use crate::repositories::scheduled_post as scheduled_repo;
use crate::repositories::user as user_repo;
use crate::services::platform_session;
use crate::services::publish::{self, PublishOrigin, PublishReport};
use crate::state::AppState;

/// What a session preparation attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// A session was granted and cached.
    Ready,
    /// The platform raised a challenge; a code is needed to continue.
    OtpNeeded,
}

/// Logs in fresh to cache a session, or to surface the challenge early.
pub async fn prepare_session(state: &AppState, user_id: &Uuid) -> Result<PrepareOutcome> {
    let user = user_repo::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let creds = platform_session::resolve_credentials(&state.vault, &user)
        .ok_or(AppError::CredentialsMissing)?;

    match state.platform.login(&creds, None).await? {
        AuthOutcome::Authenticated(artifact) => {
            platform_session::store_artifact(state, user_id, &artifact).await;
            tracing::info!("✅ Platform session ready for user {}", user_id);
            Ok(PrepareOutcome::Ready)
        }
        AuthOutcome::ChallengeRequired(signal) => {
            platform_session::store_challenge(state, &user, &signal).await?;
            Ok(PrepareOutcome::OtpNeeded)
        }
        AuthOutcome::Failed(reason) => Err(AppError::AuthFailed(reason)),
    }
}

/// Resolves the pending challenge with the user's code and caches the
/// granted session. The pending context is cleared only on success.
async fn resume_pending(state: &AppState, user: &User, code: &str) -> Result<SessionArtifact> {
    let creds = platform_session::resolve_credentials(&state.vault, user)
        .ok_or(AppError::CredentialsMissing)?;
    let pending = platform_session::load_challenge(&state.vault, user)
        .ok_or_else(|| AppError::OtpVerificationFailed("No pending challenge".to_string()))?;

    match state
        .platform
        .resume_challenge(&creds, &pending, code)
        .await?
    {
        AuthOutcome::Authenticated(artifact) => {
            platform_session::store_artifact(state, &user.id, &artifact).await;
            user_repo::clear_challenge_context(&state.db, &user.id).await?;
            tracing::info!("✅ Challenge resolved for user {}", user.id);
            Ok(artifact)
        }
        AuthOutcome::ChallengeRequired(signal) => {
            // the platform reissued; keep the newest context for the retry
            if let Err(e) = platform_session::store_challenge(state, user, &signal).await {
                tracing::error!("Failed to store reissued challenge: {}", e);
            }
            Err(AppError::OtpVerificationFailed(
                "the platform issued a new challenge".to_string(),
            ))
        }
        AuthOutcome::Failed(reason) => Err(AppError::OtpVerificationFailed(reason)),
    }
}

/// Resolves the pending challenge and stores the session for later use.
pub async fn verify_session(state: &AppState, user_id: &Uuid, code: &str) -> Result<()> {
    let user = user_repo::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    resume_pending(state, &user, code).await?;
    Ok(())
}

/// Resolves the pending challenge and, when a filename is given, publishes
/// the post the challenge interrupted.
pub async fn verify_and_publish(
    state: &AppState,
    user_id: &Uuid,
    code: &str,
    filename: Option<&str>,
    caption: &str,
) -> Result<Option<PublishReport>> {
    let user = user_repo::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    resume_pending(state, &user, code).await?;

    match filename {
        None => Ok(None),
        Some(filename) => {
            let report = publish::execute(
                state,
                user_id,
                filename,
                caption,
                true,
                PublishOrigin::Interactive,
            )
            .await?;
            Ok(Some(report))
        }
    }
}

/// Resolves the challenge that blocked a scheduled post and puts the post
/// back in the queue, due immediately.
pub async fn verify_scheduled(
    state: &AppState,
    user_id: &Uuid,
    post_id: &Uuid,
    code: &str,
) -> Result<()> {
    if scheduled_repo::find_for_user(&state.db, user_id, post_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound);
    }

    let user = user_repo::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    resume_pending(state, &user, code).await?;

    if !scheduled_repo::reset_after_otp(&state.db, user_id, post_id).await? {
        tracing::warn!(
            "Scheduled post {} was not awaiting a verification code",
            post_id
        );
    }
    Ok(())
}
