//! The publish executor: one photo, one caption, onto the platform.
//!
//! [`publish_media`] is the login-then-upload core, free of any storage so
//! it can run against a scripted client. [`execute`] wraps it with the
//! ownership gate, vault resolution, session caching, challenge persistence
//! and the status bookkeeping for scheduled posts.

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::platform::client::{
    AuthOutcome, ChallengeSignal, PlatformCredentials, PublishClient, SessionArtifact,
    UploadReceipt,
};
use crate::repositories::activity as activity_repo;
use crate::repositories::scheduled_post as scheduled_repo;
use crate::repositories::user as user_repo;
use crate::services::platform_session;
use crate::state::AppState;
use crate::storage;

/// Where a publish request came from. Scheduled publishes record their
/// outcome on the `scheduled_posts` row instead of a synchronous response.
#[derive(Debug, Clone, Copy)]
pub enum PublishOrigin {
    Interactive,
    Scheduled(Uuid),
}

/// Outcome of the login-then-upload core.
#[derive(Debug)]
pub enum PublishAttempt {
    /// The photo is live.
    Published {
        receipt: UploadReceipt,
        artifact: SessionArtifact,
        used_saved_session: bool,
    },
    /// The platform wants a verification code; nothing was uploaded.
    ChallengeRaised(ChallengeSignal),
    /// The platform rejected the credentials outright.
    Rejected(String),
}

/// What a successful publish reports back.
#[derive(Debug)]
pub struct PublishReport {
    /// Public URL of the post, empty when the platform gave no identifier.
    pub url: String,
    /// Whether a saved session carried the upload.
    pub used_saved_session: bool,
}

/// Authenticates and uploads. A saved session is tried first when given;
/// a rejected restore falls back to a fresh login, a challenge stops the
/// attempt before any upload.
pub async fn publish_media(
    client: &dyn PublishClient,
    creds: &PlatformCredentials,
    saved: Option<&SessionArtifact>,
    image: &[u8],
    caption: &str,
) -> Result<PublishAttempt> {
    if let Some(artifact) = saved {
        match client.login(creds, Some(artifact)).await {
            Ok(AuthOutcome::Authenticated(granted)) => {
                let receipt = client.upload_photo(&granted, image, caption).await?;
                return Ok(PublishAttempt::Published {
                    receipt,
                    artifact: granted,
                    used_saved_session: true,
                });
            }
            Ok(AuthOutcome::ChallengeRequired(signal)) => {
                return Ok(PublishAttempt::ChallengeRaised(signal));
            }
            Ok(AuthOutcome::Failed(reason)) => {
                tracing::warn!(
                    "Saved session login failed, will try fresh login. Reason: {}",
                    reason
                );
            }
            Err(e) => {
                tracing::warn!(
                    "Saved session login failed, will try fresh login. Reason: {}",
                    e
                );
            }
        }
    }

    match client.login(creds, None).await? {
        AuthOutcome::Authenticated(granted) => {
            let receipt = client.upload_photo(&granted, image, caption).await?;
            Ok(PublishAttempt::Published {
                receipt,
                artifact: granted,
                used_saved_session: false,
            })
        }
        AuthOutcome::ChallengeRequired(signal) => Ok(PublishAttempt::ChallengeRaised(signal)),
        AuthOutcome::Failed(reason) => Ok(PublishAttempt::Rejected(reason)),
    }
}

/// Runs a full publish for a stored image.
///
/// Scheduled origins get their row transitioned to `completed`,
/// `otp_required` or `failed`; interactive callers get the same conditions
/// as typed errors. A raised challenge is persisted before this returns.
pub async fn execute(
    state: &AppState,
    user_id: &Uuid,
    image_filename: &str,
    caption: &str,
    prefer_saved: bool,
    origin: PublishOrigin,
) -> Result<PublishReport> {
    if image_filename.is_empty() {
        return Err(fail(state, origin, AppError::Validation("No image filename".to_string())).await);
    }

    let user = match user_repo::find_by_id(&state.db, user_id).await? {
        Some(user) => user,
        None => return Err(fail(state, origin, AppError::NotFound).await),
    };

    if activity_repo::find_owned(&state.db, user_id, image_filename)
        .await?
        .is_none()
    {
        return Err(fail(state, origin, AppError::AccessDenied).await);
    }

    if !storage::image_exists(&state.config.media_root, user_id, image_filename).await {
        return Err(fail(state, origin, AppError::NotFound).await);
    }
    let image = storage::read_image(&state.config.media_root, user_id, image_filename).await?;

    let creds = match platform_session::resolve_credentials(&state.vault, &user) {
        Some(creds) => creds,
        None => return Err(fail(state, origin, AppError::CredentialsMissing).await),
    };

    let saved = if prefer_saved {
        platform_session::load_artifact(&state.vault, &user)
    } else {
        None
    };

    let attempt = match publish_media(
        state.platform.as_ref(),
        &creds,
        saved.as_ref(),
        &image,
        caption,
    )
    .await
    {
        Ok(attempt) => attempt,
        Err(e) => return Err(fail(state, origin, e).await),
    };

    match attempt {
        PublishAttempt::Published {
            receipt,
            artifact,
            used_saved_session,
        } => {
            if used_saved_session {
                tracing::info!("Reused saved platform session for user {}", user_id);
            } else {
                platform_session::store_artifact(state, user_id, &artifact).await;
            }

            activity_repo::mark_posted(&state.db, user_id, image_filename, caption).await?;
            user_repo::clear_challenge_context(&state.db, user_id).await?;
            if let PublishOrigin::Scheduled(post_id) = origin {
                scheduled_repo::mark_completed(&state.db, &post_id).await?;
            }

            let url = receipt.public_url();
            tracing::info!("🚀 Published {} for user {}", image_filename, user_id);
            Ok(PublishReport {
                url,
                used_saved_session,
            })
        }

        PublishAttempt::ChallengeRaised(signal) => {
            platform_session::store_challenge(state, &user, &signal).await?;
            if let PublishOrigin::Scheduled(post_id) = origin {
                scheduled_repo::mark_otp_required(&state.db, &post_id, "OTP challenge required")
                    .await?;
            }
            Err(AppError::OtpRequired)
        }

        PublishAttempt::Rejected(reason) => {
            Err(fail(state, origin, AppError::AuthFailed(reason)).await)
        }
    }
}

/// Records a failure on the scheduled post row, then hands the error back.
async fn fail(state: &AppState, origin: PublishOrigin, err: AppError) -> AppError {
    if let PublishOrigin::Scheduled(post_id) = origin {
        if let Err(db_err) = scheduled_repo::mark_failed(&state.db, &post_id, &err.to_string()).await
        {
            tracing::error!(
                "Failed to record failure on scheduled post {}: {}",
                post_id,
                db_err
            );
        }
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockPublishClient;

    fn creds() -> PlatformCredentials {
        PlatformCredentials {
            username: "maria".to_string(),
            password: "hunter2".to_string(),
        }
    }

    fn challenge_signal() -> ChallengeSignal {
        ChallengeSignal {
            device_id: Some("android-0123456789abcdef".to_string()),
            install_id: None,
            context: r#"{"step":"verify_email"}"#.to_string(),
        }
    }

    #[tokio::test]
    async fn challenge_during_login_never_uploads() {
        let mock = MockPublishClient::new()
            .script_login(AuthOutcome::ChallengeRequired(challenge_signal()));

        let attempt = publish_media(&mock, &creds(), None, b"png", "caption")
            .await
            .unwrap();

        assert!(matches!(attempt, PublishAttempt::ChallengeRaised(_)));
        assert_eq!(mock.upload_count(), 0);
    }

    #[tokio::test]
    async fn saved_session_success_carries_the_upload() {
        let mock = MockPublishClient::new()
            .script_login(AuthOutcome::Authenticated(MockPublishClient::artifact("saved")));
        let saved = MockPublishClient::artifact("saved");

        let attempt = publish_media(&mock, &creds(), Some(&saved), b"png", "caption")
            .await
            .unwrap();

        match attempt {
            PublishAttempt::Published {
                used_saved_session, ..
            } => assert!(used_saved_session),
            other => panic!("expected Published, got {:?}", other),
        }
        let logins = mock.login_calls();
        assert_eq!(logins.len(), 1);
        assert!(logins[0].with_saved_session);
        assert_eq!(mock.upload_count(), 1);
    }

    #[tokio::test]
    async fn rejected_restore_falls_back_to_fresh_login() {
        let mock = MockPublishClient::new()
            .script_login(AuthOutcome::Failed("session expired".to_string()))
            .script_login(AuthOutcome::Authenticated(MockPublishClient::artifact("fresh")));
        let saved = MockPublishClient::artifact("stale");

        let attempt = publish_media(&mock, &creds(), Some(&saved), b"png", "caption")
            .await
            .unwrap();

        match attempt {
            PublishAttempt::Published {
                used_saved_session, ..
            } => assert!(!used_saved_session),
            other => panic!("expected Published, got {:?}", other),
        }
        let logins = mock.login_calls();
        assert_eq!(logins.len(), 2);
        assert!(logins[0].with_saved_session);
        assert!(!logins[1].with_saved_session);
        assert_eq!(mock.upload_count(), 1);
    }

    #[tokio::test]
    async fn challenge_after_fallback_still_blocks_the_upload() {
        let mock = MockPublishClient::new()
            .script_login(AuthOutcome::Failed("session expired".to_string()))
            .script_login(AuthOutcome::ChallengeRequired(challenge_signal()));
        let saved = MockPublishClient::artifact("stale");

        let attempt = publish_media(&mock, &creds(), Some(&saved), b"png", "caption")
            .await
            .unwrap();

        assert!(matches!(attempt, PublishAttempt::ChallengeRaised(_)));
        assert_eq!(mock.upload_count(), 0);
    }

    #[tokio::test]
    async fn fresh_rejection_is_reported_not_retried() {
        let mock = MockPublishClient::new()
            .script_login(AuthOutcome::Failed("bad password".to_string()));

        let attempt = publish_media(&mock, &creds(), None, b"png", "caption")
            .await
            .unwrap();

        match attempt {
            PublishAttempt::Rejected(reason) => assert_eq!(reason, "bad password"),
            other => panic!("expected Rejected, got {:?}", other),
        }
        assert_eq!(mock.login_calls().len(), 1);
        assert_eq!(mock.upload_count(), 0);
    }

    #[tokio::test]
    async fn upload_failure_propagates_as_error() {
        let mock = MockPublishClient::new()
            .script_upload(Err(AppError::Upstream("upload refused".to_string())));

        let result = publish_media(&mock, &creds(), None, b"png", "caption").await;

        assert!(matches!(result, Err(AppError::Upstream(_))));
        assert_eq!(mock.upload_count(), 1);
    }

    #[tokio::test]
    async fn upload_carries_the_given_caption_and_bytes() {
        let mock = MockPublishClient::new();

        publish_media(&mock, &creds(), None, b"png bytes here", "my caption #tag")
            .await
            .unwrap();

        let uploads = mock.upload_calls();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].caption, "my caption #tag");
        assert_eq!(uploads[0].image_len, b"png bytes here".len());
    }
}
