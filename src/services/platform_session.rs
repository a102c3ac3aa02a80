//! Vaulted persistence of platform sessions and pending challenges.
//!
//! The users table only ever holds vault tokens for secrets. This module is
//! the boundary where tokens become plaintext credentials, session artifacts
//! or challenge state, and where fresh ones get wrapped before storage.
//! Reads degrade to `None` on unreadable tokens so a rotated master key
//! downgrades users to a fresh login instead of locking them out.

use uuid::Uuid;

use crate::crypto::vault::Vault;
use crate::error::{AppError, Result};
use crate::models::user::User;
use crate::platform::client::{
    self, ChallengeSignal, PendingChallenge, PlatformCredentials, SessionArtifact,
};
use crate::repositories::user as user_repo;
use crate::state::AppState;

/// Resolves the user's publishing credentials through the vault.
///
/// `None` when no credentials are stored or the stored token is unreadable.
pub fn resolve_credentials(vault: &Vault, user: &User) -> Option<PlatformCredentials> {
    let username = user.insta_username.as_deref()?.trim();
    if username.is_empty() {
        return None;
    }
    let token = user.insta_password.as_deref()?;
    let password = match vault.decrypt(token) {
        Ok(password) => password,
        Err(e) => {
            tracing::warn!(
                "Stored platform password unreadable for user {}: {}",
                user.id,
                e
            );
            return None;
        }
    };
    Some(PlatformCredentials {
        username: username.to_string(),
        password,
    })
}

/// Rehydrates the saved session artifact, if the user has a readable one.
pub fn load_artifact(vault: &Vault, user: &User) -> Option<SessionArtifact> {
    let token = user.ig_session_settings.as_deref()?;
    let raw = match vault.decrypt(token) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("Failed to decrypt saved session for user {}: {}", user.id, e);
            return None;
        }
    };
    let settings: sonic_rs::Value = match sonic_rs::from_str(&raw) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Saved session for user {} is corrupted: {}", user.id, e);
            return None;
        }
    };
    Some(SessionArtifact {
        settings,
        device_id: user.ig_device_id.clone(),
        install_id: user.ig_guid.clone(),
    })
}

/// Wraps and stores a freshly granted session artifact.
///
/// Best effort, mirrors the degrade-on-read behavior: a failure here costs
/// the user one extra login later, so it is logged and swallowed rather
/// than failing the publish that produced the artifact.
pub async fn store_artifact(state: &AppState, user_id: &Uuid, artifact: &SessionArtifact) {
    let outcome = async {
        let raw = sonic_rs::to_string(&artifact.settings)
            .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))?;
        let token = state.vault.encrypt(&raw)?;
        user_repo::save_session_artifact(
            &state.db,
            user_id,
            &token,
            artifact.device_id.as_deref(),
            artifact.install_id.as_deref(),
        )
        .await
    }
    .await;

    match outcome {
        Ok(()) => tracing::info!("💾 Saved platform session for user {}", user_id),
        Err(e) => tracing::error!("Failed to save platform session for user {}: {}", user_id, e),
    }
}

/// Persists a challenge raised by the platform and returns the pending
/// state a later resume needs.
///
/// The identity the challenge is bound to is taken from the signal when the
/// bridge reports it, otherwise from the user's stored identifiers, and is
/// generated fresh as a last resort. Overwrites any earlier pending
/// challenge for the user.
pub async fn store_challenge(
    state: &AppState,
    user: &User,
    signal: &ChallengeSignal,
) -> Result<PendingChallenge> {
    let device_id = signal
        .device_id
        .clone()
        .or_else(|| user.ig_device_id.clone())
        .unwrap_or_else(client::generate_device_id);
    let install_id = signal
        .install_id
        .clone()
        .or_else(|| user.ig_guid.clone())
        .unwrap_or_else(client::generate_install_id);

    let context_token = state.vault.encrypt(&signal.context)?;
    user_repo::persist_challenge(&state.db, &user.id, &device_id, &install_id, &context_token)
        .await?;
    tracing::info!("📲 Challenge context saved for user {}", user.id);

    Ok(PendingChallenge {
        device_id,
        install_id,
        context: signal.context.clone(),
    })
}

/// Loads the pending challenge for a resume attempt.
///
/// `None` when there is nothing pending or the stored context is
/// unreadable. Missing identifiers are regenerated, matching what the
/// login path would have bound the challenge to.
pub fn load_challenge(vault: &Vault, user: &User) -> Option<PendingChallenge> {
    let token = user.ig_challenge_context.as_deref()?;
    let context = match vault.decrypt(token) {
        Ok(context) => context,
        Err(e) => {
            tracing::warn!(
                "Stored challenge context unreadable for user {}: {}",
                user.id,
                e
            );
            return None;
        }
    };
    Some(PendingChallenge {
        device_id: user
            .ig_device_id
            .clone()
            .unwrap_or_else(client::generate_device_id),
        install_id: user
            .ig_guid
            .clone()
            .unwrap_or_else(client::generate_install_id),
        context,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sonic_rs::JsonValueTrait;

    fn test_vault() -> Vault {
        Vault::new(&[7u8; 32]).unwrap()
    }

    fn bare_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "maria".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            points_used: 0,
            total_points: 15,
            is_premium: false,
            referral_code: "ABCD1234".to_string(),
            referred_by: None,
            referrals_count: 0,
            insta_username: None,
            insta_password: None,
            ig_device_id: None,
            ig_guid: None,
            ig_challenge_context: None,
            ig_session_settings: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn credentials_resolve_through_the_vault() {
        let vault = test_vault();
        let mut user = bare_user();
        user.insta_username = Some("maria".to_string());
        user.insta_password = Some(vault.encrypt("hunter2").unwrap());

        let creds = resolve_credentials(&vault, &user).unwrap();
        assert_eq!(creds.username, "maria");
        assert_eq!(creds.password, "hunter2");
    }

    #[test]
    fn missing_or_blank_credentials_resolve_to_none() {
        let vault = test_vault();
        let user = bare_user();
        assert!(resolve_credentials(&vault, &user).is_none());

        let mut blank = bare_user();
        blank.insta_username = Some("   ".to_string());
        blank.insta_password = Some(vault.encrypt("x").unwrap());
        assert!(resolve_credentials(&vault, &blank).is_none());
    }

    #[test]
    fn unreadable_password_token_degrades_to_none() {
        let vault = test_vault();
        let other_vault = Vault::new(&[9u8; 32]).unwrap();
        let mut user = bare_user();
        user.insta_username = Some("maria".to_string());
        user.insta_password = Some(other_vault.encrypt("hunter2").unwrap());

        assert!(resolve_credentials(&vault, &user).is_none());
    }

    #[test]
    fn session_artifact_round_trips_with_stored_identity() {
        let vault = test_vault();
        let mut user = bare_user();
        let settings = r#"{"authorization":"Bearer IGT:2:abc"}"#;
        user.ig_session_settings = Some(vault.encrypt(settings).unwrap());
        user.ig_device_id = Some("android-0123456789abcdef".to_string());
        user.ig_guid = Some("guid-1".to_string());

        let artifact = load_artifact(&vault, &user).unwrap();
        assert_eq!(artifact.settings["authorization"].as_str(), Some("Bearer IGT:2:abc"));
        assert_eq!(artifact.device_id.as_deref(), Some("android-0123456789abcdef"));
        assert_eq!(artifact.install_id.as_deref(), Some("guid-1"));
    }

    #[test]
    fn corrupted_session_settings_degrade_to_none() {
        let vault = test_vault();
        let mut user = bare_user();
        user.ig_session_settings = Some(vault.encrypt("not json at all {{{").unwrap());
        assert!(load_artifact(&vault, &user).is_none());
    }

    #[test]
    fn pending_challenge_fills_missing_identity() {
        let vault = test_vault();
        let mut user = bare_user();
        user.ig_challenge_context = Some(vault.encrypt(r#"{"step":"verify"}"#).unwrap());

        let pending = load_challenge(&vault, &user).unwrap();
        assert_eq!(pending.context, r#"{"step":"verify"}"#);
        assert!(pending.device_id.starts_with("android-"));
        assert!(Uuid::parse_str(&pending.install_id).is_ok());
    }

    #[test]
    fn no_stored_context_means_no_pending_challenge() {
        let vault = test_vault();
        let user = bare_user();
        assert!(load_challenge(&vault, &user).is_none());
    }
}
