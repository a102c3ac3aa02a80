use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Plaintext platform credentials, already resolved through the vault.
#[derive(Clone)]
pub struct PlatformCredentials {
    /// The platform account username.
    pub username: String,
    /// The platform account password.
    pub password: String,
}

impl fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Serialized authentication state that lets a later operation skip a fresh
/// login. The platform binds session validity to the pairing of settings and
/// device/installation identifiers, so the three travel together and the
/// identifiers must be reused verbatim on restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionArtifact {
    /// Opaque serialized client settings.
    pub settings: sonic_rs::Value,
    /// Device identifier the session was established under.
    pub device_id: Option<String>,
    /// Installation identifier the session was established under.
    pub install_id: Option<String>,
}

/// Challenge details reported by an authentication attempt. The identifiers
/// are those the attempt ran under when the bridge reports them; the caller
/// fills any gaps before persisting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeSignal {
    /// Device identifier of the challenged attempt, if known.
    pub device_id: Option<String>,
    /// Installation identifier of the challenged attempt, if known.
    pub install_id: Option<String>,
    /// Opaque challenge context, serialized.
    pub context: String,
}

/// Persisted challenge state, rehydrated for a resume attempt.
#[derive(Debug, Clone)]
pub struct PendingChallenge {
    /// Device identifier the challenge was raised under.
    pub device_id: String,
    /// Installation identifier the challenge was raised under.
    pub install_id: String,
    /// Opaque challenge context, as persisted.
    pub context: String,
}

/// Typed outcome of an authentication attempt.
#[derive(Debug)]
pub enum AuthOutcome {
    /// The platform granted a session.
    Authenticated(SessionArtifact),
    /// The platform wants a one-time code before granting a session.
    ChallengeRequired(ChallengeSignal),
    /// The platform rejected the login.
    Failed(String),
}

/// Result of a photo upload. The content identifier is optional because
/// some bridge builds answer with a bare map that lacks one.
#[derive(Debug, Clone, Default)]
pub struct UploadReceipt {
    /// Platform-assigned content identifier, if one was produced.
    pub media_code: Option<String>,
}

impl UploadReceipt {
    /// Best-effort public URL for the uploaded post, empty when no content
    /// identifier was produced.
    pub fn public_url(&self) -> String {
        match &self.media_code {
            Some(code) => format!("https://www.instagram.com/p/{code}/"),
            None => String::new(),
        }
    }
}

/// Capability surface of the publishing platform. One call per operation;
/// no client state outlives a single call.
#[async_trait]
pub trait PublishClient: Send + Sync {
    /// Authenticates, restoring `saved` session state when given. Transport
    /// failures are `Err`; platform-level rejections come back as
    /// [`AuthOutcome::Failed`].
    async fn login(
        &self,
        creds: &PlatformCredentials,
        saved: Option<&SessionArtifact>,
    ) -> Result<AuthOutcome>;

    /// Resumes a pending challenge with the user-supplied one-time code.
    async fn resume_challenge(
        &self,
        creds: &PlatformCredentials,
        pending: &PendingChallenge,
        code: &str,
    ) -> Result<AuthOutcome>;

    /// Uploads a photo with its caption through an authenticated session.
    async fn upload_photo(
        &self,
        artifact: &SessionArtifact,
        image: &[u8],
        caption: &str,
    ) -> Result<UploadReceipt>;
}

/// Generates a device identifier in the platform's android form.
pub fn generate_device_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("android-{}", &hex[..16])
}

/// Generates a fresh installation identifier.
pub fn generate_install_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_has_android_shape() {
        let id = generate_device_id();
        let hex = id.strip_prefix("android-").unwrap();
        assert_eq!(hex.len(), 16);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn device_ids_are_unique() {
        assert_ne!(generate_device_id(), generate_device_id());
    }

    #[test]
    fn install_id_is_a_uuid() {
        let id = generate_install_id();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn public_url_from_media_code() {
        let receipt = UploadReceipt { media_code: Some("Cxyz123".to_string()) };
        assert_eq!(receipt.public_url(), "https://www.instagram.com/p/Cxyz123/");
    }

    #[test]
    fn public_url_without_media_code_is_empty() {
        assert_eq!(UploadReceipt::default().public_url(), "");
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = PlatformCredentials {
            username: "maria".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("maria"));
        assert!(!debug.contains("hunter2"));
    }
}
