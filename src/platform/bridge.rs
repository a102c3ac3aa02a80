//! Client for the bridge sidecar that fronts the unofficial platform API.
//!
//! The bridge exposes three endpoints (`/login`, `/resume`, `/upload`) and
//! reports challenges with an explicit `"challenge_required"` status. Legacy
//! bridge builds only reveal a challenge inside the failure detail, so this
//! client also maps details matching a fixed keyword set. That mapping is
//! the only place in the crate where the keyword set exists; everything
//! downstream dispatches on [`AuthOutcome`] tags.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sonic_rs::JsonValueTrait;

use crate::error::{AppError, Result};
use crate::platform::client::{
    AuthOutcome, ChallengeSignal, PendingChallenge, PlatformCredentials, PublishClient,
    SessionArtifact, UploadReceipt,
};

const CHALLENGE_KEYWORDS: [&str; 4] = ["challenge", "otp", "verification", "2fa"];

/// Whether a login failure detail from a legacy bridge build is really a
/// verification challenge. Case-insensitive, fixed keyword set.
fn is_challenge_signal(detail: &str) -> bool {
    let lowered = detail.to_lowercase();
    CHALLENGE_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

fn context_to_string(value: &sonic_rs::Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        // Serialization is best-effort; degrade to a debug repr rather
        // than dropping the context.
        None => sonic_rs::to_string(value).unwrap_or_else(|_| format!("{:?}", value)),
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<&'a sonic_rs::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uuid: Option<&'a str>,
}

#[derive(Serialize)]
struct ResumeRequest<'a> {
    username: &'a str,
    password: &'a str,
    device_id: &'a str,
    uuid: &'a str,
    context: &'a str,
    code: &'a str,
}

#[derive(Serialize)]
struct UploadRequest<'a> {
    settings: &'a sonic_rs::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uuid: Option<&'a str>,
    caption: &'a str,
    image: String,
}

#[derive(Deserialize)]
struct BridgeAuthResponse {
    status: String,
    #[serde(default)]
    settings: Option<sonic_rs::Value>,
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    context: Option<sonic_rs::Value>,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Deserialize)]
struct BridgeUploadResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    media_code: Option<String>,
    #[serde(default)]
    media: Option<BridgeMedia>,
    #[serde(default)]
    detail: Option<String>,
}

/// Some bridge builds answer with the full media object instead of a bare
/// `media_code`. Both carry the content identifier under `code`.
#[derive(Deserialize)]
struct BridgeMedia {
    #[serde(default)]
    code: Option<String>,
}

fn map_auth_response(resp: BridgeAuthResponse) -> Result<AuthOutcome> {
    match resp.status.as_str() {
        "ok" => {
            let settings = resp.settings.ok_or_else(|| {
                AppError::Upstream("bridge reported ok without session settings".to_string())
            })?;
            Ok(AuthOutcome::Authenticated(SessionArtifact {
                settings,
                device_id: resp.device_id,
                install_id: resp.uuid,
            }))
        }
        "challenge_required" => {
            let context = match resp.context {
                Some(value) => context_to_string(&value),
                None => resp.detail.unwrap_or_else(|| "{}".to_string()),
            };
            Ok(AuthOutcome::ChallengeRequired(ChallengeSignal {
                device_id: resp.device_id,
                install_id: resp.uuid,
                context,
            }))
        }
        "failed" => {
            let detail = resp
                .detail
                .unwrap_or_else(|| "login rejected by the platform".to_string());
            if is_challenge_signal(&detail) {
                tracing::debug!("Mapping legacy bridge failure to a challenge: {}", detail);
                Ok(AuthOutcome::ChallengeRequired(ChallengeSignal {
                    device_id: resp.device_id,
                    install_id: resp.uuid,
                    context: detail,
                }))
            } else {
                Ok(AuthOutcome::Failed(detail))
            }
        }
        other => Err(AppError::Upstream(format!(
            "bridge answered with unknown status '{}'",
            other
        ))),
    }
}

/// Bridge-backed [`PublishClient`]. One HTTP round trip per operation; no
/// platform state is held between calls.
pub struct BridgeClient {
    http: reqwest::Client,
    base_url: String,
}

impl BridgeClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if text.is_empty() {
            return Err(AppError::Upstream(format!(
                "bridge answered {} with an empty body",
                status
            )));
        }
        Ok(text)
    }

    async fn auth_call<B: Serialize>(&self, path: &str, body: &B) -> Result<AuthOutcome> {
        let text = self.post_json(path, body).await?;
        let parsed: BridgeAuthResponse = sonic_rs::from_str(&text)
            .map_err(|e| AppError::Upstream(format!("undecodable bridge response: {}", e)))?;
        map_auth_response(parsed)
    }
}

#[async_trait]
impl PublishClient for BridgeClient {
    async fn login(
        &self,
        creds: &PlatformCredentials,
        saved: Option<&SessionArtifact>,
    ) -> Result<AuthOutcome> {
        let request = LoginRequest {
            username: &creds.username,
            password: &creds.password,
            settings: saved.map(|artifact| &artifact.settings),
            device_id: saved.and_then(|artifact| artifact.device_id.as_deref()),
            uuid: saved.and_then(|artifact| artifact.install_id.as_deref()),
        };
        self.auth_call("/login", &request).await
    }

    async fn resume_challenge(
        &self,
        creds: &PlatformCredentials,
        pending: &PendingChallenge,
        code: &str,
    ) -> Result<AuthOutcome> {
        let request = ResumeRequest {
            username: &creds.username,
            password: &creds.password,
            device_id: &pending.device_id,
            uuid: &pending.install_id,
            context: &pending.context,
            code,
        };
        self.auth_call("/resume", &request).await
    }

    async fn upload_photo(
        &self,
        artifact: &SessionArtifact,
        image: &[u8],
        caption: &str,
    ) -> Result<UploadReceipt> {
        let request = UploadRequest {
            settings: &artifact.settings,
            device_id: artifact.device_id.as_deref(),
            uuid: artifact.install_id.as_deref(),
            caption,
            image: BASE64.encode(image),
        };
        let text = self.post_json("/upload", &request).await?;
        let parsed: BridgeUploadResponse = sonic_rs::from_str(&text)
            .map_err(|e| AppError::Upstream(format!("undecodable bridge response: {}", e)))?;

        if parsed.status.as_deref() == Some("failed") {
            return Err(AppError::Upstream(
                parsed
                    .detail
                    .unwrap_or_else(|| "photo upload failed".to_string()),
            ));
        }

        let media_code = parsed
            .media_code
            .or_else(|| parsed.media.and_then(|media| media.code));
        Ok(UploadReceipt { media_code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve stub");
        });
        format!("http://{}", addr)
    }

    fn creds() -> PlatformCredentials {
        PlatformCredentials {
            username: "maria".to_string(),
            password: "hunter2".to_string(),
        }
    }

    #[test]
    fn challenge_keywords_match_case_insensitively() {
        assert!(is_challenge_signal("ChallengeRequired: please verify"));
        assert!(is_challenge_signal("OTP needed"));
        assert!(is_challenge_signal("account needs VERIFICATION"));
        assert!(is_challenge_signal("2FA enabled on this account"));
        assert!(!is_challenge_signal("bad password"));
        assert!(!is_challenge_signal("user not found"));
    }

    #[tokio::test]
    async fn login_maps_granted_session() {
        let app = Router::new().route(
            "/login",
            post(|| async {
                Json(sonic_rs::json!({
                    "status": "ok",
                    "settings": {"authorization": "Bearer IGT:2:abc"},
                    "device_id": "android-0123456789abcdef",
                    "uuid": "9f1c7ee2-9c7b-4dbb-ae22-7a1f0330cde1"
                }))
            }),
        );
        let base = spawn_stub(app).await;

        let outcome = BridgeClient::new(&base)
            .login(&creds(), None)
            .await
            .expect("login call");
        match outcome {
            AuthOutcome::Authenticated(artifact) => {
                assert_eq!(artifact.device_id.as_deref(), Some("android-0123456789abcdef"));
                assert!(sonic_rs::to_string(&artifact.settings)
                    .expect("settings json")
                    .contains("IGT:2:abc"));
            }
            other => panic!("expected Authenticated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn login_maps_challenge_status() {
        let app = Router::new().route(
            "/login",
            post(|| async {
                Json(sonic_rs::json!({
                    "status": "challenge_required",
                    "device_id": "android-feedfacefeedface",
                    "uuid": "5a1b2c3d-0000-4000-8000-123456789abc",
                    "context": {"step": "select_verify_method", "nonce": "xyz"}
                }))
            }),
        );
        let base = spawn_stub(app).await;

        let outcome = BridgeClient::new(&base)
            .login(&creds(), None)
            .await
            .expect("login call");
        match outcome {
            AuthOutcome::ChallengeRequired(signal) => {
                assert_eq!(signal.device_id.as_deref(), Some("android-feedfacefeedface"));
                assert!(signal.context.contains("select_verify_method"));
            }
            other => panic!("expected ChallengeRequired, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn login_maps_legacy_challenge_detail() {
        let app = Router::new().route(
            "/login",
            post(|| async {
                Json(sonic_rs::json!({
                    "status": "failed",
                    "detail": "challenge_required: verify it's you"
                }))
            }),
        );
        let base = spawn_stub(app).await;

        let outcome = BridgeClient::new(&base)
            .login(&creds(), None)
            .await
            .expect("login call");
        match outcome {
            AuthOutcome::ChallengeRequired(signal) => {
                assert_eq!(signal.device_id, None);
                assert_eq!(signal.context, "challenge_required: verify it's you");
            }
            other => panic!("expected ChallengeRequired, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn login_maps_plain_failure() {
        let app = Router::new().route(
            "/login",
            post(|| async {
                Json(sonic_rs::json!({
                    "status": "failed",
                    "detail": "The password you entered is incorrect."
                }))
            }),
        );
        let base = spawn_stub(app).await;

        let outcome = BridgeClient::new(&base)
            .login(&creds(), None)
            .await
            .expect("login call");
        match outcome {
            AuthOutcome::Failed(detail) => {
                assert!(detail.contains("incorrect"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn login_sends_saved_artifact_for_restore() {
        // The stub echoes the settings it received so the assertion can see
        // what was sent over the wire.
        let app = Router::new().route(
            "/login",
            post(|Json(body): Json<serde_json::Value>| async move {
                Json(sonic_rs::json!({
                    "status": "ok",
                    "settings": body["settings"],
                    "device_id": body["device_id"],
                    "uuid": body["uuid"]
                }))
            }),
        );
        let base = spawn_stub(app).await;

        let saved = SessionArtifact {
            settings: sonic_rs::json!({"authorization": "Bearer IGT:2:restored"}),
            device_id: Some("android-aaaabbbbccccdddd".to_string()),
            install_id: Some("11112222-3333-4444-8555-666677778888".to_string()),
        };
        let outcome = BridgeClient::new(&base)
            .login(&creds(), Some(&saved))
            .await
            .expect("login call");
        match outcome {
            AuthOutcome::Authenticated(artifact) => {
                assert_eq!(artifact.device_id, saved.device_id);
                assert_eq!(artifact.install_id, saved.install_id);
                assert!(sonic_rs::to_string(&artifact.settings)
                    .expect("settings json")
                    .contains("IGT:2:restored"));
            }
            other => panic!("expected Authenticated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn resume_challenge_success_returns_session() {
        let app = Router::new().route(
            "/resume",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["code"].as_str(), Some("123456"));
                Json(sonic_rs::json!({
                    "status": "ok",
                    "settings": {"authorization": "Bearer IGT:2:resumed"},
                    "device_id": body["device_id"],
                    "uuid": body["uuid"]
                }))
            }),
        );
        let base = spawn_stub(app).await;

        let pending = PendingChallenge {
            device_id: "android-0011223344556677".to_string(),
            install_id: "99990000-aaaa-4bbb-8ccc-ddddeeeeffff".to_string(),
            context: r#"{"step":"submit_code"}"#.to_string(),
        };
        let outcome = BridgeClient::new(&base)
            .resume_challenge(&creds(), &pending, "123456")
            .await
            .expect("resume call");
        assert!(matches!(outcome, AuthOutcome::Authenticated(_)));
    }

    #[tokio::test]
    async fn upload_decodes_top_level_media_code() {
        let app = Router::new().route(
            "/upload",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["caption"].as_str(), Some("golden hour"));
                assert!(body["image"].as_str().is_some_and(|s| !s.is_empty()));
                Json(sonic_rs::json!({"status": "ok", "media_code": "Cort123"}))
            }),
        );
        let base = spawn_stub(app).await;

        let artifact = SessionArtifact {
            settings: sonic_rs::json!({}),
            device_id: None,
            install_id: None,
        };
        let receipt = BridgeClient::new(&base)
            .upload_photo(&artifact, b"\x89PNG fake bytes", "golden hour")
            .await
            .expect("upload call");
        assert_eq!(receipt.media_code.as_deref(), Some("Cort123"));
        assert_eq!(receipt.public_url(), "https://www.instagram.com/p/Cort123/");
    }

    #[tokio::test]
    async fn upload_decodes_nested_media_object() {
        let app = Router::new().route(
            "/upload",
            post(|| async {
                Json(sonic_rs::json!({
                    "status": "ok",
                    "media": {"pk": 181818, "code": "Cnested9"}
                }))
            }),
        );
        let base = spawn_stub(app).await;

        let artifact = SessionArtifact {
            settings: sonic_rs::json!({}),
            device_id: None,
            install_id: None,
        };
        let receipt = BridgeClient::new(&base)
            .upload_photo(&artifact, b"bytes", "caption")
            .await
            .expect("upload call");
        assert_eq!(receipt.media_code.as_deref(), Some("Cnested9"));
    }

    #[tokio::test]
    async fn upload_without_code_is_not_an_error() {
        let app = Router::new().route(
            "/upload",
            post(|| async { Json(sonic_rs::json!({"status": "ok"})) }),
        );
        let base = spawn_stub(app).await;

        let artifact = SessionArtifact {
            settings: sonic_rs::json!({}),
            device_id: None,
            install_id: None,
        };
        let receipt = BridgeClient::new(&base)
            .upload_photo(&artifact, b"bytes", "caption")
            .await
            .expect("upload call");
        assert_eq!(receipt.media_code, None);
        assert_eq!(receipt.public_url(), "");
    }

    #[tokio::test]
    async fn upload_failure_maps_to_upstream_error() {
        let app = Router::new().route(
            "/upload",
            post(|| async {
                Json(sonic_rs::json!({"status": "failed", "detail": "feedback_required"}))
            }),
        );
        let base = spawn_stub(app).await;

        let artifact = SessionArtifact {
            settings: sonic_rs::json!({}),
            device_id: None,
            install_id: None,
        };
        let err = BridgeClient::new(&base)
            .upload_photo(&artifact, b"bytes", "caption")
            .await
            .expect_err("upload should fail");
        assert!(matches!(err, AppError::Upstream(ref detail) if detail.contains("feedback_required")));
    }
}
