//! Scripted in-memory platform client for tests.
//!
//! Each call pops the next scripted outcome; an empty script answers with a
//! plain success. Calls are recorded so tests can assert on what reached
//! the platform (and, just as important, what never did).

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::platform::client::{
    AuthOutcome, PendingChallenge, PlatformCredentials, PublishClient, SessionArtifact,
    UploadReceipt,
};

/// One recorded `login` call.
#[derive(Debug, Clone)]
pub struct LoginCall {
    pub username: String,
    pub with_saved_session: bool,
}

/// One recorded `resume_challenge` call.
#[derive(Debug, Clone)]
pub struct ResumeCall {
    pub device_id: String,
    pub code: String,
}

/// One recorded `upload_photo` call.
#[derive(Debug, Clone)]
pub struct UploadCall {
    pub caption: String,
    pub image_len: usize,
}

#[derive(Default)]
pub struct MockPublishClient {
    login_script: Mutex<VecDeque<AuthOutcome>>,
    resume_script: Mutex<VecDeque<AuthOutcome>>,
    upload_script: Mutex<VecDeque<Result<UploadReceipt>>>,
    login_calls: Mutex<Vec<LoginCall>>,
    resume_calls: Mutex<Vec<ResumeCall>>,
    upload_calls: Mutex<Vec<UploadCall>>,
}

impl MockPublishClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A plausible artifact for scripting successful logins.
    pub fn artifact(tag: &str) -> SessionArtifact {
        SessionArtifact {
            settings: sonic_rs::json!({"authorization": format!("Bearer IGT:2:{tag}")}),
            device_id: Some("android-0123456789abcdef".to_string()),
            install_id: Some("9f1c7ee2-9c7b-4dbb-ae22-7a1f0330cde1".to_string()),
        }
    }

    pub fn script_login(self, outcome: AuthOutcome) -> Self {
        self.login_script.lock().unwrap().push_back(outcome);
        self
    }

    pub fn script_resume(self, outcome: AuthOutcome) -> Self {
        self.resume_script.lock().unwrap().push_back(outcome);
        self
    }

    pub fn script_upload(self, result: Result<UploadReceipt>) -> Self {
        self.upload_script.lock().unwrap().push_back(result);
        self
    }

    pub fn login_calls(&self) -> Vec<LoginCall> {
        self.login_calls.lock().unwrap().clone()
    }

    pub fn resume_calls(&self) -> Vec<ResumeCall> {
        self.resume_calls.lock().unwrap().clone()
    }

    pub fn upload_calls(&self) -> Vec<UploadCall> {
        self.upload_calls.lock().unwrap().clone()
    }

    pub fn upload_count(&self) -> usize {
        self.upload_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PublishClient for MockPublishClient {
    async fn login(
        &self,
        creds: &PlatformCredentials,
        saved: Option<&SessionArtifact>,
    ) -> Result<AuthOutcome> {
        self.login_calls.lock().unwrap().push(LoginCall {
            username: creds.username.clone(),
            with_saved_session: saved.is_some(),
        });
        let scripted = self.login_script.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| AuthOutcome::Authenticated(Self::artifact("fresh"))))
    }

    async fn resume_challenge(
        &self,
        _creds: &PlatformCredentials,
        pending: &PendingChallenge,
        code: &str,
    ) -> Result<AuthOutcome> {
        self.resume_calls.lock().unwrap().push(ResumeCall {
            device_id: pending.device_id.clone(),
            code: code.to_string(),
        });
        let scripted = self.resume_script.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| AuthOutcome::Authenticated(Self::artifact("resumed"))))
    }

    async fn upload_photo(
        &self,
        _artifact: &SessionArtifact,
        image: &[u8],
        caption: &str,
    ) -> Result<UploadReceipt> {
        self.upload_calls.lock().unwrap().push(UploadCall {
            caption: caption.to_string(),
            image_len: image.len(),
        });
        let scripted = self.upload_script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(UploadReceipt {
                media_code: Some("MOCK123".to_string()),
            })
        })
    }
}
