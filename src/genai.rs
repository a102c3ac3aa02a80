use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

use crate::error::{AppError, Result};

/// Extracted result of one generation call: the first inline image part and
/// the concatenation of all text parts (absent when the model returned no
/// text at all).
#[derive(Debug)]
pub struct GeneratedContent {
    pub image: Vec<u8>,
    pub caption: Option<String>,
}

/// Deterministic caption used when the model produced an image but no text.
pub fn fallback_caption(prompt: &str) -> String {
    format!("✨ {} ✨\n#GeneratedImage #AIArt #CreativeAI", prompt)
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
struct InlineData {
    data: String,
}

/// Thin client for the hosted generative REST API.
pub struct GenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GenAiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    /// Requests TEXT+IMAGE content for the prompt and extracts the parts.
    /// A response without an image part is an upstream failure; a response
    /// without text is fine, the caller decides the fallback.
    pub async fn generate(&self, prompt: &str) -> Result<GeneratedContent> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = sonic_rs::json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {"responseModalities": ["TEXT", "IMAGE"]}
        });

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::error!("Generative API answered {}: {}", status, text);
            return Err(AppError::Upstream(format!(
                "generative API answered {}",
                status
            )));
        }

        let parsed: GenerateResponse = sonic_rs::from_str(&text).map_err(|e| {
            AppError::Upstream(format!("undecodable generative API response: {}", e))
        })?;

        let mut text_parts: Vec<String> = Vec::new();
        let mut image_data: Option<Vec<u8>> = None;
        let parts = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts)
            .unwrap_or_default();
        for part in parts {
            if let Some(text) = part.text {
                if !text.is_empty() {
                    text_parts.push(text.trim().to_string());
                }
            } else if let Some(inline) = part.inline_data {
                if image_data.is_none() {
                    let decoded = BASE64.decode(inline.data.as_bytes()).map_err(|e| {
                        AppError::Upstream(format!("generative API sent invalid image data: {}", e))
                    })?;
                    image_data = Some(decoded);
                }
            }
        }

        let image = image_data
            .ok_or_else(|| AppError::Upstream("Image generation failed".to_string()))?;
        let caption = if text_parts.is_empty() {
            None
        } else {
            Some(text_parts.join("\n"))
        };

        Ok(GeneratedContent { image, caption })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, RawQuery};
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

    #[tokio::test]
    async fn generate_extracts_image_and_joined_caption() {
        let image_b64 = BASE64.encode(b"fake png bytes");
        let app = Router::new().route(
            "/v1beta/models/{model_action}",
            post(
                move |Path(model_action): Path<String>,
                      RawQuery(query): RawQuery,
                      Json(body): Json<serde_json::Value>| async move {
                    assert_eq!(model_action, "test-model:generateContent");
                    assert!(query.unwrap_or_default().contains("key=test-key"));
                    assert!(sonic_rs::to_string(&body)
                        .expect("body json")
                        .contains("IMAGE"));
                    Json(sonic_rs::json!({
                        "candidates": [{
                            "content": {
                                "parts": [
                                    {"text": "  Golden hour over the bay.  "},
                                    {"inlineData": {"mimeType": "image/png", "data": image_b64}},
                                    {"text": "#sunset #bay #goldenhour"}
                                ]
                            }
                        }]
                    }))
                },
            ),
        );
        let base = spawn_stub(app).await;

        let content = GenAiClient::new(&base, "test-key", "test-model")
            .generate("a sunset")
            .await
            .expect("generate call");
        assert_eq!(content.image, b"fake png bytes");
        assert_eq!(
            content.caption.as_deref(),
            Some("Golden hour over the bay.\n#sunset #bay #goldenhour")
        );
    }

    #[tokio::test]
    async fn generate_takes_first_image_part_only() {
        let first = BASE64.encode(b"first image");
        let second = BASE64.encode(b"second image");
        let app = Router::new().route(
            "/v1beta/models/{model_action}",
            post(move || async move {
                Json(sonic_rs::json!({
                    "candidates": [{
                        "content": {
                            "parts": [
                                {"inlineData": {"data": first}},
                                {"inlineData": {"data": second}}
                            ]
                        }
                    }]
                }))
            }),
        );
        let base = spawn_stub(app).await;

        let content = GenAiClient::new(&base, "k", "m")
            .generate("prompt")
            .await
            .expect("generate call");
        assert_eq!(content.image, b"first image");
        assert_eq!(content.caption, None);
    }

    #[tokio::test]
    async fn generate_without_image_is_an_upstream_error() {
        let app = Router::new().route(
            "/v1beta/models/{model_action}",
            post(|| async {
                Json(sonic_rs::json!({
                    "candidates": [{
                        "content": {"parts": [{"text": "words but no picture"}]}
                    }]
                }))
            }),
        );
        let base = spawn_stub(app).await;

        let err = GenAiClient::new(&base, "k", "m")
            .generate("prompt")
            .await
            .expect_err("generate should fail");
        assert!(matches!(err, AppError::Upstream(ref msg) if msg.contains("Image generation failed")));
    }

    #[tokio::test]
    async fn generate_surfaces_upstream_http_failures() {
        let app = Router::new().route(
            "/v1beta/models/{model_action}",
            post(|| async {
                (
                    axum::http::StatusCode::TOO_MANY_REQUESTS,
                    Json(sonic_rs::json!({"error": {"message": "quota exceeded"}})),
                )
            }),
        );
        let base = spawn_stub(app).await;

        let err = GenAiClient::new(&base, "k", "m")
            .generate("prompt")
            .await
            .expect_err("generate should fail");
        assert!(matches!(err, AppError::Upstream(ref msg) if msg.contains("429")));
    }

    #[test]
    fn fallback_caption_wraps_the_prompt() {
        let caption = fallback_caption("a red fox");
        assert_eq!(caption, "✨ a red fox ✨\n#GeneratedImage #AIArt #CreativeAI");
    }
}
