//! OpenAI image-generation client for featured images.
//!
//! Returns a URL rather than bytes: downloading and re-uploading the image is
//! the publish gateway's concern.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use blogmate_shared::http::{build_client, upstream_message};
use blogmate_shared::{AppConfig, BlogMateError, HttpConfig, OpenAiConfig, Result, resolve_secret};

use crate::ImageProvider;

const PROVIDER: &str = "openai";

const GENERIC_FAILURE: &str = "Image generation failed.";

const IMAGE_SIZE: &str = "1024x1024";
const IMAGE_QUALITY: &str = "standard";

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    quality: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    #[serde(default)]
    url: Option<String>,
}

/// Fixed-style prompt wrapping the post title.
pub fn image_prompt(title: &str) -> String {
    format!(
        "Create a professional, high-quality image for a tech blog post titled \"{}\". \
         The image should be visually appealing, modern, and suitable for a professional technology blog.",
        title.trim()
    )
}

/// [`ImageProvider`] backed by the OpenAI images API (bearer auth).
pub struct OpenAiImageProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiImageProvider {
    /// Create a provider with an explicit API key.
    pub fn new(config: &OpenAiConfig, http: &HttpConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(http, http.generation_timeout_secs)?,
            api_key: api_key.into(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a provider, reading the API key from the configured env var.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = resolve_secret(&config.openai.api_key_env)?;
        Self::new(&config.openai, &config.http, api_key)
    }
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    #[instrument(skip_all, fields(title = %title))]
    async fn generate_image(&self, title: &str) -> Result<String> {
        if self.api_key.trim().is_empty() {
            return Err(BlogMateError::config(
                "OpenAI API key is missing. Set it in the environment before generating images.",
            ));
        }

        let prompt = image_prompt(title);
        let request = ImageRequest {
            model: &self.model,
            prompt: &prompt,
            n: 1,
            size: IMAGE_SIZE,
            quality: IMAGE_QUALITY,
            response_format: "url",
        };

        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| BlogMateError::Network(format!("openai: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BlogMateError::Network(format!("openai: {e}")))?;

        if !status.is_success() {
            let message = upstream_message(&body).unwrap_or_else(|| GENERIC_FAILURE.to_string());
            warn!(%status, %message, "image generation rejected");
            return Err(BlogMateError::provider(PROVIDER, message));
        }

        let parsed: ImageResponse = serde_json::from_str(&body)
            .map_err(|e| BlogMateError::provider(PROVIDER, format!("malformed response: {e}")))?;

        let url = parsed
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| BlogMateError::provider(PROVIDER, "image URL missing from response"))?;

        info!(model = %self.model, "image generated");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, key: &str) -> OpenAiImageProvider {
        let config = OpenAiConfig {
            base_url: server.uri(),
            ..OpenAiConfig::default()
        };
        OpenAiImageProvider::new(&config, &HttpConfig::default(), key).unwrap()
    }

    #[test]
    fn prompt_wraps_title() {
        let prompt = image_prompt("  Intro to Caching ");
        assert!(prompt.contains("titled \"Intro to Caching\""));
        assert!(prompt.contains("professional technology blog"));
    }

    #[tokio::test]
    async fn requests_one_square_url_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_json(serde_json::json!({
                "model": "dall-e-3",
                "prompt": image_prompt("Intro to Caching"),
                "n": 1,
                "size": "1024x1024",
                "quality": "standard",
                "response_format": "url"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "created": 1_700_000_000,
                "data": [{ "url": "https://images.example.com/abc.png", "revised_prompt": "..." }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = provider(&server, "sk-test")
            .generate_image("Intro to Caching")
            .await
            .unwrap();
        assert_eq!(url, "https://images.example.com/abc.png");
    }

    #[tokio::test]
    async fn missing_url_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "data": [{ "b64_json": "AAAA" }] })),
            )
            .mount(&server)
            .await;

        let err = provider(&server, "sk-test")
            .generate_image("T")
            .await
            .unwrap_err();
        match err {
            BlogMateError::Provider { provider, message } => {
                assert_eq!(provider, "openai");
                assert!(message.contains("URL missing"));
            }
            other => panic!("expected Provider, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejection_surfaces_upstream_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": { "message": "Your request was rejected by the safety system.", "type": "invalid_request_error" }
            })))
            .mount(&server)
            .await;

        let err = provider(&server, "sk-test")
            .generate_image("T")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "openai error: Your request was rejected by the safety system."
        );
    }

    #[tokio::test]
    async fn fallback_message_for_opaque_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = provider(&server, "sk-test")
            .generate_image("T")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "openai error: Image generation failed.");
    }

    #[tokio::test]
    async fn missing_key_is_checked_locally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = provider(&server, " ").generate_image("T").await.unwrap_err();
        assert!(matches!(err, BlogMateError::Config { .. }));
    }
}
