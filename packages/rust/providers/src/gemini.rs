//! Gemini `generateContent` client for HTML post bodies.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use blogmate_shared::http::{build_client, upstream_message};
use blogmate_shared::{AppConfig, BlogMateError, GeminiConfig, HttpConfig, Result, resolve_secret};

use crate::{ContentProvider, TitleRequest, non_blank};

const PROVIDER: &str = "gemini";

/// Fallback when the upstream error body carries no message.
const GENERIC_FAILURE: &str = "Failed to generate content";

/// Formatting instruction shared by both prompts.
const HTML_FORMAT: &str = "appropriate HTML tags (h2, h3, p, ul, li)";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

impl GenerateContentResponse {
    /// `candidates[0].content.parts[0].text`, if present.
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// Instruction for the by-title flow.
pub fn title_prompt(request: &TitleRequest) -> String {
    let mut prompt = format!(
        "Generate a {} blog post titled \"{}\"",
        request.blog_type,
        request.title.trim()
    );

    if let Some(outline) = non_blank(request.outline.as_deref()) {
        prompt.push_str(&format!(" using the following outline or notes: {outline}"));
    }

    if let Some(keywords) = non_blank(request.keywords.as_deref()) {
        prompt.push_str(&format!(" and targeting these keywords: {keywords}"));
    }

    prompt.push_str(&format!(
        ". Write in a professional but engaging tone. Format the content with {HTML_FORMAT} for a WordPress blog."
    ));
    prompt
}

/// Instruction for the by-URL flow.
pub fn source_prompt(source_url: &str, title: &str, source_text: Option<&str>) -> String {
    let source = non_blank(source_text).unwrap_or("No content available");
    format!(
        "Create a completely original blog post titled \"{title}\" based on this content from {source_url}:\n\n\
         {source}\n\n\
         Requirements:\n\
         1. Write in a professional but engaging tone\n\
         2. Structure the content well with headings and paragraphs\n\
         3. Format with {HTML_FORMAT} for WordPress\n\
         4. Make it informative and accurate\n\
         5. Ensure it's completely original to avoid plagiarism\n\
         6. Include relevant examples and explanations\n\
         7. Add a strong conclusion",
        title = title.trim(),
    )
}

/// Remove a surrounding Markdown code fence (```html ... ```), which models
/// sometimes add around HTML output.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening fence line.
    match body.split_once('\n') {
        Some((_lang, html)) => html.trim(),
        None => body.trim(),
    }
}

// ---------------------------------------------------------------------------
// GeminiProvider
// ---------------------------------------------------------------------------

/// [`ContentProvider`] backed by the Gemini REST API (query-string key auth).
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    /// Create a provider with an explicit API key.
    pub fn new(config: &GeminiConfig, http: &HttpConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(http, http.generation_timeout_secs)?,
            api_key: api_key.into(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a provider, reading the API key from the configured env var.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = resolve_secret(&config.gemini.api_key_env)?;
        Self::new(&config.gemini, &config.http, api_key)
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Send one prompt and return the generated HTML.
    async fn generate(&self, prompt: String) -> Result<String> {
        if self.api_key.trim().is_empty() {
            return Err(BlogMateError::config(
                "Gemini API key is missing. Set it in the environment before generating content.",
            ));
        }

        debug!(model = %self.model, prompt_chars = prompt.len(), "requesting content");

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: Some(prompt) }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            // Strip the URL: it carries the API key.
            .map_err(|e| BlogMateError::Network(format!("gemini: {}", e.without_url())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BlogMateError::Network(format!("gemini: {}", e.without_url())))?;

        if !status.is_success() {
            let message = upstream_message(&body).unwrap_or_else(|| GENERIC_FAILURE.to_string());
            warn!(%status, %message, "content generation rejected");
            return Err(BlogMateError::provider(PROVIDER, message));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            BlogMateError::provider(PROVIDER, format!("malformed response: {e}"))
        })?;

        let text = parsed.into_text().unwrap_or_default();
        let html = strip_code_fence(&text);
        if html.is_empty() {
            return Err(BlogMateError::provider(
                PROVIDER,
                "response did not contain any generated text",
            ));
        }

        info!(html_chars = html.len(), "content generated");
        Ok(html.to_string())
    }
}

#[async_trait]
impl ContentProvider for GeminiProvider {
    #[instrument(skip_all, fields(title = %request.title, blog_type = %request.blog_type))]
    async fn generate_from_title(&self, request: &TitleRequest) -> Result<String> {
        self.generate(title_prompt(request)).await
    }

    #[instrument(skip_all, fields(source_url = %source_url, title = %title))]
    async fn generate_from_source(
        &self,
        source_url: &str,
        title: &str,
        source_text: Option<&str>,
    ) -> Result<String> {
        self.generate(source_prompt(source_url, title, source_text))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blogmate_shared::BlogType;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, key: &str) -> GeminiProvider {
        let config = GeminiConfig {
            base_url: server.uri(),
            ..GeminiConfig::default()
        };
        GeminiProvider::new(&config, &HttpConfig::default(), key).unwrap()
    }

    fn text_response(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }]
        })
    }

    #[test]
    fn title_prompt_without_extras() {
        let request = TitleRequest::new("Intro to Caching", BlogType::InformativeArticle);
        let prompt = title_prompt(&request);
        assert!(prompt.starts_with(
            "Generate a Informative Article blog post titled \"Intro to Caching\". "
        ));
        assert!(!prompt.contains("outline"));
        assert!(!prompt.contains("keywords"));
        assert!(prompt.contains("h2, h3, p, ul, li"));
    }

    #[test]
    fn title_prompt_appends_non_blank_extras() {
        let request = TitleRequest::new("Intro to Caching", BlogType::Listicle)
            .with_outline("LRU, TTL")
            .with_keywords("cache, redis");
        let prompt = title_prompt(&request);
        assert!(prompt.contains("using the following outline or notes: LRU, TTL"));
        assert!(prompt.contains("and targeting these keywords: cache, redis"));

        let blank = TitleRequest::new("X", BlogType::Listicle)
            .with_outline("   ")
            .with_keywords("");
        let prompt = title_prompt(&blank);
        assert!(!prompt.contains("outline"));
        assert!(!prompt.contains("keywords"));
    }

    #[test]
    fn source_prompt_falls_back_without_text() {
        let prompt = source_prompt("https://example.com/a", "Title", None);
        assert!(prompt.contains("from https://example.com/a"));
        assert!(prompt.contains("No content available"));

        let prompt = source_prompt("https://example.com/a", "Title", Some("Scraped body"));
        assert!(prompt.contains("Scraped body"));
        assert!(!prompt.contains("No content available"));
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fence("```html\n<h2>Hi</h2>\n```"), "<h2>Hi</h2>");
        assert_eq!(strip_code_fence("  <p>plain</p> "), "<p>plain</p>");
        assert_eq!(strip_code_fence("```<p>x</p>```"), "<p>x</p>");
    }

    #[test]
    fn response_text_extraction() {
        let parsed: GenerateContentResponse =
            serde_json::from_value(text_response("<p>ok</p>")).unwrap();
        assert_eq!(parsed.into_text().as_deref(), Some("<p>ok</p>"));

        let parsed: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert_eq!(parsed.into_text(), None);
    }

    #[tokio::test]
    async fn generates_from_title() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{ "parts": [{ "text": title_prompt(
                    &TitleRequest::new("Intro to Caching", BlogType::InformativeArticle)
                ) }] }]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(text_response("<h2>Caching</h2>")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let html = provider(&server, "test-key")
            .generate_from_title(&TitleRequest::new(
                "Intro to Caching",
                BlogType::InformativeArticle,
            ))
            .await
            .unwrap();
        assert_eq!(html, "<h2>Caching</h2>");
    }

    #[tokio::test]
    async fn upstream_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": { "code": 400, "message": "API key not valid. Please pass a valid API key." }
            })))
            .mount(&server)
            .await;

        let err = provider(&server, "bad-key")
            .generate_from_source("https://example.com", "T", None)
            .await
            .unwrap_err();
        match err {
            BlogMateError::Provider { provider, message } => {
                assert_eq!(provider, "gemini");
                assert_eq!(message, "API key not valid. Please pass a valid API key.");
            }
            other => panic!("expected Provider, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn generic_message_without_upstream_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = provider(&server, "k")
            .generate_from_title(&TitleRequest::new("T", BlogType::Listicle))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "gemini error: Failed to generate content");
    }

    #[tokio::test]
    async fn empty_text_on_success_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("   ")))
            .mount(&server)
            .await;

        let err = provider(&server, "k")
            .generate_from_title(&TitleRequest::new("T", BlogType::Listicle))
            .await
            .unwrap_err();
        assert!(matches!(err, BlogMateError::Provider { .. }));
    }

    #[tokio::test]
    async fn missing_candidates_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = provider(&server, "k")
            .generate_from_source("https://example.com", "T", Some("text"))
            .await
            .unwrap_err();
        assert!(matches!(err, BlogMateError::Provider { .. }));
    }

    #[tokio::test]
    async fn missing_key_is_checked_locally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("<p>x</p>")))
            .expect(0)
            .mount(&server)
            .await;

        let err = provider(&server, "")
            .generate_from_title(&TitleRequest::new("T", BlogType::Listicle))
            .await
            .unwrap_err();
        assert!(matches!(err, BlogMateError::Config { .. }));
    }
}
