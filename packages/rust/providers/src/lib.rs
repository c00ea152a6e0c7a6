//! Text- and image-generation providers.
//!
//! Both providers are stateless request/response clients with no internal
//! retry; retry policy belongs to the caller.
//!
//! - [`ContentProvider`] / [`GeminiProvider`] — HTML post bodies
//! - [`ImageProvider`] / [`OpenAiImageProvider`] — featured image URLs

pub mod gemini;
pub mod openai;

use async_trait::async_trait;

use blogmate_shared::{BlogType, Result};

pub use gemini::GeminiProvider;
pub use openai::OpenAiImageProvider;

/// Inputs for the by-title flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleRequest {
    pub title: String,
    pub blog_type: BlogType,
    /// Free-form outline or notes; ignored when blank.
    pub outline: Option<String>,
    /// Comma-separated target keywords; ignored when blank.
    pub keywords: Option<String>,
}

impl TitleRequest {
    pub fn new(title: impl Into<String>, blog_type: BlogType) -> Self {
        Self {
            title: title.into(),
            blog_type,
            outline: None,
            keywords: None,
        }
    }

    pub fn with_outline(mut self, outline: impl Into<String>) -> Self {
        self.outline = Some(outline.into());
        self
    }

    pub fn with_keywords(mut self, keywords: impl Into<String>) -> Self {
        self.keywords = Some(keywords.into());
        self
    }
}

/// Turns a title or a source page into an HTML post body.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Generate a post for `request`. Returns non-empty HTML or a provider error.
    async fn generate_from_title(&self, request: &TitleRequest) -> Result<String>;

    /// Generate an original post titled `title` based on `source_url`,
    /// optionally grounded on text already extracted from that page.
    async fn generate_from_source(
        &self,
        source_url: &str,
        title: &str,
        source_text: Option<&str>,
    ) -> Result<String>;
}

/// Turns a title into the URL of a generated image.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generate one image for `title`. A response without a usable URL is a
    /// provider error.
    async fn generate_image(&self, title: &str) -> Result<String>;
}

/// `Some(trimmed)` when the optional field carries any text.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
