//! Error types for BlogMate.
//!
//! Library crates use [`BlogMateError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::Stage;

/// Top-level error type for all BlogMate operations.
#[derive(Debug, thiserror::Error)]
pub enum BlogMateError {
    /// Missing or incomplete credentials/configuration, detected locally.
    #[error("config error: {message}")]
    Config { message: String },

    /// Text or image generation failed (upstream reachable but rejected or empty).
    #[error("{provider} error: {message}")]
    Provider { provider: String, message: String },

    /// Transport failure while talking to a generation provider.
    #[error("network error: {0}")]
    Network(String),

    /// Source page unreachable or returned a non-success status.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Publish phase 1: the featured image could not be downloaded.
    #[error("media fetch failed: {0}")]
    MediaFetch(String),

    /// Publish phase 1: the CMS rejected the media upload.
    #[error("media upload failed: {0}")]
    MediaUpload(String),

    /// Publish phase 2: the CMS rejected the post.
    ///
    /// When the media phase had already succeeded, `orphaned_media_id` names
    /// the uploaded media object that is now unreferenced in the CMS.
    #[error("post creation failed: {message}{}", orphan_note(.orphaned_media_id))]
    PostCreate {
        message: String,
        orphaned_media_id: Option<u64>,
    },

    /// Input validation failed before any remote call.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Another operation is already in flight for this draft.
    #[error("an operation is already in progress (stage: {stage})")]
    Busy { stage: Stage },

    /// The draft was reset while this operation was in flight; its result was discarded.
    #[error("operation superseded by a reset; result discarded")]
    Superseded,

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn orphan_note(media_id: &Option<u64>) -> String {
    match media_id {
        Some(id) => format!(" (uploaded media {id} left unattached)"),
        None => String::new(),
    }
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BlogMateError>;

impl BlogMateError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a provider error attributed to the named provider.
    pub fn provider(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = BlogMateError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = BlogMateError::provider("gemini", "quota exceeded");
        assert_eq!(err.to_string(), "gemini error: quota exceeded");
    }

    #[test]
    fn post_create_mentions_orphaned_media() {
        let err = BlogMateError::PostCreate {
            message: "Sorry, you are not allowed to create posts.".into(),
            orphaned_media_id: Some(42),
        };
        let text = err.to_string();
        assert!(text.contains("not allowed to create posts"));
        assert!(text.contains("media 42"));

        let err = BlogMateError::PostCreate {
            message: "bad request".into(),
            orphaned_media_id: None,
        };
        assert_eq!(err.to_string(), "post creation failed: bad request");
    }

    #[test]
    fn busy_names_the_active_stage() {
        let err = BlogMateError::Busy {
            stage: Stage::Publishing,
        };
        assert!(err.to_string().contains("publishing"));
    }
}
