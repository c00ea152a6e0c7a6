//! Core domain types for the generate → publish pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one editing session (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new session identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// The active stages an operation can fail in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedStage {
    Fetching,
    Generating,
    Publishing,
}

/// Where a draft currently sits in the generate → publish lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "stage", content = "at")]
pub enum Stage {
    #[default]
    Empty,
    Fetching,
    Generating,
    Generated,
    Publishing,
    Published,
    Failed(FailedStage),
}

impl Stage {
    /// Whether an operation is in flight in this stage.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Fetching | Self::Generating | Self::Publishing)
    }

    /// Whether a draft in this stage may carry a body.
    pub fn holds_body(&self) -> bool {
        matches!(self, Self::Generated | Self::Published)
    }
}

impl From<FailedStage> for Stage {
    fn from(stage: FailedStage) -> Self {
        match stage {
            FailedStage::Fetching => Self::Fetching,
            FailedStage::Generating => Self::Generating,
            FailedStage::Publishing => Self::Publishing,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("empty"),
            Self::Fetching => f.write_str("fetching"),
            Self::Generating => f.write_str("generating"),
            Self::Generated => f.write_str("generated"),
            Self::Publishing => f.write_str("publishing"),
            Self::Published => f.write_str("published"),
            Self::Failed(at) => write!(f, "failed while {}", Stage::from(*at)),
        }
    }
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// In-memory accumulation of a post pending publish. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    /// Post title.
    pub title: String,
    /// HTML body; non-empty only when `stage.holds_body()`.
    pub body: String,
    /// Featured image URL as returned by the image provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Reference URL for the by-URL flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Current lifecycle stage.
    pub stage: Stage,
}

// ---------------------------------------------------------------------------
// BlogType
// ---------------------------------------------------------------------------

/// Style of post requested from the content provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlogType {
    InformativeArticle,
    PersuasiveArgument,
    Listicle,
    HowToGuide,
}

impl BlogType {
    /// All known types, in display order.
    pub const ALL: [BlogType; 4] = [
        Self::InformativeArticle,
        Self::PersuasiveArgument,
        Self::Listicle,
        Self::HowToGuide,
    ];

    /// Human-readable label embedded in prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InformativeArticle => "Informative Article",
            Self::PersuasiveArgument => "Persuasive Argument",
            Self::Listicle => "Listicle",
            Self::HowToGuide => "How-to Guide",
        }
    }

    fn slug(&self) -> &'static str {
        match self {
            Self::InformativeArticle => "informative-article",
            Self::PersuasiveArgument => "persuasive-argument",
            Self::Listicle => "listicle",
            Self::HowToGuide => "how-to-guide",
        }
    }
}

impl std::fmt::Display for BlogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for BlogType {
    type Err = String;

    /// Accepts either the label ("How-to Guide") or its kebab-case form ("how-to-guide").
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(needle) || t.slug() == needle)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|t| t.slug()).collect();
                format!("unknown blog type '{s}': expected one of {}", known.join(", "))
            })
    }
}

// ---------------------------------------------------------------------------
// SourcePage
// ---------------------------------------------------------------------------

/// Readable text extracted from a reference web page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePage {
    /// The URL that was fetched.
    pub url: String,
    /// `<title>` text, empty if absent.
    pub title: String,
    /// `meta[name=description]` content, empty if absent.
    pub description: String,
    /// Whitespace-collapsed main-content text, bounded in length.
    pub content: String,
}

// ---------------------------------------------------------------------------
// PublishResult
// ---------------------------------------------------------------------------

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    /// CMS-assigned post identifier.
    pub post_id: u64,
    /// Permalink of the published post.
    pub post_url: String,
    /// When the CMS accepted the post.
    pub published_at: DateTime<Utc>,
}
