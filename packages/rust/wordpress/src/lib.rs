//! Publishing to a WordPress site.
//!
//! A publish with an image is two-phase: the image is downloaded and uploaded
//! to the media library, then the post is created referencing that media id.
//! Phases are strictly ordered and a media failure aborts before any post
//! request. No rollback is attempted when the post phase fails after media
//! succeeded.

pub mod gateway;
pub mod naming;

use async_trait::async_trait;

use blogmate_shared::{PublishResult, Result, WordPressConfig};

pub use gateway::WordPressGateway;
pub use naming::{media_filename, slugify};

/// Pushes finished posts to a CMS.
#[async_trait]
pub trait PublishGateway: Send + Sync {
    /// Publish `html` under `title`, attaching `image_url` as the featured
    /// image when present.
    async fn publish(
        &self,
        config: &WordPressConfig,
        title: &str,
        html: &str,
        image_url: Option<&str>,
    ) -> Result<PublishResult>;

    /// Authenticated no-op probe. Any failure, including transport errors,
    /// yields `false`.
    async fn validate_credentials(&self, config: &WordPressConfig) -> bool;
}
