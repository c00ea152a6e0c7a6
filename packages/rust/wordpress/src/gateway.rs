//! WordPress REST client: featured-image upload followed by post creation.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use blogmate_shared::http::{build_client, upstream_message};
use blogmate_shared::{BlogMateError, HttpConfig, PublishResult, Result, WordPressConfig};

use crate::PublishGateway;
use crate::naming::media_filename;

const MEDIA_FETCH_FAILURE: &str = "Failed to fetch image";
const MEDIA_UPLOAD_FAILURE: &str = "Failed to upload media";
const POST_FAILURE: &str = "Failed to publish post";

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// An uploaded media object, consumed by the post phase.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MediaReference {
    #[serde(rename = "id")]
    pub media_id: u64,
    #[serde(default)]
    pub source_url: String,
}

#[derive(Debug, Serialize)]
struct PostRequest<'a> {
    title: &'a str,
    content: &'a str,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    featured_media: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    id: u64,
    link: String,
}

/// [`PublishGateway`] over the WordPress `wp/v2` REST API with application
/// password (basic) auth.
pub struct WordPressGateway {
    client: Client,
}

impl WordPressGateway {
    pub fn new(http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(http, http.publish_timeout_secs)?,
        })
    }

    /// Download the generated image. No CMS credentials are sent here.
    async fn fetch_image(&self, image_url: &str) -> Result<(Vec<u8>, String)> {
        let response = self
            .client
            .get(image_url)
            .send()
            .await
            .map_err(|e| BlogMateError::MediaFetch(format!("{MEDIA_FETCH_FAILURE}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BlogMateError::MediaFetch(format!(
                "{MEDIA_FETCH_FAILURE}: HTTP {status}"
            )));
        }

        let mime = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BlogMateError::MediaFetch(format!("{MEDIA_FETCH_FAILURE}: {e}")))?;
        if bytes.is_empty() {
            return Err(BlogMateError::MediaFetch(format!(
                "{MEDIA_FETCH_FAILURE}: empty body"
            )));
        }

        Ok((bytes.to_vec(), mime))
    }

    /// Phase 1: fetch the image and upload it to the media library.
    async fn upload_featured_image(
        &self,
        config: &WordPressConfig,
        title: &str,
        image_url: &str,
    ) -> Result<MediaReference> {
        let (bytes, mime) = self.fetch_image(image_url).await?;
        let filename = media_filename(title);
        debug!(%filename, %mime, size = bytes.len(), "uploading featured image");

        let part = Part::bytes(bytes)
            .file_name(filename)
            .mime_str(&mime)
            .map_err(|e| BlogMateError::MediaUpload(format!("{MEDIA_UPLOAD_FAILURE}: {e}")))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(config.endpoint("media"))
            .basic_auth(&config.username, Some(&config.app_password))
            .multipart(form)
            .send()
            .await
            .map_err(|e| BlogMateError::MediaUpload(format!("{MEDIA_UPLOAD_FAILURE}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BlogMateError::MediaUpload(format!("{MEDIA_UPLOAD_FAILURE}: {e}")))?;

        if !status.is_success() {
            let message = upstream_message(&body).unwrap_or_else(|| MEDIA_UPLOAD_FAILURE.to_string());
            warn!(%status, %message, "media upload rejected");
            return Err(BlogMateError::MediaUpload(message));
        }

        let media: MediaReference = serde_json::from_str(&body).map_err(|e| {
            BlogMateError::MediaUpload(format!("{MEDIA_UPLOAD_FAILURE}: malformed response: {e}"))
        })?;
        info!(media_id = media.media_id, source_url = %media.source_url, "media uploaded");
        Ok(media)
    }

    /// Phase 2: create the published post, attaching media when present.
    async fn create_post(
        &self,
        config: &WordPressConfig,
        title: &str,
        html: &str,
        media: Option<&MediaReference>,
    ) -> Result<PublishResult> {
        let orphaned_media_id = media.map(|m| m.media_id);
        let post_error = |message: String| {
            if let Some(id) = orphaned_media_id {
                warn!(media_id = id, "post creation failed after media upload; media left unattached");
            }
            BlogMateError::PostCreate {
                message,
                orphaned_media_id,
            }
        };

        let request = PostRequest {
            title,
            content: html,
            status: "publish",
            featured_media: orphaned_media_id,
        };

        let response = self
            .client
            .post(config.endpoint("posts"))
            .basic_auth(&config.username, Some(&config.app_password))
            .json(&request)
            .send()
            .await
            .map_err(|e| post_error(format!("{POST_FAILURE}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| post_error(format!("{POST_FAILURE}: {e}")))?;

        if !status.is_success() {
            let message = upstream_message(&body).unwrap_or_else(|| POST_FAILURE.to_string());
            warn!(%status, %message, "post creation rejected");
            return Err(post_error(message));
        }

        let post: PostResponse = serde_json::from_str(&body)
            .map_err(|e| post_error(format!("{POST_FAILURE}: malformed response: {e}")))?;

        Ok(PublishResult {
            post_id: post.id,
            post_url: post.link,
            published_at: Utc::now(),
        })
    }
}

#[async_trait]
impl PublishGateway for WordPressGateway {
    #[instrument(skip_all, fields(site = %config.site_url, with_image = image_url.is_some()))]
    async fn publish(
        &self,
        config: &WordPressConfig,
        title: &str,
        html: &str,
        image_url: Option<&str>,
    ) -> Result<PublishResult> {
        config.ensure_complete()?;

        let media = match image_url {
            Some(url) => Some(self.upload_featured_image(config, title, url).await?),
            None => None,
        };

        let result = self.create_post(config, title, html, media.as_ref()).await?;
        info!(post_id = result.post_id, post_url = %result.post_url, "post published");
        Ok(result)
    }

    #[instrument(skip_all, fields(site = %config.site_url))]
    async fn validate_credentials(&self, config: &WordPressConfig) -> bool {
        if config.ensure_complete().is_err() {
            return false;
        }

        match self
            .client
            .get(config.endpoint("users/me"))
            .basic_auth(&config.username, Some(&config.app_password))
            .send()
            .await
        {
            Ok(response) => {
                let ok = response.status().is_success();
                debug!(status = %response.status(), ok, "credential check");
                ok
            }
            Err(e) => {
                debug!(error = %e.without_url(), "credential check unreachable");
                false
            }
        }
    }
}
