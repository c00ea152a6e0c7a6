//! Draft state machine: by-title, by-URL and manual flows, then publish.
//!
//! ```text
//! Empty ─▶ Fetching ─▶ Empty            (optional pre-fetch for by-URL)
//! Empty ─▶ Generating ─▶ Generated ─▶ Publishing ─▶ Published
//!              │                           │
//!              ▼                           ▼
//!     Failed(Generating)          Failed(Publishing) ─▶ Publishing (retry)
//! ```
//!
//! One operation may be in flight per draft; a second is rejected with
//! [`BlogMateError::Busy`]. [`Orchestrator::reset`] always wins: results of
//! operations started before the reset are discarded and reported as
//! [`BlogMateError::Superseded`].

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use blogmate_providers::TitleRequest;
use blogmate_shared::{
    BlogMateError, Draft, FailedStage, PublishResult, Result, SourcePage, Stage,
};

use crate::session::Session;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called whenever the draft changes stage.
    fn stage(&self, stage: Stage);
    /// Called when a remote step within the current stage starts.
    fn step(&self, message: &str);
    /// Called once a post is live.
    fn published(&self, result: &PublishResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _stage: Stage) {}
    fn step(&self, _message: &str) {}
    fn published(&self, _result: &PublishResult) {}
}

#[derive(Debug, Default)]
struct DraftState {
    draft: Draft,
    /// Body held back from the visible draft while publishing, and after a
    /// failed publish so a retry can resend it.
    retained_body: String,
    /// Page fetched ahead of by-URL generation, keyed by normalised URL.
    source: Option<(String, SourcePage)>,
    /// Bumped on every reset.
    epoch: u64,
    in_flight: bool,
}

impl DraftState {
    fn set_stage(&mut self, stage: Stage) {
        if !stage.holds_body() {
            self.draft.body.clear();
        }
        self.draft.stage = stage;
    }

    /// Drop the generated parts of the draft before a new generation.
    fn clear_output(&mut self) {
        self.draft.body.clear();
        self.draft.image_url = None;
        self.retained_body.clear();
    }
}

/// Proof that an operation was admitted at a given epoch.
#[derive(Debug, Clone, Copy)]
struct Ticket {
    epoch: u64,
}

/// Sequences fetch, generation and publish for one in-memory draft.
pub struct Orchestrator {
    session: Session,
    state: Mutex<DraftState>,
    progress: Arc<dyn ProgressReporter>,
}

impl Orchestrator {
    pub fn new(session: Session) -> Self {
        Self::with_progress(session, Arc::new(SilentProgress))
    }

    pub fn with_progress(session: Session, progress: Arc<dyn ProgressReporter>) -> Self {
        Self {
            session,
            state: Mutex::new(DraftState::default()),
            progress,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Snapshot of the current draft.
    pub async fn draft(&self) -> Draft {
        self.state.lock().await.draft.clone()
    }

    /// The page fetched by the last successful [`fetch_source`](Self::fetch_source).
    pub async fn source(&self) -> Option<SourcePage> {
        self.state
            .lock()
            .await
            .source
            .as_ref()
            .map(|(_, page)| page.clone())
    }

    // -----------------------------------------------------------------------
    // Flows
    // -----------------------------------------------------------------------

    /// By-title flow: content, then the featured image, strictly in sequence.
    #[instrument(skip_all, fields(session = %self.session.id, blog_type = %request.blog_type))]
    pub async fn generate_from_title(&self, request: TitleRequest) -> Result<Draft> {
        let title = require_non_blank(&request.title, "title")?;
        let request = TitleRequest {
            title: title.clone(),
            ..request
        };

        let (ticket, ()) = self
            .begin(Some(Stage::Generating), |state| {
                state.clear_output();
                state.source = None;
                state.draft.source_url = None;
                state.draft.title = title.clone();
                Ok(())
            })
            .await?;

        self.progress.step("Generating content");
        let body = self
            .check(
                ticket,
                FailedStage::Generating,
                self.session.content.generate_from_title(&request).await,
            )
            .await?;

        self.finish_generation(ticket, &title, body).await
    }

    /// Optional by-URL pre-fetch. Records the URL, pre-fills the title from
    /// the page and returns to `Empty`.
    #[instrument(skip_all, fields(session = %self.session.id, url = %url))]
    pub async fn fetch_source(&self, url: &str) -> Result<SourcePage> {
        let url = parse_http_url(url)?;

        let (ticket, ()) = self
            .begin(Some(Stage::Fetching), |state| {
                state.draft = Draft {
                    source_url: Some(url.to_string()),
                    ..Draft::default()
                };
                state.retained_body.clear();
                state.source = None;
                Ok(())
            })
            .await?;

        self.progress.step("Fetching source page");
        let page = self
            .check(
                ticket,
                FailedStage::Fetching,
                self.session.fetcher.fetch(url.as_str()).await,
            )
            .await?;

        debug!(
            title = %page.title,
            content_chars = page.content.chars().count(),
            "source page fetched"
        );

        self.finish(ticket, |state| {
            let title = page.title.trim();
            if state.draft.title.trim().is_empty() && !title.is_empty() {
                state.draft.title = title.to_string();
            }
            state.source = Some((url.to_string(), page.clone()));
            state.set_stage(Stage::Empty);
            page
        })
        .await
    }

    /// By-URL flow. Uses text from a prior [`fetch_source`](Self::fetch_source)
    /// of the same URL when available.
    #[instrument(skip_all, fields(session = %self.session.id, url = %url))]
    pub async fn generate_from_url(&self, url: &str, title: &str) -> Result<Draft> {
        let url = parse_http_url(url)?;
        let title = require_non_blank(title, "title")?;

        let (ticket, source_text) = self
            .begin(Some(Stage::Generating), |state| {
                let source_text = state
                    .source
                    .as_ref()
                    .filter(|(fetched, _)| fetched == url.as_str())
                    .map(|(_, page)| page.content.clone())
                    .filter(|text| !text.trim().is_empty());
                state.clear_output();
                state.draft.title = title.clone();
                state.draft.source_url = Some(url.to_string());
                Ok(source_text)
            })
            .await?;

        debug!(grounded = source_text.is_some(), "generating from source");
        self.progress.step("Generating content");
        let body = self
            .check(
                ticket,
                FailedStage::Generating,
                self.session
                    .content
                    .generate_from_source(url.as_str(), &title, source_text.as_deref())
                    .await,
            )
            .await?;

        self.finish_generation(ticket, &title, body).await
    }

    /// Manual flow: user-authored HTML goes straight to `Generated` with no
    /// content-provider call. Any featured image already on the draft is kept.
    #[instrument(skip_all, fields(session = %self.session.id))]
    pub async fn write_manual(&self, title: &str, html: &str) -> Result<Draft> {
        let title = require_non_blank(title, "title")?;
        if html.trim().is_empty() {
            return Err(BlogMateError::validation("post body must not be empty"));
        }

        let mut state = self.state.lock().await;
        if state.in_flight {
            return Err(BlogMateError::Busy {
                stage: state.draft.stage,
            });
        }

        state.retained_body.clear();
        state.source = None;
        state.draft.title = title;
        state.draft.source_url = None;
        state.draft.body = html.to_string();
        state.set_stage(Stage::Generated);
        self.progress.stage(Stage::Generated);

        info!("manual draft ready");
        Ok(state.draft.clone())
    }

    /// Side action: generate a featured image for `title` and attach it to
    /// the draft. Does not change the stage and is not gated on the body.
    #[instrument(skip_all, fields(session = %self.session.id))]
    pub async fn generate_image(&self, title: &str) -> Result<String> {
        let title = require_non_blank(title, "title")?;
        let (ticket, ()) = self.begin(None, |_| Ok(())).await?;

        self.progress.step("Generating featured image");
        let outcome = self.session.images.generate_image(&title).await;

        let mut state = self.state.lock().await;
        if state.epoch != ticket.epoch {
            warn!("image result discarded after reset");
            return Err(BlogMateError::Superseded);
        }
        state.in_flight = false;
        let image_url = outcome?;
        state.draft.image_url = Some(image_url.clone());
        Ok(image_url)
    }

    /// Publish the generated draft. Allowed from `Generated`, and from
    /// `Failed(Publishing)` as a retry.
    #[instrument(skip_all, fields(session = %self.session.id))]
    pub async fn publish(&self) -> Result<PublishResult> {
        let (ticket, (config, title, body, image_url)) = self
            .begin(Some(Stage::Publishing), |state| {
                let retry = match state.draft.stage {
                    Stage::Generated => false,
                    Stage::Failed(FailedStage::Publishing) if !state.retained_body.is_empty() => true,
                    Stage::Published => {
                        return Err(BlogMateError::validation(
                            "draft is already published; reset to start a new post",
                        ));
                    }
                    other => {
                        return Err(BlogMateError::validation(format!(
                            "nothing to publish: draft is {other}"
                        )));
                    }
                };

                let config = self.session.wordpress.clone().ok_or_else(|| {
                    BlogMateError::config(
                        "WordPress is not configured: set site_url and username under [wordpress] \
                         and export the application password",
                    )
                })?;
                config.ensure_complete()?;

                if !retry {
                    state.retained_body = std::mem::take(&mut state.draft.body);
                }
                Ok((
                    config,
                    state.draft.title.clone(),
                    state.retained_body.clone(),
                    state.draft.image_url.clone(),
                ))
            })
            .await?;

        self.progress.step("Publishing to WordPress");
        let result = self
            .check(
                ticket,
                FailedStage::Publishing,
                self.session
                    .gateway
                    .publish(&config, &title, &body, image_url.as_deref())
                    .await,
            )
            .await?;

        let applied = self
            .finish(ticket, |state| {
                state.draft.body = std::mem::take(&mut state.retained_body);
                state.set_stage(Stage::Published);
            })
            .await;
        if let Err(e) = applied {
            warn!(post_url = %result.post_url, "post went live after the draft was reset");
            return Err(e);
        }

        self.progress.published(&result);
        info!(post_id = result.post_id, post_url = %result.post_url, "draft published");
        Ok(result)
    }

    /// Discard the draft unconditionally. In-flight results become stale.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        let epoch = state.epoch + 1;
        *state = DraftState {
            epoch,
            ..DraftState::default()
        };
        self.progress.stage(Stage::Empty);
        info!(session = %self.session.id, epoch, "draft reset");
    }

    /// Probe the session's WordPress credentials. `false` when none are set.
    pub async fn validate_credentials(&self) -> bool {
        match &self.session.wordpress {
            Some(config) => self.session.gateway.validate_credentials(config).await,
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // State transitions
    // -----------------------------------------------------------------------

    /// Admit a new operation, optionally entering `stage`.
    async fn begin<T>(
        &self,
        stage: Option<Stage>,
        prepare: impl FnOnce(&mut DraftState) -> Result<T>,
    ) -> Result<(Ticket, T)> {
        let mut state = self.state.lock().await;
        if state.in_flight {
            return Err(BlogMateError::Busy {
                stage: state.draft.stage,
            });
        }

        let prepared = prepare(&mut state)?;
        state.in_flight = true;
        if let Some(stage) = stage {
            state.set_stage(stage);
            self.progress.stage(stage);
        }
        Ok((Ticket { epoch: state.epoch }, prepared))
    }

    /// Apply a successful result, unless a reset happened meanwhile.
    async fn finish<T>(&self, ticket: Ticket, apply: impl FnOnce(&mut DraftState) -> T) -> Result<T> {
        let mut state = self.state.lock().await;
        if state.epoch != ticket.epoch {
            warn!("result discarded after reset");
            return Err(BlogMateError::Superseded);
        }
        state.in_flight = false;
        let out = apply(&mut state);
        self.progress.stage(state.draft.stage);
        Ok(out)
    }

    /// Route a step failure into `Failed(at)`.
    async fn check<T>(&self, ticket: Ticket, at: FailedStage, outcome: Result<T>) -> Result<T> {
        let error = match outcome {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let mut state = self.state.lock().await;
        if state.epoch != ticket.epoch {
            warn!(%error, "failure discarded after reset");
            return Err(BlogMateError::Superseded);
        }
        state.in_flight = false;
        let stage = Stage::Failed(at);
        state.set_stage(stage);
        self.progress.stage(stage);
        warn!(%stage, %error, "operation failed");
        Err(error)
    }

    async fn ensure_current(&self, ticket: Ticket) -> Result<()> {
        if self.state.lock().await.epoch == ticket.epoch {
            Ok(())
        } else {
            Err(BlogMateError::Superseded)
        }
    }

    /// Shared tail of the by-title and by-URL flows.
    async fn finish_generation(&self, ticket: Ticket, title: &str, body: String) -> Result<Draft> {
        self.ensure_current(ticket).await?;

        self.progress.step("Generating featured image");
        let image_url = self
            .check(
                ticket,
                FailedStage::Generating,
                self.session.images.generate_image(title).await,
            )
            .await?;

        let draft = self
            .finish(ticket, |state| {
                state.draft.body = body;
                state.draft.image_url = Some(image_url);
                state.set_stage(Stage::Generated);
                state.draft.clone()
            })
            .await?;

        info!(title = %draft.title, body_len = draft.body.len(), "draft generated");
        Ok(draft)
    }
}

fn require_non_blank(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BlogMateError::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn parse_http_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| BlogMateError::validation(format!("invalid URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(BlogMateError::validation(format!(
            "unsupported URL scheme '{other}': only http and https are allowed"
        ))),
    }
}
