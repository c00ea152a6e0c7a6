//! Explicit per-session wiring: providers, fetcher, gateway and credentials.

use std::sync::Arc;

use tracing::debug;

use blogmate_fetcher::{HttpSourceFetcher, SourceFetcher};
use blogmate_providers::{ContentProvider, GeminiProvider, ImageProvider, OpenAiImageProvider};
use blogmate_shared::{AppConfig, Result, SessionId, WordPressConfig, resolve_secret};
use blogmate_wordpress::{PublishGateway, WordPressGateway};

/// Everything one orchestrator needs to talk to the outside world.
///
/// Built once per interactive session and handed to
/// [`Orchestrator::new`](crate::Orchestrator::new).
#[derive(Clone)]
pub struct Session {
    pub id: SessionId,
    pub content: Arc<dyn ContentProvider>,
    pub images: Arc<dyn ImageProvider>,
    pub fetcher: Arc<dyn SourceFetcher>,
    pub gateway: Arc<dyn PublishGateway>,
    /// `None` until WordPress credentials are supplied; publishing then
    /// fails with a config error.
    pub wordpress: Option<WordPressConfig>,
}

impl Session {
    pub fn new(
        content: Arc<dyn ContentProvider>,
        images: Arc<dyn ImageProvider>,
        fetcher: Arc<dyn SourceFetcher>,
        gateway: Arc<dyn PublishGateway>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            content,
            images,
            fetcher,
            gateway,
            wordpress: None,
        }
    }

    pub fn with_wordpress(mut self, config: WordPressConfig) -> Self {
        self.wordpress = Some(config);
        self
    }

    /// Wire the production clients from the loaded config.
    ///
    /// Missing API keys are not fatal here: the affected provider reports a
    /// config error when first called, so flows that never touch it still run.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let gemini_key = optional_secret(&config.gemini.api_key_env);
        let openai_key = optional_secret(&config.openai.api_key_env);

        let session = Self::new(
            Arc::new(GeminiProvider::new(&config.gemini, &config.http, gemini_key)?),
            Arc::new(OpenAiImageProvider::new(&config.openai, &config.http, openai_key)?),
            Arc::new(HttpSourceFetcher::new(&config.http)?),
            Arc::new(WordPressGateway::new(&config.http)?),
        );

        match config.wordpress_config() {
            Ok(wordpress) => Ok(session.with_wordpress(wordpress)),
            Err(e) => {
                debug!(error = %e, "WordPress not configured; publishing disabled");
                Ok(session)
            }
        }
    }
}

fn optional_secret(var_name: &str) -> String {
    resolve_secret(var_name).unwrap_or_else(|e| {
        debug!(error = %e, "API key not set");
        String::new()
    })
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("wordpress", &self.wordpress)
            .finish_non_exhaustive()
    }
}
