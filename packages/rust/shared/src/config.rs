//! Application configuration for BlogMate.
//!
//! User config lives at `~/.blogmate/blogmate.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets are never written to the file — only the names of the env vars
//! that hold them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BlogMateError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "blogmate.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".blogmate";

// ---------------------------------------------------------------------------
// Config structs (matching blogmate.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Text-generation provider settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Image-generation provider settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// WordPress site settings.
    #[serde(default)]
    pub wordpress: WordPressSettings,

    /// HTTP client timeouts.
    #[serde(default)]
    pub http: HttpConfig,
}

/// `[gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,

    /// Model used for both the by-title and by-source prompts.
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// API base URL (overridable for proxies and tests).
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_key_env(),
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
        }
    }
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_gemini_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    /// Image model.
    #[serde(default = "default_image_model")]
    pub model: String,

    /// API base URL.
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_key_env(),
            model: default_image_model(),
            base_url: default_openai_base_url(),
        }
    }
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_image_model() -> String {
    "dall-e-3".into()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".into()
}

/// `[wordpress]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordPressSettings {
    /// Site root, e.g. `https://blog.example.com`.
    #[serde(default)]
    pub site_url: String,

    /// WordPress user the application password belongs to.
    #[serde(default)]
    pub username: String,

    /// Name of the env var holding the application password.
    #[serde(default = "default_app_password_env")]
    pub app_password_env: String,
}

impl Default for WordPressSettings {
    fn default() -> Self {
        Self {
            site_url: String::new(),
            username: String::new(),
            app_password_env: default_app_password_env(),
        }
    }
}

fn default_app_password_env() -> String {
    "WORDPRESS_APP_PASSWORD".into()
}

/// `[http]` section. No upstream call is retried automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// TCP/TLS connect timeout for every client.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Total timeout for text and image generation calls.
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,

    /// Total timeout for fetching a source page.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Total timeout for each WordPress request (image download included).
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: u64,

    /// Maximum redirects followed by any client.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            generation_timeout_secs: default_generation_timeout(),
            fetch_timeout_secs: default_fetch_timeout(),
            publish_timeout_secs: default_publish_timeout(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    10
}
fn default_generation_timeout() -> u64 {
    120
}
fn default_fetch_timeout() -> u64 {
    30
}
fn default_publish_timeout() -> u64 {
    60
}
fn default_max_redirects() -> usize {
    5
}

impl HttpConfig {
    /// Connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// WordPressConfig (runtime credential bundle)
// ---------------------------------------------------------------------------

/// Resolved WordPress credentials, passed into each publish call.
#[derive(Clone, PartialEq, Eq)]
pub struct WordPressConfig {
    /// Site root without a trailing slash.
    pub site_url: String,
    pub username: String,
    pub app_password: String,
}

impl WordPressConfig {
    /// Build a bundle, normalising the site URL.
    pub fn new(
        site_url: impl Into<String>,
        username: impl Into<String>,
        app_password: impl Into<String>,
    ) -> Self {
        Self {
            site_url: site_url.into().trim().trim_end_matches('/').to_string(),
            username: username.into(),
            app_password: app_password.into(),
        }
    }

    /// Check that every field is present, without contacting the site.
    pub fn ensure_complete(&self) -> Result<()> {
        if self.site_url.is_empty() || self.username.is_empty() || self.app_password.is_empty() {
            return Err(BlogMateError::config(
                "WordPress configuration is incomplete: site URL, username and application password are all required",
            ));
        }
        Ok(())
    }

    /// Absolute URL of a `wp/v2` REST route, e.g. `endpoint("posts")`.
    pub fn endpoint(&self, route: &str) -> String {
        format!("{}/wp-json/wp/v2/{route}", self.site_url)
    }
}

impl std::fmt::Debug for WordPressConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordPressConfig")
            .field("site_url", &self.site_url)
            .field("username", &self.username)
            .field("app_password", &"<redacted>")
            .finish()
    }
}

impl AppConfig {
    /// Resolve the `[wordpress]` section plus its password env var into credentials.
    pub fn wordpress_config(&self) -> Result<WordPressConfig> {
        let settings = &self.wordpress;
        if settings.site_url.trim().is_empty() {
            return Err(BlogMateError::config(
                "WordPress site URL is not set. Add `site_url` under [wordpress] in the config file.",
            ));
        }
        if settings.username.trim().is_empty() {
            return Err(BlogMateError::config(
                "WordPress username is not set. Add `username` under [wordpress] in the config file.",
            ));
        }
        let password = resolve_secret(&settings.app_password_env)?;
        let config = WordPressConfig::new(&settings.site_url, settings.username.trim(), password);
        config.ensure_complete()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.blogmate/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BlogMateError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.blogmate/blogmate.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BlogMateError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| BlogMateError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BlogMateError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BlogMateError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BlogMateError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a secret from the named env var; unset or empty is a config error.
pub fn resolve_secret(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(BlogMateError::config(format!(
            "secret not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("GEMINI_API_KEY"));
        assert!(toml_str.contains("WORDPRESS_APP_PASSWORD"));
        assert!(toml_str.contains("generation_timeout_secs"));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let toml_str = r#"
[wordpress]
site_url = "https://blog.example.com/"
username = "editor"

[http]
fetch_timeout_secs = 5
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.wordpress.username, "editor");
        assert_eq!(config.wordpress.app_password_env, "WORDPRESS_APP_PASSWORD");
        assert_eq!(config.http.fetch_timeout_secs, 5);
        assert_eq!(config.http.generation_timeout_secs, 120);
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
        assert_eq!(config.openai.model, "dall-e-3");
    }

    #[test]
    fn missing_secret_names_the_variable() {
        let err = resolve_secret("BLOGMATE_TEST_NONEXISTENT_SECRET_98765").unwrap_err();
        assert!(err.to_string().contains("BLOGMATE_TEST_NONEXISTENT_SECRET_98765"));
    }

    #[test]
    fn wordpress_config_requires_site_and_user() {
        let config = AppConfig::default();
        let err = config.wordpress_config().unwrap_err();
        assert!(matches!(err, BlogMateError::Config { .. }));
        assert!(err.to_string().contains("site URL"));

        let mut config = AppConfig::default();
        config.wordpress.site_url = "https://blog.example.com".into();
        config.wordpress.username = "editor".into();
        config.wordpress.app_password_env = "BLOGMATE_TEST_NONEXISTENT_PASSWORD_4321".into();
        let err = config.wordpress_config().unwrap_err();
        assert!(err.to_string().contains("BLOGMATE_TEST_NONEXISTENT_PASSWORD_4321"));
    }

    #[test]
    fn wordpress_endpoint_strips_trailing_slash() {
        let wp = WordPressConfig::new("https://blog.example.com/", "editor", "abcd efgh");
        assert_eq!(wp.endpoint("media"), "https://blog.example.com/wp-json/wp/v2/media");
        assert!(wp.ensure_complete().is_ok());
    }

    #[test]
    fn incomplete_wordpress_config_is_rejected() {
        let wp = WordPressConfig::new("https://blog.example.com", "", "secret");
        assert!(matches!(
            wp.ensure_complete(),
            Err(BlogMateError::Config { .. })
        ));
    }

    #[test]
    fn debug_redacts_password() {
        let wp = WordPressConfig::new("https://blog.example.com", "editor", "hunter2");
        let dbg = format!("{wp:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("redacted"));
    }
}
