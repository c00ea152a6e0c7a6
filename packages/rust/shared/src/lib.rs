//! Shared types, error model, configuration and HTTP helpers for BlogMate.
//!
//! This crate is the foundation depended on by all other BlogMate crates.
//! It provides:
//! - [`BlogMateError`] — the unified error type
//! - Domain types ([`Draft`], [`Stage`], [`SourcePage`], [`PublishResult`])
//! - Configuration ([`AppConfig`], [`WordPressConfig`], config loading)
//! - [`http`] — client construction and upstream error parsing

pub mod config;
pub mod error;
pub mod http;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, GeminiConfig, HttpConfig, OpenAiConfig, WordPressConfig, WordPressSettings,
    config_dir, config_file_path, init_config, load_config, load_config_from, resolve_secret,
};
pub use error::{BlogMateError, Result};
pub use types::{BlogType, Draft, FailedStage, PublishResult, SessionId, SourcePage, Stage};
