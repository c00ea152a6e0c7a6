//! Core pipeline orchestration for BlogMate.
//!
//! This crate ties together source fetching, content and image generation,
//! and WordPress publishing into the three drafting flows (by-title, by-URL,
//! manual) behind a single [`Orchestrator`] per session.

pub mod pipeline;
pub mod session;

pub use pipeline::{Orchestrator, ProgressReporter, SilentProgress};
pub use session::Session;
