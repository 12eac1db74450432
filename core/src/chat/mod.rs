//! Chat backend module root
//!
//! This module provides:
//! - `ChatBackend`, the seam the orchestrator talks to
//! - `ChatClientConfig` and `ChatClient` for OpenAI-compatible HTTP backends

mod client;

pub use client::{ChatBackend, ChatClient, ChatClientConfig, CompletionOptions};
