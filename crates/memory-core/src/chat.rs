//! `Chat` capability
//!
//! Structured-output generation against a typed schema, used by PRIME
//! extraction and optional LLM classification during connection
//! discovery. Message shape follows the common role/content convention
//! (system/user/assistant roles, plain string content) behind a capability
//! trait instead of a concrete provider client, since concrete LLM SDKs
//! are out of scope.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Generation parameters. Callers in this crate always set a low
/// temperature (0.2-0.3) for deterministic, schema-conforming output.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        GenerateOptions {
            temperature: 0.2,
            max_tokens: 1024,
        }
    }
}

/// Token accounting returned alongside a structured generation, used by
/// `CostTracker`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// The result of a structured-output generation call.
pub struct GeneratedObject<T> {
    pub object: T,
    pub usage: Usage,
}

/// The chat capability the core consumes. `generate_object` asks the
/// provider to return a value matching `schema` (a JSON Schema document);
/// implementations are expected to use native structured-output/tool-calling
/// support where the underlying model offers it.
#[async_trait]
pub trait Chat: Send + Sync {
    async fn generate_object(
        &self,
        schema: &serde_json::Value,
        messages: &[ChatMessage],
        options: &GenerateOptions,
    ) -> Result<GeneratedObject<serde_json::Value>>;
}

/// Typed error detail a `Chat` implementation may wrap inside
/// `MemoryError::Transient`/`Permanent` — errors are typed as rate-limit,
/// schema, or transport failures.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("rate limited, retry after {retry_after_ms:?}ms")]
    RateLimit { retry_after_ms: Option<u64> },
    #[error("response did not match the requested schema: {0}")]
    Schema(String),
    #[error("transport error: {0}")]
    Transport(String),
}
