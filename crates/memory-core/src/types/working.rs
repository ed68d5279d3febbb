//! Working memory policy: short-lived, session-scoped context (Invariant 6).

use crate::config::WorkingMemoryConfig;
use crate::error::{MemoryError, Result};
use crate::model::NewMemory;

#[derive(Debug, Clone)]
pub struct WorkingPolicy {
    config: WorkingMemoryConfig,
}

impl WorkingPolicy {
    pub fn new(config: WorkingMemoryConfig) -> Self {
        WorkingPolicy { config }
    }

    pub fn config(&self) -> &WorkingMemoryConfig {
        &self.config
    }

    /// Working memory must be scoped to a session (Invariant 6) and stay
    /// under the configured per-item token budget.
    pub fn validate_new(&self, input: &NewMemory) -> Result<()> {
        if input.session_id.as_deref().is_none_or(str::is_empty) {
            return Err(MemoryError::invalid(
                "WorkingPolicy::validate_new",
                "working memory requires a non-empty session_id",
            ));
        }
        if let Some(tokens) = input.token_count {
            if tokens > self.config.max_tokens {
                return Err(MemoryError::invalid(
                    "WorkingPolicy::validate_new",
                    format!(
                        "token_count {tokens} exceeds working memory max_tokens {}",
                        self.config.max_tokens
                    ),
                ));
            }
        }
        Ok(())
    }

    /// A working memory is expired once it has outlived `ttl_seconds` since
    /// it was last accessed.
    pub fn is_expired(&self, last_accessed_at: i64, now: i64) -> bool {
        let ttl_ms = (self.config.ttl_seconds as i64).saturating_mul(1000);
        now.saturating_sub(last_accessed_at) > ttl_ms
    }
}
