//! Error taxonomy
//!
//! Every fallible operation in this crate returns [`MemoryError`], a single
//! `#[non_exhaustive]` enum covering the five categories the rest of the
//! crate is built around: `Invalid`, `NotSupported`, `Transient`,
//! `Permanent`, and `Budget`. Overflow conditions (pending-map eviction,
//! discovery-queue drops) are intentionally *not* represented here — they
//! are logged via `tracing::warn!` with counters and never propagated to a
//! caller.

use thiserror::Error;

/// The crate-wide result alias.
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Unified error type returned by every public operation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Bad caller input: empty ids, out-of-range importance, unknown type.
    /// Always reported before any I/O is attempted.
    #[error("invalid input in {component}: {reason}")]
    Invalid {
        component: &'static str,
        reason: String,
    },

    /// The configured `StorageProvider` lacks a capability this operation
    /// requires (e.g. no memory ops, no batch update, no hybrid search).
    #[error("{component} requires {capability}, which the storage provider does not support")]
    NotSupported {
        component: &'static str,
        capability: &'static str,
    },

    /// Timeout, rate limit, or transport error. Retried locally where a
    /// retry budget exists; surfaced to the caller once that budget is
    /// exhausted.
    #[error("transient error in {component} (memory {memory_id:?}): {source}")]
    Transient {
        component: &'static str,
        memory_id: Option<String>,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Schema validation failure or data corruption. Logged and attributed,
    /// never retried.
    #[error("permanent error in {component} (memory {memory_id:?}): {reason}")]
    Permanent {
        component: &'static str,
        memory_id: Option<String>,
        reason: String,
    },

    /// A cost or rate budget was exceeded. Callers should expect a
    /// downgrade path (e.g. skip LLM classification) rather than a hard
    /// failure of previously stored state.
    #[error("budget exceeded in {component}: {reason}")]
    Budget {
        component: &'static str,
        reason: String,
    },
}

impl MemoryError {
    pub fn invalid(component: &'static str, reason: impl Into<String>) -> Self {
        MemoryError::Invalid {
            component,
            reason: reason.into(),
        }
    }

    pub fn not_supported(component: &'static str, capability: &'static str) -> Self {
        MemoryError::NotSupported {
            component,
            capability,
        }
    }

    pub fn transient(
        component: &'static str,
        memory_id: Option<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        MemoryError::Transient {
            component,
            memory_id,
            source: Box::new(source),
        }
    }

    pub fn permanent(
        component: &'static str,
        memory_id: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        MemoryError::Permanent {
            component,
            memory_id,
            reason: reason.into(),
        }
    }

    pub fn budget(component: &'static str, reason: impl Into<String>) -> Self {
        MemoryError::Budget {
            component,
            reason: reason.into(),
        }
    }

    /// True for categories that a background worker should retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MemoryError::Transient { .. })
    }
}

/// Validate that a user/agent scoping pair is non-empty.
///
/// Every read and write on the façade runs this first;
/// violations fail before any I/O.
pub fn require_scoped(component: &'static str, user_id: &str, agent_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(MemoryError::invalid(component, "user_id must not be empty"));
    }
    if agent_id.trim().is_empty() {
        return Err(MemoryError::invalid(component, "agent_id must not be empty"));
    }
    Ok(())
}
