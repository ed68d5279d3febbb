//! Cost accounting
//!
//! Append-only, saturating token and call counters keyed by component.
//! `CostTracker` both records spend and enforces it: `check_budget` is the
//! gate connection discovery and PRIME extraction call before spending
//! another LLM call, returning `MemoryError::Budget` once a configured
//! ceiling is crossed.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{MemoryError, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentSpend {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub calls: u64,
}

impl ComponentSpend {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// Thread-safe, append-only spend ledger. Counters saturate rather than
/// overflow or panic, since a cost tracker should never be the reason a
/// long-running process crashes.
#[derive(Debug, Default)]
pub struct CostTracker {
    spend: Mutex<HashMap<&'static str, ComponentSpend>>,
}

impl CostTracker {
    pub fn new() -> Self {
        CostTracker {
            spend: Mutex::new(HashMap::new()),
        }
    }

    pub fn record_tokens(&self, component: &'static str, prompt_tokens: u32, completion_tokens: u32) {
        let mut spend = self.spend.lock().unwrap();
        let entry = spend.entry(component).or_default();
        entry.prompt_tokens = entry.prompt_tokens.saturating_add(prompt_tokens as u64);
        entry.completion_tokens = entry.completion_tokens.saturating_add(completion_tokens as u64);
        entry.calls = entry.calls.saturating_add(1);
    }

    pub fn spend_for(&self, component: &str) -> ComponentSpend {
        self.spend
            .lock()
            .unwrap()
            .get(component)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_tokens(&self) -> u64 {
        self.spend
            .lock()
            .unwrap()
            .values()
            .map(|s| s.total_tokens())
            .sum()
    }

    /// True once `component`'s call count in this tracker's lifetime has
    /// reached `max_calls` — the check `ConnectionManager`/PRIME use before
    /// spending another LLM call.
    pub fn calls_at_or_above(&self, component: &str, max_calls: u64) -> bool {
        self.spend_for(component).calls >= max_calls
    }

    /// Enforcement gate: `Err(MemoryError::Budget)` once `component` has
    /// already made `max_calls` calls in this tracker's lifetime, `Ok(())`
    /// otherwise. Callers check this *before* spending the next LLM call,
    /// not after — the tracker can't retroactively cancel a call already in
    /// flight.
    pub fn check_budget(&self, component: &'static str, max_calls: u64) -> Result<()> {
        if self.calls_at_or_above(component, max_calls) {
            Err(MemoryError::budget(
                component,
                format!("component {component} has reached its call budget of {max_calls}"),
            ))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_aggregates() {
        let tracker = CostTracker::new();
        tracker.record_tokens("prime", 100, 50);
        tracker.record_tokens("prime", 10, 5);
        let spend = tracker.spend_for("prime");
        assert_eq!(spend.prompt_tokens, 110);
        assert_eq!(spend.completion_tokens, 55);
        assert_eq!(spend.calls, 2);
        assert_eq!(tracker.total_tokens(), 165);
    }

    #[test]
    fn unknown_component_is_zero() {
        let tracker = CostTracker::new();
        assert_eq!(tracker.spend_for("nope").total_tokens(), 0);
        assert!(!tracker.calls_at_or_above("nope", 1));
    }

    #[test]
    fn check_budget_errs_once_the_call_ceiling_is_reached() {
        let tracker = CostTracker::new();
        assert!(tracker.check_budget("prime", 1).is_ok());
        tracker.record_tokens("prime", 10, 5);
        match tracker.check_budget("prime", 1) {
            Err(MemoryError::Budget { component, .. }) => assert_eq!(component, "prime"),
            other => panic!("expected Budget error, got {other:?}"),
        }
    }
}
