//! Lazy decay
//!
//! Resonance is never stored as "the current value" — it is computed at
//! read time from the last persisted snapshot, and the resulting writes are
//! coalesced through a batch processor so bursty reads don't storm the
//! storage provider.

mod batch;
mod calculator;

pub use batch::{BatchError, LazyDecayBatchProcessor, LazyDecayBatchProcessorConfig};
pub use calculator::{DecayOutcome, LazyDecayCalculator, LazyDecayCalculatorConfig};
