//! PRIME extraction: turn structured LLM output into candidate memories.

mod extractor;
mod orchestrator;
pub mod rules;

pub use extractor::PrimeExtractor;
pub use orchestrator::{select_tier, PrimeOrchestrator};
