//! LLM-backed recommendations for the pricing pipeline.
//!
//! The completion service only ever sees one product's inputs and derived
//! metrics. Every failure on that path degrades to the rule-based text for
//! the affected row, so a batch never fails because the service did.

pub mod llm;
pub mod prompt;
pub mod strategy;

pub use llm::{CompletionRequest, LlmClient, LlmError, OpenAiClient};
pub use strategy::{LlmRecommender, RecommendationStrategy};
