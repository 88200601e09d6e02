//! LLM module - model backends and failover
//!
//! Provides the provider abstraction, vendor implementations, retry with
//! backoff, and the adapter that switches to a secondary provider.

pub mod failover;
pub mod provider;
pub mod retry;
pub mod traits;

pub use failover::ProviderAdapter;
pub use provider::create_provider;
pub use traits::{GenerateOptions, ModelRequest, ModelTurn, Provider, TokenUsage};
