//! LLM Provider Layer
//!
//! The scoring pipeline talks to language models through the
//! [`ScoreProvider`] capability set; concrete implementations cover the
//! live HTTP client and a scripted mock for tests.

pub mod client;
pub mod mock;
pub mod provider;

pub use client::HttpScoreClient;
pub use mock::{MockOutcome, MockProvider};
pub use provider::{ModelResult, ProviderError, ScoreProvider};
