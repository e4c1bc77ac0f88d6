//! Analysis adapter: asks a chat completions model for one fix proposal.

pub mod client;
pub mod errors;
pub mod prompt;
pub mod response;

pub use client::ChatCompletionsAnalyzer;
pub use errors::CompletionError;
