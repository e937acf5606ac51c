//! LLM port: prompt in, text out.

use anyhow::Result;
use async_trait::async_trait;

pub mod http;
pub mod prompts;

pub use http::HttpLlmClient;

/// Report generation model. Implementations must tolerate prompts up to
/// roughly 200k characters.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn invoke(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}
