//! Language model provider abstractions.
//!
//! Search grounding and speech synthesis are delegated to a hosted model. The
//! two traits below are the only seams the rest of the crate depends on, which
//! keeps the chat service testable without network access.

use async_trait::async_trait;

use crate::core_types::{ReasoningMethod, SearchAnswer, VoiceGender};
use crate::errors::SearchError;

pub mod providers;

pub use providers::gemini::GeminiClient;

#[async_trait]
pub trait SearchModel: Send + Sync {
    /// Answer `prompt` using web search grounding. `images` are `data:` URLs.
    async fn search(
        &self,
        prompt: &str,
        images: &[String],
        method: ReasoningMethod,
    ) -> Result<SearchAnswer, SearchError>;
}

#[async_trait]
pub trait SpeechModel: Send + Sync {
    /// Synthesize `text` and return raw 16-bit PCM bytes.
    async fn synthesize(&self, text: &str, voice: VoiceGender) -> Result<Vec<u8>, SearchError>;
}
