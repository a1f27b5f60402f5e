pub mod gemini;
pub mod local;

use crate::errors::PromptError;
use crate::types::{ChatMessage, SamplingParams};
use async_trait::async_trait;
use dyn_clone::DynClone;
use std::fmt::Debug;

/// A trait for interacting with a text-completion service.
///
/// Implementations wrap a concrete Large Language Model API (e.g., Gemini, an
/// OpenAI-compatible local server). The conversation pipeline only ever sees
/// the returned text.
#[async_trait]
pub trait AiProvider: Send + Sync + Debug + DynClone {
    /// Sends `message` as the next user message of a chat that already contains
    /// `history`, under the given system instruction.
    async fn chat(
        &self,
        system_instruction: &str,
        history: &[ChatMessage],
        message: &str,
        params: &SamplingParams,
    ) -> Result<String, PromptError>;

    /// Single-shot completion of a self-contained prompt.
    async fn complete(&self, prompt: &str, params: &SamplingParams) -> Result<String, PromptError> {
        self.chat("", &[], prompt, params).await
    }
}

dyn_clone::clone_trait_object!(AiProvider);
