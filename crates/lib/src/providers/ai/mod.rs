pub mod gemini;
pub mod local;

use crate::errors::ProviderError;
use async_trait::async_trait;
use dyn_clone::DynClone;
use std::fmt::Debug;

/// A trait for interacting with an AI provider.
///
/// This defines the one interface the summarizer needs from a Large Language
/// Model: hand over a system and a user prompt, get text back. Adapters for
/// concrete APIs (Gemini, OpenAI-compatible local servers) live beside it.
#[async_trait]
pub trait AiProvider: Send + Sync + Debug + DynClone {
    /// Generates a response from a given system and user prompt.
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, ProviderError>;
}

dyn_clone::clone_trait_object!(AiProvider);
