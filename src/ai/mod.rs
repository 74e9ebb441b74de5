//! AI backend adapters.
//!
//! Every backend implements [`AiProvider`]; the variant is chosen once from
//! [`AiSettings`] by [`build_provider`]. Backends only implement the raw
//! completion call. The two capability operations, [`AiProvider::generate_answer`]
//! and [`AiProvider::extract_profile`], are provided here and convert every
//! failure into `None`.

mod error;
mod hosted;
mod local;
pub mod prompt;

pub use error::ProviderError;
pub use hosted::{AnthropicProvider, GeminiProvider, OpenAiProvider};
pub use local::OllamaProvider;

use serde_json::Value;
use std::sync::Arc;

use crate::workspace::{AiSettings, ProviderKind};

pub trait AiProvider: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Sends one prompt and returns the raw completion text.
    fn complete(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Models the backend can serve.
    fn list_models(&self) -> Result<Vec<String>, ProviderError>;

    /// Character budget applied to resume text before extraction.
    fn resume_budget(&self) -> usize {
        15_000
    }

    /// Free-form completion. `None` on any failure.
    fn generate_answer(&self, prompt: &str) -> Option<String> {
        log::info!("[AI] Asking {}...", self.name());
        match self.complete(prompt) {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => {
                log::warn!("[AI] {} returned an empty completion", self.name());
                None
            }
            Err(err) => {
                log::error!("[AI] Answer generation failed: {err}");
                None
            }
        }
    }

    /// Structured profile extraction. `None` when the call fails or the
    /// response does not parse as a JSON object; no partial record is kept.
    fn extract_profile(&self, resume_text: &str) -> Option<Value> {
        let prompt = prompt::build_extraction_prompt(resume_text, self.resume_budget());
        log::info!("[AI] Extracting profile via {}...", self.name());
        let raw = match self.complete(&prompt) {
            Ok(raw) => raw,
            Err(err) => {
                log::error!("[AI] Profile extraction failed: {err}");
                return None;
            }
        };
        let cleaned = prompt::sanitize_structured_output(&raw);
        match serde_json::from_str::<Value>(&cleaned) {
            Ok(value @ Value::Object(_)) => Some(value),
            Ok(_) => {
                log::error!("[AI] Extraction response was not a JSON object");
                None
            }
            Err(err) => {
                log::error!("[AI] Extraction response did not parse: {err}");
                None
            }
        }
    }
}

/// Builds the configured backend.
pub fn build_provider(settings: &AiSettings) -> Arc<dyn AiProvider> {
    log::info!(
        "[AI] Using {} ({})",
        settings.provider.as_str(),
        settings.effective_model()
    );
    match settings.provider {
        ProviderKind::Ollama => Arc::new(OllamaProvider::from_settings(settings)),
        ProviderKind::Openai => Arc::new(OpenAiProvider::from_settings(settings)),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::from_settings(settings)),
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_settings(settings)),
    }
}

/// Pulls a trimmed string out of a JSON response by pointer.
pub(crate) fn text_at(provider: &'static str, data: &Value, pointer: &str) -> Result<String, ProviderError> {
    match data.pointer(pointer) {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Some(Value::String(_)) => Err(ProviderError::Empty { provider }),
        Some(_) => Err(ProviderError::malformed(provider, format!("{pointer} is not a string"))),
        None => Err(ProviderError::malformed(provider, format!("missing {pointer}"))),
    }
}
