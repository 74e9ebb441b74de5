use serde_json::{json, Value};
use std::time::Duration;

use super::{text_at, AiProvider, ProviderError};
use crate::workspace::AiSettings;

const PROVIDER: &str = "ollama";

/// Local inference server. Every call is hard-bounded by the configured timeout.
pub struct OllamaProvider {
    agent: ureq::Agent,
    base_url: String,
    model: String,
    resume_budget: usize,
}

impl OllamaProvider {
    pub fn from_settings(settings: &AiSettings) -> Self {
        let timeout = Duration::from_secs(settings.local_timeout_secs.max(1));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .build();
        Self {
            agent,
            base_url: settings.effective_base_url(),
            model: settings.effective_model(),
            resume_budget: settings.resume_budget_chars,
        }
    }
}

impl AiProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        log::debug!("[AI] POST {url} ({})", self.model);
        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_json(json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
            }))
            .map_err(|e| ProviderError::from_ureq(PROVIDER, e))?;
        let data: Value = response
            .into_json()
            .map_err(|e| ProviderError::malformed(PROVIDER, e.to_string()))?;
        text_at(PROVIDER, &data, "/response")
    }

    fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| ProviderError::from_ureq(PROVIDER, e))?;
        let data: Value = response
            .into_json()
            .map_err(|e| ProviderError::malformed(PROVIDER, e.to_string()))?;
        let models = data
            .get("models")
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::malformed(PROVIDER, "missing models array"))?;
        Ok(models
            .iter()
            .filter_map(|m| m.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    fn resume_budget(&self) -> usize {
        self.resume_budget
    }
}
