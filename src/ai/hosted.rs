//! Hosted API backends. These rely on the transport's default timeouts.

use serde_json::{json, Value};

use super::{text_at, AiProvider, ProviderError};
use crate::workspace::AiSettings;

fn read_json(provider: &'static str, response: ureq::Response) -> Result<Value, ProviderError> {
    response
        .into_json()
        .map_err(|e| ProviderError::malformed(provider, e.to_string()))
}

pub struct OpenAiProvider {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    model: String,
    resume_budget: usize,
}

impl OpenAiProvider {
    pub fn from_settings(settings: &AiSettings) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
            base_url: settings.effective_base_url(),
            api_key: settings.effective_api_key(),
            model: settings.effective_model(),
            resume_budget: settings.resume_budget_chars,
        }
    }
}

impl AiProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let response = self
            .agent
            .post(&format!("{}/v1/chat/completions", self.base_url))
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
                "temperature": 0.3,
            }))
            .map_err(|e| ProviderError::from_ureq("openai", e))?;
        let data = read_json("openai", response)?;
        text_at("openai", &data, "/choices/0/message/content")
    }

    fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(vec![self.model.clone()])
    }

    fn resume_budget(&self) -> usize {
        self.resume_budget
    }
}

pub struct AnthropicProvider {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    model: String,
    resume_budget: usize,
}

impl AnthropicProvider {
    pub fn from_settings(settings: &AiSettings) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
            base_url: settings.effective_base_url(),
            api_key: settings.effective_api_key(),
            model: settings.effective_model(),
            resume_budget: settings.resume_budget_chars,
        }
    }
}

impl AiProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let response = self
            .agent
            .post(&format!("{}/v1/messages", self.base_url))
            .set("Content-Type", "application/json")
            .set("x-api-key", &self.api_key)
            .set("anthropic-version", "2023-06-01")
            .send_json(json!({
                "model": self.model,
                "max_tokens": 1024,
                "messages": [{ "role": "user", "content": prompt }],
            }))
            .map_err(|e| ProviderError::from_ureq("anthropic", e))?;
        let data = read_json("anthropic", response)?;
        text_at("anthropic", &data, "/content/0/text")
    }

    fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(vec![self.model.clone()])
    }

    fn resume_budget(&self) -> usize {
        self.resume_budget
    }
}

pub struct GeminiProvider {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    model: String,
    resume_budget: usize,
}

impl GeminiProvider {
    pub fn from_settings(settings: &AiSettings) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
            base_url: settings.effective_base_url(),
            api_key: settings.effective_api_key(),
            model: settings.effective_model(),
            resume_budget: settings.resume_budget_chars,
        }
    }
}

impl AiProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let response = self
            .agent
            .post(&url)
            .query("key", &self.api_key)
            .set("Content-Type", "application/json")
            .send_json(json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
            }))
            .map_err(|e| ProviderError::from_ureq("gemini", e))?;
        let data = read_json("gemini", response)?;
        text_at("gemini", &data, "/candidates/0/content/parts/0/text")
    }

    fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(vec![self.model.clone()])
    }

    fn resume_budget(&self) -> usize {
        self.resume_budget
    }
}
