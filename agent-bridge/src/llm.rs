//! LLM / VLM client interface (§6).

use agent_config::LlmConfig;
use agent_core::error::AgentError;
use async_trait::async_trait;
use serde_json::json;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, prompt: &str) -> Result<String, AgentError>;
    async fn vision(&self, prompt: &str, image_base64: &str) -> Result<String, AgentError>;
}

/// An OpenAI-chat-completions-shaped client, sufficient for both the text
/// and vision endpoints (the vision call embeds the base64 image as an
/// image_url content part). The request/response framing here is
/// incidental scaffolding around the out-of-scope endpoints; only the
/// `chat`/`vision` trait signatures are load-bearing.
pub struct ReqwestLlmClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl ReqwestLlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl LlmClient for ReqwestLlmClient {
    async fn chat(&self, prompt: &str) -> Result<String, AgentError> {
        let body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [{"role": "user", "content": prompt}],
        });
        send_chat_completion(&self.http, &self.config, body).await
    }

    async fn vision(&self, prompt: &str, image_base64: &str) -> Result<String, AgentError> {
        let body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": prompt},
                    {"type": "image_url", "image_url": {"url": format!("data:image/png;base64,{image_base64}")}},
                ],
            }],
        });
        send_chat_completion(&self.http, &self.config, body).await
    }
}

async fn send_chat_completion(
    http: &reqwest::Client,
    config: &LlmConfig,
    body: serde_json::Value,
) -> Result<String, AgentError> {
    let response = http
        .post(format!("{}/chat/completions", config.base_url))
        .bearer_auth(&config.api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| AgentError::Fatal(format!("llm request failed: {e}")))?;

    let payload: serde_json::Value = response
        .json()
        .await
        .map_err(|e| AgentError::Fatal(format!("llm response was not JSON: {e}")))?;

    payload
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| AgentError::Fatal("llm response missing choices[0].message.content".to_string()))
}
