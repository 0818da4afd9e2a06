use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embed::resolve_endpoint;
use crate::error::{RagError, Result};

/// Text generation capability: one prompt in, one completion out.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    pub fn from_env(system_prompt: String) -> anyhow::Result<Self> {
        let base_url = dotenv::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:1234/v1".to_string());
        let model =
            dotenv::var("LLM_MODEL").unwrap_or_else(|_| "openai/gpt-oss-120b".to_string());
        let api_key = dotenv::var("LLM_API_KEY").ok().filter(|k| !k.is_empty());

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            model,
            api_key,
            system_prompt,
            temperature: 0.2,
            max_tokens: 512,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        resolve_endpoint(&self.base_url, "chat/completions")
    }

    /// Non-streaming chat completion.
    pub async fn chat(&self, messages: &[Message]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "top_p": 1,
            "stream": false,
        });

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| RagError::GenerationFailure(format!("LLM request failed: {}", e)))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| RagError::GenerationFailure(format!("Failed to read LLM response: {}", e)))?;
        if !status.is_success() {
            return Err(RagError::GenerationFailure(format!(
                "LLM endpoint returned {}: {}",
                status, text
            )));
        }

        let content = extract_content(&text)?;
        debug!(model = %self.model, answer_len = content.len(), "LLM completion received");
        Ok(content)
    }
}

/// Pull `choices[0].message.content` out of a chat completion body (null reads as empty).
fn extract_content(body: &str) -> Result<String> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| RagError::GenerationFailure(format!("Failed to parse LLM JSON: {}", e)))?;

    Ok(json["choices"]
        .get(0)
        .and_then(|c| c["message"]["content"].as_str())
        .unwrap_or("")
        .to_string())
}

#[async_trait]
impl Generator for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let messages = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(prompt),
        ];
        self.chat(&messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"8.5% p.a."}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "8.5% p.a.");
    }

    #[test]
    fn test_extract_content_null_is_empty() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "");
        assert_eq!(extract_content(r#"{"choices":[]}"#).unwrap(), "");
    }

    #[test]
    fn test_extract_content_rejects_non_json() {
        assert!(matches!(
            extract_content("<html>bad gateway</html>"),
            Err(RagError::GenerationFailure(_))
        ));
    }

    #[test]
    fn test_message_roles() {
        assert_eq!(Message::system("s").role, "system");
        assert_eq!(Message::user("u").role, "user");
    }
}
