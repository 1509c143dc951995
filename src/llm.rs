use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;

/// Produces free-text replies for messages that are not commands.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate_response(&self, message: &str, wa_id: &str, name: &str) -> Result<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn build_messages(&self, message: &str, name: &str) -> Vec<ChatMessage> {
        let mut system_prompt = self.config.system_prompt.clone();
        if !name.is_empty() {
            system_prompt.push_str(&format!("\n\nYou are talking to {}.", name));
        }

        vec![
            ChatMessage {
                role: "system".to_string(),
                content: Some(system_prompt),
            },
            ChatMessage {
                role: "user".to_string(),
                content: Some(message.to_string()),
            },
        ]
    }

    pub async fn chat(&self, messages: Vec<ChatMessage>, user: Option<&str>) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            user: user.map(str::to_string),
        };

        let url = format!(
            "{}/chat/completions",
            self.config.effective_base_url().trim_end_matches('/')
        );
        let provider = &self.config.provider;

        debug!("Sending request to {}: {}", provider, url);

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request);
        if !self.config.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", provider))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("{} API error ({}): {}", provider, status, error_body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", provider))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .with_context(|| format!("No response from {}", provider))
    }
}

#[async_trait]
impl ResponseGenerator for LlmClient {
    async fn generate_response(&self, message: &str, wa_id: &str, name: &str) -> Result<String> {
        let messages = self.build_messages(message, name);
        self.chat(messages, Some(wa_id)).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::LlmProvider;
    use std::sync::Mutex;

    /// Records every call and answers with a fixed reply, or fails when built with `failing`.
    pub(crate) struct MockGenerator {
        reply: Option<String>,
        calls: Mutex<Vec<(String, String, String)>>,
    }

    impl MockGenerator {
        pub(crate) fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                reply: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> Vec<(String, String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResponseGenerator for MockGenerator {
        async fn generate_response(
            &self,
            message: &str,
            wa_id: &str,
            name: &str,
        ) -> Result<String> {
            self.calls.lock().unwrap().push((
                message.to_string(),
                wa_id.to_string(),
                name.to_string(),
            ));
            self.reply
                .clone()
                .context("generator unavailable")
        }
    }

    fn config(base_url: &str) -> LlmConfig {
        LlmConfig {
            provider: LlmProvider::Openai,
            model: "gpt-4o-mini".to_string(),
            base_url: base_url.to_string(),
            api_key: "sk-test".to_string(),
            max_tokens: 256,
            system_prompt: "Be brief.".to_string(),
        }
    }

    #[test]
    fn test_system_prompt_mentions_name() {
        let client = LlmClient::new(config("http://unused"));
        let messages = client.build_messages("hello", "Ana");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.as_deref().unwrap().ends_with("talking to Ana."));
        assert_eq!(messages[1].content.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_generate_response_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "gpt-4o-mini",
                "user": "16505551234"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "choices": [{ "message": { "role": "assistant", "content": "Hi Ana!" } }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = LlmClient::new(config(&server.url()));
        let reply = client
            .generate_response("hello", "16505551234", "Ana")
            .await
            .unwrap();

        assert_eq!(reply, "Hi Ana!");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_response_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let client = LlmClient::new(config(&server.url()));
        let err = client
            .generate_response("hello", "1", "Ana")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn test_generate_response_no_choices() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let client = LlmClient::new(config(&server.url()));
        let err = client
            .generate_response("hello", "1", "Ana")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No response"));
    }
}
