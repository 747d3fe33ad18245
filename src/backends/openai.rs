//! Remote chat-completion backend speaking the OpenAI HTTP API.

use super::completion::{text_completion, CompletionDraft, CompletionReturn, CompletionUsage};
use super::llm::{Llm, LlmBackend, LlmBackendOptions};
use crate::config::OpenAiSettings;
use crate::error::{Error, Result};
use crate::modality::BackendClient;
use crate::options::schemas::{openai_options, OPENAI_MODEL_PREFIX};
use crate::options::{CompletionOptions, OpenAiOptions};
use crate::prompt::Message;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
    frequency_penalty: f64,
    presence_penalty: f64,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
}

impl<'a> From<&'a OpenAiOptions> for ChatRequest<'a> {
    fn from(options: &'a OpenAiOptions) -> Self {
        Self {
            model: &options.model,
            messages: &options.messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
            frequency_penalty: options.frequency_penalty,
            presence_penalty: options.presence_penalty,
            stop: &options.stop,
            seed: (options.seed >= 0).then_some(options.seed),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Stateless client for the OpenAI API. "Loading" a model only records its
/// name; nothing is resident locally.
pub struct OpenAiClient {
    http: Client,
    api_key: Option<String>,
    base_url: String,
    selected: RwLock<Option<String>>,
}

impl OpenAiClient {
    pub fn new(settings: &OpenAiSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            selected: RwLock::new(None),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| Error::Config("OpenAI API key not set".into()))
    }

    async fn chat_completion(&self, options: &OpenAiOptions) -> Result<CompletionReturn> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %options.model, "requesting chat completion");

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key()?)
            .json(&ChatRequest::from(options))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference {
                backend: LlmBackend::OpenAi.to_string(),
                message: format!("{}: {}", status, body),
            });
        }

        let body: ChatResponse = response.json().await?;
        let choice = body.choices.into_iter().next().ok_or_else(|| Error::Inference {
            backend: LlmBackend::OpenAi.to_string(),
            message: "response contained no choices".into(),
        })?;

        Ok(text_completion(CompletionDraft {
            text: choice.message.content.unwrap_or_default(),
            model: body.model.unwrap_or_else(|| options.model.clone()),
            max_tokens: options.max_tokens,
            finish_reason: choice.finish_reason,
            id: body.id,
            created: body.created,
            usage: body.usage,
            ..Default::default()
        }))
    }
}

#[async_trait]
impl BackendClient<Llm> for OpenAiClient {
    fn backend(&self) -> LlmBackend {
        LlmBackend::OpenAi
    }

    async fn load_model(&self, name: &str) -> Result<()> {
        info!(model = %name, "selected remote model");
        *self.selected.write() = Some(name.to_string());
        Ok(())
    }

    async fn unload_model(&self) -> Result<()> {
        self.selected.write().take();
        Ok(())
    }

    fn convert_options(&self, request: &CompletionOptions) -> Result<LlmBackendOptions> {
        Ok(LlmBackendOptions::OpenAi(openai_options(request)?))
    }

    async fn infer(&self, options: LlmBackendOptions) -> Result<CompletionReturn> {
        match options {
            LlmBackendOptions::OpenAi(options) => self.chat_completion(&options).await,
            other => Err(Error::OptionValidation(format!(
                "openai client cannot run {} options",
                other.backend()
            ))),
        }
    }

    fn loaded_model(&self) -> Option<String> {
        self.selected.read().clone()
    }

    /// GPT models offered to this key, prefixed for routing. Without a key
    /// the catalog is empty.
    async fn list_remote_models(&self) -> Result<Vec<String>> {
        let Some(key) = self.api_key.as_deref() else {
            return Ok(Vec::new());
        };

        let list: ModelList = self
            .http
            .get(format!("{}/models", self.base_url))
            .bearer_auth(key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(list
            .data
            .into_iter()
            .filter(|m| m.id.contains("gpt"))
            .map(|m| format!("{}{}", OPENAI_MODEL_PREFIX, m.id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(key: Option<&str>) -> OpenAiSettings {
        OpenAiSettings {
            api_key: key.map(str::to_string),
            base_url: "http://127.0.0.1:9/v1/".into(),
            timeout_secs: 1,
        }
    }

    #[tokio::test]
    async fn test_no_key_means_empty_catalog() {
        let client = OpenAiClient::new(&settings(None)).unwrap();
        assert!(client.list_remote_models().await.unwrap().is_empty());
        assert!(!client.has_api_key());
    }

    #[tokio::test]
    async fn test_selection_is_bookkeeping_only() {
        let client = OpenAiClient::new(&settings(Some("sk-test"))).unwrap();
        client.load_model("openai:gpt-4").await.unwrap();
        assert_eq!(client.loaded_model().as_deref(), Some("openai:gpt-4"));
        client.unload_model().await.unwrap();
        assert!(!client.is_loaded());
    }

    #[test]
    fn test_chat_request_omits_unset_seed() {
        let options = OpenAiOptions {
            model: "gpt-4".into(),
            messages: vec![Message::user("Hi")],
            frequency_penalty: 0.0,
            max_tokens: 56,
            presence_penalty: 0.0,
            seed: -1,
            stop: Vec::new(),
            temperature: 0.8,
            top_p: 0.95,
        };
        let body = serde_json::to_value(ChatRequest::from(&options)).unwrap();
        assert!(body.get("seed").is_none());
        assert!(body.get("stop").is_none());
        assert_eq!(body["messages"][0]["content"], "Hi");
    }

    #[tokio::test]
    async fn test_rejects_foreign_options() {
        let client = OpenAiClient::new(&settings(Some("sk-test"))).unwrap();
        let foreign = LlmBackend::LlamaCpp
            .convert(&CompletionOptions::with_prompt("Hi"))
            .unwrap();
        assert!(matches!(
            client.infer(foreign).await,
            Err(Error::OptionValidation(_))
        ));
    }
}
