use super::ModalityService;
use crate::backends::llm::is_chat_model;
use crate::backends::{CompletionReturn, Llm, LlmBackend};
use crate::error::{Error, Result};
use crate::modality::Modality;
use crate::options::CompletionOptions;
use crate::prompt::{parts_to_prompt, render_messages, PromptParts};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A completion request: canonical options plus optional structured parts
/// that are rendered into the prompt or message list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    #[serde(flatten)]
    pub options: CompletionOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<PromptParts>,
    /// Text the model's answer should start with.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix_response: String,
}

impl ModalityService<Llm> {
    /// Resolve the model, render prompt parts for it, make sure it is active
    /// and run the completion. Remote chat models are called directly
    /// without changing the active local model.
    pub async fn complete(&self, request: CompletionRequest) -> Result<CompletionReturn> {
        let manager = self.manager();
        let mut options = request.options;

        let model = options
            .model
            .clone()
            .filter(|m| !m.is_empty())
            .or_else(|| manager.active_model_name())
            .or_else(|| manager.settings().default_model().map(str::to_string))
            .ok_or(Error::NoDefaultModel { modality: Llm::NAME })?;
        options.model = Some(model.clone());

        if let Some(parts) = &request.parts {
            if is_chat_model(&model) {
                options.messages = Some(render_messages(parts, &request.prefix_response));
            } else {
                options.prompt = Some(parts_to_prompt(parts, &model, &request.prefix_response)?);
            }
        }
        if !options.has_prompt() {
            return Err(Error::MissingPrompt);
        }

        let backend = manager.pick_client(&model);
        if backend == LlmBackend::OpenAi {
            debug!(model = %model, "remote completion");
            return manager.infer_on(backend, &options).await;
        }

        if manager.active_model_name().as_deref() != Some(model.as_str()) {
            if let Err(e) = manager.unload_model().await {
                warn!("unload before switching models failed: {}", e);
            }
            manager.load_model(Some(&model)).await?;
        }

        manager.infer(&options).await
    }
}
