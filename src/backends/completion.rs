//! OpenAI-style `text_completion` envelope shared by every LLM backend.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub text: String,
    pub index: u32,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReturn {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    pub usage: CompletionUsage,
}

impl CompletionReturn {
    pub fn text(&self) -> &str {
        self.choices.first().map_or("", |c| c.text.as_str())
    }
}

/// Raw result of one generation, before it is wrapped.
#[derive(Debug, Clone, Default)]
pub struct CompletionDraft {
    pub text: String,
    pub model: String,
    /// Tokens generated, when the engine reports it.
    pub tokens: u32,
    pub max_tokens: u32,
    /// Reason reported by the engine; "length" when absent.
    pub finish_reason: Option<String>,
    /// Fields copied from an upstream envelope, when there is one.
    pub id: Option<String>,
    pub created: Option<i64>,
    pub usage: Option<CompletionUsage>,
}

impl CompletionDraft {
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Wrap a generation result. A run that produced some tokens but stopped
/// short of `max_tokens` finished on a stop condition.
pub fn text_completion(draft: CompletionDraft) -> CompletionReturn {
    let mut finish_reason = draft.finish_reason.unwrap_or_else(|| "length".to_string());
    if draft.tokens > 0 && draft.tokens < draft.max_tokens {
        finish_reason = "stop".to_string();
    }

    let mut usage = draft.usage.unwrap_or_default();
    if draft.tokens > 0 && usage.completion_tokens == 0 {
        usage.completion_tokens = draft.tokens;
    }
    if usage.total_tokens == 0 {
        usage.total_tokens = usage.prompt_tokens + usage.completion_tokens;
    }

    CompletionReturn {
        id: draft.id.unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
        object: "text_completion".to_string(),
        created: draft.created.unwrap_or_else(|| Utc::now().timestamp()),
        model: draft.model,
        choices: vec![CompletionChoice {
            text: draft.text,
            index: 0,
            finish_reason,
        }],
        usage,
    }
}
