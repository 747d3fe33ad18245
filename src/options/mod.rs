//! Canonical completion options and their translation to backend schemas.
//!
//! Callers fill in [`CompletionOptions`], leaving unset what they do not care
//! about. [`convert`] walks the canonical fields in a fixed order, renames the
//! ones a backend spells differently, fills the rest of the target from its
//! declared defaults and validates the result by deserializing it into the
//! target type.

pub mod schemas;

use crate::error::{Error, Result};
use crate::prompt::Message;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use schemas::{
    Exllamav2Options, LlamaCppOptions, OpenAiOptions, TransformersOptions, EXLLAMAV2_RENAMES,
    LLAMACPP_RENAMES, OPENAI_RENAMES, TRANSFORMERS_RENAMES,
};

/// Canonical option names, in the order conversion visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Model,
    Prompt,
    Messages,
    Temp,
    MaxTokens,
    TopP,
    MinP,
    TopK,
    Typical,
    Tfs,
    RepeatPen,
    Mirostat,
    MirostatTau,
    MirostatEta,
    Stop,
    FrequencyPenalty,
    PresencePenalty,
    Seed,
    Grammar,
    TokenRepetitionRange,
    TokenRepetitionDecay,
    TemperatureLast,
    MirostatMu,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 23] = [
        CanonicalField::Model,
        CanonicalField::Prompt,
        CanonicalField::Messages,
        CanonicalField::Temp,
        CanonicalField::MaxTokens,
        CanonicalField::TopP,
        CanonicalField::MinP,
        CanonicalField::TopK,
        CanonicalField::Typical,
        CanonicalField::Tfs,
        CanonicalField::RepeatPen,
        CanonicalField::Mirostat,
        CanonicalField::MirostatTau,
        CanonicalField::MirostatEta,
        CanonicalField::Stop,
        CanonicalField::FrequencyPenalty,
        CanonicalField::PresencePenalty,
        CanonicalField::Seed,
        CanonicalField::Grammar,
        CanonicalField::TokenRepetitionRange,
        CanonicalField::TokenRepetitionDecay,
        CanonicalField::TemperatureLast,
        CanonicalField::MirostatMu,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::Model => "model",
            CanonicalField::Prompt => "prompt",
            CanonicalField::Messages => "messages",
            CanonicalField::Temp => "temp",
            CanonicalField::MaxTokens => "max_tokens",
            CanonicalField::TopP => "top_p",
            CanonicalField::MinP => "min_p",
            CanonicalField::TopK => "top_k",
            CanonicalField::Typical => "typical",
            CanonicalField::Tfs => "tfs",
            CanonicalField::RepeatPen => "repeat_pen",
            CanonicalField::Mirostat => "mirostat",
            CanonicalField::MirostatTau => "mirostat_tau",
            CanonicalField::MirostatEta => "mirostat_eta",
            CanonicalField::Stop => "stop",
            CanonicalField::FrequencyPenalty => "frequency_penalty",
            CanonicalField::PresencePenalty => "presence_penalty",
            CanonicalField::Seed => "seed",
            CanonicalField::Grammar => "grammar",
            CanonicalField::TokenRepetitionRange => "token_repetition_range",
            CanonicalField::TokenRepetitionDecay => "token_repetition_decay",
            CanonicalField::TemperatureLast => "temperature_last",
            CanonicalField::MirostatMu => "mirostat_mu",
        }
    }
}

/// Canonical fields a backend spells differently, with the backend's name.
pub type RenameTable = &'static [(CanonicalField, &'static str)];

/// Backend-neutral completion request. `None` means "not set by the caller".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typical: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tfs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_pen: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirostat: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirostat_tau: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirostat_eta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grammar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_repetition_range: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_repetition_decay: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_last: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirostat_mu: Option<f64>,
}

impl CompletionOptions {
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Default::default()
        }
    }

    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Some(messages),
            ..Default::default()
        }
    }

    /// A request is usable when it carries a non-empty prompt or at least
    /// one message.
    pub fn has_prompt(&self) -> bool {
        self.prompt.as_deref().map_or(false, |p| !p.is_empty())
            || self.messages.as_ref().map_or(false, |m| !m.is_empty())
    }

    /// Canonical fields the caller set, keyed by canonical name.
    pub fn explicit_values(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::Serialization(format!(
                "completion options serialized to {} instead of an object",
                other
            ))),
        }
    }
}

/// A backend's native option schema.
pub trait TargetSchema: Serialize + DeserializeOwned {
    /// Backend name used in validation errors.
    const NAME: &'static str;

    /// Every field the backend accepts with its default. `None` marks a
    /// required field.
    fn fields() -> Vec<(&'static str, Option<Value>)>;

    /// Constraints that deserialization alone cannot express.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

fn declares(fields: &[(&'static str, Option<Value>)], name: &str) -> bool {
    fields.iter().any(|(field, _)| *field == name)
}

fn default_for<'a>(fields: &'a [(&'static str, Option<Value>)], name: &str) -> Option<&'a Value> {
    fields
        .iter()
        .find(|(field, _)| *field == name)
        .and_then(|(_, default)| default.as_ref())
}

/// Translate `source` into the backend schema `T`.
///
/// For each canonical field in order: a renamed field is copied under its
/// backend name when the caller set it and `T` declares the new name; an
/// unrenamed field `T` declares takes the caller's value or `T`'s default;
/// anything else is dropped. Remaining fields of `T` take their defaults.
pub fn convert<T: TargetSchema>(source: &CompletionOptions, renames: RenameTable) -> Result<T> {
    if !source.has_prompt() {
        return Err(Error::MissingPrompt);
    }

    let explicit = source.explicit_values()?;
    let fields = T::fields();
    let mut assembled = Map::new();

    for field in CanonicalField::ALL {
        let key = field.as_str();
        match renames.iter().find(|(canonical, _)| *canonical == field) {
            Some((_, renamed)) => {
                if declares(&fields, renamed) {
                    if let Some(value) = explicit.get(key) {
                        assembled.insert((*renamed).to_string(), value.clone());
                    }
                }
            }
            None if declares(&fields, key) => {
                if let Some(value) = explicit.get(key).or_else(|| default_for(&fields, key)) {
                    assembled.insert(key.to_string(), value.clone());
                }
            }
            None => {}
        }
    }

    for (name, default) in &fields {
        if let Some(default) = default {
            assembled
                .entry((*name).to_string())
                .or_insert_with(|| default.clone());
        }
    }

    let options: T = serde_json::from_value(Value::Object(assembled))
        .map_err(|e| Error::OptionValidation(format!("{}: {}", T::NAME, e)))?;
    options.validate()?;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_values_only_contain_set_fields() {
        let options = CompletionOptions {
            temp: Some(0.5),
            ..CompletionOptions::with_prompt("Hi")
        };
        let explicit = options.explicit_values().unwrap();
        let mut keys: Vec<_> = explicit.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["prompt".to_string(), "temp".to_string()]);
    }

    #[test]
    fn test_has_prompt() {
        assert!(!CompletionOptions::default().has_prompt());
        assert!(!CompletionOptions::with_prompt("").has_prompt());
        assert!(!CompletionOptions::with_messages(Vec::new()).has_prompt());
        assert!(CompletionOptions::with_messages(vec![Message::user("x")]).has_prompt());
    }

    #[test]
    fn test_canonical_names_are_unique() {
        let mut names: Vec<_> = CanonicalField::ALL.iter().map(|f| f.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), CanonicalField::ALL.len());
    }
}
