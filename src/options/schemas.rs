//! Native option schemas of the LLM backends.

use super::{convert, CanonicalField, CompletionOptions, RenameTable, TargetSchema};
use crate::error::{Error, Result};
use crate::prompt::Message;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const OPENAI_MODEL_PREFIX: &str = "openai:";

pub const LLAMACPP_RENAMES: RenameTable = &[
    (CanonicalField::Temp, "temperature"),
    (CanonicalField::Typical, "typical_p"),
    (CanonicalField::Tfs, "tfs_z"),
    (CanonicalField::RepeatPen, "repeat_penalty"),
];

pub const EXLLAMAV2_RENAMES: RenameTable = &[
    (CanonicalField::Temp, "temperature"),
    (CanonicalField::RepeatPen, "token_repetition_penalty"),
];

pub const TRANSFORMERS_RENAMES: RenameTable = &[
    (CanonicalField::Temp, "temperature"),
    (CanonicalField::MaxTokens, "max_new_tokens"),
    (CanonicalField::Typical, "typical_p"),
    (CanonicalField::RepeatPen, "repetition_penalty"),
];

pub const OPENAI_RENAMES: RenameTable = &[(CanonicalField::Temp, "temperature")];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlamaCppOptions {
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    pub min_p: f64,
    pub typical_p: f64,
    pub stop: Vec<String>,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub repeat_penalty: f64,
    pub top_k: u32,
    pub seed: i64,
    pub tfs_z: f64,
    pub mirostat_mode: u8,
    pub mirostat_tau: f64,
    pub mirostat_eta: f64,
    pub grammar: Option<String>,
}

impl TargetSchema for LlamaCppOptions {
    const NAME: &'static str = "llamacpp";

    fn fields() -> Vec<(&'static str, Option<Value>)> {
        vec![
            ("prompt", None),
            ("temperature", Some(json!(0.8))),
            ("max_tokens", Some(json!(16))),
            ("top_p", Some(json!(0.95))),
            ("min_p", Some(json!(0.05))),
            ("typical_p", Some(json!(1.0))),
            ("stop", Some(json!([]))),
            ("frequency_penalty", Some(json!(0.0))),
            ("presence_penalty", Some(json!(0.0))),
            ("repeat_penalty", Some(json!(1.1))),
            ("top_k", Some(json!(40))),
            ("seed", Some(json!(-1))),
            ("tfs_z", Some(json!(1.0))),
            ("mirostat_mode", Some(json!(0))),
            ("mirostat_tau", Some(json!(5.0))),
            ("mirostat_eta", Some(json!(0.1))),
            ("grammar", Some(Value::Null)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Exllamav2Options {
    pub prompt: String,
    pub max_tokens: u32,
    pub token_repetition_penalty: f64,
    pub token_repetition_range: i64,
    pub token_repetition_decay: f64,
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub stop: Vec<String>,
    pub min_p: f64,
    pub tfs: f64,
    pub typical: f64,
    pub temperature_last: bool,
    pub mirostat: bool,
    pub mirostat_tau: f64,
    pub mirostat_eta: f64,
    pub mirostat_mu: Option<f64>,
}

impl TargetSchema for Exllamav2Options {
    const NAME: &'static str = "exllamav2";

    fn fields() -> Vec<(&'static str, Option<Value>)> {
        vec![
            ("prompt", None),
            ("max_tokens", Some(json!(128))),
            ("token_repetition_penalty", Some(json!(1.15))),
            ("token_repetition_range", Some(json!(-1))),
            ("token_repetition_decay", Some(json!(0.0))),
            ("temperature", Some(json!(0.9))),
            ("top_k", Some(json!(40))),
            ("top_p", Some(json!(0.9))),
            ("stop", Some(json!([]))),
            ("min_p", Some(json!(0.0))),
            ("tfs", Some(json!(0.0))),
            ("typical", Some(json!(0.0))),
            ("temperature_last", Some(json!(false))),
            ("mirostat", Some(json!(false))),
            ("mirostat_tau", Some(json!(1.5))),
            ("mirostat_eta", Some(json!(0.1))),
            ("mirostat_mu", Some(Value::Null)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformersOptions {
    pub prompt: String,
    pub max_new_tokens: u32,
    pub min_new_tokens: u32,
    /// Generation time limit in seconds.
    pub max_time: f64,
    pub do_sample: bool,
    pub use_cache: bool,
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub typical_p: f64,
    pub repetition_penalty: f64,
    pub encoder_repetition_penalty: f64,
    pub guidance_scale: f64,
}

impl TargetSchema for TransformersOptions {
    const NAME: &'static str = "transformers";

    fn fields() -> Vec<(&'static str, Option<Value>)> {
        vec![
            ("max_new_tokens", Some(json!(0))),
            ("min_new_tokens", Some(json!(0))),
            ("max_time", Some(json!(10.0))),
            ("do_sample", Some(json!(true))),
            ("use_cache", Some(json!(true))),
            ("temperature", Some(json!(1.0))),
            ("top_k", Some(json!(50))),
            ("top_p", Some(json!(1.0))),
            ("typical_p", Some(json!(1.0))),
            ("repetition_penalty", Some(json!(1.0))),
            ("encoder_repetition_penalty", Some(json!(1.0))),
            ("guidance_scale", Some(json!(1.0))),
            ("prompt", None),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiOptions {
    pub model: String,
    pub messages: Vec<Message>,
    pub frequency_penalty: f64,
    pub max_tokens: u32,
    pub presence_penalty: f64,
    /// Negative means "let the service choose".
    pub seed: i64,
    pub stop: Vec<String>,
    pub temperature: f64,
    pub top_p: f64,
}

impl TargetSchema for OpenAiOptions {
    const NAME: &'static str = "openai";

    fn fields() -> Vec<(&'static str, Option<Value>)> {
        vec![
            ("model", None),
            ("messages", None),
            ("frequency_penalty", Some(json!(0.0))),
            ("max_tokens", Some(json!(56))),
            ("presence_penalty", Some(json!(0.0))),
            ("seed", Some(json!(-1))),
            ("stop", Some(json!([]))),
            ("temperature", Some(json!(0.8))),
            ("top_p", Some(json!(0.95))),
        ]
    }

    fn validate(&self) -> Result<()> {
        if self.messages.is_empty() {
            return Err(Error::OptionValidation("openai: messages must not be empty".into()));
        }
        for (name, value) in [
            ("frequency_penalty", self.frequency_penalty),
            ("presence_penalty", self.presence_penalty),
        ] {
            if !(-2.0..=2.0).contains(&value) {
                return Err(Error::OptionValidation(format!(
                    "openai: {} must be between -2 and 2, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// llama.cpp has no boolean mirostat switch; a requested mirostat selects
/// mode 1.
pub fn llamacpp_options(source: &CompletionOptions) -> Result<LlamaCppOptions> {
    let mut options: LlamaCppOptions = convert(source, LLAMACPP_RENAMES)?;
    if source.mirostat == Some(true) {
        options.mirostat_mode = 1;
    }
    Ok(options)
}

pub fn exllamav2_options(source: &CompletionOptions) -> Result<Exllamav2Options> {
    convert(source, EXLLAMAV2_RENAMES)
}

pub fn transformers_options(source: &CompletionOptions) -> Result<TransformersOptions> {
    convert(source, TRANSFORMERS_RENAMES)
}

/// A bare prompt becomes a single user message, and the routing prefix is
/// stripped from the model name.
pub fn openai_options(source: &CompletionOptions) -> Result<OpenAiOptions> {
    let mut options = match (&source.messages, &source.prompt) {
        (messages, Some(prompt))
            if messages.as_ref().map_or(true, Vec::is_empty) && !prompt.is_empty() =>
        {
            let chat = CompletionOptions {
                messages: Some(vec![Message::user(prompt.as_str())]),
                ..source.clone()
            };
            convert::<OpenAiOptions>(&chat, OPENAI_RENAMES)?
        }
        _ => convert::<OpenAiOptions>(source, OPENAI_RENAMES)?,
    };

    if let Some(model) = options.model.strip_prefix(OPENAI_MODEL_PREFIX) {
        options.model = model.to_string();
    }
    Ok(options)
}
