//! Large language model modality.

use super::completion::CompletionReturn;
use super::local::{LocalWeightsClient, ModelLayout};
use crate::error::{Error, Result};
use crate::modality::{LocalRuntime, Modality, NamePattern, Route};
use crate::options::schemas::{
    exllamav2_options, llamacpp_options, openai_options, transformers_options, OPENAI_MODEL_PREFIX,
};
use crate::options::{
    CompletionOptions, Exllamav2Options, LlamaCppOptions, OpenAiOptions, TransformersOptions,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Weights file extensions listed as loadable models.
pub const WEIGHTS_EXTENSIONS: &[&str] = &["gguf", "ggml", "safetensor"];

/// Directory-name markers for formats loaded as a whole directory.
pub const DIRECTORY_FORMATS: &[&str] = &["awq", "gptq", "exl2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    LlamaCpp,
    Exllamav2,
    Transformers,
    OpenAi,
}

impl LlmBackend {
    pub const ALL: [LlmBackend; 4] = [
        LlmBackend::LlamaCpp,
        LlmBackend::Exllamav2,
        LlmBackend::Transformers,
        LlmBackend::OpenAi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LlmBackend::LlamaCpp => "llamacpp",
            LlmBackend::Exllamav2 => "exllamav2",
            LlmBackend::Transformers => "transformers",
            LlmBackend::OpenAi => "openai",
        }
    }

    /// Translate canonical options into this backend's schema.
    pub fn convert(self, options: &CompletionOptions) -> Result<LlmBackendOptions> {
        Ok(match self {
            LlmBackend::LlamaCpp => LlmBackendOptions::LlamaCpp(llamacpp_options(options)?),
            LlmBackend::Exllamav2 => LlmBackendOptions::Exllamav2(exllamav2_options(options)?),
            LlmBackend::Transformers => {
                LlmBackendOptions::Transformers(transformers_options(options)?)
            }
            LlmBackend::OpenAi => LlmBackendOptions::OpenAi(openai_options(options)?),
        })
    }
}

impl fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        LlmBackend::ALL
            .into_iter()
            .find(|b| b.as_str() == s.to_lowercase())
            .ok_or_else(|| Error::InvalidInput(format!("unknown LLM backend '{}'", s)))
    }
}

/// Options in the native schema of one LLM backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LlmBackendOptions {
    LlamaCpp(LlamaCppOptions),
    Exllamav2(Exllamav2Options),
    Transformers(TransformersOptions),
    OpenAi(OpenAiOptions),
}

impl LlmBackendOptions {
    pub fn backend(&self) -> LlmBackend {
        match self {
            LlmBackendOptions::LlamaCpp(_) => LlmBackend::LlamaCpp,
            LlmBackendOptions::Exllamav2(_) => LlmBackend::Exllamav2,
            LlmBackendOptions::Transformers(_) => LlmBackend::Transformers,
            LlmBackendOptions::OpenAi(_) => LlmBackend::OpenAi,
        }
    }

    /// Generation budget the backend will use.
    pub fn max_tokens(&self) -> u32 {
        match self {
            LlmBackendOptions::LlamaCpp(o) => o.max_tokens,
            LlmBackendOptions::Exllamav2(o) => o.max_tokens,
            LlmBackendOptions::Transformers(o) => o.max_new_tokens,
            LlmBackendOptions::OpenAi(o) => o.max_tokens,
        }
    }
}

pub struct Llm;

static LLM_ROUTES: [Route<LlmBackend>; 3] = [
    Route::contains(OPENAI_MODEL_PREFIX, LlmBackend::OpenAi),
    Route::directory(NamePattern::AnyOf(&["gptq", "exl2"]), LlmBackend::Exllamav2),
    Route::directory(NamePattern::Contains("awq"), LlmBackend::Transformers),
];

impl Modality for Llm {
    const NAME: &'static str = "llm";

    type Backend = LlmBackend;
    type Request = CompletionOptions;
    type Options = LlmBackendOptions;
    type Output = CompletionReturn;

    fn routes() -> &'static [Route<LlmBackend>] {
        &LLM_ROUTES
    }

    fn fallback() -> LlmBackend {
        LlmBackend::LlamaCpp
    }

    fn list_local_models(models_dir: Option<&Path>) -> Result<Vec<String>> {
        match models_dir {
            Some(dir) if dir.is_dir() => list_weights(dir),
            _ => Ok(Vec::new()),
        }
    }
}

fn has_weights_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| WEIGHTS_EXTENSIONS.contains(&ext))
}

/// Weights files at the top level, whole directories for directory formats,
/// and `dir/file` entries for weights files inside other directories.
fn list_weights(models_dir: &Path) -> Result<Vec<String>> {
    let mut models = Vec::new();

    for entry in fs::read_dir(models_dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        if path.is_dir() {
            let lowered = name.to_lowercase();
            if DIRECTORY_FORMATS.iter().any(|f| lowered.contains(f)) {
                models.push(name);
                continue;
            }
            for sub in fs::read_dir(&path)? {
                let sub = sub?;
                if sub.path().is_file() && has_weights_extension(&sub.path()) {
                    models.push(format!("{}/{}", name, sub.file_name().to_string_lossy()));
                }
            }
        } else if has_weights_extension(&path) {
            models.push(name);
        }
    }

    Ok(models)
}

fn local_client(
    backend: LlmBackend,
    layout: ModelLayout,
    models_dir: Option<PathBuf>,
    runtime: Arc<dyn LocalRuntime<Llm>>,
) -> LocalWeightsClient<Llm> {
    LocalWeightsClient::new(
        backend,
        layout,
        models_dir,
        Arc::new(move |request: &CompletionOptions| backend.convert(request)),
        runtime,
    )
}

/// GGUF/GGML weights, one file per model.
pub fn llamacpp_client(
    models_dir: Option<PathBuf>,
    runtime: Arc<dyn LocalRuntime<Llm>>,
) -> LocalWeightsClient<Llm> {
    local_client(LlmBackend::LlamaCpp, ModelLayout::File, models_dir, runtime).with_weights_metadata()
}

/// GPTQ/EXL2 directories.
pub fn exllamav2_client(
    models_dir: Option<PathBuf>,
    runtime: Arc<dyn LocalRuntime<Llm>>,
) -> LocalWeightsClient<Llm> {
    local_client(LlmBackend::Exllamav2, ModelLayout::Directory, models_dir, runtime)
}

pub fn transformers_client(
    models_dir: Option<PathBuf>,
    runtime: Arc<dyn LocalRuntime<Llm>>,
) -> LocalWeightsClient<Llm> {
    local_client(LlmBackend::Transformers, ModelLayout::Directory, models_dir, runtime)
}

/// Chat-style models take a message list instead of a rendered prompt.
pub fn is_chat_model(model_name: &str) -> bool {
    let lowered = model_name.to_lowercase();
    lowered.contains(OPENAI_MODEL_PREFIX) || lowered.contains("gpt-")
}
