//! Fake runtimes and fixtures shared by the integration tests.
#![allow(dead_code)]

use aihub_core::backends::img::GeneratedImages;
use aihub_core::backends::llm::{exllamav2_client, llamacpp_client};
use aihub_core::backends::stt::{TranscribeChunk, TranscribeOptions, TranscribeResponse};
use aihub_core::backends::tts::{CoquiOptions, SpeechOutput, SpeechTarget};
use aihub_core::backends::{
    text_completion, CompletionDraft, CompletionReturn, Img, Llm, LlmBackend, LlmBackendOptions, Stt, Tts,
};
use aihub_core::options::CompletionOptions;
use aihub_core::{
    BackendClient, ClientRegistry, Error, LocalRuntime, ModalitySettings, ModelHandle, ModelManager, ModelSource,
    Result,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const MISTRAL_FILE: &str = "mistral-7b-instruct-v0.1.Q4_K_M.gguf";
pub const DOLPHIN_FILE: &str = "dolphin-2.1-mistral-7b.Q4_K_M.gguf";
/// Weights the fake runtime refuses to load.
pub const BROKEN_FILE: &str = "broken-13b.Q8_0.gguf";
pub const GPTQ_DIR: &str = "Mistral-7B-Instruct-GPTQ";

/// A models dir with three GGUF files and one GPTQ directory.
pub fn llm_models_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for file in [MISTRAL_FILE, DOLPHIN_FILE, BROKEN_FILE] {
        std::fs::write(dir.path().join(file), b"GGUF").unwrap();
    }
    std::fs::create_dir(dir.path().join(GPTQ_DIR)).unwrap();
    dir
}

/// LLM runtime that echoes the prompt it receives.
#[derive(Default)]
pub struct FakeLlmRuntime {
    loads: AtomicUsize,
    releases: AtomicUsize,
    loading: AtomicUsize,
    max_loading: AtomicUsize,
    load_delay: Duration,
    fail_release: AtomicBool,
    prompts: Mutex<Vec<String>>,
}

impl FakeLlmRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Each load sleeps for `delay`, so overlapping loads would be visible.
    pub fn with_load_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            load_delay: delay,
            ..Default::default()
        })
    }

    /// Make every later release fail after counting it.
    pub fn fail_releases(&self) {
        self.fail_release.store(true, Ordering::SeqCst);
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Highest number of loads observed running at the same time.
    pub fn max_concurrent_loads(&self) -> usize {
        self.max_loading.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }
}

#[async_trait]
impl LocalRuntime<Llm> for FakeLlmRuntime {
    async fn load(&self, source: &ModelSource) -> anyhow::Result<ModelHandle> {
        let running = self.loading.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_loading.fetch_max(running, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        self.loading.fetch_sub(1, Ordering::SeqCst);
        self.loads.fetch_add(1, Ordering::SeqCst);

        if source.name.starts_with("broken") {
            anyhow::bail!("invalid magic number in {}", source.name);
        }
        Ok(ModelHandle::new(source.name.clone()))
    }

    async fn run(&self, handle: &ModelHandle, options: LlmBackendOptions) -> anyhow::Result<CompletionReturn> {
        let model = handle.downcast_ref::<String>().cloned().unwrap_or_default();
        let prompt = match &options {
            LlmBackendOptions::LlamaCpp(o) => o.prompt.clone(),
            LlmBackendOptions::Exllamav2(o) => o.prompt.clone(),
            LlmBackendOptions::Transformers(o) => o.prompt.clone(),
            LlmBackendOptions::OpenAi(_) => anyhow::bail!("chat options sent to a local runtime"),
        };
        self.prompts.lock().push(prompt.clone());

        let mut draft = CompletionDraft::new(format!("echo: {}", prompt), model);
        draft.tokens = 3;
        draft.max_tokens = options.max_tokens();
        Ok(text_completion(draft))
    }

    async fn release(&self, _handle: ModelHandle) -> anyhow::Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        if self.fail_release.load(Ordering::SeqCst) {
            anyhow::bail!("device lost while freeing weights");
        }
        Ok(())
    }
}

/// Remote-style client that only serves a model catalog.
pub struct CatalogClient {
    models: Vec<String>,
    reachable: bool,
}

impl CatalogClient {
    pub fn new(models: &[&str]) -> Self {
        Self {
            models: models.iter().map(|m| m.to_string()).collect(),
            reachable: true,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            models: Vec::new(),
            reachable: false,
        }
    }
}

#[async_trait]
impl BackendClient<Llm> for CatalogClient {
    fn backend(&self) -> LlmBackend {
        LlmBackend::OpenAi
    }

    async fn load_model(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn unload_model(&self) -> Result<()> {
        Ok(())
    }

    fn convert_options(&self, request: &CompletionOptions) -> Result<LlmBackendOptions> {
        LlmBackend::OpenAi.convert(request)
    }

    async fn infer(&self, _options: LlmBackendOptions) -> Result<CompletionReturn> {
        Err(Error::Inference {
            backend: "openai".into(),
            message: "offline".into(),
        })
    }

    fn loaded_model(&self) -> Option<String> {
        None
    }

    async fn list_remote_models(&self) -> Result<Vec<String>> {
        if !self.reachable {
            return Err(Error::Http("connection refused".into()));
        }
        Ok(self.models.clone())
    }
}

/// llamacpp and exllamav2 clients over `runtime`, rooted at `dir`.
pub fn llm_clients(dir: &Path, runtime: &Arc<FakeLlmRuntime>) -> ClientRegistry<Llm> {
    let llamacpp: Arc<dyn LocalRuntime<Llm>> = runtime.clone();
    let exllamav2: Arc<dyn LocalRuntime<Llm>> = runtime.clone();
    ClientRegistry::<Llm>::new()
        .with(Arc::new(llamacpp_client(Some(dir.to_path_buf()), llamacpp)))
        .with(Arc::new(exllamav2_client(Some(dir.to_path_buf()), exllamav2)))
}

pub fn llm_manager(dir: &Path, runtime: &Arc<FakeLlmRuntime>, default_model: Option<&str>) -> ModelManager<Llm> {
    ModelManager::new(
        ModalitySettings::new(Some(dir.to_path_buf()), default_model.map(str::to_string)),
        llm_clients(dir, runtime),
    )
}

/// TTS runtime returning the request text as audio bytes.
#[derive(Default)]
pub struct FakeTtsRuntime;

#[async_trait]
impl LocalRuntime<Tts> for FakeTtsRuntime {
    async fn load(&self, source: &ModelSource) -> anyhow::Result<ModelHandle> {
        Ok(ModelHandle::new(source.name.clone()))
    }

    async fn run(&self, _handle: &ModelHandle, options: CoquiOptions) -> anyhow::Result<SpeechOutput> {
        let audio = format!("RIFF:{}", options.text).into_bytes();
        match options.target {
            SpeechTarget::Inline => Ok(SpeechOutput::Audio(audio)),
            SpeechTarget::File(path) => {
                tokio::fs::write(&path, audio).await?;
                Ok(SpeechOutput::File(path))
            }
        }
    }

    async fn release(&self, _handle: ModelHandle) -> anyhow::Result<()> {
        Ok(())
    }
}

/// STT runtime producing one chunk per request.
#[derive(Default)]
pub struct FakeSttRuntime;

#[async_trait]
impl LocalRuntime<Stt> for FakeSttRuntime {
    async fn load(&self, source: &ModelSource) -> anyhow::Result<ModelHandle> {
        Ok(ModelHandle::new(source.name.clone()))
    }

    async fn run(&self, handle: &ModelHandle, options: TranscribeOptions) -> anyhow::Result<TranscribeResponse> {
        let engine = handle.downcast_ref::<String>().cloned().unwrap_or_default();
        let chunk = TranscribeChunk {
            start: 0.0,
            end: 1.5,
            speech: format!("transcribed by {}", engine),
            speaker: if options.diarize { "SPEAKER_00".into() } else { String::new() },
        };
        Ok(TranscribeResponse::from_chunks(vec![chunk], options.result_format))
    }

    async fn release(&self, _handle: ModelHandle) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Image runtime producing one placeholder image.
#[derive(Default)]
pub struct FakeImgRuntime;

#[async_trait]
impl LocalRuntime<Img> for FakeImgRuntime {
    async fn load(&self, source: &ModelSource) -> anyhow::Result<ModelHandle> {
        Ok(ModelHandle::new(source.name.clone()))
    }

    async fn run(
        &self,
        _handle: &ModelHandle,
        _options: aihub_core::backends::img::Txt2ImgOptions,
    ) -> anyhow::Result<GeneratedImages> {
        Ok(GeneratedImages {
            png: vec![b"png".to_vec()],
            nsfw_content_detected: vec![false],
        })
    }

    async fn release(&self, _handle: ModelHandle) -> anyhow::Result<()> {
        Ok(())
    }
}
