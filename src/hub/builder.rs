use super::ModalityService;
use crate::backends::img::diffusers_client;
use crate::backends::llm::{exllamav2_client, llamacpp_client, transformers_client};
use crate::backends::stt::{stt_client, TranscribeConverter};
use crate::backends::tts::{coqui_client, list_voices, CoquiConverter};
use crate::backends::{Img, Llm, OpenAiClient, Stt, SttBackend, Tts};
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::manager::{ClientRegistry, ModelManager};
use crate::modality::{LocalRuntime, Modality, ModalitySettings};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Inference engines available to this process. Backends without a runtime
/// are not registered.
#[derive(Clone, Default)]
pub struct RuntimeSet {
    pub llamacpp: Option<Arc<dyn LocalRuntime<Llm>>>,
    pub exllamav2: Option<Arc<dyn LocalRuntime<Llm>>>,
    pub transformers: Option<Arc<dyn LocalRuntime<Llm>>>,
    pub coqui: Option<Arc<dyn LocalRuntime<Tts>>>,
    pub whispercpp: Option<Arc<dyn LocalRuntime<Stt>>>,
    pub whisperx: Option<Arc<dyn LocalRuntime<Stt>>>,
    pub diffusers: Option<Arc<dyn LocalRuntime<Img>>>,
}

/// One service per enabled modality.
pub struct Hub {
    pub llm: Option<ModalityService<Llm>>,
    pub tts: Option<ModalityService<Tts>>,
    pub stt: Option<ModalityService<Stt>>,
    pub img: Option<ModalityService<Img>>,
    voices_dir: PathBuf,
}

impl Hub {
    pub fn from_config(config: &ServiceConfig, runtimes: RuntimeSet) -> Result<Self> {
        let llm = if config.llm.enabled {
            let dir = Some(config.llm.models_dir.clone());
            let mut clients = ClientRegistry::<Llm>::new();
            clients.register(Arc::new(OpenAiClient::new(&config.openai)?));
            if let Some(runtime) = runtimes.llamacpp {
                clients.register(Arc::new(llamacpp_client(dir.clone(), runtime)));
            }
            if let Some(runtime) = runtimes.exllamav2 {
                clients.register(Arc::new(exllamav2_client(dir.clone(), runtime)));
            }
            if let Some(runtime) = runtimes.transformers {
                clients.register(Arc::new(transformers_client(dir, runtime)));
            }
            Some(service(config.llm_settings(), clients))
        } else {
            None
        };

        let tts = if config.tts.enabled {
            let mut clients = ClientRegistry::<Tts>::new();
            if let Some(runtime) = runtimes.coqui {
                let converter = CoquiConverter {
                    voices_dir: config.tts.voices_dir.clone(),
                    output_dir: config.tts.output_dir.clone(),
                };
                clients.register(Arc::new(coqui_client(converter, runtime)));
            }
            Some(service(config.tts_settings(), clients))
        } else {
            None
        };

        let stt = if config.stt.enabled {
            let converter = TranscribeConverter {
                input_dir: config.stt.input_dir.clone(),
            };
            let mut clients = ClientRegistry::<Stt>::new();
            if let Some(runtime) = runtimes.whispercpp {
                clients.register(Arc::new(stt_client(SttBackend::WhisperCpp, converter.clone(), runtime)));
            }
            if let Some(runtime) = runtimes.whisperx {
                clients.register(Arc::new(stt_client(SttBackend::WhisperX, converter, runtime)));
            }
            Some(service(config.stt_settings(), clients))
        } else {
            None
        };

        let img = if config.img.enabled {
            let mut clients = ClientRegistry::<Img>::new();
            if let Some(runtime) = runtimes.diffusers {
                clients.register(Arc::new(diffusers_client(Some(config.img.models_dir.clone()), runtime)));
            }
            Some(service(config.img_settings(), clients))
        } else {
            None
        };

        info!(
            llm = llm.is_some(),
            tts = tts.is_some(),
            stt = stt.is_some(),
            img = img.is_some(),
            "hub ready"
        );

        Ok(Self {
            llm,
            tts,
            stt,
            img,
            voices_dir: config.tts.voices_dir.clone(),
        })
    }

    /// Reference voices available to TTS requests.
    pub fn list_voices(&self) -> Result<Vec<String>> {
        list_voices(&self.voices_dir)
    }

    /// Unload every active model.
    pub async fn shutdown(&self) {
        if let Some(llm) = &self.llm {
            llm.unload().await;
        }
        if let Some(tts) = &self.tts {
            tts.unload().await;
        }
        if let Some(stt) = &self.stt {
            stt.unload().await;
        }
        if let Some(img) = &self.img {
            img.unload().await;
        }
    }
}

fn service<M: Modality>(settings: ModalitySettings, clients: ClientRegistry<M>) -> ModalityService<M> {
    debug!(
        modality = M::NAME,
        backends = ?clients.backends(),
        "registering backends"
    );
    ModalityService::new(Arc::new(ModelManager::new(settings, clients)))
}
