//! Modality descriptors and backend clients.

pub mod completion;
pub mod img;
pub mod llm;
pub mod local;
pub mod metadata;
pub mod openai;
pub mod stt;
pub mod tts;

pub use completion::{text_completion, CompletionDraft, CompletionReturn, CompletionUsage};
pub use img::{Img, ImgBackend};
pub use llm::{Llm, LlmBackend, LlmBackendOptions};
pub use local::{LocalWeightsClient, ModelLayout};
pub use openai::OpenAiClient;
pub use stt::{Stt, SttBackend};
pub use tts::{Tts, TtsBackend};
