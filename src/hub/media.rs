//! TTS, STT and image endpoints.

use super::ModalityService;
use crate::backends::img::{normalize_txt2img, Txt2ImgOptions, Txt2ImgResponse, SAMPLERS};
use crate::backends::stt::{TranscribeOptions, TranscribeResponse};
use crate::backends::tts::{
    SpeakOptions, SpeakRequest, SpeakResponse, SpeakToFileOptions, SpeakToFileResponse, SpeechOutput,
};
use crate::backends::{Img, Stt, Tts};
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::time::Instant;
use tracing::debug;

impl ModalityService<Tts> {
    /// Synthesize speech and return it base64 encoded.
    pub async fn speak(&self, options: SpeakOptions) -> Result<SpeakResponse> {
        let start = Instant::now();
        let audio = match self.infer(&SpeakRequest::Speak(options)).await? {
            SpeechOutput::Audio(bytes) => bytes,
            SpeechOutput::File(path) => {
                let bytes = tokio::fs::read(&path).await?;
                tokio::fs::remove_file(&path).await?;
                bytes
            }
        };

        Ok(SpeakResponse {
            audio: STANDARD.encode(audio),
            time: start.elapsed().as_secs_f64(),
        })
    }

    /// Synthesize speech into a file under the output dir.
    pub async fn speak_to_file(&self, options: SpeakToFileOptions) -> Result<SpeakToFileResponse> {
        let start = Instant::now();
        let path = match self.infer(&SpeakRequest::SpeakToFile(options)).await? {
            SpeechOutput::File(path) => path,
            SpeechOutput::Audio(_) => {
                return Err(Error::Inference {
                    backend: "coqui".into(),
                    message: "runtime returned inline audio for a file request".into(),
                })
            }
        };

        Ok(SpeakToFileResponse {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            time: start.elapsed().as_secs_f64(),
        })
    }
}

impl ModalityService<Stt> {
    pub async fn transcribe(&self, options: TranscribeOptions) -> Result<TranscribeResponse> {
        let start = Instant::now();
        let response = self.infer(&options).await?;
        debug!(
            file = %options.file_path.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "transcribed"
        );
        Ok(response)
    }
}

impl ModalityService<Img> {
    /// Samplers of the active model; empty when nothing is loaded.
    pub fn list_samplers(&self) -> Vec<String> {
        if self.manager().active_model_name().is_none() {
            return Vec::new();
        }
        SAMPLERS.iter().map(|s| s.to_string()).collect()
    }

    pub async fn txt2img(&self, options: Txt2ImgOptions) -> Result<Txt2ImgResponse> {
        let info = normalize_txt2img(&options)?;
        let generated = self.infer(&options).await?;

        Ok(Txt2ImgResponse {
            images: generated
                .png
                .iter()
                .map(|png| format!("data:image/png;base64,{}", STANDARD.encode(png)))
                .collect(),
            nsfw_content_detected: generated.nsfw_content_detected,
            info,
        })
    }
}
