//! Text-to-speech modality.

use super::local::{LocalWeightsClient, ModelLayout};
use crate::error::{Error, Result};
use crate::modality::{LocalRuntime, Modality, Route};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reference voice used when a request does not name one.
pub const DEFAULT_VOICE: &str = "jaiden-10s.wav";

/// Models the coqui runtime can fetch by name.
pub const COQUI_MODELS: &[&str] = &["tts_models/multilingual/multi-dataset/xtts_v2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsBackend {
    Coqui,
}

impl fmt::Display for TtsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TtsBackend::Coqui => f.write_str("coqui"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakOptions {
    pub text: String,
    /// Split long text into sentences before synthesis.
    #[serde(default = "default_split_sentences")]
    pub split_sentences: bool,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_voice")]
    pub voice: String,
}

impl SpeakOptions {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            split_sentences: default_split_sentences(),
            language: default_language(),
            voice: default_voice(),
        }
    }
}

fn default_split_sentences() -> bool {
    true
}

fn default_language() -> String {
    "en".to_string()
}

fn default_voice() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakToFileOptions {
    #[serde(flatten)]
    pub speak: SpeakOptions,
    /// Output file name under the output dir; generated when empty.
    #[serde(default)]
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakRequest {
    Speak(SpeakOptions),
    SpeakToFile(SpeakToFileOptions),
}

impl SpeakRequest {
    fn options(&self) -> &SpeakOptions {
        match self {
            SpeakRequest::Speak(options) => options,
            SpeakRequest::SpeakToFile(options) => &options.speak,
        }
    }
}

/// Where synthesized audio goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechTarget {
    /// Return the WAV bytes to the caller.
    Inline,
    File(PathBuf),
}

/// Native options of the coqui runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoquiOptions {
    pub text: String,
    pub language: String,
    pub split_sentences: bool,
    pub speaker_wav: PathBuf,
    pub target: SpeechTarget,
}

/// Synthesized audio as produced by a runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutput {
    Audio(Vec<u8>),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakResponse {
    /// WAV data, base64 encoded.
    pub audio: String,
    /// Seconds spent generating.
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakToFileResponse {
    pub file_name: String,
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListVoicesResponse {
    pub voices: Vec<String>,
}

/// Path of a reference voice. `"default"` and empty names select
/// [`DEFAULT_VOICE`]; names without `.wav` get the extension appended.
pub fn voice_path(voices_dir: &Path, voice: &str) -> PathBuf {
    let voice = match voice {
        "" | "default" => DEFAULT_VOICE.to_string(),
        v if v.contains(".wav") => v.to_string(),
        v => format!("{}.wav", v),
    };
    voices_dir.join(voice)
}

/// `*.wav` files in the voices dir, sorted.
pub fn list_voices(voices_dir: &Path) -> Result<Vec<String>> {
    if !voices_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut voices = Vec::new();
    for entry in fs::read_dir(voices_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.path().is_file() && name.ends_with(".wav") {
            voices.push(name);
        }
    }
    voices.sort();
    Ok(voices)
}

/// Builds coqui options from speak requests.
#[derive(Debug, Clone)]
pub struct CoquiConverter {
    pub voices_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl CoquiConverter {
    pub fn convert(&self, request: &SpeakRequest) -> Result<CoquiOptions> {
        let options = request.options();
        if options.text.trim().is_empty() {
            return Err(Error::InvalidInput("No text provided".into()));
        }

        let target = match request {
            SpeakRequest::Speak(_) => SpeechTarget::Inline,
            SpeakRequest::SpeakToFile(to_file) => {
                let file = if to_file.file.is_empty() {
                    format!("tts-{}.wav", Utc::now().timestamp_millis())
                } else {
                    to_file.file.clone()
                };
                SpeechTarget::File(self.output_dir.join(file))
            }
        };

        Ok(CoquiOptions {
            text: options.text.clone(),
            language: options.language.clone(),
            split_sentences: options.split_sentences,
            speaker_wav: voice_path(&self.voices_dir, &options.voice),
            target,
        })
    }
}

pub struct Tts;

impl Modality for Tts {
    const NAME: &'static str = "tts";

    type Backend = TtsBackend;
    type Request = SpeakRequest;
    type Options = CoquiOptions;
    type Output = SpeechOutput;

    fn routes() -> &'static [Route<TtsBackend>] {
        &[]
    }

    fn fallback() -> TtsBackend {
        TtsBackend::Coqui
    }

    fn list_local_models(_models_dir: Option<&Path>) -> Result<Vec<String>> {
        Ok(COQUI_MODELS.iter().map(|m| m.to_string()).collect())
    }
}

/// Coqui models are fetched by catalog name.
pub fn coqui_client(converter: CoquiConverter, runtime: Arc<dyn LocalRuntime<Tts>>) -> LocalWeightsClient<Tts> {
    LocalWeightsClient::new(
        TtsBackend::Coqui,
        ModelLayout::Named,
        None,
        Arc::new(move |request: &SpeakRequest| converter.convert(request)),
        runtime,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_path() {
        let dir = Path::new("/voices");
        assert_eq!(voice_path(dir, "default"), dir.join(DEFAULT_VOICE));
        assert_eq!(voice_path(dir, ""), dir.join(DEFAULT_VOICE));
        assert_eq!(voice_path(dir, "alice"), dir.join("alice.wav"));
        assert_eq!(voice_path(dir, "bob.wav"), dir.join("bob.wav"));
    }

    #[test]
    fn test_speak_options_defaults() {
        let options: SpeakToFileOptions = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(options.speak, SpeakOptions::new("hi"));
        assert!(options.file.is_empty());
    }

    #[test]
    fn test_convert_targets() {
        let converter = CoquiConverter {
            voices_dir: PathBuf::from("/voices"),
            output_dir: PathBuf::from("/out"),
        };

        let inline = converter
            .convert(&SpeakRequest::Speak(SpeakOptions::new("hello")))
            .unwrap();
        assert_eq!(inline.target, SpeechTarget::Inline);
        assert_eq!(inline.speaker_wav, PathBuf::from("/voices").join(DEFAULT_VOICE));

        let named = converter
            .convert(&SpeakRequest::SpeakToFile(SpeakToFileOptions {
                speak: SpeakOptions::new("hello"),
                file: "greeting.wav".into(),
            }))
            .unwrap();
        assert_eq!(named.target, SpeechTarget::File(PathBuf::from("/out/greeting.wav")));

        assert!(matches!(
            converter.convert(&SpeakRequest::Speak(SpeakOptions::new("  "))),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_list_voices_only_wav() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.wav"), b"").unwrap();
        std::fs::write(dir.path().join("a.wav"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        assert_eq!(list_voices(dir.path()).unwrap(), vec!["a.wav", "b.wav"]);
    }
}
