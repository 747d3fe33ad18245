//! Speech-to-text modality.

use super::local::{LocalWeightsClient, ModelLayout};
use crate::error::{Error, Result};
use crate::modality::{LocalRuntime, Modality, Route};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SttBackend {
    WhisperCpp,
    WhisperX,
}

impl SttBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            SttBackend::WhisperCpp => "whispercpp",
            SttBackend::WhisperX => "whisperx",
        }
    }
}

impl fmt::Display for SttBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscribeOptions {
    pub file_path: PathBuf,
    /// Attribute segments to speakers.
    #[serde(default)]
    pub diarize: bool,
    #[serde(default)]
    pub result_format: ResultFormat,
}

impl TranscribeOptions {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            diarize: false,
            result_format: ResultFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribeChunk {
    /// Seconds from the start of the audio.
    pub start: f64,
    pub end: f64,
    pub speech: String,
    #[serde(default)]
    pub speaker: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranscriptResult {
    Chunks(Vec<TranscribeChunk>),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub result: TranscriptResult,
}

impl TranscribeResponse {
    /// Shape `chunks` the way the request asked for.
    pub fn from_chunks(chunks: Vec<TranscribeChunk>, format: ResultFormat) -> Self {
        let result = match format {
            ResultFormat::Json => TranscriptResult::Chunks(chunks),
            ResultFormat::Text => TranscriptResult::Text(format_transcript(&chunks)),
        };
        Self { result }
    }
}

fn format_timestamp(seconds: f64, with_hours: bool) -> String {
    let total = seconds.round().max(0.0) as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if with_hours {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

/// One `[start-end] speaker: speech` line per chunk. Hours are shown only
/// when the transcript runs past the first hour.
pub fn format_transcript(chunks: &[TranscribeChunk]) -> String {
    let with_hours = chunks.last().map_or(false, |c| c.start > 3600.0);
    chunks
        .iter()
        .map(|c| {
            format!(
                "[{}-{}] {}: {}\n",
                format_timestamp(c.start, with_hours),
                format_timestamp(c.end, with_hours),
                c.speaker,
                c.speech
            )
        })
        .collect()
}

lazy_static! {
    static ref WHISPERCPP_LINE: Regex = Regex::new(
        r"\[([0-9]{2}):([0-9]{2}):([0-9]{2}\.[0-9]{3}) --> ([0-9]{2}):([0-9]{2}):([0-9]{2}\.[0-9]{3})\](.*)"
    )
    .expect("whisper.cpp line pattern is valid");
}

/// Parse whisper.cpp console output into chunks. Lines without a timestamp
/// range are skipped.
pub fn parse_whispercpp_output(output: &str) -> Vec<TranscribeChunk> {
    let seconds = |h: &str, m: &str, s: &str| -> Option<f64> {
        Some(h.parse::<f64>().ok()? * 3600.0 + m.parse::<f64>().ok()? * 60.0 + s.parse::<f64>().ok()?)
    };

    output
        .trim()
        .lines()
        .filter_map(|line| {
            let caps = WHISPERCPP_LINE.captures(line)?;
            Some(TranscribeChunk {
                start: seconds(&caps[1], &caps[2], &caps[3])?,
                end: seconds(&caps[4], &caps[5], &caps[6])?,
                speech: caps[7].trim().to_string(),
                speaker: String::new(),
            })
        })
        .collect()
}

/// Resolves audio paths before transcription.
#[derive(Debug, Clone, Default)]
pub struct TranscribeConverter {
    /// Base for relative paths.
    pub input_dir: Option<PathBuf>,
}

impl TranscribeConverter {
    pub fn convert(&self, request: &TranscribeOptions) -> Result<TranscribeOptions> {
        let path = match &self.input_dir {
            Some(dir) if request.file_path.is_relative() => dir.join(&request.file_path),
            _ => request.file_path.clone(),
        };
        if !path.is_file() {
            return Err(Error::InvalidInput(format!(
                "File does not exist: {}",
                path.display()
            )));
        }
        Ok(TranscribeOptions {
            file_path: path,
            ..request.clone()
        })
    }
}

pub struct Stt;

static STT_ROUTES: [Route<SttBackend>; 1] = [Route::contains("whispercpp", SttBackend::WhisperCpp)];

impl Modality for Stt {
    const NAME: &'static str = "stt";

    type Backend = SttBackend;
    type Request = TranscribeOptions;
    type Options = TranscribeOptions;
    type Output = TranscribeResponse;

    fn routes() -> &'static [Route<SttBackend>] {
        &STT_ROUTES
    }

    fn fallback() -> SttBackend {
        SttBackend::WhisperX
    }

    /// STT engines are selected by engine name.
    fn list_local_models(_models_dir: Option<&Path>) -> Result<Vec<String>> {
        Ok(vec![
            SttBackend::WhisperCpp.to_string(),
            SttBackend::WhisperX.to_string(),
        ])
    }
}

pub fn stt_client(
    backend: SttBackend,
    converter: TranscribeConverter,
    runtime: Arc<dyn LocalRuntime<Stt>>,
) -> LocalWeightsClient<Stt> {
    LocalWeightsClient::new(
        backend,
        ModelLayout::Named,
        None,
        Arc::new(move |request: &TranscribeOptions| converter.convert(request)),
        runtime,
    )
}
