//! Configuration management for the aihub service.
//!
//! Configuration is layered from several sources:
//! 1. Default configuration (embedded in binary)
//! 2. System-wide configuration file (`/etc/aihub/config.toml`)
//! 3. User-specified configuration file (`--config`)
//! 4. Environment variables (prefixed with `AIHUB_`, `__` between levels)
//! 5. Command-line arguments
//!
//! Later sources override earlier ones.
//!
//! # Environment Variables
//!
//! - `AIHUB_LLM__MODEL` - Default LLM model name
//! - `AIHUB_LLM__MODELS_DIR` - Directory holding LLM weights
//! - `AIHUB_OPENAI__API_KEY` - OpenAI API key
//! - `OPENAI_API_KEY` - Used when no OpenAI key was configured otherwise

use crate::error::Result;
use crate::modality::ModalitySettings;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Command-line overrides for the layered configuration.
#[derive(Debug, Default, Clone, clap::Args)]
pub struct ConfigArgs {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding LLM weights
    #[arg(long, global = true)]
    pub llm_models_dir: Option<PathBuf>,

    /// Default LLM model
    #[arg(long, global = true)]
    pub llm_model: Option<String>,

    /// Directory holding TTS models
    #[arg(long, global = true)]
    pub tts_models_dir: Option<PathBuf>,

    /// Default TTS model
    #[arg(long, global = true)]
    pub tts_model: Option<String>,

    /// Directory holding TTS reference voices
    #[arg(long, global = true)]
    pub voices_dir: Option<PathBuf>,

    /// Default STT model
    #[arg(long, global = true)]
    pub stt_model: Option<String>,

    /// Directory holding image-generation checkpoints
    #[arg(long, global = true)]
    pub img_models_dir: Option<PathBuf>,

    /// Default image-generation model
    #[arg(long, global = true)]
    pub img_model: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "AIHUB_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log filter directives (e.g. "aihub_core=debug")
    #[arg(long, global = true)]
    pub log_filter: Option<String>,
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub tts: TtsConfig,
    pub stt: SttConfig,
    pub img: ImgConfig,
    #[serde(default)]
    pub openai: OpenAiSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listen address reserved for an HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub models_dir: PathBuf,
    /// Default model (empty or absent means none)
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub models_dir: PathBuf,
    #[serde(default)]
    pub model: Option<String>,
    pub voices_dir: PathBuf,
    /// Where speak-to-file output lands when no file name is given
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub model: Option<String>,
    /// Relative audio paths are resolved against this directory
    #[serde(default)]
    pub input_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImgConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub models_dir: PathBuf,
    #[serde(default)]
    pub model: Option<String>,
}

/// Remote OpenAI access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiSettings {
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_timeout")]
    pub timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            timeout_secs: default_openai_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            filter: None,
        }
    }
}

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

impl ServiceConfig {
    /// Load configuration from all sources
    pub fn load(args: &ConfigArgs) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::with_name("/etc/aihub/config.toml").required(false));

        if let Some(path) = &args.config {
            builder = builder.add_source(config::File::from(path.as_path()));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("AIHUB")
                .prefix_separator("_")
                .separator("__"),
        );

        let mut config: ServiceConfig = builder.build()?.try_deserialize()?;
        config.apply_overrides(args);

        if config.openai.api_key.as_deref().map_or(true, str::is_empty) {
            config.openai.api_key = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        }

        Ok(config)
    }

    fn apply_overrides(&mut self, args: &ConfigArgs) {
        if let Some(dir) = &args.llm_models_dir {
            self.llm.models_dir = dir.clone();
        }
        if let Some(model) = &args.llm_model {
            self.llm.model = Some(model.clone());
        }
        if let Some(dir) = &args.tts_models_dir {
            self.tts.models_dir = dir.clone();
        }
        if let Some(model) = &args.tts_model {
            self.tts.model = Some(model.clone());
        }
        if let Some(dir) = &args.voices_dir {
            self.tts.voices_dir = dir.clone();
        }
        if let Some(model) = &args.stt_model {
            self.stt.model = Some(model.clone());
        }
        if let Some(dir) = &args.img_models_dir {
            self.img.models_dir = dir.clone();
        }
        if let Some(model) = &args.img_model {
            self.img.model = Some(model.clone());
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if let Some(filter) = &args.log_filter {
            self.logging.filter = Some(filter.clone());
        }
    }

    pub fn llm_settings(&self) -> ModalitySettings {
        ModalitySettings::new(Some(self.llm.models_dir.clone()), self.llm.model.clone())
    }

    pub fn tts_settings(&self) -> ModalitySettings {
        ModalitySettings::new(Some(self.tts.models_dir.clone()), self.tts.model.clone())
    }

    /// STT backends are named, not loaded from a weights directory.
    pub fn stt_settings(&self) -> ModalitySettings {
        ModalitySettings::new(None, self.stt.model.clone())
    }

    pub fn img_settings(&self) -> ModalitySettings {
        ModalitySettings::new(Some(self.img.models_dir.clone()), self.img.model.clone())
    }
}

fn default_enabled() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7851
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_timeout() -> u64 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_defaults() {
        let config: ServiceConfig = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.server.port, 7851);
        assert_eq!(config.llm.models_dir, PathBuf::from("models/llm"));
        assert_eq!(
            config.tts.model.as_deref(),
            Some("tts_models/multilingual/multi-dataset/xtts_v2")
        );
        assert_eq!(config.openai.timeout_secs, 120);
    }

    #[test]
    fn test_user_file_and_cli_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[llm]\nmodels_dir = \"/srv/llm\"\nmodel = \"from-file.gguf\"").unwrap();

        let args = ConfigArgs {
            config: Some(file.path().to_path_buf()),
            llm_model: Some("from-cli.gguf".into()),
            ..Default::default()
        };
        let config = ServiceConfig::load(&args).unwrap();

        assert_eq!(config.llm.models_dir, PathBuf::from("/srv/llm"));
        assert_eq!(config.llm.model.as_deref(), Some("from-cli.gguf"));
        let settings = config.llm_settings();
        assert_eq!(settings.default_model(), Some("from-cli.gguf"));
    }
}
