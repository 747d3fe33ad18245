//! Model catalog CLI commands

use clap::{Args, Subcommand, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModalityKind {
    Llm,
    Tts,
    Stt,
    Img,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Model catalog commands
#[derive(Args)]
pub struct ModelsCommand {
    #[command(subcommand)]
    pub action: ModelsAction,
}

#[derive(Subcommand)]
pub enum ModelsAction {
    /// List available models
    List {
        /// Modality to list
        #[arg(long, value_enum, default_value = "llm")]
        modality: ModalityKind,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show which backend would serve a model
    Pick {
        /// Model name as it appears in the models dir
        name: String,

        #[arg(long, value_enum, default_value = "llm")]
        modality: ModalityKind,
    },

    /// List TTS reference voices
    Voices {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}
