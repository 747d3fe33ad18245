//! Option conversion CLI commands

use crate::backends::LlmBackend;
use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Args)]
pub struct OptionsCommand {
    #[command(subcommand)]
    pub action: OptionsAction,
}

#[derive(Subcommand)]
pub enum OptionsAction {
    /// Convert canonical completion options to a backend's native schema
    Convert {
        /// Target backend (llamacpp, exllamav2, transformers, openai)
        #[arg(long)]
        backend: LlmBackend,

        /// JSON file with canonical completion options
        #[arg(long)]
        options: PathBuf,
    },
}
