pub mod config;
pub mod models;
pub mod options;
pub mod prompt;

pub use config::{ConfigAction, ConfigCommand};
pub use models::{ModalityKind, ModelsAction, ModelsCommand, OutputFormat};
pub use options::{OptionsAction, OptionsCommand};
pub use prompt::{PromptAction, PromptCommand};

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// List models and inspect backend routing
    Models(ModelsCommand),
    /// Inspect and render prompt templates
    Prompt(PromptCommand),
    /// Convert completion options to a backend's schema
    Options(OptionsCommand),
    /// Show the effective configuration
    Config(ConfigCommand),
}
