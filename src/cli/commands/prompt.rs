//! Prompt template CLI commands

use crate::prompt::Template;
use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Args)]
pub struct PromptCommand {
    #[command(subcommand)]
    pub action: PromptAction,
}

#[derive(Subcommand)]
pub enum PromptAction {
    /// Show the template selected for a model
    Template {
        /// Model name or path
        model: String,
    },

    /// Render prompt parts for a model
    Render {
        /// Model name or path
        #[arg(long)]
        model: String,

        /// JSON file with prompt parts (`user`, `system`, `prior_msgs`)
        #[arg(long)]
        parts: PathBuf,

        /// Text the answer should start with
        #[arg(long, default_value = "")]
        prefix_response: String,

        /// Render a chat message list instead of a prompt string
        #[arg(long)]
        messages: bool,

        /// Use this template instead of the one selected by model name
        #[arg(long)]
        template: Option<Template>,
    },
}
