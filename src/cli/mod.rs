//! Command-line interface module.
//!
//! This module provides the CLI functionality for:
//! - Model catalog listing and backend routing
//! - Prompt template inspection and rendering
//! - Option conversion for LLM backends
//! - Configuration display

pub mod commands;
pub mod handlers;

pub use handlers::{handle_config, handle_models, handle_options, handle_prompt};
