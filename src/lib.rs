//! aihub: one active model per modality behind a uniform surface.
//!
//! The crate keeps, for each modality (LLM, TTS, STT, image generation), a
//! single active model and the backend client holding it. Requests are
//! expressed in canonical form and translated to each backend's native
//! options; completion prompts are laid out with per-model-family templates.
//!
//! The main pieces:
//! - [`modality`]: the [`Modality`](modality::Modality) descriptor and backend contracts
//! - [`manager`]: per-modality active-model state
//! - [`backends`]: LLM, TTS, STT and image descriptors and clients
//! - [`options`]: canonical completion options and schema conversion
//! - [`prompt`]: prompt parts and templates
//! - [`hub`]: request services and response envelopes
//! - [`config`]: layered configuration

pub mod backends;
pub mod cli;
pub mod config;
pub mod error;
pub mod hub;
pub mod manager;
pub mod modality;
pub mod options;
pub mod prompt;

pub use error::{Error, Result};
pub use hub::{Hub, ModalityService, RuntimeSet};
pub use manager::{ClientRegistry, ModelManager};
pub use modality::{BackendClient, LocalRuntime, Modality, ModalitySettings, ModelHandle, ModelSource};
