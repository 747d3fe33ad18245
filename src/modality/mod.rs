//! Modality descriptors and the contracts every backend client honors.
//!
//! A [`Modality`] ties together the request type callers speak, the backend
//! identifiers that can serve it, and the rules used to route a model name to
//! one of those backends. [`BackendClient`] is the uniform surface the
//! [`ModelManager`](crate::manager::ModelManager) drives; [`LocalRuntime`] is
//! the seam to the actual inference engines, which live outside this crate.

pub mod routing;

use crate::error::Result;
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use routing::{pick_client, NamePattern, Route};

/// A family of inference tasks sharing one request shape.
pub trait Modality: Send + Sync + 'static {
    /// Short name used in logs and errors ("llm", "tts", ...).
    const NAME: &'static str;

    type Backend: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;
    /// Canonical request callers submit.
    type Request: Send + Sync + 'static;
    /// Backend-native options produced from a request.
    type Options: Send + 'static;
    type Output: Send + 'static;

    /// Ordered routing rules; the first match wins.
    fn routes() -> &'static [Route<Self::Backend>];

    /// Backend used when no rule matches.
    fn fallback() -> Self::Backend;

    /// Names of the models available without network access.
    fn list_local_models(models_dir: Option<&Path>) -> Result<Vec<String>>;
}

/// Per-modality settings handed to the manager and local clients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModalitySettings {
    pub models_dir: Option<PathBuf>,
    default_model: Option<String>,
}

impl ModalitySettings {
    pub fn new(models_dir: Option<PathBuf>, default_model: Option<String>) -> Self {
        Self {
            models_dir,
            default_model: default_model.filter(|m| !m.is_empty()),
        }
    }

    /// The configured default model, if any. Empty names count as unset.
    pub fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    pub fn models_dir(&self) -> Option<&Path> {
        self.models_dir.as_deref()
    }
}

/// Uniform surface over one backend. Implementations hold at most one
/// resident model.
#[async_trait]
pub trait BackendClient<M: Modality>: Send + Sync {
    fn backend(&self) -> M::Backend;

    /// Make `name` resident, releasing any previously resident model first.
    async fn load_model(&self, name: &str) -> Result<()>;

    /// Release the resident model. Releasing when nothing is resident is a no-op.
    async fn unload_model(&self) -> Result<()>;

    /// Translate the canonical request into this backend's options.
    fn convert_options(&self, request: &M::Request) -> Result<M::Options>;

    async fn infer(&self, options: M::Options) -> Result<M::Output>;

    /// Name of the resident model.
    fn loaded_model(&self) -> Option<String>;

    fn is_loaded(&self) -> bool {
        self.loaded_model().is_some()
    }

    /// Models offered by a remote catalog. Local backends have none.
    async fn list_remote_models(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Where a local runtime should load weights from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSource {
    pub name: String,
    /// Filesystem location; `None` for runtimes addressed by name only.
    pub path: Option<PathBuf>,
}

/// Opaque handle to a model held by a [`LocalRuntime`].
#[derive(Clone)]
pub struct ModelHandle(Arc<dyn Any + Send + Sync>);

impl ModelHandle {
    pub fn new<T: Any + Send + Sync>(inner: T) -> Self {
        Self(Arc::new(inner))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ModelHandle(..)")
    }
}

/// An inference engine running weights on this machine.
#[async_trait]
pub trait LocalRuntime<M: Modality>: Send + Sync {
    async fn load(&self, source: &ModelSource) -> anyhow::Result<ModelHandle>;

    async fn run(&self, handle: &ModelHandle, options: M::Options) -> anyhow::Result<M::Output>;

    async fn release(&self, handle: ModelHandle) -> anyhow::Result<()>;
}
