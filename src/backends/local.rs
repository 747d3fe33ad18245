//! Backend client for weights that run in-process on a [`LocalRuntime`].

use super::metadata::parse_size_and_quant;
use crate::error::{Error, Result};
use crate::modality::{BackendClient, LocalRuntime, Modality, ModelHandle, ModelSource};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How a backend expects its model name to resolve on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelLayout {
    /// A single weights file under the models dir.
    File,
    /// A directory of weights under the models dir.
    Directory,
    FileOrDirectory,
    /// Resolved by the runtime itself (catalog name or engine name).
    Named,
}

/// Translates a canonical request into backend options.
pub type OptionConverter<M> =
    Arc<dyn Fn(&<M as Modality>::Request) -> Result<<M as Modality>::Options> + Send + Sync>;

struct Resident {
    name: String,
    handle: ModelHandle,
}

pub struct LocalWeightsClient<M: Modality> {
    backend: M::Backend,
    layout: ModelLayout,
    models_dir: Option<PathBuf>,
    convert: OptionConverter<M>,
    runtime: Arc<dyn LocalRuntime<M>>,
    log_weights_metadata: bool,
    resident: RwLock<Option<Resident>>,
}

impl<M: Modality> LocalWeightsClient<M> {
    pub fn new(
        backend: M::Backend,
        layout: ModelLayout,
        models_dir: Option<PathBuf>,
        convert: OptionConverter<M>,
        runtime: Arc<dyn LocalRuntime<M>>,
    ) -> Self {
        Self {
            backend,
            layout,
            models_dir,
            convert,
            runtime,
            log_weights_metadata: false,
            resident: RwLock::new(None),
        }
    }

    /// Log parameter count and quantization parsed from file names on load.
    pub fn with_weights_metadata(mut self) -> Self {
        self.log_weights_metadata = true;
        self
    }

    pub fn layout(&self) -> ModelLayout {
        self.layout
    }

    /// Resolve `name` to a load source according to the layout.
    pub fn resolve(&self, name: &str) -> Result<ModelSource> {
        if self.layout == ModelLayout::Named {
            return Ok(ModelSource {
                name: name.to_string(),
                path: None,
            });
        }

        let not_found = || Error::ModelNotFound {
            name: name.to_string(),
            dir: self.models_dir.clone().unwrap_or_default(),
        };
        let dir = self.models_dir.as_ref().ok_or_else(not_found)?;
        let path = dir.join(name);

        let found = match self.layout {
            ModelLayout::File => path.is_file(),
            ModelLayout::Directory => path.is_dir(),
            ModelLayout::FileOrDirectory | ModelLayout::Named => path.exists(),
        };
        if !found {
            return Err(not_found());
        }

        Ok(ModelSource {
            name: name.to_string(),
            path: Some(path),
        })
    }

    async fn release(&self, resident: Resident) -> Result<()> {
        debug!(backend = %self.backend, model = %resident.name, "releasing model");
        self.runtime
            .release(resident.handle)
            .await
            .map_err(|e| Error::BackendUnload {
                backend: self.backend.to_string(),
                message: format!("{:#}", e),
            })
    }
}

#[async_trait]
impl<M: Modality> BackendClient<M> for LocalWeightsClient<M> {
    fn backend(&self) -> M::Backend {
        self.backend
    }

    async fn load_model(&self, name: &str) -> Result<()> {
        let source = self.resolve(name)?;

        if self.log_weights_metadata && source.path.as_ref().map_or(false, |p| p.is_file()) {
            let (size, quant) = parse_size_and_quant(name);
            debug!(backend = %self.backend, model = %name, size = ?size, quant = ?quant, "weights metadata");
        }

        let previous = self.resident.write().take();
        if let Some(previous) = previous {
            if let Err(e) = self.release(previous).await {
                warn!(backend = %self.backend, "continuing load after failed release: {}", e);
            }
        }

        let start = Instant::now();
        let handle = self.runtime.load(&source).await.map_err(|e| Error::BackendLoad {
            model: name.to_string(),
            backend: self.backend.to_string(),
            elapsed: start.elapsed(),
            message: format!("{:#}", e),
        })?;
        info!(
            backend = %self.backend,
            model = %name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "weights resident"
        );

        *self.resident.write() = Some(Resident {
            name: name.to_string(),
            handle,
        });
        Ok(())
    }

    async fn unload_model(&self) -> Result<()> {
        let resident = self.resident.write().take();
        match resident {
            Some(resident) => self.release(resident).await,
            None => Ok(()),
        }
    }

    fn convert_options(&self, request: &M::Request) -> Result<M::Options> {
        (self.convert)(request)
    }

    async fn infer(&self, options: M::Options) -> Result<M::Output> {
        let handle = self
            .resident
            .read()
            .as_ref()
            .map(|r| r.handle.clone())
            .ok_or(Error::ModelNotLoaded { modality: M::NAME })?;

        self.runtime
            .run(&handle, options)
            .await
            .map_err(|e| Error::Inference {
                backend: self.backend.to_string(),
                message: format!("{:#}", e),
            })
    }

    fn loaded_model(&self) -> Option<String> {
        self.resident.read().as_ref().map(|r| r.name.clone())
    }
}
