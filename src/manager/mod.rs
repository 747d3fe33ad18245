//! Per-modality model manager.
//!
//! A [`ModelManager`] tracks which model is active for one modality and which
//! backend client holds it. Transitions (load and unload) are serialized by an
//! async mutex; the active triple of model name, backend and client is kept
//! behind a read-write lock so readers always observe a consistent snapshot.
//! Inference does not take the transition lock.

use crate::error::{Error, Result};
use crate::modality::{pick_client, BackendClient, Modality, ModalitySettings};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Backend clients available to one modality, one per backend.
pub struct ClientRegistry<M: Modality> {
    clients: HashMap<M::Backend, Arc<dyn BackendClient<M>>>,
}

impl<M: Modality> Default for ClientRegistry<M> {
    fn default() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }
}

impl<M: Modality> ClientRegistry<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client under the backend it reports. Replaces any earlier
    /// client for the same backend.
    pub fn register(&mut self, client: Arc<dyn BackendClient<M>>) -> &mut Self {
        self.clients.insert(client.backend(), client);
        self
    }

    pub fn with(mut self, client: Arc<dyn BackendClient<M>>) -> Self {
        self.register(client);
        self
    }

    pub fn get(&self, backend: M::Backend) -> Option<Arc<dyn BackendClient<M>>> {
        self.clients.get(&backend).cloned()
    }

    pub fn backends(&self) -> Vec<M::Backend> {
        self.clients.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<dyn BackendClient<M>>> {
        self.clients.values()
    }
}

struct ActiveModel<M: Modality> {
    name: String,
    backend: M::Backend,
    client: Arc<dyn BackendClient<M>>,
}

impl<M: Modality> Clone for ActiveModel<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            backend: self.backend,
            client: Arc::clone(&self.client),
        }
    }
}

/// Owns the active-model state for one modality.
pub struct ModelManager<M: Modality> {
    settings: ModalitySettings,
    clients: ClientRegistry<M>,
    active: RwLock<Option<ActiveModel<M>>>,
    transition: Mutex<()>,
}

impl<M: Modality> ModelManager<M> {
    pub fn new(settings: ModalitySettings, clients: ClientRegistry<M>) -> Self {
        Self {
            settings,
            clients,
            active: RwLock::new(None),
            transition: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &ModalitySettings {
        &self.settings
    }

    pub fn active_model_name(&self) -> Option<String> {
        self.active.read().as_ref().map(|a| a.name.clone())
    }

    pub fn active_backend(&self) -> Option<M::Backend> {
        self.active.read().as_ref().map(|a| a.backend)
    }

    /// Name and backend of the active model, read together.
    pub fn snapshot(&self) -> Option<(String, M::Backend)> {
        self.active
            .read()
            .as_ref()
            .map(|a| (a.name.clone(), a.backend))
    }

    pub fn client(&self, backend: M::Backend) -> Option<Arc<dyn BackendClient<M>>> {
        self.clients.get(backend)
    }

    /// Backend that would serve `name`.
    pub fn pick_client(&self, name: &str) -> M::Backend {
        pick_client(M::routes(), M::fallback(), name, self.settings.models_dir())
    }

    /// Make `name` (or the configured default) the active model.
    ///
    /// Loading the already-active model is a no-op. The active state is only
    /// replaced after the backend reports success, so a failed load leaves
    /// the previous state untouched. Switching to a model served by another
    /// backend does not unload the previous one; callers unload first.
    pub async fn load_model(&self, name: Option<&str>) -> Result<()> {
        let name = match name.filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => self
                .settings
                .default_model()
                .map(str::to_string)
                .ok_or(Error::NoDefaultModel { modality: M::NAME })?,
        };

        let _guard = self.transition.lock().await;

        let previous = self.snapshot();
        if let Some((active, _)) = &previous {
            if *active == name {
                debug!(modality = M::NAME, model = %name, "model already active");
                return Ok(());
            }
        }

        let backend = self.pick_client(&name);
        let client = self.clients.get(backend).ok_or_else(|| Error::BackendUnavailable {
            modality: M::NAME,
            backend: backend.to_string(),
        })?;

        if let Some((active, active_backend)) = previous {
            if active_backend != backend {
                warn!(
                    modality = M::NAME,
                    active = %active,
                    "loading '{}' while '{}' stays resident on {}",
                    name, active, active_backend
                );
            }
        }

        info!(modality = M::NAME, model = %name, backend = %backend, "loading model");
        let start = Instant::now();
        if let Err(e) = client.load_model(&name).await {
            // A client that released its resident model before failing no
            // longer serves the active one.
            let mut active = self.active.write();
            let stale = active
                .as_ref()
                .map_or(false, |a| a.client.loaded_model().as_deref() != Some(a.name.as_str()));
            if stale {
                warn!(modality = M::NAME, "active model was released by the failed load");
                *active = None;
            }
            return Err(e);
        }
        info!(
            modality = M::NAME,
            model = %name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "model loaded"
        );

        *self.active.write() = Some(ActiveModel {
            name,
            backend,
            client,
        });
        Ok(())
    }

    /// Release the active model. Always ends with nothing active, even if the
    /// backend reports a failure while releasing.
    pub async fn unload_model(&self) -> Result<()> {
        let _guard = self.transition.lock().await;

        let previous = self.active.write().take();
        match previous {
            None => Ok(()),
            Some(active) => {
                info!(modality = M::NAME, model = %active.name, "unloading model");
                active.client.unload_model().await.map_err(|e| {
                    warn!(modality = M::NAME, model = %active.name, "unload failed: {}", e);
                    e
                })
            }
        }
    }

    /// Local models plus every client's remote catalog, sorted. Duplicates
    /// are kept.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let mut models = M::list_local_models(self.settings.models_dir())?;

        for client in self.clients.iter() {
            match client.list_remote_models().await {
                Ok(remote) => models.extend(remote),
                Err(e) => warn!(
                    modality = M::NAME,
                    backend = %client.backend(),
                    "remote model catalog unavailable: {}", e
                ),
            }
        }

        models.sort();
        Ok(models)
    }

    /// Run `request` on the active model, loading the default model first if
    /// nothing is active.
    pub async fn infer(&self, request: &M::Request) -> Result<M::Output> {
        let current = self.active.read().clone();
        let active = match current {
            Some(active) => active,
            None => {
                self.load_model(None).await?;
                let loaded = self.active.read().clone();
                loaded.ok_or(Error::ModelNotLoaded { modality: M::NAME })?
            }
        };

        debug!(modality = M::NAME, model = %active.name, backend = %active.backend, "running inference");
        let options = active.client.convert_options(request)?;
        active.client.infer(options).await
    }

    /// Run `request` on a specific backend without touching the active state.
    /// Used for stateless remote backends.
    pub async fn infer_on(&self, backend: M::Backend, request: &M::Request) -> Result<M::Output> {
        let client = self.clients.get(backend).ok_or_else(|| Error::BackendUnavailable {
            modality: M::NAME,
            backend: backend.to_string(),
        })?;
        let options = client.convert_options(request)?;
        client.infer(options).await
    }
}
