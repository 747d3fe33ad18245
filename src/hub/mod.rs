//! Request-level services over the per-modality managers.
//!
//! Each [`ModalityService`] wraps one [`ModelManager`] and turns its results
//! into the response envelopes an outer API returns. The [`Hub`] owns one
//! service per enabled modality.

mod builder;
mod llm;
mod media;

pub use builder::{Hub, RuntimeSet};
pub use llm::CompletionRequest;

use crate::error::Result;
use crate::manager::ModelManager;
use crate::modality::Modality;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Name reported when nothing is active.
pub const NO_MODEL: &str = "None";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetModelResponse {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loader_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadStatus {
    Loaded,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadModelResponse {
    pub status: LoadStatus,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loader_name: Option<String>,
    /// Seconds spent on the request.
    pub time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnloadStatus {
    Unloaded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnloadModelResponse {
    pub status: UnloadStatus,
    /// Model active after the unload, so always [`NO_MODEL`].
    pub model: String,
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListModelsResponse {
    pub models: Vec<String>,
}

/// Service surface for one modality.
pub struct ModalityService<M: Modality> {
    manager: Arc<ModelManager<M>>,
}

impl<M: Modality> Clone for ModalityService<M> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}

impl<M: Modality> ModalityService<M> {
    pub fn new(manager: Arc<ModelManager<M>>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ModelManager<M>> {
        &self.manager
    }

    fn model_name(&self) -> String {
        self.manager
            .active_model_name()
            .unwrap_or_else(|| NO_MODEL.to_string())
    }

    pub fn get_model(&self) -> GetModelResponse {
        match self.manager.snapshot() {
            Some((model, backend)) => GetModelResponse {
                model,
                loader_name: Some(backend.to_string()),
            },
            None => GetModelResponse {
                model: NO_MODEL.to_string(),
                loader_name: None,
            },
        }
    }

    /// Switch to `name`. A different active model is unloaded first; a
    /// failed load is reported in the envelope, not as an error.
    pub async fn load(&self, name: &str) -> LoadModelResponse {
        let start = Instant::now();

        let target = match name {
            "" => self.manager.settings().default_model().unwrap_or_default(),
            name => name,
        };
        if let Some(active) = self.manager.active_model_name() {
            if active != target {
                if let Err(e) = self.manager.unload_model().await {
                    warn!(modality = M::NAME, "unload before switching models failed: {}", e);
                }
            }
        }

        let result = self.manager.load_model(Some(name)).await;
        let snapshot = self.manager.snapshot();
        let (status, error) = match result {
            Ok(()) => (LoadStatus::Loaded, None),
            Err(e) => (LoadStatus::Error, Some(e.to_string())),
        };

        LoadModelResponse {
            status,
            model: snapshot
                .as_ref()
                .map_or_else(|| NO_MODEL.to_string(), |(model, _)| model.clone()),
            loader_name: snapshot.map(|(_, backend)| backend.to_string()),
            time: start.elapsed().as_secs_f64(),
            error,
        }
    }

    pub async fn unload(&self) -> UnloadModelResponse {
        let start = Instant::now();
        if let Err(e) = self.manager.unload_model().await {
            warn!(modality = M::NAME, "unload reported an error: {}", e);
        }
        UnloadModelResponse {
            status: UnloadStatus::Unloaded,
            model: self.model_name(),
            time: start.elapsed().as_secs_f64(),
        }
    }

    pub async fn list(&self) -> Result<ListModelsResponse> {
        Ok(ListModelsResponse {
            models: self.manager.list_models().await?,
        })
    }

    /// Run a request on the active model, loading the default when nothing
    /// is active.
    pub async fn infer(&self, request: &M::Request) -> Result<M::Output> {
        self.manager.infer(request).await
    }
}
