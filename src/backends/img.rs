//! Image generation modality.

use super::local::{LocalWeightsClient, ModelLayout};
use crate::error::{Error, Result};
use crate::modality::{LocalRuntime, Modality, Route};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CHECKPOINT_EXTENSION: &str = ".safetensors";

/// Schedulers the diffusers runtime can switch between.
pub const SAMPLERS: &[&str] = &["dpm++ 2m", "dpm++ 2m karras", "euler a"];

pub const DEFAULT_SAMPLER: &str = "euler a";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImgBackend {
    Diffusers,
}

impl fmt::Display for ImgBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImgBackend::Diffusers => f.write_str("diffusers"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Txt2ImgOptions {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default = "default_steps")]
    pub num_inference_steps: u32,
    /// Classifier-free guidance scale.
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f64,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// CLIP layers skipped when embedding the prompt.
    #[serde(default)]
    pub clip_skip: u32,
    #[serde(default)]
    pub seed: Option<i64>,
    #[serde(default)]
    pub sampler_name: Option<String>,
}

fn default_steps() -> u32 {
    20
}

fn default_guidance_scale() -> f64 {
    5.5
}

fn default_width() -> u32 {
    512
}

fn default_height() -> u32 {
    768
}

impl Txt2ImgOptions {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: String::new(),
            num_inference_steps: default_steps(),
            guidance_scale: default_guidance_scale(),
            width: default_width(),
            height: default_height(),
            clip_skip: 0,
            seed: None,
            sampler_name: None,
        }
    }
}

/// Images as produced by a runtime, PNG encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedImages {
    pub png: Vec<Vec<u8>>,
    pub nsfw_content_detected: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Txt2ImgResponse {
    /// `data:image/png;base64,` URLs.
    pub images: Vec<String>,
    pub nsfw_content_detected: Vec<bool>,
    /// Options actually used, sampler resolved.
    pub info: Txt2ImgOptions,
}

/// Validate a request and resolve its sampler. Sampler names are matched
/// case-insensitively; an unset sampler selects [`DEFAULT_SAMPLER`].
pub fn normalize_txt2img(request: &Txt2ImgOptions) -> Result<Txt2ImgOptions> {
    if request.prompt.trim().is_empty() {
        return Err(Error::InvalidInput("No prompt provided".into()));
    }
    if request.width == 0 || request.height == 0 {
        return Err(Error::InvalidInput(format!(
            "invalid image size {}x{}",
            request.width, request.height
        )));
    }

    let sampler = match request.sampler_name.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_SAMPLER.to_string(),
        Some(name) => {
            let lowered = name.to_lowercase();
            if !SAMPLERS.contains(&lowered.as_str()) {
                return Err(Error::InvalidInput(format!("unknown sampler '{}'", name)));
            }
            lowered
        }
    };

    Ok(Txt2ImgOptions {
        sampler_name: Some(sampler),
        ..request.clone()
    })
}

pub struct Img;

impl Modality for Img {
    const NAME: &'static str = "img";

    type Backend = ImgBackend;
    type Request = Txt2ImgOptions;
    type Options = Txt2ImgOptions;
    type Output = GeneratedImages;

    fn routes() -> &'static [Route<ImgBackend>] {
        &[]
    }

    fn fallback() -> ImgBackend {
        ImgBackend::Diffusers
    }

    /// `.safetensors` checkpoints, skipping inpainting variants.
    fn list_local_models(models_dir: Option<&Path>) -> Result<Vec<String>> {
        let Some(dir) = models_dir.filter(|d| d.is_dir()) else {
            return Ok(Vec::new());
        };

        let mut models = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_file() && name.ends_with(CHECKPOINT_EXTENSION) && !name.contains("inpaint") {
                models.push(name);
            }
        }
        Ok(models)
    }
}

pub fn diffusers_client(models_dir: Option<PathBuf>, runtime: Arc<dyn LocalRuntime<Img>>) -> LocalWeightsClient<Img> {
    LocalWeightsClient::new(
        ImgBackend::Diffusers,
        ModelLayout::File,
        models_dir,
        Arc::new(normalize_txt2img),
        runtime,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txt2img_defaults() {
        let options: Txt2ImgOptions = serde_json::from_str(r#"{"prompt":"a cat"}"#).unwrap();
        assert_eq!(options, Txt2ImgOptions::new("a cat"));
        assert_eq!(options.height, 768);
    }

    #[test]
    fn test_sampler_resolution() {
        let resolved = normalize_txt2img(&Txt2ImgOptions::new("a cat")).unwrap();
        assert_eq!(resolved.sampler_name.as_deref(), Some("euler a"));

        let mut request = Txt2ImgOptions::new("a cat");
        request.sampler_name = Some("DPM++ 2M Karras".into());
        assert_eq!(
            normalize_txt2img(&request).unwrap().sampler_name.as_deref(),
            Some("dpm++ 2m karras")
        );

        request.sampler_name = Some("ddim".into());
        assert!(normalize_txt2img(&request).is_err());
    }

    #[test]
    fn test_list_checkpoints_skips_inpaint() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sdxl.safetensors"), b"").unwrap();
        std::fs::write(dir.path().join("sd-inpaint.safetensors"), b"").unwrap();
        std::fs::write(dir.path().join("vae.pt"), b"").unwrap();
        assert_eq!(Img::list_local_models(Some(dir.path())).unwrap(), vec!["sdxl.safetensors"]);
    }
}
