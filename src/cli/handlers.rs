use crate::backends::{Img, Llm, Stt, Tts};
use crate::cli::commands::{ConfigAction, ModalityKind, ModelsAction, OptionsAction, OutputFormat, PromptAction};
use crate::config::ServiceConfig;
use crate::hub::{Hub, ModalityService, RuntimeSet};
use crate::modality::{pick_client, Modality, ModalitySettings};
use crate::options::CompletionOptions;
use crate::prompt::{parts_to_prompt, render, render_messages, select_template, PromptParts};
use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing::debug;

fn print_list(items: &[String], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for item in items {
                println!("{}", item);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
    }
    Ok(())
}

async fn list_from<M: Modality>(service: Option<&ModalityService<M>>) -> Result<Vec<String>> {
    let service = service.ok_or_else(|| anyhow!("{} is disabled in the configuration", M::NAME))?;
    Ok(service.list().await?.models)
}

fn pick_for<M: Modality>(name: &str, settings: &ModalitySettings) -> String {
    pick_client(M::routes(), M::fallback(), name, settings.models_dir()).to_string()
}

pub async fn handle_models(action: ModelsAction, config: &ServiceConfig) -> Result<()> {
    match action {
        ModelsAction::List { modality, format } => {
            let hub = Hub::from_config(config, RuntimeSet::default())?;
            let models = match modality {
                ModalityKind::Llm => list_from(hub.llm.as_ref()).await?,
                ModalityKind::Tts => list_from(hub.tts.as_ref()).await?,
                ModalityKind::Stt => list_from(hub.stt.as_ref()).await?,
                ModalityKind::Img => list_from(hub.img.as_ref()).await?,
            };
            print_list(&models, format)
        }
        ModelsAction::Pick { name, modality } => {
            let backend = match modality {
                ModalityKind::Llm => pick_for::<Llm>(&name, &config.llm_settings()),
                ModalityKind::Tts => pick_for::<Tts>(&name, &config.tts_settings()),
                ModalityKind::Stt => pick_for::<Stt>(&name, &config.stt_settings()),
                ModalityKind::Img => pick_for::<Img>(&name, &config.img_settings()),
            };
            println!("{}", backend);
            Ok(())
        }
        ModelsAction::Voices { format } => {
            let hub = Hub::from_config(config, RuntimeSet::default())?;
            print_list(&hub.list_voices()?, format)
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

pub async fn handle_prompt(action: PromptAction) -> Result<()> {
    match action {
        PromptAction::Template { model } => {
            let base_name = model.rsplit('/').next().unwrap_or(&model);
            println!("{}", select_template(base_name)?);
            Ok(())
        }
        PromptAction::Render {
            model,
            parts,
            prefix_response,
            messages,
            template,
        } => {
            let parts: PromptParts = read_json(&parts)?;
            if messages {
                let rendered = render_messages(&parts, &prefix_response);
                println!("{}", serde_json::to_string_pretty(&rendered)?);
                return Ok(());
            }
            let prompt = match template {
                Some(template) => render(&parts, template, &prefix_response),
                None => parts_to_prompt(&parts, &model, &prefix_response)?,
            };
            print!("{}", prompt);
            Ok(())
        }
    }
}

pub async fn handle_options(action: OptionsAction) -> Result<()> {
    match action {
        OptionsAction::Convert { backend, options } => {
            let canonical: CompletionOptions = read_json(&options)?;
            debug!(backend = %backend, "converting options");
            let converted = backend.convert(&canonical)?;
            println!("{}", serde_json::to_string_pretty(&converted)?);
            Ok(())
        }
    }
}

pub async fn handle_config(action: ConfigAction, config: &ServiceConfig) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
            Ok(())
        }
    }
}
