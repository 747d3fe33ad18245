//! Prompt assembly.
//!
//! Callers describe a prompt as [`PromptParts`]: ordered user and system
//! fragments plus prior conversation turns. Completion models receive a
//! single string laid out with the model family's [`Template`]; chat models
//! receive a message list built by [`render_messages`].

mod templates;

pub use templates::{select_template, Template, TemplateInput, TEMPLATE_PATTERNS};

use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const USER_ROLE: &str = "user";
pub const ASSISTANT_ROLE: &str = "assistant";
pub const SYSTEM_ROLE: &str = "system";

/// A chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(SYSTEM_ROLE, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(USER_ROLE, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ASSISTANT_ROLE, content)
    }
}

/// A prompt fragment. Disabled fragments are skipped entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPart {
    #[serde(rename = "use", default = "enabled")]
    pub enabled: bool,
    pub val: String,
    #[serde(default)]
    pub pre: String,
    #[serde(default)]
    pub suf: String,
}

fn enabled() -> bool {
    true
}

impl PromptPart {
    pub fn new(val: impl Into<String>) -> Self {
        Self {
            enabled: true,
            val: val.into(),
            pre: String::new(),
            suf: String::new(),
        }
    }

    pub fn with_prefix(mut self, pre: impl Into<String>) -> Self {
        self.pre = pre.into();
        self
    }

    pub fn with_suffix(mut self, suf: impl Into<String>) -> Self {
        self.suf = suf.into();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptParts {
    pub user: Vec<PromptPart>,
    #[serde(default)]
    pub system: Vec<PromptPart>,
    #[serde(default)]
    pub prior_msgs: Vec<Message>,
}

impl PromptParts {
    pub fn from_user(val: impl Into<String>) -> Self {
        Self {
            user: vec![PromptPart::new(val)],
            ..Default::default()
        }
    }
}

/// Concatenate `pre + val + suf` of every enabled part, in order.
pub fn render_part_sequence(parts: &[PromptPart]) -> String {
    parts
        .iter()
        .filter(|p| p.enabled)
        .fold(String::new(), |mut out, p| {
            out.push_str(&p.pre);
            out.push_str(&p.val);
            out.push_str(&p.suf);
            out
        })
}

/// Lay out `parts` with `template`.
pub fn render(parts: &PromptParts, template: Template, prefix_response: &str) -> String {
    let user = render_part_sequence(&parts.user);
    let system = render_part_sequence(&parts.system);
    let input = TemplateInput {
        user: &user,
        system: &system,
        prefix_response,
        prior_msgs: &parts.prior_msgs,
        user_role: USER_ROLE,
        assistant_role: ASSISTANT_ROLE,
    };
    template.render(&input)
}

/// Render `parts` for `model_name`, choosing the template from the model's
/// base name. Fails with `UnsupportedModel` when no template claims it.
pub fn parts_to_prompt(parts: &PromptParts, model_name: &str, prefix_response: &str) -> Result<String> {
    let base_name = model_name.rsplit('/').next().unwrap_or(model_name);
    let template = select_template(base_name)?;
    Ok(render(parts, template, prefix_response))
}

/// Build a chat message list: optional system message, prior turns as
/// given, the user message, then an assistant message holding
/// `prefix_response` when it is non-empty.
pub fn render_messages(parts: &PromptParts, prefix_response: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(parts.prior_msgs.len() + 3);

    let system = render_part_sequence(&parts.system);
    let system = system.trim();
    if !system.is_empty() {
        messages.push(Message::system(system));
    }

    messages.extend(parts.prior_msgs.iter().cloned());
    messages.push(Message::user(render_part_sequence(&parts.user).trim()));

    if !prefix_response.is_empty() {
        messages.push(Message::assistant(prefix_response));
    }
    messages
}
