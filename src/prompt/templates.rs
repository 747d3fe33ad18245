use super::Message;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

/// Prompt layouts understood by the supported model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Template {
    Flexible,
    Alpaca,
    #[serde(rename = "Alpaca_Input")]
    AlpacaInput,
    #[serde(rename = "ChatML")]
    ChatMl,
    MistralInstruct,
    UserAssistant,
    UserAssistantNewlines,
}

/// Model-name patterns and the template each selects, checked in order.
pub const TEMPLATE_PATTERNS: &[(&str, Template)] = &[
    ("*dolphin-2*", Template::ChatMl),
    ("*emerhyst-20b*", Template::Alpaca),
    ("*luna-ai-llama2*", Template::UserAssistant),
    ("*mistral-7b-instruct*", Template::MistralInstruct),
    ("*mythalion-13b*", Template::Alpaca),
    ("*mythomax-l2-13b*", Template::Alpaca),
    ("*openhermes-2.*-mistral-7b*", Template::ChatMl),
    ("*platypus-30b*", Template::Alpaca),
    ("*solar-10.7b-instruct*", Template::UserAssistantNewlines),
];

/// Select the template for a model by matching its lowercased name against
/// [`TEMPLATE_PATTERNS`].
pub fn select_template(model_name: &str) -> Result<Template> {
    let lowered = model_name.to_lowercase();
    TEMPLATE_PATTERNS
        .iter()
        .find(|(pattern, _)| {
            glob::Pattern::new(pattern)
                .map(|p| p.matches(&lowered))
                .unwrap_or(false)
        })
        .map(|(_, template)| *template)
        .ok_or_else(|| Error::UnsupportedModel(model_name.to_string()))
}

/// Everything a template needs, already flattened to strings.
#[derive(Debug, Clone, Copy)]
pub struct TemplateInput<'a> {
    pub user: &'a str,
    pub system: &'a str,
    pub prefix_response: &'a str,
    pub prior_msgs: &'a [Message],
    pub user_role: &'a str,
    pub assistant_role: &'a str,
}

impl Template {
    pub const ALL: [Template; 7] = [
        Template::Flexible,
        Template::Alpaca,
        Template::AlpacaInput,
        Template::ChatMl,
        Template::MistralInstruct,
        Template::UserAssistant,
        Template::UserAssistantNewlines,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Template::Flexible => "flexible",
            Template::Alpaca => "Alpaca",
            Template::AlpacaInput => "Alpaca_Input",
            Template::ChatMl => "ChatML",
            Template::MistralInstruct => "MistralInstruct",
            Template::UserAssistant => "UserAssistant",
            Template::UserAssistantNewlines => "UserAssistantNewlines",
        }
    }

    pub fn render(self, input: &TemplateInput<'_>) -> String {
        let mut out = String::new();
        match self {
            Template::Flexible => flexible(&mut out, input),
            Template::Alpaca => alpaca(&mut out, input),
            Template::AlpacaInput => alpaca_input(&mut out, input),
            Template::ChatMl => chatml(&mut out, input),
            Template::MistralInstruct => mistral_instruct(&mut out, input),
            Template::UserAssistant => user_assistant(&mut out, input),
            Template::UserAssistantNewlines => user_assistant_newlines(&mut out, input),
        }
        out
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Template {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Template::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidInput(format!("unknown template '{}'", s)))
    }
}

/// First character uppercased, the rest lowercased.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

// Writing into a String cannot fail, so the fmt::Result of write! is dropped.

fn flexible(out: &mut String, input: &TemplateInput<'_>) {
    if !input.system.is_empty() {
        let _ = writeln!(out, "{}", input.system.trim());
    }
    let has_prior = !input.prior_msgs.is_empty();
    if has_prior {
        for msg in input.prior_msgs {
            let _ = writeln!(out, "{}: {}", capitalize(&msg.role), msg.content);
        }
        let _ = write!(out, "{}: ", capitalize(input.user_role));
    }
    let _ = writeln!(out, "{}", input.user.trim());
    if input.prefix_response.is_empty() {
        if has_prior {
            let _ = write!(out, "{}: ", capitalize(input.assistant_role));
        }
        out.push_str("RESPONSE:\n");
    } else {
        out.push_str(input.prefix_response);
    }
}

fn alpaca(out: &mut String, input: &TemplateInput<'_>) {
    let has_prior = !input.prior_msgs.is_empty();
    if !input.system.is_empty() {
        if has_prior {
            out.push_str("### Instruction:\n");
        }
        let _ = write!(out, "{}\n\n", input.system.trim());
    }
    if has_prior {
        for msg in input.prior_msgs {
            let _ = write!(out, "{}: {}\n\n", capitalize(&msg.role), msg.content);
        }
        let _ = write!(out, "{}: ", capitalize(input.user_role));
    } else {
        out.push_str("### Instruction:\n");
    }
    let _ = writeln!(out, "{}", input.user.trim());
    out.push_str("### Response:\n");
    out.push_str(input.prefix_response);
}

fn alpaca_input(out: &mut String, input: &TemplateInput<'_>) {
    let has_prior = !input.prior_msgs.is_empty();
    if !input.system.is_empty() {
        let _ = write!(out, "### Instruction:\n{}\n\n", input.system.trim());
    }
    out.push_str("### Input:\n");
    if has_prior {
        for msg in input.prior_msgs {
            let _ = write!(out, "{}: {}\n\n", capitalize(&msg.role), msg.content);
        }
        let _ = write!(out, "{}: ", capitalize(input.user_role));
    }
    let _ = writeln!(out, "{}", input.user.trim());
    if has_prior {
        let _ = writeln!(out, "### {} Response:", capitalize(input.assistant_role));
    } else {
        out.push_str("### Response:\n");
    }
    out.push_str(input.prefix_response);
}

fn chatml(out: &mut String, input: &TemplateInput<'_>) {
    if !input.system.is_empty() {
        let _ = writeln!(out, "<|im_start|>system\n{}<|im_end|>", input.system.trim());
    }
    for msg in input.prior_msgs {
        let _ = writeln!(out, "<|im_start|>{}\n{}<|im_end|>", msg.role, msg.content);
    }
    let _ = writeln!(
        out,
        "<|im_start|>{}\n{}<|im_end|>",
        input.user_role.to_lowercase(),
        input.user.trim()
    );
    let _ = writeln!(out, "<|im_start|>{}", input.assistant_role.to_lowercase());
    out.push_str(input.prefix_response);
}

fn mistral_instruct(out: &mut String, input: &TemplateInput<'_>) {
    // The opening tag only follows system text; bare prompts start with the
    // user text and history without system text opens with a stray close.
    out.push_str("<s>");
    if !input.system.is_empty() {
        let _ = write!(out, "[INST] {}", input.system.trim());
    }
    if !input.prior_msgs.is_empty() {
        out.push_str("\n[/INST]\n");
        for msg in input.prior_msgs {
            if msg.role == input.user_role {
                let _ = writeln!(out, "[INST] {}: {} [/INST]", msg.role, msg.content);
            } else {
                let _ = writeln!(out, "{}: {}", msg.role, msg.content);
            }
        }
        out.push_str("[INST] ");
    }
    let _ = write!(out, "{} [/INST]", input.user.trim());
    if !input.prefix_response.is_empty() {
        let _ = write!(out, "\n{}", input.prefix_response);
    }
}

fn user_assistant(out: &mut String, input: &TemplateInput<'_>) {
    if !input.system.is_empty() {
        let _ = writeln!(out, "{}", input.system.trim());
    }
    let standard_roles = input.user_role == super::USER_ROLE && input.assistant_role == super::ASSISTANT_ROLE;
    for msg in input.prior_msgs {
        let role = if standard_roles {
            msg.role.as_str()
        } else if msg.role == input.user_role {
            "USER"
        } else if msg.role == input.assistant_role {
            "ASSISTANT"
        } else {
            msg.role.as_str()
        };
        let _ = writeln!(out, "{}:\n{}", role, msg.content.trim());
    }
    let _ = writeln!(out, "USER:\n{}", input.user.trim());
    out.push_str("ASSISTANT:\n");
    out.push_str(input.prefix_response);
}

fn user_assistant_newlines(out: &mut String, input: &TemplateInput<'_>) {
    if !input.system.is_empty() {
        let _ = write!(out, "{}\n\n", input.system.trim());
    }
    for msg in input.prior_msgs {
        let _ = write!(out, "{}:\n{}\n\n", capitalize(&msg.role), msg.content.trim());
    }
    let _ = write!(out, "### {}:\n{}\n\n", capitalize(input.user_role), input.user.trim());
    let _ = writeln!(out, "### {}:", capitalize(input.assistant_role));
    out.push_str(input.prefix_response);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(user: &'a str, system: &'a str, prior: &'a [Message], prefix: &'a str) -> TemplateInput<'a> {
        TemplateInput {
            user,
            system,
            prefix_response: prefix,
            prior_msgs: prior,
            user_role: "user",
            assistant_role: "assistant",
        }
    }

    #[test]
    fn test_select_template_is_case_insensitive() {
        assert_eq!(select_template("Dolphin-2.1-Mistral-7B").unwrap(), Template::ChatMl);
        assert_eq!(
            select_template("openhermes-2.5-mistral-7b.Q5_K_M.gguf").unwrap(),
            Template::ChatMl
        );
        assert_eq!(
            select_template("solar-10.7b-instruct-v1.0.Q4_K_M.gguf").unwrap(),
            Template::UserAssistantNewlines
        );
    }

    #[test]
    fn test_select_template_unknown() {
        assert!(matches!(
            select_template("unknown-model-xyz"),
            Err(Error::UnsupportedModel(_))
        ));
    }

    #[test]
    fn test_chatml_layout() {
        let prior = [Message::user("Hello"), Message::assistant("Hi!")];
        let rendered = Template::ChatMl.render(&input(" Next? ", "Be nice.", &prior, ""));
        assert_eq!(
            rendered,
            "<|im_start|>system\nBe nice.<|im_end|>\n\
             <|im_start|>user\nHello<|im_end|>\n\
             <|im_start|>assistant\nHi!<|im_end|>\n\
             <|im_start|>user\nNext?<|im_end|>\n\
             <|im_start|>assistant\n"
        );
    }

    #[test]
    fn test_alpaca_without_history() {
        let rendered = Template::Alpaca.render(&input("Write a haiku", "", &[], "Sure:"));
        assert_eq!(rendered, "### Instruction:\nWrite a haiku\n### Response:\nSure:");
    }

    #[test]
    fn test_alpaca_with_history_and_system() {
        let prior = [Message::user("hi"), Message::assistant("hello")];
        let rendered = Template::Alpaca.render(&input("more", "sys", &prior, ""));
        assert_eq!(
            rendered,
            "### Instruction:\nsys\n\nUser: hi\n\nAssistant: hello\n\nUser: more\n### Response:\n"
        );
    }

    #[test]
    fn test_alpaca_input_names_responder_with_history() {
        let prior = [Message::user("hi")];
        let rendered = Template::AlpacaInput.render(&input("q", "", &prior, ""));
        assert_eq!(rendered, "### Input:\nUser: hi\n\nUser: q\n### Assistant Response:\n");
        let rendered = Template::AlpacaInput.render(&input("q", "s", &[], ""));
        assert_eq!(rendered, "### Instruction:\ns\n\n### Input:\nq\n### Response:\n");
    }

    #[test]
    fn test_flexible_default_response_marker() {
        assert_eq!(Template::Flexible.render(&input("q", "", &[], "")), "q\nRESPONSE:\n");
        let prior = [Message::user("a")];
        assert_eq!(
            Template::Flexible.render(&input("q", "s", &prior, "")),
            "s\nUser: a\nUser: q\nAssistant: RESPONSE:\n"
        );
        assert_eq!(Template::Flexible.render(&input("q", "", &[], "A:")), "q\nA:");
    }

    #[test]
    fn test_mistral_instruct_layouts() {
        assert_eq!(
            Template::MistralInstruct.render(&input("Hi", "", &[], "")),
            "<s>Hi [/INST]"
        );
        assert_eq!(
            Template::MistralInstruct.render(&input("Hi", "Sys", &[], "Ok")),
            "<s>[INST] SysHi [/INST]\nOk"
        );
        let prior = [Message::user("a"), Message::assistant("b")];
        assert_eq!(
            Template::MistralInstruct.render(&input("Hi", "", &prior, "")),
            "<s>\n[/INST]\n[INST] user: a [/INST]\nassistant: b\n[INST] Hi [/INST]"
        );
    }

    #[test]
    fn test_user_assistant_layouts() {
        let prior = [Message::user(" a "), Message::assistant("b")];
        assert_eq!(
            Template::UserAssistant.render(&input("q", "s", &prior, "")),
            "s\nuser:\na\nassistant:\nb\nUSER:\nq\nASSISTANT:\n"
        );
        assert_eq!(
            Template::UserAssistantNewlines.render(&input("q", "s", &prior, "x")),
            "s\n\nUser:\na\n\nAssistant:\nb\n\n### User:\nq\n\n### Assistant:\nx"
        );
    }

    #[test]
    fn test_template_names_round_trip() {
        for template in Template::ALL {
            assert_eq!(template.name().parse::<Template>().unwrap(), template);
        }
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("uSER"), "User");
        assert_eq!(capitalize(""), "");
    }
}
