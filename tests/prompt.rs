use aihub_core::prompt::{parts_to_prompt, render, render_messages, Message, PromptParts, Template};
use aihub_core::Error;

const CONVERSATION: &str = r#"{
    "user": [{"val": "Summarize this."}, {"use": false, "val": "ignored"}],
    "system": [{"pre": "You are ", "val": "terse", "suf": "."}],
    "prior_msgs": [
        {"role": "user", "content": "Hi"},
        {"role": "assistant", "content": "Hello!"}
    ]
}"#;

fn conversation() -> PromptParts {
    serde_json::from_str(CONVERSATION).unwrap()
}

#[test]
fn test_chatml_conversation() {
    let prompt = parts_to_prompt(&conversation(), "models/dolphin-2.2.1-mistral-7b.Q5_K_M.gguf", "").unwrap();
    assert_eq!(
        prompt,
        "<|im_start|>system\nYou are terse.<|im_end|>\n\
         <|im_start|>user\nHi<|im_end|>\n\
         <|im_start|>assistant\nHello!<|im_end|>\n\
         <|im_start|>user\nSummarize this.<|im_end|>\n\
         <|im_start|>assistant\n"
    );
}

#[test]
fn test_alpaca_conversation() {
    let prompt = parts_to_prompt(&conversation(), "mythomax-l2-13b.Q8_0.gguf", "").unwrap();
    assert_eq!(
        prompt,
        "### Instruction:\nYou are terse.\n\nUser: Hi\n\nAssistant: Hello!\n\nUser: Summarize this.\n### Response:\n"
    );
}

#[test]
fn test_mistral_instruct_conversation_with_prefix() {
    let prompt = parts_to_prompt(&conversation(), "mistral-7b-instruct-v0.2.Q4_K_M.gguf", "Sure,").unwrap();
    assert_eq!(
        prompt,
        "<s>[INST] You are terse.\n[/INST]\n[INST] user: Hi [/INST]\nassistant: Hello!\n[INST] Summarize this. [/INST]\nSure,"
    );
}

#[test]
fn test_mistral_instruct_keeps_upstream_openings() {
    let bare = PromptParts::from_user("Hi");
    assert_eq!(render(&bare, Template::MistralInstruct, ""), "<s>Hi [/INST]");

    let with_system = PromptParts {
        prior_msgs: Vec::new(),
        ..conversation()
    };
    assert_eq!(
        render(&with_system, Template::MistralInstruct, ""),
        "<s>[INST] You are terse.Summarize this. [/INST]"
    );
}

#[test]
fn test_user_assistant_conversation() {
    let prompt = parts_to_prompt(&conversation(), "luna-ai-llama2-uncensored.Q4_0.gguf", "").unwrap();
    assert_eq!(
        prompt,
        "You are terse.\nuser:\nHi\nassistant:\nHello!\nUSER:\nSummarize this.\nASSISTANT:\n"
    );
}

#[test]
fn test_user_assistant_newlines_conversation() {
    let prompt = parts_to_prompt(&conversation(), "solar-10.7b-instruct-v1.0.Q4_K_M.gguf", "").unwrap();
    assert_eq!(
        prompt,
        "You are terse.\n\nUser:\nHi\n\nAssistant:\nHello!\n\n### User:\nSummarize this.\n\n### Assistant:\n"
    );
}

#[test]
fn test_explicit_template_bypasses_selection() {
    let parts = PromptParts {
        prior_msgs: Vec::new(),
        ..conversation()
    };
    let template: Template = "flexible".parse().unwrap();
    assert_eq!(render(&parts, template, ""), "You are terse.\nSummarize this.\nRESPONSE:\n");
}

#[test]
fn test_messages_for_chat_models() {
    let messages = render_messages(&conversation(), "");
    assert_eq!(
        messages,
        vec![
            Message::system("You are terse."),
            Message::user("Hi"),
            Message::assistant("Hello!"),
            Message::user("Summarize this."),
        ]
    );
}

#[test]
fn test_unknown_family_is_rejected() {
    let err = parts_to_prompt(&conversation(), "llama-2-7b-chat.Q4_0.gguf", "").unwrap_err();
    assert_eq!(err.to_string(), "Model llama-2-7b-chat.Q4_0.gguf not supported");
    assert!(matches!(err, Error::UnsupportedModel(_)));
}
