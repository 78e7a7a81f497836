//! Prompt rendering by plain `{{name}}` substitution.

use crate::protocol::{GetPromptResult, PromptArgument, PromptDescriptor, PromptMessage, ToolContent};
use querydeck_core::PromptDefinition;
use serde_json::Value;
use std::collections::BTreeMap;

/// Describe a prompt for `prompts/list`. Arguments without a default are required.
pub fn describe(prompt: &PromptDefinition) -> PromptDescriptor {
    PromptDescriptor {
        name: prompt.name.clone(),
        description: prompt.description.clone(),
        arguments: prompt
            .parameters
            .iter()
            .map(|(name, param)| PromptArgument {
                name: name.clone(),
                description: param.description.clone(),
                required: param.default.is_none(),
            })
            .collect(),
    }
}

/// Substitute caller arguments, then declared defaults, into the prompt text.
///
/// Placeholders for declared parameters that are still unfilled become empty.
/// Placeholders for undeclared names are left as they are. Substituted values
/// are never scanned again.
pub fn render(prompt: &PromptDefinition, arguments: &BTreeMap<String, String>) -> String {
    let mut text = String::with_capacity(prompt.prompt.len());
    let mut rest = prompt.prompt.as_str();

    while let Some(open) = rest.find("{{") {
        let Some(len) = rest[open + 2..].find("}}") else {
            break;
        };
        let close = open + 2 + len + 2;
        text.push_str(&rest[..open]);
        match lookup(prompt, arguments, &rest[open + 2..close - 2]) {
            Some(value) => text.push_str(&value),
            None => text.push_str(&rest[open..close]),
        }
        rest = &rest[close..];
    }

    text.push_str(rest);
    text
}

fn lookup(
    prompt: &PromptDefinition,
    arguments: &BTreeMap<String, String>,
    name: &str,
) -> Option<String> {
    if let Some(value) = arguments.get(name) {
        return Some(value.clone());
    }
    prompt.parameters.get(name).map(|param| match &param.default {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}

/// Build the `prompts/get` result.
pub fn get(prompt: &PromptDefinition, arguments: &BTreeMap<String, String>) -> GetPromptResult {
    GetPromptResult {
        description: prompt.description.clone(),
        messages: vec![PromptMessage {
            role: "user".to_string(),
            content: ToolContent::Text {
                text: render(prompt, arguments),
            },
        }],
    }
}
