//! Name-indexed registry of tools, prompts and glossaries.
//!
//! The registry is built once from a [`DefinitionSet`] and is read-only
//! afterwards, so it can be shared behind an `Arc` without locking.

use crate::processor::{PREVIEW_KEY, TemplateProcessor};
use crate::prompt;
use crate::protocol::{PromptDescriptor, ToolDescriptor};
use querydeck_core::{DefinitionSet, GlossaryResource, PromptDefinition, ToolDefinition};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Tools answered by the server itself rather than by rendering SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// Reports executor reachability.
    ConnectionStatus,
    /// Returns the loaded glossary.
    Glossary,
}

impl Builtin {
    fn for_name(name: &str) -> Option<Self> {
        match name {
            "connection_status" => Some(Self::ConnectionStatus),
            "glossary_resource" => Some(Self::Glossary),
            _ => None,
        }
    }
}

/// A registered tool.
#[derive(Debug, Clone)]
pub struct ToolEntry {
    processor: TemplateProcessor,
    builtin: Option<Builtin>,
}

impl ToolEntry {
    pub fn processor(&self) -> &TemplateProcessor {
        &self.processor
    }

    pub fn definition(&self) -> &ToolDefinition {
        self.processor.definition()
    }

    pub fn builtin(&self) -> Option<Builtin> {
        self.builtin
    }

    fn descriptor(&self) -> ToolDescriptor {
        let definition = self.definition();
        let mut properties = Map::new();
        for (name, param) in &definition.parameters {
            let mut property = Map::new();
            property.insert("type".into(), json!(param.kind().schema_type()));
            if !param.description.is_empty() {
                property.insert("description".into(), json!(param.description));
            }
            if let Some(default) = &param.default {
                property.insert("default".into(), default.clone());
            }
            properties.insert(name.clone(), Value::Object(property));
        }
        if self.builtin.is_none() {
            properties.insert(
                PREVIEW_KEY.to_string(),
                json!({
                    "type": "boolean",
                    "description": "Return the generated SQL without executing it",
                }),
            );
        }

        ToolDescriptor {
            name: definition.name.clone(),
            description: definition.description.clone(),
            input_schema: json!({
                "type": "object",
                "properties": properties,
                "required": definition.required,
            }),
        }
    }
}

/// Registry of everything the server can serve.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tools: BTreeMap<String, ToolEntry>,
    prompts: BTreeMap<String, PromptDefinition>,
    glossaries: Vec<GlossaryResource>,
}

impl Registry {
    /// Build a registry. A later definition replaces an earlier one with the same name.
    pub fn build(set: DefinitionSet) -> Self {
        let mut registry = Self::default();

        for tool in set.tools {
            let name = tool.name.clone();
            let entry = ToolEntry {
                builtin: Builtin::for_name(&name),
                processor: TemplateProcessor::new(tool),
            };
            if registry.tools.insert(name.clone(), entry).is_some() {
                tracing::warn!(tool = %name, "Duplicate tool definition, keeping the last one loaded");
            }
        }

        for prompt in set.prompts {
            let name = prompt.name.clone();
            if registry.prompts.insert(name.clone(), prompt).is_some() {
                tracing::warn!(prompt = %name, "Duplicate prompt definition, keeping the last one loaded");
            }
        }

        registry.glossaries = set.glossaries;

        tracing::debug!(
            tools = registry.tools.len(),
            prompts = registry.prompts.len(),
            glossaries = registry.glossaries.len(),
            "Built registry"
        );
        registry
    }

    /// Look up a tool by name.
    pub fn lookup(&self, name: &str) -> Option<&ToolEntry> {
        self.tools.get(name)
    }

    /// Tool descriptors for `tools/list`, sorted by name.
    pub fn tool_descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(ToolEntry::descriptor).collect()
    }

    pub fn prompt(&self, name: &str) -> Option<&PromptDefinition> {
        self.prompts.get(name)
    }

    /// Prompt descriptors for `prompts/list`, sorted by name.
    pub fn prompt_descriptors(&self) -> Vec<PromptDescriptor> {
        self.prompts.values().map(prompt::describe).collect()
    }

    /// The first glossary loaded, if any.
    pub fn glossary(&self) -> Option<&GlossaryResource> {
        self.glossaries.first()
    }

    /// Number of tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
