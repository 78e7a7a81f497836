//! Declarative definitions loaded from YAML.
//!
//! Definitions are immutable once loaded. The MCP layer builds its registry
//! from them at startup and never mutates them afterwards.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Declared type of a tool or prompt parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterType {
    String,
    Integer,
    Number,
    Boolean,
    /// Any type name this crate does not know. Values are not checked.
    Other(String),
}

impl ParameterType {
    /// Parse a declared type name. Matching is case-insensitive.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "string" => Self::String,
            "integer" => Self::Integer,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            _ => Self::Other(name.to_string()),
        }
    }

    /// Type name as advertised in a JSON input schema.
    ///
    /// Unknown types are advertised as strings.
    pub fn schema_type(&self) -> &'static str {
        match self {
            Self::String | Self::Other(_) => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Integer => f.write_str("integer"),
            Self::Number => f.write_str("number"),
            Self::Boolean => f.write_str("boolean"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Input parameter schema.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Parameter {
    /// Declared type name (`string`, `integer`, `number`, `boolean`, ...).
    #[serde(rename = "type", default = "default_parameter_type")]
    pub type_name: String,

    #[serde(default)]
    pub description: String,

    /// Default value. A YAML `null` is treated as "no default".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Parameter {
    /// The parsed declared type.
    pub fn kind(&self) -> ParameterType {
        ParameterType::parse(&self.type_name)
    }
}

fn default_parameter_type() -> String {
    "string".to_string()
}

/// Canned payload returned in place of query results when no database is reachable.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackPayload {
    /// Where the payload came from: a file path, or `inline`.
    pub reference: String,
    pub data: Value,
}

/// A tool: a named, parameterized operation that renders to a query string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub parameters: BTreeMap<String, Parameter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,

    #[serde(alias = "template")]
    pub sql_template: String,

    #[serde(default)]
    pub required: Vec<String>,

    /// JSON file (relative to the definition file) used as fallback payload.
    #[serde(default, alias = "return_test_message", skip_serializing_if = "Option::is_none")]
    pub fallback_file: Option<PathBuf>,

    /// Inline fallback payload.
    #[serde(default, rename = "fallback", skip_serializing_if = "Option::is_none")]
    pub inline_fallback: Option<Value>,

    /// Fallback resolved by the loader from `fallback_file` or `fallback`.
    #[serde(skip)]
    pub fallback_payload: Option<FallbackPayload>,
}

impl ToolDefinition {
    /// Whether `name` is listed in `required`.
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

/// A prompt: a text template rendered by plain placeholder substitution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub parameters: BTreeMap<String, Parameter>,

    pub prompt: String,
}

/// Glossary body.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Glossary {
    #[serde(default)]
    pub words: Value,
}

/// A glossary of domain terms exposed to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryResource {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub resource: Glossary,
}

/// Any definition found in a definitions directory.
#[derive(Debug, Clone)]
pub enum Definition {
    Tool(ToolDefinition),
    Prompt(PromptDefinition),
    Glossary(GlossaryResource),
}

impl Definition {
    pub fn name(&self) -> &str {
        match self {
            Self::Tool(t) => &t.name,
            Self::Prompt(p) => &p.name,
            Self::Glossary(g) => &g.name,
        }
    }
}

/// Definitions split by kind, in load order.
#[derive(Debug, Clone, Default)]
pub struct DefinitionSet {
    pub tools: Vec<ToolDefinition>,
    pub prompts: Vec<PromptDefinition>,
    pub glossaries: Vec<GlossaryResource>,
}

impl From<Vec<Definition>> for DefinitionSet {
    fn from(definitions: Vec<Definition>) -> Self {
        let mut set = Self::default();
        for definition in definitions {
            match definition {
                Definition::Tool(t) => set.tools.push(t),
                Definition::Prompt(p) => set.prompts.push(p),
                Definition::Glossary(g) => set.glossaries.push(g),
            }
        }
        set
    }
}
