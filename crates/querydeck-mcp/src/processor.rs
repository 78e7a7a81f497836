//! Per-tool SQL template processing.
//!
//! A [`TemplateProcessor`] is bound to one tool definition. It validates
//! caller arguments against the declared parameters, layers them over the
//! declared defaults and renders the tool's SQL template. It only produces
//! text; execution happens elsewhere.

use crate::template::{Template, TemplateError};
use querydeck_core::{ParameterType, ToolDefinition};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Reserved argument that selects preview mode. Never validated.
pub const PREVIEW_KEY: &str = "__preview";

/// A single argument whose runtime kind does not match its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeMismatch {
    pub name: String,
    pub expected: String,
    pub actual: String,
}

/// Every validation problem found in one set of arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ValidationError {
    pub missing: Vec<String>,
    #[serde(rename = "typeMismatches")]
    pub type_mismatches: Vec<TypeMismatch>,
}

impl ValidationError {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.type_mismatches.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!(
                "missing required parameter: {}",
                self.missing.join(", ")
            ));
        }
        for m in &self.type_mismatches {
            parts.push(format!(
                "parameter {}: expected {}, got {}",
                m.name, m.expected, m.actual
            ));
        }
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// SQL template processor bound to a single tool.
#[derive(Debug, Clone)]
pub struct TemplateProcessor {
    definition: ToolDefinition,
    template: Result<Template, TemplateError>,
}

impl TemplateProcessor {
    /// Create a processor, parsing the tool's template once.
    pub fn new(definition: ToolDefinition) -> Self {
        let template = Template::parse(&definition.sql_template);
        if let Err(e) = &template {
            tracing::warn!(tool = %definition.name, error = %e, "Tool has an invalid SQL template");
        }
        Self {
            definition,
            template,
        }
    }

    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Split caller arguments into declared parameters and the preview flag.
    ///
    /// Arguments the tool does not declare are dropped.
    pub fn prepare_arguments(
        &self,
        mut arguments: Map<String, Value>,
    ) -> Result<(Map<String, Value>, bool), TypeMismatch> {
        let preview = match arguments.remove(PREVIEW_KEY) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => b,
            Some(other) => {
                return Err(TypeMismatch {
                    name: PREVIEW_KEY.to_string(),
                    expected: "boolean".to_string(),
                    actual: kind_name(&other).to_string(),
                });
            }
        };

        let (declared, ignored): (Map<String, Value>, Map<String, Value>) = arguments
            .into_iter()
            .partition(|(name, _)| self.definition.parameters.contains_key(name));
        if !ignored.is_empty() {
            tracing::debug!(
                tool = %self.definition.name,
                ignored = ?ignored.keys().collect::<Vec<_>>(),
                "Dropping undeclared arguments"
            );
        }

        Ok((declared, preview))
    }

    /// Check required parameters and declared types.
    pub fn validate(&self, params: &Map<String, Value>) -> Result<(), ValidationError> {
        let mut error = ValidationError::default();

        for required in &self.definition.required {
            if !params.contains_key(required) {
                error.missing.push(required.clone());
            }
        }

        for (name, value) in params {
            if name == PREVIEW_KEY {
                continue;
            }
            let Some(declared) = self.definition.parameters.get(name) else {
                continue;
            };
            let expected = declared.kind();
            if !matches_type(value, &expected) {
                error.type_mismatches.push(TypeMismatch {
                    name: name.clone(),
                    expected: expected.to_string(),
                    actual: kind_name(value).to_string(),
                });
            }
        }

        if error.is_empty() { Ok(()) } else { Err(error) }
    }

    /// Layer caller parameters over declared defaults.
    pub fn merge(&self, params: &Map<String, Value>) -> Map<String, Value> {
        let mut merged = Map::new();
        for (name, parameter) in &self.definition.parameters {
            if let Some(default) = &parameter.default {
                merged.insert(name.clone(), default.clone());
            }
        }
        for (name, value) in params {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }

    /// Render the tool's SQL with defaults applied, then tidy whitespace.
    pub fn render(&self, params: &Map<String, Value>) -> Result<String, TemplateError> {
        let template = self.template.as_ref().map_err(|e| e.clone())?;
        let rendered = template.render(&self.merge(params))?;
        Ok(normalize_whitespace(&rendered))
    }
}

/// Trim the text and collapse runs of empty lines to a single empty line.
///
/// Lines holding only spaces or tabs are content and are kept as written.
pub fn normalize_whitespace(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut newlines = 0;
    for c in sql.trim().chars() {
        if c == '\n' {
            newlines += 1;
            if newlines > 2 {
                continue;
            }
        } else {
            newlines = 0;
        }
        out.push(c);
    }
    out
}

fn matches_type(value: &Value, expected: &ParameterType) -> bool {
    match expected {
        ParameterType::String => value.is_string(),
        ParameterType::Integer => match value {
            Value::Number(n) => {
                n.is_i64() || n.is_u64() || n.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
            }
            _ => false,
        },
        ParameterType::Number => value.is_number(),
        ParameterType::Boolean => value.is_boolean(),
        ParameterType::Other(_) => true,
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
