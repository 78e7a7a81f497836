//! Definition source: discovers YAML definitions under a root directory.

use crate::config::ConfigError;
use crate::definition::{
    Definition, DefinitionSet, FallbackPayload, GlossaryResource, PromptDefinition,
    ToolDefinition,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Load every definition under `root`, walking subdirectories in sorted order.
///
/// A missing root is not an error: it yields an empty list.
pub fn list_definitions(root: impl AsRef<Path>) -> Result<Vec<Definition>, ConfigError> {
    Ok(load_with_paths(root.as_ref())?
        .into_iter()
        .map(|(_, definition)| definition)
        .collect())
}

/// Load every definition under `root`, split by kind.
pub fn load_definition_set(root: impl AsRef<Path>) -> Result<DefinitionSet, ConfigError> {
    list_definitions(root).map(DefinitionSet::from)
}

/// A non-fatal issue found in otherwise loadable definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionProblem {
    pub path: PathBuf,
    pub name: String,
    pub message: String,
}

/// Check loaded definitions for problems the loader tolerates.
///
/// Reports required parameters that are not declared, and names defined
/// more than once (the later definition wins at runtime).
pub fn check_definitions(root: impl AsRef<Path>) -> Result<Vec<DefinitionProblem>, ConfigError> {
    let mut problems = Vec::new();
    let mut seen: HashMap<(&'static str, String), PathBuf> = HashMap::new();

    for (path, definition) in load_with_paths(root.as_ref())? {
        let kind = match &definition {
            Definition::Tool(_) => "tool",
            Definition::Prompt(_) => "prompt",
            Definition::Glossary(_) => "glossary",
        };

        if let Definition::Tool(tool) = &definition {
            for required in &tool.required {
                if !tool.parameters.contains_key(required) {
                    problems.push(DefinitionProblem {
                        path: path.clone(),
                        name: tool.name.clone(),
                        message: format!(
                            "required parameter '{}' is not declared in parameters",
                            required
                        ),
                    });
                }
            }
        }

        let key = (kind, definition.name().to_string());
        if let Some(previous) = seen.get(&key) {
            problems.push(DefinitionProblem {
                path: path.clone(),
                name: definition.name().to_string(),
                message: format!(
                    "{} name is already defined in {}; this definition replaces it",
                    kind,
                    previous.display()
                ),
            });
        }
        seen.insert(key, path);
    }

    Ok(problems)
}

fn load_with_paths(root: &Path) -> Result<Vec<(PathBuf, Definition)>, ConfigError> {
    if !root.exists() {
        tracing::debug!(root = %root.display(), "Definitions directory not found");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    collect_yaml_files(root, &mut files)?;

    let mut definitions = Vec::with_capacity(files.len());
    for path in files {
        let definition = load_definition_file(&path)?;
        definitions.push((path, definition));
    }
    Ok(definitions)
}

fn collect_yaml_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ConfigError> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_yaml_files(&path, out)?;
        } else if path
            .extension()
            .map(|e| e == "yaml" || e == "yml")
            .unwrap_or(false)
        {
            out.push(path);
        }
    }
    Ok(())
}

/// Parse a single definition file.
pub fn load_definition_file(path: &Path) -> Result<Definition, ConfigError> {
    let content = fs::read_to_string(path)?;
    let value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|e| definition_error(path, e.to_string()))?;

    let has_key = |key: &str| value.get(key).is_some();

    if has_key("sql_template") || has_key("template") {
        let mut tool: ToolDefinition = serde_yaml::from_value(value)
            .map_err(|e| definition_error(path, e.to_string()))?;
        if tool.name.trim().is_empty() {
            return Err(definition_error(path, "tool name is required"));
        }
        if tool.sql_template.trim().is_empty() {
            return Err(definition_error(path, "sql_template is required"));
        }
        tool.fallback_payload = resolve_fallback(path, &tool);
        Ok(Definition::Tool(tool))
    } else if has_key("prompt") {
        let prompt: PromptDefinition = serde_yaml::from_value(value)
            .map_err(|e| definition_error(path, e.to_string()))?;
        if prompt.name.trim().is_empty() {
            return Err(definition_error(path, "prompt name is required"));
        }
        if prompt.prompt.trim().is_empty() {
            return Err(definition_error(path, "prompt text is required"));
        }
        Ok(Definition::Prompt(prompt))
    } else if has_key("resource") {
        let glossary: GlossaryResource = serde_yaml::from_value(value)
            .map_err(|e| definition_error(path, e.to_string()))?;
        Ok(Definition::Glossary(glossary))
    } else {
        Err(definition_error(
            path,
            "unrecognized definition: expected one of sql_template, prompt or resource",
        ))
    }
}

fn resolve_fallback(path: &Path, tool: &ToolDefinition) -> Option<FallbackPayload> {
    if let Some(file) = &tool.fallback_file {
        let resolved = if file.is_absolute() {
            file.clone()
        } else {
            path.parent()
                .map(|dir| dir.join(file))
                .unwrap_or_else(|| file.clone())
        };

        let parsed = fs::read_to_string(&resolved)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str(&raw).map_err(|e| e.to_string()));

        return match parsed {
            Ok(data) => Some(FallbackPayload {
                reference: file.display().to_string(),
                data,
            }),
            Err(e) => {
                tracing::warn!(
                    tool = %tool.name,
                    file = %resolved.display(),
                    error = %e,
                    "Failed to load fallback payload; tool loads without one"
                );
                None
            }
        };
    }

    tool.inline_fallback.clone().map(|data| FallbackPayload {
        reference: "inline".to_string(),
        data,
    })
}

fn definition_error(path: &Path, reason: impl Into<String>) -> ConfigError {
    ConfigError::Definition {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}
