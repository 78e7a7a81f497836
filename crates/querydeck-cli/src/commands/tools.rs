//! Tool introspection commands.
//!
//! `querydeck tools list` - List tools and prompts (offline).
//! `querydeck tools check` - Report definition problems.
//! `querydeck tools render` - Print the SQL a call would generate.

use anyhow::{Context, Result};
use querydeck_core::{QuerydeckConfig, check_definitions, load_definition_set};
use querydeck_mcp::{Registry, TemplateError};
use serde_json::{Map, Value};

fn load_registry(config: &QuerydeckConfig) -> Result<Registry> {
    let definitions = load_definition_set(&config.definitions_dir).with_context(|| {
        format!(
            "Failed to load definitions from {}",
            config.definitions_dir.display()
        )
    })?;
    Ok(Registry::build(definitions))
}

/// List tools and prompts.
pub fn list(config: &QuerydeckConfig) -> Result<()> {
    let registry = load_registry(config)?;

    println!("Tools ({}):", registry.len());
    for tool in registry.tool_descriptors() {
        println!("  {:<32} {}", tool.name, first_line(&tool.description));
    }

    let prompts = registry.prompt_descriptors();
    if !prompts.is_empty() {
        println!("\nPrompts ({}):", prompts.len());
        for prompt in prompts {
            println!("  {:<32} {}", prompt.name, first_line(&prompt.description));
        }
    }
    Ok(())
}

/// Report definition problems; fails if there are any.
pub fn check(config: &QuerydeckConfig) -> Result<()> {
    let problems = check_definitions(&config.definitions_dir).with_context(|| {
        format!(
            "Failed to load definitions from {}",
            config.definitions_dir.display()
        )
    })?;

    if problems.is_empty() {
        println!(
            "✓ Definitions in {} are valid",
            config.definitions_dir.display()
        );
        return Ok(());
    }

    for problem in &problems {
        println!(
            "✗ {} ({}): {}",
            problem.name,
            problem.path.display(),
            problem.message
        );
    }
    anyhow::bail!("{} definition problem(s) found", problems.len())
}

/// Validate `args_json` against a tool and print its generated SQL.
pub fn render(config: &QuerydeckConfig, name: &str, args_json: &str) -> Result<()> {
    println!("{}", render_sql(&load_registry(config)?, name, args_json)?);
    Ok(())
}

fn render_sql(registry: &Registry, name: &str, args_json: &str) -> Result<String> {
    let entry = registry
        .lookup(name)
        .with_context(|| format!("Unknown tool: {}", name))?;
    if entry.builtin().is_some() {
        anyhow::bail!("Tool {} is built in and has no SQL to render", name);
    }

    let arguments: Map<String, Value> =
        serde_json::from_str(args_json).context("--args must be a JSON object")?;

    let processor = entry.processor();
    let (params, _) = processor
        .prepare_arguments(arguments)
        .map_err(|m| anyhow::anyhow!("argument {} must be a {}, got {}", m.name, m.expected, m.actual))?;
    processor.validate(&params)?;

    let sql = processor.render(&params)?;
    if sql.is_empty() {
        return Err(TemplateError::Empty.into());
    }
    Ok(sql)
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
