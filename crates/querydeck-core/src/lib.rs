//! # querydeck-core
//!
//! Shared types for Querydeck: the declarative definitions that describe
//! tools, prompts and glossaries, the YAML loader that discovers them on
//! disk, and the server configuration.
//!
//! A definitions directory holds one YAML document per file. The document's
//! keys decide what it is:
//!
//! | Key present    | Definition kind |
//! |----------------|-----------------|
//! | `sql_template` | [`ToolDefinition`] |
//! | `prompt`       | [`PromptDefinition`] |
//! | `resource`     | [`GlossaryResource`] |

pub mod config;
pub mod definition;
pub mod loader;

pub use config::{
    ConfigError, DatabaseConfig, HealthConfig, LoggingConfig, QuerydeckConfig,
};
pub use definition::{
    Definition, DefinitionSet, FallbackPayload, Glossary, GlossaryResource, Parameter,
    ParameterType, PromptDefinition, ToolDefinition,
};
pub use loader::{DefinitionProblem, check_definitions, list_definitions, load_definition_set};
