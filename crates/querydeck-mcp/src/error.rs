//! Error types for the MCP crate.

use crate::codec::FrameError;
use crate::executor::ExecutorError;
use crate::processor::ValidationError;
use crate::template::TemplateError;
use serde_json::{Value, json};
use thiserror::Error;

/// JSON-RPC error codes.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const TOOL_NOT_FOUND: i32 = -32001;
    pub const VALIDATION_FAILED: i32 = -32002;
    pub const TEMPLATE_FAILED: i32 = -32003;
    pub const EXECUTION_FAILED: i32 = -32004;
    pub const PROMPT_NOT_FOUND: i32 = -32005;
}

/// Errors that can occur while serving a request.
///
/// Everything except [`McpError::Transport`] is answered with an error
/// envelope and leaves the request loop running.
#[derive(Debug, Error)]
pub enum McpError {
    /// Payload is not valid JSON.
    #[error("parse error: {0}")]
    Parse(String),

    /// Payload is JSON but not a request envelope.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No handler for the method.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Params missing or malformed.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Tool not found.
    #[error("unknown tool: {name}")]
    ToolNotFound { name: String },

    /// Prompt not found.
    #[error("unknown prompt: {name}")]
    PromptNotFound { name: String },

    /// Arguments failed the tool's parameter schema.
    #[error("parameter validation failed for tool {tool}: {source}")]
    Validation {
        tool: String,
        #[source]
        source: ValidationError,
    },

    /// Template could not be rendered.
    #[error("SQL template processing failed for tool {tool}: {source}")]
    Template {
        tool: String,
        #[source]
        source: TemplateError,
    },

    /// Backing store rejected or failed the query.
    #[error("SQL execution failed for tool {tool}: {source}")]
    Execution {
        tool: String,
        #[source]
        source: ExecutorError,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The byte stream itself failed.
    #[error("transport error: {0}")]
    Transport(#[from] FrameError),
}

impl McpError {
    /// Stable JSON-RPC error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::Parse(_) => codes::PARSE_ERROR,
            Self::InvalidRequest(_) => codes::INVALID_REQUEST,
            Self::MethodNotFound(_) => codes::METHOD_NOT_FOUND,
            Self::InvalidParams(_) => codes::INVALID_PARAMS,
            Self::ToolNotFound { .. } => codes::TOOL_NOT_FOUND,
            Self::PromptNotFound { .. } => codes::PROMPT_NOT_FOUND,
            Self::Validation { .. } => codes::VALIDATION_FAILED,
            Self::Template { .. } => codes::TEMPLATE_FAILED,
            Self::Execution { .. } => codes::EXECUTION_FAILED,
            Self::Serialization(_) | Self::Transport(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Structured detail attached to the error envelope, if any.
    pub fn data(&self) -> Option<Value> {
        match self {
            Self::Validation { tool, source } => Some(json!({
                "tool": tool,
                "missing": source.missing,
                "typeMismatches": source.type_mismatches,
            })),
            Self::ToolNotFound { name } | Self::PromptNotFound { name } => {
                Some(json!({ "name": name }))
            }
            _ => None,
        }
    }
}
