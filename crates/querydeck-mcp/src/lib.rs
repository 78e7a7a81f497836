//! # querydeck-mcp
//!
//! MCP (Model Context Protocol) server for Querydeck.
//!
//! This crate turns declarative tool definitions into callable MCP tools.
//! Each tool owns a SQL template; a call validates its arguments, renders
//! the template and either previews the SQL, returns a fallback payload,
//! or executes it through an [`Executor`].
//!
//! ## Architecture
//!
//! ```text
//! AI Agent
//!       │
//!       │ Content-Length framed JSON-RPC over stdio
//!       ▼
//! ┌───────────────────────┐
//! │  FrameReader          │  codec
//! │  McpServer::route     │  server
//! │  TemplateProcessor    │  processor + template
//! │  formatter            │  preview / fallback / rows
//! └──────────┬────────────┘
//!            │ Executor trait
//!            ▼
//!      Backing database
//! ```
//!
//! ## Example Usage
//!
//! ```ignore
//! use querydeck_core::load_definition_set;
//! use querydeck_mcp::{McpServer, Registry};
//! use std::sync::Arc;
//!
//! let registry = Registry::build(load_definition_set("tools")?);
//! let server = McpServer::new("querydeck", env!("CARGO_PKG_VERSION"), Arc::new(registry));
//! server.run_stdio().await?;
//! ```

pub mod codec;
pub mod error;
pub mod executor;
pub mod formatter;
pub mod processor;
pub mod prompt;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod template;

pub use codec::{FrameError, FrameReader, FrameWriter, encode_frame};
pub use error::{McpError, codes};
pub use executor::{Executor, ExecutorError, Row};
pub use processor::{PREVIEW_KEY, TemplateProcessor, TypeMismatch, ValidationError};
pub use protocol::{
    CallToolParams, CallToolResult, JsonRpcRequest, JsonRpcResponse, ToolContent, ToolDescriptor,
};
pub use registry::{Builtin, Registry, ToolEntry};
pub use server::McpServer;
pub use template::{Template, TemplateError};
