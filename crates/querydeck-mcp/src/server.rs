//! MCP server implementation.
//!
//! The server reads one frame at a time, routes the request, and writes the
//! response before reading the next frame. Responses are therefore always
//! emitted in request order, and the output stream has a single writer.

use crate::codec::{FrameError, FrameReader, FrameWriter};
use crate::error::{McpError, codes};
use crate::executor::Executor;
use crate::formatter;
use crate::processor::TemplateProcessor;
use crate::prompt;
use crate::protocol::*;
use crate::registry::{Builtin, Registry};
use crate::template::TemplateError;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};

/// The MCP server.
pub struct McpServer {
    info: ServerInfo,
    registry: Arc<Registry>,
    executor: Option<Arc<dyn Executor>>,
}

impl McpServer {
    /// Create a server with no executor. Tool calls run in preview/fallback mode.
    pub fn new(name: impl Into<String>, version: impl Into<String>, registry: Arc<Registry>) -> Self {
        Self {
            info: ServerInfo {
                name: name.into(),
                version: version.into(),
            },
            registry,
            executor: None,
        }
    }

    /// Attach a query executor.
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run the server over stdin/stdout until the client disconnects.
    pub async fn run_stdio(&self) -> Result<(), McpError> {
        tracing::info!(
            tools = self.registry.len(),
            executor = self.executor.as_ref().map(|e| e.kind()).unwrap_or("none"),
            "Starting MCP server with stdio transport"
        );
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve framed requests from `reader`, writing responses to `writer`.
    ///
    /// Returns `Ok(())` on a clean end of stream or after an unrecoverable
    /// framing error. IO failures are returned as errors.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut frames = FrameReader::new(reader);
        let mut out = FrameWriter::new(writer);

        loop {
            let payload = match frames.read_frame().await {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    tracing::info!("Client closed the stream");
                    return Ok(());
                }
                Err(err) => return self.abort(&mut out, err).await,
            };

            if let Some(response) = self.handle_message(&payload).await {
                self.emit(&mut out, &response).await?;
            }
        }
    }

    /// Answer a framing failure if the request id survived, then stop.
    async fn abort<W>(&self, out: &mut FrameWriter<W>, err: FrameError) -> Result<(), McpError>
    where
        W: AsyncWrite + Unpin,
    {
        tracing::warn!(error = %err, "Unrecoverable framing error, closing stream");

        if let Some(id) = err.partial_body().and_then(salvage_id) {
            let response = JsonRpcResponse::failure(Some(id), &McpError::Parse(err.to_string()));
            if let Err(e) = self.emit(out, &response).await {
                tracing::debug!(error = %e, "Could not deliver framing error response");
            }
        }

        match err {
            FrameError::Io(_) => Err(McpError::Transport(err)),
            _ => Ok(()),
        }
    }

    /// Encode and write one response.
    async fn emit<W>(&self, out: &mut FrameWriter<W>, response: &JsonRpcResponse) -> Result<(), McpError>
    where
        W: AsyncWrite + Unpin,
    {
        let payload = match serde_json::to_vec(response) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(error = %err, id = ?response.id_text(), "Failed to encode response");
                let fallback = JsonRpcResponse::error(
                    response.id.clone(),
                    codes::INTERNAL_ERROR,
                    format!("failed to encode response: {}", err),
                );
                serde_json::to_vec(&fallback)?
            }
        };
        out.write_frame(&payload).await?;
        Ok(())
    }

    /// Handle one raw frame payload. Returns `None` for notifications.
    pub async fn handle_message(&self, payload: &[u8]) -> Option<JsonRpcResponse> {
        match JsonRpcRequest::from_slice(payload) {
            Ok(request) => self.handle_request(request).await,
            Err(err) => {
                let id = salvage_id(payload);
                let error = if err.is_syntax() || err.is_eof() {
                    McpError::Parse(err.to_string())
                } else {
                    McpError::InvalidRequest(err.to_string())
                };
                tracing::warn!(error = %error, "Rejecting undecodable message");
                Some(JsonRpcResponse::failure(id, &error))
            }
        }
    }

    /// Handle a decoded JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;
        tracing::debug!(method = %method, id = ?id.as_deref().map(RawValue::get), "Handling request");
        let outcome = self.route(&method, params).await;

        if id.is_none() {
            if let Err(err) = outcome {
                tracing::debug!(method = %method, error = %err, "Notification failed");
            }
            return None;
        }

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => {
                tracing::warn!(method = %method, code = err.code(), error = %err, "Request failed");
                JsonRpcResponse::failure(id, &err)
            }
        })
    }

    async fn route(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        match method {
            "initialize" => self.handle_initialize(),
            "initialized" | "notifications/initialized" => Ok(json!({})),
            "ping" => Ok(json!({})),
            "shutdown" => self.handle_shutdown(),
            "tools/list" => self.handle_list_tools(),
            "tools/call" => self.handle_call_tool(params).await,
            "prompts/list" => self.handle_list_prompts(),
            "prompts/get" => self.handle_get_prompt(params),
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    fn handle_initialize(&self) -> Result<Value, McpError> {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            server_info: self.info.clone(),
            capabilities: json!({
                "tools": { "listChanged": false },
                "prompts": { "listChanged": false }
            }),
        };
        Ok(serde_json::to_value(result)?)
    }

    fn handle_shutdown(&self) -> Result<Value, McpError> {
        tracing::info!("MCP server shutdown requested");
        Ok(Value::Null)
    }

    fn handle_list_tools(&self) -> Result<Value, McpError> {
        let result = ListToolsResult {
            tools: self.registry.tool_descriptors(),
        };
        Ok(serde_json::to_value(result)?)
    }

    async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: CallToolParams = parse_params(params)?;
        let entry = self
            .registry
            .lookup(&params.name)
            .ok_or_else(|| McpError::ToolNotFound {
                name: params.name.clone(),
            })?;

        let result = match entry.builtin() {
            Some(Builtin::ConnectionStatus) => self.connection_status().await,
            Some(Builtin::Glossary) => self.glossary(),
            None => self.call_sql_tool(entry.processor(), params.arguments).await?,
        };
        Ok(serde_json::to_value(result)?)
    }

    /// Validate, render, then preview, fall back, or execute.
    async fn call_sql_tool(
        &self,
        processor: &TemplateProcessor,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult, McpError> {
        let definition = processor.definition();
        let tool = definition.name.as_str();

        let (params, preview) = processor.prepare_arguments(arguments).map_err(|m| {
            McpError::InvalidParams(format!(
                "argument {} must be a {}, got {}",
                m.name, m.expected, m.actual
            ))
        })?;

        processor
            .validate(&params)
            .map_err(|source| McpError::Validation {
                tool: tool.to_string(),
                source,
            })?;

        let sql = processor
            .render(&params)
            .and_then(|sql| {
                if sql.is_empty() {
                    Err(TemplateError::Empty)
                } else {
                    Ok(sql)
                }
            })
            .map_err(|source| McpError::Template {
                tool: tool.to_string(),
                source,
            })?;

        tracing::debug!(tool, preview, sql = %sql, "Rendered SQL");

        if preview {
            return Ok(formatter::preview(&sql));
        }

        let Some(executor) = &self.executor else {
            tracing::info!(tool, "No executor available, returning unexecuted SQL");
            return Ok(formatter::unavailable(
                &sql,
                definition.fallback_payload.as_ref(),
            ));
        };

        let rows = executor
            .execute(&sql)
            .await
            .map_err(|source| McpError::Execution {
                tool: tool.to_string(),
                source,
            })?;
        tracing::info!(tool, rows = rows.len(), "Executed tool");
        Ok(formatter::executed(&sql, rows))
    }

    async fn connection_status(&self) -> CallToolResult {
        let status = match &self.executor {
            None => json!({
                "status": "not connected",
                "target": Value::Null,
                "type": Value::Null,
                "error": Value::Null,
            }),
            Some(executor) => {
                let (status, error) = match executor.ping().await {
                    Ok(()) => ("connected", Value::Null),
                    Err(e) => ("error", json!(e.to_string())),
                };
                json!({
                    "status": status,
                    "target": executor.target(),
                    "type": executor.kind(),
                    "error": error,
                })
            }
        };
        CallToolResult::text(status.to_string())
    }

    fn glossary(&self) -> CallToolResult {
        match self.registry.glossary() {
            Some(glossary) => CallToolResult::text(glossary.resource.words.to_string()),
            None => CallToolResult::error_text("No glossary resource is loaded"),
        }
    }

    fn handle_list_prompts(&self) -> Result<Value, McpError> {
        let result = ListPromptsResult {
            prompts: self.registry.prompt_descriptors(),
        };
        Ok(serde_json::to_value(result)?)
    }

    fn handle_get_prompt(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: GetPromptParams = parse_params(params)?;
        let definition = self
            .registry
            .prompt(&params.name)
            .ok_or_else(|| McpError::PromptNotFound {
                name: params.name.clone(),
            })?;
        Ok(serde_json::to_value(prompt::get(definition, &params.arguments))?)
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, McpError> {
    let params = params.ok_or_else(|| McpError::InvalidParams("missing params".to_string()))?;
    serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))
}
