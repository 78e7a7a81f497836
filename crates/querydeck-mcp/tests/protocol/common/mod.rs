//! Shared helpers for the protocol tests.

#![allow(dead_code)]

use querydeck_core::load_definition_set;
use querydeck_mcp::{McpServer, Registry, encode_frame};
use querydeck_mcp::codec::FrameReader;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::io::BufReader;

pub const USERS_TOOL: &str = r#"
name: get_user_by_id
description: Fetch a user by id
parameters:
  user_id:
    type: string
    description: User ID
  active:
    type: boolean
    description: Only active users
    default: false
required: [user_id]
sql_template: "SELECT * FROM users WHERE id = '{{user_id}}' {{if active}}AND active = 1{{end}}"
"#;

/// Write `files` (relative path, contents) under `root`.
pub fn write_definitions(root: &Path, files: &[(&str, &str)]) {
    for (name, contents) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }
}

/// A server built from the definitions found under `root`.
pub fn server_from_dir(root: &Path) -> McpServer {
    let registry = Registry::build(load_definition_set(root).unwrap());
    McpServer::new("querydeck-test", "0.0.0", Arc::new(registry))
}

/// A server with only the users tool.
pub fn users_server() -> (tempfile::TempDir, McpServer) {
    let dir = tempfile::tempdir().unwrap();
    write_definitions(dir.path(), &[("users.yaml", USERS_TOOL)]);
    let server = server_from_dir(dir.path());
    (dir, server)
}

/// Frame each message as a request payload.
pub fn frames(messages: &[Value]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for message in messages {
        bytes.extend(encode_frame(&serde_json::to_vec(message).unwrap()));
    }
    bytes
}

/// Feed `input` to the server and collect every response it writes.
pub async fn exchange(server: &McpServer, input: &[u8]) -> Vec<Value> {
    let mut output = Vec::new();
    server
        .serve(BufReader::new(input), &mut output)
        .await
        .unwrap();
    decode_all(&output).await
}

/// Decode every frame in `bytes` as JSON.
pub async fn decode_all(bytes: &[u8]) -> Vec<Value> {
    let mut reader = FrameReader::new(BufReader::new(bytes));
    let mut responses = Vec::new();
    while let Some(payload) = reader.read_frame().await.unwrap() {
        responses.push(serde_json::from_slice(&payload).unwrap());
    }
    responses
}

/// Text of the first content block of a tool call result.
pub fn tool_text(response: &Value) -> &str {
    response["result"]["content"][0]["text"]
        .as_str()
        .expect("text content expected")
}
