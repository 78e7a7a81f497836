use crate::common::*;
use querydeck_mcp::codes;
use serde_json::{Value, json};

fn call(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    })
}

#[tokio::test]
async fn test_rendering_scenarios() {
    let (_dir, server) = users_server();
    let input = frames(&[
        call(1, "get_user_by_id", json!({"user_id": "123", "__preview": true})),
        call(
            2,
            "get_user_by_id",
            json!({"user_id": "123", "active": true, "__preview": true}),
        ),
    ]);

    let responses = exchange(&server, &input).await;
    assert!(tool_text(&responses[0]).ends_with("SELECT * FROM users WHERE id = '123'"));
    assert!(
        tool_text(&responses[1]).ends_with("SELECT * FROM users WHERE id = '123' AND active = 1")
    );
}

#[tokio::test]
async fn test_without_database_returns_notice_and_sql() {
    let (_dir, server) = users_server();
    let responses = exchange(
        &server,
        &frames(&[call(1, "get_user_by_id", json!({"user_id": "9"}))]),
    )
    .await;

    let text = tool_text(&responses[0]);
    assert!(text.contains("Database connection not available"));
    assert!(text.contains("SELECT * FROM users WHERE id = '9'"));
    assert_eq!(responses[0]["result"]["isError"], false);
}

#[tokio::test]
async fn test_fallback_file_is_returned() {
    let dir = tempfile::tempdir().unwrap();
    let tool = format!("{}fallback_file: fixtures/user.json\n", USERS_TOOL);
    write_definitions(
        dir.path(),
        &[
            ("users.yaml", tool.as_str()),
            ("fixtures/user.json", r#"[{"id": "9", "name": "Grace"}]"#),
        ],
    );
    let server = server_from_dir(dir.path());

    let responses = exchange(
        &server,
        &frames(&[call(1, "get_user_by_id", json!({"user_id": "9"}))]),
    )
    .await;

    let body: Value = serde_json::from_str(tool_text(&responses[0])).unwrap();
    assert_eq!(body["source"], "fallback");
    assert_eq!(body["data"][0]["name"], "Grace");
    assert_eq!(body["sql"], "SELECT * FROM users WHERE id = '9'");
    assert!(body["file"].as_str().unwrap().ends_with("user.json"));
}

#[tokio::test]
async fn test_errors_are_per_request() {
    let (_dir, server) = users_server();
    let input = frames(&[
        call(1, "get_user_by_id", json!({})),
        call(2, "missing_tool", json!({})),
        json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"arguments": {}}}),
        call(4, "get_user_by_id", json!({"user_id": "1", "__preview": true})),
    ]);

    let responses = exchange(&server, &input).await;
    assert_eq!(responses.len(), 4);
    assert_eq!(responses[0]["error"]["code"], codes::VALIDATION_FAILED);
    assert_eq!(responses[0]["error"]["data"]["missing"], json!(["user_id"]));
    assert_eq!(responses[1]["error"]["code"], codes::TOOL_NOT_FOUND);
    assert_eq!(responses[2]["error"]["code"], codes::INVALID_PARAMS);
    assert!(responses[3]["result"].is_object());
}

#[tokio::test]
async fn test_escape_is_applied_only_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    write_definitions(
        dir.path(),
        &[(
            "search.yaml",
            r#"
name: search_customers
description: Search by last name
parameters:
  last_name:
    type: string
required: [last_name]
sql_template: |
  SELECT *
  FROM customers
  WHERE last_name = '{{escape last_name}}'
  -- raw: {{last_name}}
"#,
        )],
    );
    let server = server_from_dir(dir.path());
    let responses = exchange(
        &server,
        &frames(&[call(
            1,
            "search_customers",
            json!({"last_name": "O'Neil", "__preview": true}),
        )]),
    )
    .await;

    let text = tool_text(&responses[0]);
    assert!(text.contains("WHERE last_name = 'O''Neil'"), "{text}");
    assert!(text.contains("-- raw: O'Neil"), "{text}");
}
