use crate::common::*;
use querydeck_mcp::codes;
use serde_json::json;

#[tokio::test]
async fn test_malformed_frame_does_not_stop_the_loop() {
    let (_dir, server) = users_server();

    let mut input = encode(b"{this is not json");
    input.extend(frames(&[json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})]));

    let responses = exchange(&server, &input).await;
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["error"]["code"], codes::PARSE_ERROR);
    assert!(responses[0]["id"].is_null());
    assert_eq!(responses[1]["id"], 2);
    assert_eq!(
        responses[1]["result"]["tools"][0]["name"],
        "get_user_by_id"
    );
}

#[tokio::test]
async fn test_responses_follow_request_order() {
    let (_dir, server) = users_server();
    let input = frames(&[
        json!({"jsonrpc": "2.0", "id": "a", "method": "initialize", "params": {}}),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}),
        json!({"jsonrpc": "2.0", "id": 3, "method": "bogus"}),
        json!({"jsonrpc": "2.0", "id": 4, "method": "tools/list"}),
    ]);

    let responses = exchange(&server, &input).await;
    let ids: Vec<_> = responses.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![json!("a"), json!(2), json!(3), json!(4)]);
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], "querydeck-test");
    assert_eq!(responses[2]["error"]["code"], codes::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn test_clean_eof_with_no_input() {
    let (_dir, server) = users_server();
    assert!(exchange(&server, b"").await.is_empty());
}

#[tokio::test]
async fn test_framing_error_ends_the_stream() {
    let (_dir, server) = users_server();
    let mut input = frames(&[json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})]);
    input.extend(b"X-Header: nothing\r\n\r\n");
    input.extend(frames(&[json!({"jsonrpc": "2.0", "id": 2, "method": "ping"})]));

    let responses = exchange(&server, &input).await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["id"], 1);
}

#[tokio::test]
async fn test_short_body_salvages_id() {
    let (_dir, server) = users_server();
    let body = br#"{"jsonrpc":"2.0","id":77,"method":"ping"}"#;
    let mut input = format!("Content-Length: {}\r\n\r\n", body.len() + 10).into_bytes();
    input.extend_from_slice(body);

    let responses = exchange(&server, &input).await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["id"], 77);
    assert_eq!(responses[0]["error"]["code"], codes::PARSE_ERROR);
}

#[tokio::test]
async fn test_body_cut_mid_method_salvages_id() {
    let (_dir, server) = users_server();
    let input = b"Content-Length: 60\r\n\r\n{\"jsonrpc\":\"2.0\",\"id\":77,\"method\":\"tools/ca";

    let responses = exchange(&server, input).await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["id"], 77);
    assert_eq!(responses[0]["error"]["code"], codes::PARSE_ERROR);
}

#[tokio::test]
async fn test_short_body_without_id_is_silent() {
    let (_dir, server) = users_server();
    let responses = exchange(&server, b"Content-Length: 50\r\n\r\n{\"jsonrpc\":").await;
    assert!(responses.is_empty());
}

#[tokio::test]
async fn test_string_ids_are_echoed_verbatim() {
    let (_dir, server) = users_server();
    let input = encode(r#"{"jsonrpc":"2.0","id":"req-é","method":"ping"}"#.as_bytes());
    let mut output = Vec::new();
    server
        .serve(tokio::io::BufReader::new(&input[..]), &mut output)
        .await
        .unwrap();
    let text = String::from_utf8(output).unwrap();
    assert!(text.contains(r#""id":"req-é""#), "{text}");
}

fn encode(payload: &[u8]) -> Vec<u8> {
    querydeck_mcp::encode_frame(payload)
}
