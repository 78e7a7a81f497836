//! Shapes tool results for the three call outcomes: preview, no database,
//! and executed.
//!
//! Every function here is infallible. Execution itself happens in the
//! dispatcher, which maps executor failures to error envelopes.

use crate::executor::Row;
use crate::protocol::CallToolResult;
use querydeck_core::FallbackPayload;
use serde_json::json;

/// Notice returned when there is no database and no fallback payload.
pub const UNAVAILABLE_NOTICE: &str =
    "Database connection not available. Use '__preview': true to see generated SQL.";

/// Rendered SQL, labeled as not executed.
pub fn preview(sql: &str) -> CallToolResult {
    CallToolResult::text(format!("Generated SQL (preview, not executed):\n{}", sql))
}

/// Result when no executor is reachable.
///
/// A configured fallback payload is returned with its provenance. Otherwise
/// the caller gets an explanatory notice plus the rendered SQL.
pub fn unavailable(sql: &str, fallback: Option<&FallbackPayload>) -> CallToolResult {
    match fallback {
        Some(payload) => CallToolResult::text(
            json!({
                "data": payload.data,
                "source": "fallback",
                "file": payload.reference,
                "sql": sql,
            })
            .to_string(),
        ),
        None => CallToolResult::text(format!(
            "{}\n\nGenerated SQL:\n{}",
            UNAVAILABLE_NOTICE, sql
        )),
    }
}

/// Rows returned by the executor, with their count and the SQL that produced them.
pub fn executed(sql: &str, rows: Vec<Row>) -> CallToolResult {
    let count = rows.len();
    CallToolResult::text(
        json!({
            "rows": rows,
            "count": count,
            "sql": sql,
        })
        .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn body(result: &CallToolResult) -> Value {
        serde_json::from_str(&result.joined_text()).unwrap()
    }

    #[test]
    fn test_preview_is_labeled() {
        let result = preview("SELECT 1");
        assert!(!result.is_error);
        assert_eq!(
            result.joined_text(),
            "Generated SQL (preview, not executed):\nSELECT 1"
        );
    }

    #[test]
    fn test_unavailable_without_fallback() {
        let text = unavailable("SELECT 1", None).joined_text();
        assert!(text.starts_with(UNAVAILABLE_NOTICE));
        assert!(text.ends_with("Generated SQL:\nSELECT 1"));
    }

    #[test]
    fn test_unavailable_with_fallback() {
        let payload = FallbackPayload {
            reference: "fixtures/users.json".to_string(),
            data: json!([{"id": 1}]),
        };
        let value = body(&unavailable("SELECT 1", Some(&payload)));
        assert_eq!(value["source"], "fallback");
        assert_eq!(value["file"], "fixtures/users.json");
        assert_eq!(value["sql"], "SELECT 1");
        assert_eq!(value["data"], json!([{"id": 1}]));
    }

    #[test]
    fn test_executed_counts_rows() {
        let mut row = Map::new();
        row.insert("id".to_string(), json!(7));
        let value = body(&executed("SELECT id FROM t", vec![row.clone(), row]));
        assert_eq!(value["count"], 2);
        assert_eq!(value["rows"][1]["id"], 7);
        assert_eq!(value["sql"], "SELECT id FROM t");
    }

    #[test]
    fn test_executed_empty_is_distinguishable() {
        let value = body(&executed("SELECT 1 WHERE false", Vec::new()));
        assert_eq!(value["count"], 0);
        assert_eq!(value["rows"], json!([]));
    }
}
