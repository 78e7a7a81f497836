//! HTTP health endpoint.
//!
//! `GET /` reports the server identity and how many tools currently load
//! from disk. `GET /healthz` is a plain liveness probe.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::{Json, Router, routing::get};
use chrono::{SecondsFormat, Utc};
use clap::Args;
use querydeck_core::{QuerydeckConfig, load_definition_set};
use serde_json::{Value, json};
use std::path::PathBuf;
use tower_http::trace::TraceLayer;

/// Arguments for `querydeck health`.
#[derive(Debug, Args)]
pub struct HealthArgs {
    /// Bind address. Overrides `health.bind` from the config file.
    #[arg(long)]
    pub bind: Option<String>,
}

/// Shared state for the health handlers.
#[derive(Debug, Clone)]
pub struct HealthState {
    name: String,
    definitions_dir: PathBuf,
}

impl HealthState {
    pub fn from_config(config: &QuerydeckConfig) -> Self {
        Self {
            name: config.name.clone(),
            definitions_dir: config.definitions_dir.clone(),
        }
    }
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn status(State(state): State<HealthState>) -> Json<Value> {
    let (status, tools_loaded) = match load_definition_set(&state.definitions_dir) {
        Ok(set) => ("ok".to_string(), set.tools.len()),
        Err(e) => (format!("warning: {}", e), 0),
    };

    Json(json!({
        "name": state.name,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        "status": status,
        "tools_loaded": tools_loaded,
    }))
}

async fn healthz() -> &'static str {
    "ok"
}

pub async fn execute(config: QuerydeckConfig, args: HealthArgs) -> Result<()> {
    let addr = args.bind.unwrap_or_else(|| config.health.bind.clone());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("querydeck health listening on {}", addr);

    axum::serve(listener, router(HealthState::from_config(&config)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn state(dir: &std::path::Path) -> HealthState {
        HealthState {
            name: "querydeck-test".to_string(),
            definitions_dir: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_healthz() {
        let dir = tempfile::tempdir().unwrap();
        let response = router(state(dir.path()))
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn test_status_counts_tools_on_each_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(state(dir.path()));

        let (code, body) = get_json(app.clone(), "/").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["tools_loaded"], 0);
        assert_eq!(body["name"], "querydeck-test");
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));

        std::fs::write(
            dir.path().join("ping.yaml"),
            "name: ping\nsql_template: SELECT 1\n",
        )
        .unwrap();
        let (_, body) = get_json(app, "/").await;
        assert_eq!(body["tools_loaded"], 1);
    }

    #[tokio::test]
    async fn test_status_reports_load_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.yaml"), "name: [unclosed").unwrap();
        let (code, body) = get_json(router(state(dir.path())), "/").await;
        assert_eq!(code, StatusCode::OK);
        assert!(body["status"].as_str().unwrap().starts_with("warning: "));
        assert_eq!(body["tools_loaded"], 0);
    }
}
