//! `querydeck serve` - run the MCP server over stdio.

use super::health;
use anyhow::{Context, Result};
use clap::Args;
use querydeck_adapter_pg::PgExecutor;
use querydeck_core::{DatabaseConfig, QuerydeckConfig, load_definition_set};
use querydeck_mcp::{Executor, McpServer, Registry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Arguments for `querydeck serve`.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Definitions directory. Overrides the config file.
    #[arg(long, env = "QUERYDECK_DEFINITIONS")]
    pub definitions: Option<PathBuf>,

    /// Never connect to a database; tool calls return generated SQL or fallbacks.
    #[arg(long, default_value_t = false)]
    pub no_database: bool,

    /// Also serve the HTTP health endpoint on this address.
    #[arg(long)]
    pub health_bind: Option<String>,
}

pub async fn execute(mut config: QuerydeckConfig, args: ServeArgs) -> Result<()> {
    if let Some(dir) = args.definitions {
        config.definitions_dir = dir;
    }

    let definitions = load_definition_set(&config.definitions_dir).with_context(|| {
        format!(
            "Failed to load definitions from {}",
            config.definitions_dir.display()
        )
    })?;
    info!(
        dir = %config.definitions_dir.display(),
        tools = definitions.tools.len(),
        prompts = definitions.prompts.len(),
        glossaries = definitions.glossaries.len(),
        "Loaded definitions"
    );

    let executor = if args.no_database {
        info!("Database disabled by --no-database");
        None
    } else {
        connect(&config.database).await
    };

    let mut server = McpServer::new(
        config.name.clone(),
        env!("CARGO_PKG_VERSION"),
        Arc::new(Registry::build(definitions)),
    );
    if let Some(executor) = &executor {
        server = server.with_executor(executor.clone());
    }

    if let Some(bind) = args.health_bind {
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .with_context(|| format!("Failed to bind health endpoint on {}", bind))?;
        info!(addr = %bind, "Health endpoint listening");
        let app = health::router(health::HealthState::from_config(&config));
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!(error = %e, "Health endpoint stopped");
            }
        });
    }

    let result = server.run_stdio().await;

    if let Some(executor) = executor {
        executor.close().await;
    }
    result.context("MCP server failed")
}

/// Connect to the configured database, or run without one.
async fn connect(config: &DatabaseConfig) -> Option<Arc<dyn Executor>> {
    if !config.is_configured() {
        info!("No database configured, tool calls will return generated SQL");
        return None;
    }

    match PgExecutor::connect(config).await {
        Ok(executor) => Some(Arc::new(executor)),
        Err(e) => {
            warn!(
                database = %config.redacted_target(),
                error = %format!("{:#}", e),
                "Database connection failed, continuing without a database"
            );
            None
        }
    }
}
