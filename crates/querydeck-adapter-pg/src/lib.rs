use anyhow::Context;
use async_trait::async_trait;
use querydeck_core::DatabaseConfig;
use querydeck_mcp::executor::{Executor, ExecutorError, Row};
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row as _};
use std::str::FromStr;
use std::time::Duration;

/// Statement keywords whose results can be wrapped in a subquery.
const ROW_RETURNING: &[&str] = &["select", "with", "values", "table"];

pub struct PgExecutor {
    pool: PgPool,
    target: String,
    query_timeout: Option<Duration>,
}

impl PgExecutor {
    /// Open a connection pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let target = config.redacted_target();
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_with(connect_options(config)?)
            .await
            .with_context(|| format!("failed to connect to {}", target))?;

        tracing::info!(database = %target, "Connected to Postgres");
        Ok(Self::from_pool(pool, target)
            .with_query_timeout(config.query_timeout_secs.map(Duration::from_secs)))
    }

    pub fn from_pool(pool: PgPool, target: impl Into<String>) -> Self {
        Self {
            pool,
            target: target.into(),
            query_timeout: None,
        }
    }

    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    async fn run(&self, sql: &str) -> Result<Vec<Row>, ExecutorError> {
        let Some(wrapped) = wrap_statement(sql) else {
            let done = sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            tracing::debug!(rows_affected = done.rows_affected(), "Statement executed");
            return Ok(Vec::new());
        };

        let records = sqlx::query(&wrapped)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let value: Value = record.try_get("row").map_err(map_sqlx_error)?;
            rows.push(into_row(value));
        }
        Ok(rows)
    }
}

#[async_trait]
impl Executor for PgExecutor {
    fn kind(&self) -> &str {
        "postgres"
    }

    fn target(&self) -> String {
        self.target.clone()
    }

    async fn execute(&self, sql: &str) -> Result<Vec<Row>, ExecutorError> {
        match self.query_timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(sql))
                .await
                .map_err(|_| ExecutorError::Timeout(limit))?,
            None => self.run(sql).await,
        }
    }

    async fn ping(&self) -> Result<(), ExecutorError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!(database = %self.target, "Closed Postgres pool");
    }
}

/// Connection options from either the URL or the individual settings.
pub fn connect_options(config: &DatabaseConfig) -> anyhow::Result<PgConnectOptions> {
    if let Some(url) = &config.url {
        return PgConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url for {}", config.redacted_target()));
    }

    let mut options = PgConnectOptions::new();
    if let Some(host) = &config.host {
        options = options.host(host);
    }
    if let Some(port) = config.port {
        options = options.port(port);
    }
    if let Some(database) = &config.database {
        options = options.database(database);
    }
    if let Some(username) = &config.username {
        options = options.username(username);
    }
    if let Some(password) = &config.password {
        options = options.password(password);
    }
    Ok(options)
}

/// Wrap a row-returning statement so each row comes back as one JSON object.
///
/// Returns `None` for statements that cannot be used as a subquery.
pub fn wrap_statement(sql: &str) -> Option<String> {
    let body = sql.trim().trim_end_matches(';').trim_end();
    let keyword = body
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()?
        .to_ascii_lowercase();
    if !ROW_RETURNING.contains(&keyword.as_str()) {
        return None;
    }
    // Newlines keep a trailing line comment from swallowing the closing paren.
    Some(format!("SELECT to_jsonb(q) AS row FROM (\n{}\n) AS q", body))
}

fn into_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => {
            let mut row = Row::new();
            row.insert("value".to_string(), other);
            row
        }
    }
}

fn map_sqlx_error(err: sqlx::Error) -> ExecutorError {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => ExecutorError::Connection(err.to_string()),
        other => ExecutorError::Query(other.to_string()),
    }
}
