//! Query executor abstraction.
//!
//! The dispatcher hands rendered SQL to an [`Executor`] and never looks at
//! the statement itself. Database adapters implement this trait.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

/// Errors returned by an executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The database rejected or failed the statement.
    #[error("query failed: {0}")]
    Query(String),

    /// The statement did not finish in time.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// The connection is gone or could not be established.
    #[error("connection unavailable: {0}")]
    Connection(String),
}

/// Runs rendered queries against a backing store.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Short backend name, e.g. `postgres`.
    fn kind(&self) -> &str;

    /// Connection target with credentials removed.
    fn target(&self) -> String;

    /// Execute a statement and return its rows.
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, ExecutorError>;

    /// Check the connection.
    async fn ping(&self) -> Result<(), ExecutorError>;

    /// Release pooled connections.
    async fn close(&self);
}
