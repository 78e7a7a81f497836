//! CLI command implementations.

pub mod health;
pub mod serve;
pub mod tools;
