//! PostgreSQL persistence module.
//!
//! Provides connection pooling and schema migrations for the PostgreSQL
//! template backend.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
