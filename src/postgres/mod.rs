//! PostgreSQL connection handling.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
