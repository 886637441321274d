//! PostgreSQL persistence module.
//!
//! Provides connection pooling for the PostgreSQL storage backends.

pub mod pool;

pub use pool::{create_pool, mask_database_url};
