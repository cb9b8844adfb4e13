//! PostgreSQL database integration
//!
//! Batch runs, reply detail rows and mapping rule sets are stored in the
//! tables created by `migrations/001_initial_schema.sql`.

pub mod adapter;
pub mod client;
pub mod models;

pub use adapter::PostgreSQLBatchRepository;
pub use client::PostgreSQLClient;
pub use models::PostgreSQLBatchRun;
