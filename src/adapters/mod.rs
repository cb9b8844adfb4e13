//! External system integrations for Batchfeed.
//!
//! - [`database`] - Repository abstraction (trait-based) and the in-memory store
//! - [`postgresql`] - PostgreSQL implementation
//! - [`transfer`] - SFTP, local-directory and disabled transfer gateways
//!
//! # Design Pattern
//!
//! Adapters isolate external dependencies behind traits so the pipeline and
//! the reply processor can be tested against the in-memory repository and
//! the local transfer backend.
//!
//! ```rust,no_run
//! use batchfeed::adapters::postgresql::{PostgreSQLBatchRepository, PostgreSQLClient};
//! use batchfeed::adapters::database::BatchRepository;
//! use batchfeed::config::{secret_string, PostgreSQLConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PostgreSQLConfig {
//!     connection_string: secret_string("postgresql://batchfeed@localhost/batchfeed".to_string()),
//!     max_connections: 5,
//!     connection_timeout_seconds: 10,
//!     statement_timeout_seconds: 30,
//!     ssl_mode: "disable".to_string(),
//! };
//!
//! let repository = PostgreSQLBatchRepository::new(PostgreSQLClient::new(config).await?);
//! repository.ensure_schema().await?;
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod postgresql;
pub mod transfer;
