//! Configuration management for Batchfeed.
//!
//! Batchfeed reads one TOML file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `BATCHFEED_<SECTION>_<KEY>` overrides applied after parsing
//! - Default values for optional settings
//! - Validation on load, including production-only safety rules
//!
//! # Example Configuration
//!
//! ```toml
//! database_target = "postgresql"
//! environment = "production"
//!
//! [application]
//! log_level = "info"
//!
//! [workspace]
//! work_dir = "/var/lib/batchfeed/work"
//!
//! [encryption]
//! recipient_public_keys = ["/etc/batchfeed/vendor.pub.asc"]
//! secret_keyring = "/etc/batchfeed/batchfeed.sec.asc"
//! passphrase = "${BATCHFEED_KEY_PASSPHRASE}"
//!
//! [transfer]
//! backend = "sftp"
//! upload_dir = "/in"
//! inbox_dir = "/out"
//!
//! [transfer.sftp]
//! host = "sftp.vendor.example"
//! username = "batchfeed"
//! private_key_path = "/etc/batchfeed/id_ed25519"
//! known_hosts_path = "/etc/batchfeed/known_hosts"
//!
//! [postgresql]
//! connection_string = "${BATCHFEED_DATABASE_URL}"
//! ssl_mode = "require"
//! ```
//!
//! # Validation
//!
//! ```rust,no_run
//! use batchfeed::config::load_config;
//!
//! match load_config("batchfeed.toml") {
//!     Ok(_) => println!("Configuration valid"),
//!     Err(e) => eprintln!("Configuration error: {e}"),
//! }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_str};
pub use schema::{
    ApplicationConfig, BatchfeedConfig, DatabaseTarget, EncryptionConfig, Environment,
    FeedsConfig, KdfConfig, LocalTransferConfig, LoggingConfig, PollerConfig, PostgreSQLConfig,
    RiskFeedConfig, ScreeningFeedConfig, SftpConfig, TransferBackend, TransferConfig,
    WorkspaceConfig,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
