// Batchfeed - KYC batch data-feed pipeline
// Copyright (c) 2025 Batchfeed Contributors
// Licensed under the MIT License

//! # Batchfeed - KYC batch data-feed pipeline
//!
//! Batchfeed turns client records into vendor batch feeds, ships them over
//! SFTP, and folds the vendor's replies back into the batch history.
//!
//! ## Overview
//!
//! Outbound, every batch moves through the same stages:
//!
//! 1. **Feed** - map each record through the stored rules and render the
//!    screening XML or the risk JSON-lines file
//! 2. **Checksum** - write a `.sha256sum` sidecar for the feed
//! 3. **Archive** - pack feed and sidecar (plus the risk control manifest)
//!    into a zip
//! 4. **Encrypt** - seal the archive for the vendor's public keys
//! 5. **Upload** - put the envelope on the remote endpoint
//!
//! Inbound, the reply poller downloads envelopes from the inbox, verifies
//! them, correlates them with a batch and records notifications and
//! feedback matches.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Mapping, feed rendering, codecs, the pipeline and reply processing
//! - [`adapters`] - Batch storage (PostgreSQL, memory) and file transfer (SFTP, local)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batchfeed::adapters::database::create_repository;
//! use batchfeed::adapters::transfer::create_gateway;
//! use batchfeed::config::load_config;
//! use batchfeed::core::pipeline::BatchPipeline;
//! use batchfeed::domain::{FeedKind, InputRecord};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("batchfeed.toml")?;
//!     let repository = create_repository(&config).await?;
//!     let gateway = create_gateway(&config)?;
//!
//!     let pipeline = BatchPipeline::new(&config, repository, gateway);
//!     let record = InputRecord {
//!         client_id: Some(42),
//!         last_name: Some("Doe".to_string()),
//!         ..Default::default()
//!     };
//!
//!     let run = pipeline.initiate(FeedKind::Screening, &[record]).await?;
//!     println!("{} is {}", run.name, run.status);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library operations return [`domain::Result`]; the error kind decides the
//! CLI exit code:
//!
//! - `0` - Success
//! - `2` - Configuration error
//! - `3` - Validation or integrity failure
//! - `4` - Transport or database failure
//! - `5` - Anything else
//!
//! ## Logging
//!
//! Batchfeed logs through `tracing`. Stage and reply events carry `batch`,
//! `stage`, `status` and `file` fields so one batch can be followed across
//! the log.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
