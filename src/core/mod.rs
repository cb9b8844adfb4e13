//! Core business logic for Batchfeed.
//!
//! # Modules
//!
//! - [`mapping`] - Document tree and configurable field mapping
//! - [`feed`] - Feed strategies (screening XML, risk JSON Lines) and assembly
//! - [`codec`] - Checksums, ZIP archives and sealed envelopes
//! - [`pipeline`] - The outbound stage machine and batch workspaces
//! - [`reply`] - Reply parsing, correlation and inbox polling
//!
//! # Outbound Workflow
//!
//! 1. **Create**: register the batch run and snapshot the input records
//! 2. **Feed**: build the document skeleton per record and apply the mapping rules
//! 3. **Checksum**: write the GNU sidecar for the feed file
//! 4. **Archive**: pack feed and sidecar (risk feeds add `control.json`)
//! 5. **Encrypt**: seal the archive for the vendor keys
//! 6. **Upload**: hand the envelope to the transfer gateway
//!
//! # Example
//!
//! ```rust,no_run
//! use batchfeed::adapters::database::create_repository;
//! use batchfeed::adapters::transfer::create_gateway;
//! use batchfeed::config::load_config;
//! use batchfeed::core::pipeline::BatchPipeline;
//! use batchfeed::domain::{FeedKind, InputRecord};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("batchfeed.toml")?;
//! let pipeline = BatchPipeline::new(
//!     &config,
//!     create_repository(&config).await?,
//!     create_gateway(&config)?,
//! );
//!
//! let raw = std::fs::read_to_string("records.json")?;
//! let records: Vec<InputRecord> = serde_json::from_str(&raw)?;
//! let run = pipeline.initiate(FeedKind::Screening, &records).await?;
//! println!("{} is {}", run.name, run.status);
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod feed;
pub mod mapping;
pub mod pipeline;
pub mod reply;
