//! Preview command implementation

use crate::cli::commands::context::{read_records, report, AppContext};
use crate::domain::FeedKind;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the preview command
#[derive(Args, Debug)]
pub struct PreviewArgs {
    #[arg(long)]
    pub feed: FeedKind,

    /// JSON file holding one record or an array of records
    #[arg(long)]
    pub input: PathBuf,
}

impl PreviewArgs {
    /// Execute the preview command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let ctx = match AppContext::connect(config_path, true).await {
            Ok(ctx) => ctx,
            Err(code) => return Ok(code),
        };
        let records = match read_records(&self.input) {
            Ok(records) => records,
            Err(e) => return Ok(report("Failed to read input records", &e)),
        };

        let pipeline = ctx.pipeline();
        for record in &records {
            match pipeline.preview_record(self.feed, record).await {
                Ok(rendered) => println!("{rendered}"),
                Err(e) => return Ok(report("Preview failed", &e)),
            }
        }
        Ok(0)
    }
}
