//! Batch command implementation
//!
//! `batch create` registers a batch, `batch run` resumes it from the next
//! unfinished stage, and one subcommand per stage replays that stage alone.

use crate::cli::commands::context::{read_records, report, AppContext};
use crate::core::pipeline::{Artifact, Stage};
use crate::domain::{BatchRun, FeedKind};
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Arguments for the batch command
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Never contact the remote endpoint; uploads are logged only
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: BatchCommand,
}

#[derive(Subcommand, Debug)]
pub enum BatchCommand {
    /// Create a batch from a JSON file of input records
    Create {
        #[arg(long)]
        feed: FeedKind,

        /// JSON file holding one record or an array of records
        #[arg(long)]
        input: PathBuf,

        /// Run every stage right away
        #[arg(long)]
        run: bool,
    },

    /// Run every unfinished stage of a batch
    Run { name: String },

    /// Generate the feed file
    Feed { name: String },

    /// Write the checksum sidecar
    Checksum { name: String },

    /// Pack feed and sidecar into the archive
    Archive { name: String },

    /// Seal the archive
    Encrypt { name: String },

    /// Upload the envelope
    Upload { name: String },

    /// Print a workspace file
    Show {
        name: String,

        /// input, feed, checksum or control
        #[arg(long, default_value = "feed")]
        file: Artifact,
    },
}

impl BatchArgs {
    /// Execute the batch command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let ctx = match AppContext::connect(config_path, self.dry_run).await {
            Ok(ctx) => ctx,
            Err(code) => return Ok(code),
        };
        let pipeline = ctx.pipeline();

        let (name, stage) = match &self.command {
            BatchCommand::Create { feed, input, run } => {
                let records = match read_records(input) {
                    Ok(records) => records,
                    Err(e) => return Ok(report("Failed to read input records", &e)),
                };
                let result = if *run {
                    pipeline.initiate(*feed, &records).await
                } else {
                    pipeline.create(*feed, &records).await
                };
                return Ok(match result {
                    Ok(run) => {
                        print_run("Batch created", &run);
                        0
                    }
                    Err(e) => report("Batch creation failed", &e),
                });
            }
            BatchCommand::Run { name } => {
                return Ok(match pipeline.run(name).await {
                    Ok(run) => {
                        print_run("Batch complete", &run);
                        0
                    }
                    Err(e) => report("Batch run failed", &e),
                });
            }
            BatchCommand::Show { name, file } => {
                return Ok(match pipeline.preview_artifact(name, *file).await {
                    Ok(contents) => {
                        print!("{contents}");
                        0
                    }
                    Err(e) => report("Cannot show workspace file", &e),
                });
            }
            BatchCommand::Feed { name } => (name, Stage::Feed),
            BatchCommand::Checksum { name } => (name, Stage::Checksum),
            BatchCommand::Archive { name } => (name, Stage::Archive),
            BatchCommand::Encrypt { name } => (name, Stage::Encrypt),
            BatchCommand::Upload { name } => (name, Stage::Upload),
        };

        Ok(match pipeline.execute(name, stage).await {
            Ok(run) => {
                print_run(&format!("Stage '{stage}' completed"), &run);
                0
            }
            Err(e) => report(&format!("Stage '{stage}' failed"), &e),
        })
    }
}

fn print_run(headline: &str, run: &BatchRun) {
    println!("✅ {headline}");
    println!("   Batch:  {}", run.name);
    println!("   Feed:   {}", run.feed);
    println!("   Status: {}", run.status);
}
