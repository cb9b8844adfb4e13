//! Reply and poll command implementations

use crate::cli::commands::context::{report, AppContext};
use crate::core::reply::ReplyPoller;
use clap::{Args, Subcommand};
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the reply command
#[derive(Args, Debug)]
pub struct ReplyArgs {
    #[command(subcommand)]
    pub command: ReplyCommand,
}

#[derive(Subcommand, Debug)]
pub enum ReplyCommand {
    /// Process one reply file from the inbox
    Process {
        /// File name in the inbox, or a full remote path
        remote_file: String,
    },
}

impl ReplyArgs {
    /// Execute the reply command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let ReplyCommand::Process { remote_file } = &self.command;

        let ctx = match AppContext::connect(config_path, false).await {
            Ok(ctx) => ctx,
            Err(code) => return Ok(code),
        };
        let processor = match ctx.processor() {
            Ok(p) => p,
            Err(e) => return Ok(report("Failed to load key material", &e)),
        };

        Ok(match processor.process(remote_file).await {
            Ok(outcome) => {
                println!("✅ {remote_file}: {outcome}");
                0
            }
            Err(e) => report(&format!("Reply {remote_file} failed"), &e),
        })
    }
}

/// Arguments for the poll command
#[derive(Args, Debug)]
pub struct PollArgs {
    /// Run a single poll cycle and exit
    #[arg(long)]
    pub once: bool,
}

impl PollArgs {
    /// Execute the poll command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let ctx = match AppContext::connect(config_path, false).await {
            Ok(ctx) => ctx,
            Err(code) => return Ok(code),
        };
        let processor = match ctx.processor() {
            Ok(p) => Arc::new(p),
            Err(e) => return Ok(report("Failed to load key material", &e)),
        };
        let poller = ReplyPoller::new(processor, &ctx.config.poller);

        if self.once {
            return Ok(match poller.poll_once().await {
                Ok(summary) => {
                    summary.log_summary();
                    println!(
                        "✅ Poll complete: {} listed, {} applied, {} uncorrelated, {} ignored, {} discarded, {} failed",
                        summary.listed,
                        summary.applied,
                        summary.uncorrelated,
                        summary.ignored,
                        summary.discarded,
                        summary.failed
                    );
                    0
                }
                Err(e) => report("Poll failed", &e),
            });
        }

        println!("📥 Polling {} (Ctrl+C to stop)", ctx.config.transfer.inbox_dir);
        Ok(match poller.run(shutdown_signal).await {
            Ok(()) => 0,
            Err(e) => report("Poller stopped", &e),
        })
    }
}
