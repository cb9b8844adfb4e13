//! Status command implementation
//!
//! Lists batch runs newest first, or shows one batch with the rows its
//! replies produced.

use crate::cli::commands::context::{report, AppContext};
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show a single batch with its reply errors and feedback results
    #[arg(long)]
    pub batch: Option<String>,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking batch status");

        let ctx = match AppContext::connect(config_path, false).await {
            Ok(ctx) => ctx,
            Err(code) => return Ok(code),
        };

        match &self.batch {
            Some(name) => self.show_one(&ctx, name).await,
            None => self.list_all(&ctx).await,
        }
    }

    async fn list_all(&self, ctx: &AppContext) -> anyhow::Result<i32> {
        let runs = match ctx.repository.find_all().await {
            Ok(runs) => runs,
            Err(e) => return Ok(report("Failed to load batch runs", &e)),
        };

        if runs.is_empty() {
            println!("No batch runs found.");
            println!("Run 'batchfeed batch create' to start one.");
            return Ok(0);
        }

        println!("📊 Found {} batch run(s):", runs.len());
        println!();
        println!(
            "{:<6} {:<40} {:<10} {:<22} {:<20}",
            "ID", "Name", "Feed", "Status", "Updated"
        );
        println!("{}", "-".repeat(100));
        for run in runs {
            println!(
                "{:<6} {:<40} {:<10} {:<22} {:<20}",
                run.id,
                run.name,
                run.feed,
                run.status,
                run.updated_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
        println!();
        Ok(0)
    }

    async fn show_one(&self, ctx: &AppContext, name: &str) -> anyhow::Result<i32> {
        let run = match ctx.repository.find_by_name(name).await {
            Ok(Some(run)) => run,
            Ok(None) => {
                println!("❌ No batch run named {name}");
                return Ok(3);
            }
            Err(e) => return Ok(report("Failed to load batch run", &e)),
        };

        let (errors, feedback) = match tokio::try_join!(
            ctx.repository.errors_for(run.id),
            ctx.repository.feedback_for(run.id)
        ) {
            Ok(rows) => rows,
            Err(e) => return Ok(report("Failed to load reply rows", &e)),
        };

        println!("📊 Batch {}", run.name);
        println!("   Feed:                {}", run.feed);
        println!("   Status:              {}", run.status);
        println!(
            "   Notification status: {}",
            run.notification_status.as_deref().unwrap_or("-")
        );
        println!("   Feedback count:      {}", run.feedback_count);
        println!("   Created:             {}", run.created_at.format("%Y-%m-%d %H:%M:%S"));
        println!("   Updated:             {}", run.updated_at.format("%Y-%m-%d %H:%M:%S"));
        println!();

        if !errors.is_empty() {
            println!("Record errors ({}):", errors.len());
            for error in &errors {
                println!(
                    "  {:<20} {:<10} {}",
                    error.record_id.as_deref().unwrap_or("-"),
                    error.error_code.as_deref().unwrap_or("-"),
                    error.error_message.as_deref().unwrap_or("")
                );
            }
            println!();
        }

        if !feedback.is_empty() {
            println!("Feedback results ({}):", feedback.len());
            for result in &feedback {
                println!(
                    "  {:<20} {:<12} {:<30} {:<6} {}",
                    result.record_id.as_deref().unwrap_or("-"),
                    result.match_id.as_deref().unwrap_or("-"),
                    result.match_name.as_deref().unwrap_or("-"),
                    result.match_score.as_deref().unwrap_or("-"),
                    result.status.as_deref().unwrap_or("")
                );
            }
            println!();
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_args_defaults() {
        let args = StatusArgs { batch: None };
        assert!(args.batch.is_none());
    }
}
