//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Batchfeed using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Batchfeed - KYC batch data-feed pipeline
#[derive(Parser, Debug)]
#[command(name = "batchfeed")]
#[command(version, about, long_about = None)]
#[command(author = "Batchfeed Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "batchfeed.toml", env = "BATCHFEED_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "BATCHFEED_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new configuration file
    Init(commands::init::InitArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Generate a passphrase-protected keypair
    Keygen(commands::keygen::KeygenArgs),

    /// Create batches and run or replay their stages
    Batch(commands::batch::BatchArgs),

    /// List batch runs, or show one with its reply rows
    Status(commands::status::StatusArgs),

    /// Process reply files
    Reply(commands::reply::ReplyArgs),

    /// Poll the inbox until interrupted
    Poll(commands::reply::PollArgs),

    /// Import or export mapping rules
    Rules(commands::rules::RulesArgs),

    /// Render one record without creating a batch
    Preview(commands::preview::PreviewArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeedKind;

    #[test]
    fn test_cli_parse_defaults() {
        let cli = Cli::parse_from(["batchfeed", "status"]);
        assert_eq!(cli.config, "batchfeed.toml");
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn test_cli_parse_with_config_and_level() {
        let cli = Cli::parse_from([
            "batchfeed",
            "--config",
            "custom.toml",
            "--log-level",
            "debug",
            "validate-config",
        ]);
        assert_eq!(cli.config, "custom.toml");
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_batch_create() {
        let cli = Cli::parse_from([
            "batchfeed",
            "batch",
            "create",
            "--feed",
            "risk",
            "--input",
            "records.json",
        ]);
        match cli.command {
            Commands::Batch(args) => match args.command {
                commands::batch::BatchCommand::Create { feed, run, .. } => {
                    assert_eq!(feed, FeedKind::Risk);
                    assert!(!run);
                }
                other => panic!("unexpected batch command {other:?}"),
            },
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_batch_stage() {
        let cli = Cli::parse_from(["batchfeed", "batch", "encrypt", "RISK_BATCH_20250101120000_1"]);
        assert!(matches!(
            cli.command,
            Commands::Batch(commands::batch::BatchArgs {
                command: commands::batch::BatchCommand::Encrypt { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_cli_rejects_unknown_feed() {
        let parsed = Cli::try_parse_from([
            "batchfeed",
            "rules",
            "export",
            "--feed",
            "payments",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_cli_parse_reply_and_poll() {
        let cli = Cli::parse_from(["batchfeed", "reply", "process", "BATCH_001.zip.enc"]);
        assert!(matches!(cli.command, Commands::Reply(_)));

        let cli = Cli::parse_from(["batchfeed", "poll", "--once"]);
        match cli.command {
            Commands::Poll(args) => assert!(args.once),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
