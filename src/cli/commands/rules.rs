//! Mapping rule import and export
//!
//! Imports replace the whole rule set of a feed kind; there is no partial update.

use crate::cli::commands::context::{report, AppContext};
use crate::core::mapping::MappingEngine;
use crate::domain::{BatchfeedError, FeedKind, MappingRule};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

/// Arguments for the rules command
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// Replace the rule set of a feed with the rules in a JSON file
    Import {
        #[arg(long)]
        feed: FeedKind,

        /// JSON array of {targetPath, sourceField, defaultValue, category}
        file: PathBuf,
    },

    /// Print the stored rule set of a feed as JSON
    Export {
        #[arg(long)]
        feed: FeedKind,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Reads and validates a rule file for `kind`
pub fn read_rules(kind: FeedKind, path: &Path) -> Result<Vec<MappingRule>, BatchfeedError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        BatchfeedError::Validation(format!("Cannot read {}: {}", path.display(), e))
    })?;
    let rules: Vec<MappingRule> = serde_json::from_str(&text)?;
    MappingEngine::for_feed(kind).validate(&rules)?;
    Ok(rules)
}

impl RulesArgs {
    /// Execute the rules command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let ctx = match AppContext::connect(config_path, false).await {
            Ok(ctx) => ctx,
            Err(code) => return Ok(code),
        };

        match &self.command {
            RulesCommand::Import { feed, file } => {
                let rules = match read_rules(*feed, file) {
                    Ok(rules) => rules,
                    Err(e) => return Ok(report("Rule file rejected", &e)),
                };
                Ok(match ctx.repository.replace_mapping_rules(*feed, &rules).await {
                    Ok(()) => {
                        println!("✅ Imported {} {} rule(s)", rules.len(), feed);
                        0
                    }
                    Err(e) => report("Failed to store rules", &e),
                })
            }
            RulesCommand::Export { feed, output } => {
                let rules = match ctx.repository.load_mapping_rules(*feed).await {
                    Ok(rules) => rules,
                    Err(e) => return Ok(report("Failed to load rules", &e)),
                };
                let json = serde_json::to_string_pretty(&rules)?;
                match output {
                    Some(path) => {
                        std::fs::write(path, format!("{json}\n"))?;
                        println!("✅ Exported {} rule(s) to {}", rules.len(), path.display());
                    }
                    None => println!("{json}"),
                }
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_rules_validates_paths() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("good.json");
        std::fs::write(
            &good,
            r#"[{"targetPath": "name.full", "sourceField": "lastName"},
                {"targetPath": "individual.gender", "defaultValue": "U"}]"#,
        )
        .unwrap();
        assert_eq!(read_rules(FeedKind::Screening, &good).unwrap().len(), 2);

        let bad = tmp.path().join("bad.json");
        std::fs::write(&bad, r#"[{"targetPath": "name.full", "sourceField": "shoeSize"}]"#)
            .unwrap();
        let err = read_rules(FeedKind::Screening, &bad).unwrap_err();
        assert!(err.is_configuration());
    }
}
