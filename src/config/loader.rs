//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{BatchfeedConfig, Environment, TransferBackend};
use super::secret::secret_string;
use crate::domain::errors::BatchfeedError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into BatchfeedConfig
/// 4. Applies environment variable overrides (BATCHFEED_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`BatchfeedError::Configuration`] if the file cannot be read, a
/// referenced variable is unset, parsing fails or validation fails.
///
/// # Examples
///
/// ```no_run
/// use batchfeed::config::loader::load_config;
///
/// let config = load_config("batchfeed.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<BatchfeedConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(BatchfeedError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        BatchfeedError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_str(&contents)
}

/// Same as [`load_config`] for configuration text already in memory
pub fn load_config_str(contents: &str) -> Result<BatchfeedConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: BatchfeedConfig = toml::from_str(&contents)
        .map_err(|e| BatchfeedError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        BatchfeedError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied through untouched. Line structure, including a
/// missing trailing newline, is preserved.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| BatchfeedError::Other(format!("Invalid placeholder pattern: {e}")))?;
    let mut missing_vars: Vec<String> = Vec::new();

    let lines: Vec<String> = input
        .split('\n')
        .map(|line| {
            if line.trim_start().starts_with('#') {
                return line.to_string();
            }
            re.replace_all(line, |cap: &regex::Captures<'_>| {
                let var_name = &cap[1];
                match std::env::var(var_name) {
                    Ok(value) => value,
                    Err(_) => {
                        if !missing_vars.iter().any(|v| v == var_name) {
                            missing_vars.push(var_name.to_string());
                        }
                        cap[0].to_string()
                    }
                }
            })
            .into_owned()
        })
        .collect();

    if !missing_vars.is_empty() {
        return Err(BatchfeedError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            BatchfeedError::Configuration(format!("Invalid value for {key}: '{raw}'"))
        }),
    }
}

/// Applies environment variable overrides using the BATCHFEED_* prefix
///
/// Variables follow the pattern `BATCHFEED_<SECTION>_<KEY>`, for example
/// `BATCHFEED_TRANSFER_UPLOAD_DIR` or `BATCHFEED_POLLER_INTERVAL_SECONDS`.
fn apply_env_overrides(config: &mut BatchfeedConfig) -> Result<()> {
    // Application overrides
    if let Some(val) = env("BATCHFEED_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = env_parse("BATCHFEED_APPLICATION_DRY_RUN")? {
        config.application.dry_run = val;
    }
    if let Some(val) = env("BATCHFEED_ENVIRONMENT") {
        config.environment = match val.to_lowercase().as_str() {
            "development" => Environment::Development,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(BatchfeedError::Configuration(format!(
                    "Invalid value for BATCHFEED_ENVIRONMENT: '{other}'"
                )))
            }
        };
    }

    // Workspace overrides
    if let Some(val) = env("BATCHFEED_WORKSPACE_WORK_DIR") {
        config.workspace.work_dir = PathBuf::from(val);
    }

    // Encryption overrides
    if let Some(val) = env("BATCHFEED_ENCRYPTION_PASSPHRASE") {
        config.encryption.passphrase = Some(secret_string(val));
    }
    if let Some(val) = env("BATCHFEED_ENCRYPTION_SECRET_KEYRING") {
        config.encryption.secret_keyring = Some(PathBuf::from(val));
    }
    if let Some(val) = env("BATCHFEED_ENCRYPTION_RECIPIENT_PUBLIC_KEYS") {
        config.encryption.recipient_public_keys = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();
    }
    if let Some(val) = env_parse("BATCHFEED_ENCRYPTION_ALLOW_UNENCRYPTED_FALLBACK")? {
        config.encryption.allow_unencrypted_fallback = val;
    }

    // Transfer overrides
    if let Some(val) = env("BATCHFEED_TRANSFER_BACKEND") {
        config.transfer.backend = match val.to_lowercase().as_str() {
            "sftp" => TransferBackend::Sftp,
            "local" => TransferBackend::Local,
            "disabled" => TransferBackend::Disabled,
            other => {
                return Err(BatchfeedError::Configuration(format!(
                    "Invalid value for BATCHFEED_TRANSFER_BACKEND: '{other}'"
                )))
            }
        };
    }
    if let Some(val) = env("BATCHFEED_TRANSFER_UPLOAD_DIR") {
        config.transfer.upload_dir = val;
    }
    if let Some(val) = env("BATCHFEED_TRANSFER_INBOX_DIR") {
        config.transfer.inbox_dir = val;
    }
    if let Some(ref mut sftp) = config.transfer.sftp {
        if let Some(val) = env("BATCHFEED_TRANSFER_SFTP_HOST") {
            sftp.host = val;
        }
        if let Some(val) = env_parse("BATCHFEED_TRANSFER_SFTP_PORT")? {
            sftp.port = val;
        }
        if let Some(val) = env("BATCHFEED_TRANSFER_SFTP_USERNAME") {
            sftp.username = val;
        }
        if let Some(val) = env("BATCHFEED_TRANSFER_SFTP_PASSWORD") {
            sftp.password = Some(secret_string(val));
        }
        if let Some(val) = env("BATCHFEED_TRANSFER_SFTP_PRIVATE_KEY_PASSPHRASE") {
            sftp.private_key_passphrase = Some(secret_string(val));
        }
    }

    // Poller overrides
    if let Some(val) = env_parse("BATCHFEED_POLLER_INTERVAL_SECONDS")? {
        config.poller.interval_seconds = val;
    }
    if let Some(val) = env_parse("BATCHFEED_POLLER_MAX_CONCURRENT")? {
        config.poller.max_concurrent = val;
    }
    if let Some(val) = env_parse("BATCHFEED_POLLER_DELETE_AFTER_PROCESSING")? {
        config.poller.delete_after_processing = val;
    }

    // PostgreSQL overrides (only if PostgreSQL is configured)
    if let Some(ref mut pg) = config.postgresql {
        if let Some(val) = env("BATCHFEED_POSTGRESQL_CONNECTION_STRING") {
            pg.connection_string = secret_string(val);
        }
        if let Some(val) = env_parse("BATCHFEED_POSTGRESQL_MAX_CONNECTIONS")? {
            pg.max_connections = val;
        }
        if let Some(val) = env("BATCHFEED_POSTGRESQL_SSL_MODE") {
            pg.ssl_mode = val;
        }
    }

    // Logging overrides
    if let Some(val) = env_parse("BATCHFEED_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = val;
    }
    if let Some(val) = env("BATCHFEED_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

/// Held by every unit test that reads or writes `BATCHFEED_*` variables
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
