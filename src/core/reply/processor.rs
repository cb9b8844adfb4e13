//! Inbound reply processing
//!
//! One reply file is one unit of work: download, open the envelope, unpack,
//! verify the optional sidecar, parse, correlate to a batch run and persist
//! the effect in a single repository call.

use crate::adapters::database::BatchRepository;
use crate::adapters::transfer::{remote_join, TransferGateway};
use crate::config::BatchfeedConfig;
use crate::core::codec::envelope::{EnvelopeCodec, LiteralData};
use crate::core::codec::{archive, checksum};
use crate::core::pipeline::workspace::{Workspace, ARCHIVE_EXTENSION, SIDECAR_EXTENSION};
use crate::core::reply::locks::BatchLocks;
use crate::core::reply::parser::parse_reply;
use crate::domain::{BatchName, BatchStatus, BatchfeedError, Result};
use crate::log_reply_outcome;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How a reply file was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The effect was persisted on the named batch run
    Applied {
        batch: BatchName,
        status: BatchStatus,
        rows: usize,
    },
    /// No batch run carries the recovered name; nothing was written
    Uncorrelated { candidate: String },
    /// No payload, or a payload that is not a known reply shape
    Ignored { reason: &'static str },
}

impl fmt::Display for ReplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyOutcome::Applied { batch, status, rows } => {
                write!(f, "applied to {batch} ({status}, {rows} rows)")
            }
            ReplyOutcome::Uncorrelated { candidate } => {
                write!(f, "uncorrelated ({candidate})")
            }
            ReplyOutcome::Ignored { reason } => write!(f, "ignored ({reason})"),
        }
    }
}

/// Recovers a batch name by stripping the first matching suffix, longest first
///
/// A name without any known suffix is returned unchanged.
pub fn strip_known_suffix<'a>(file_name: &'a str, suffixes: &[String]) -> &'a str {
    let mut ordered: Vec<&String> = suffixes.iter().collect();
    ordered.sort_by_key(|s| std::cmp::Reverse(s.len()));
    ordered
        .into_iter()
        .find_map(|suffix| file_name.strip_suffix(suffix.as_str()))
        .filter(|stem| !stem.is_empty())
        .unwrap_or(file_name)
}

pub struct ReplyProcessor {
    repository: Arc<dyn BatchRepository>,
    gateway: Arc<dyn TransferGateway>,
    codec: Arc<EnvelopeCodec>,
    workspace: Workspace,
    locks: BatchLocks,
    inbox_dir: String,
    suffixes: Vec<String>,
    delete_after_processing: bool,
}

impl ReplyProcessor {
    /// Builds a processor with the configured keyring
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a key file cannot be read.
    pub fn new(
        config: &BatchfeedConfig,
        repository: Arc<dyn BatchRepository>,
        gateway: Arc<dyn TransferGateway>,
    ) -> Result<Self> {
        let codec = EnvelopeCodec::from_config(&config.encryption)?;
        Ok(Self::with_codec(config, repository, gateway, codec))
    }

    pub fn with_codec(
        config: &BatchfeedConfig,
        repository: Arc<dyn BatchRepository>,
        gateway: Arc<dyn TransferGateway>,
        codec: EnvelopeCodec,
    ) -> Self {
        let envelope_extension = &config.encryption.envelope_extension;
        Self {
            repository,
            gateway,
            codec: Arc::new(codec),
            workspace: Workspace::new(config.workspace.work_dir.clone()),
            locks: BatchLocks::new(),
            inbox_dir: config.transfer.inbox_dir.clone(),
            suffixes: vec![
                format!(".{ARCHIVE_EXTENSION}.{envelope_extension}"),
                ".xml".to_string(),
            ],
            delete_after_processing: config.poller.delete_after_processing,
        }
    }

    /// Suffix every reply envelope carries
    pub fn envelope_suffix(&self) -> &str {
        &self.suffixes[0]
    }

    pub fn inbox_dir(&self) -> &str {
        &self.inbox_dir
    }

    pub fn gateway(&self) -> &Arc<dyn TransferGateway> {
        &self.gateway
    }

    /// Batch name a reply file name refers to
    pub fn batch_name_for(&self, file_name: &str) -> String {
        strip_known_suffix(file_name, &self.suffixes).to_string()
    }

    /// Processes one reply file from the inbox
    ///
    /// `remote_file` is either a bare file name in the inbox or a full remote
    /// path. Uncorrelated and unrecognized replies are not errors. Integrity
    /// and path-traversal failures discard the file without touching the
    /// batch run.
    pub async fn process(&self, remote_file: &str) -> Result<ReplyOutcome> {
        let remote_path = if remote_file.contains('/') {
            remote_file.to_string()
        } else {
            remote_join(&self.inbox_dir, remote_file)
        };
        let file_name = remote_path
            .rsplit('/')
            .next()
            .unwrap_or(remote_file)
            .to_string();

        let scratch = self.workspace.reply_scratch()?;
        let result = self.handle(&remote_path, &file_name, &scratch).await;
        if let Err(e) = fs::remove_dir_all(&scratch) {
            tracing::debug!(dir = %scratch.display(), error = %e, "Scratch directory not removed");
        }

        match &result {
            Ok(outcome) => {
                log_reply_outcome!(file_name, outcome);
                self.cleanup(&remote_path).await;
            }
            Err(e) if e.is_integrity() || e.is_path_traversal() => {
                tracing::error!(file = %file_name, error = %e, "Reply discarded");
                self.cleanup(&remote_path).await;
            }
            Err(e) => {
                tracing::error!(file = %file_name, error = %e, "Reply left in inbox");
            }
        }
        result
    }

    async fn handle(
        &self,
        remote_path: &str,
        file_name: &str,
        scratch: &Path,
    ) -> Result<ReplyOutcome> {
        let local = scratch.join(file_name);
        self.download(remote_path, &local).await?;

        let literal = self.decrypt(local).await?;
        let files = archive::unpack(&literal.data, &scratch.join("extracted"))?;

        let Some(payload) = single_payload(&files)? else {
            return Ok(ReplyOutcome::Ignored { reason: "no payload" });
        };
        let bytes = fs::read(&payload)?;
        verify_against_sidecar(&files, &payload, &bytes)?;

        let Some(reply) = parse_reply(&bytes)? else {
            return Ok(ReplyOutcome::Ignored {
                reason: "unrecognized document",
            });
        };

        let candidate = match reply.correlation_id.as_deref() {
            Some(id) => strip_known_suffix(id, &self.suffixes).to_string(),
            None => self.batch_name_for(file_name),
        };

        let _guard = self.locks.lock(&candidate).await;
        let Some(run) = self.repository.find_by_name(&candidate).await? else {
            tracing::warn!(file = %file_name, candidate = %candidate, "No batch run for reply");
            return Ok(ReplyOutcome::Uncorrelated { candidate });
        };

        let updated = self.repository.apply_reply(run.id, &reply.effect).await?;
        Ok(ReplyOutcome::Applied {
            batch: updated.name,
            status: updated.status,
            rows: reply.effect.row_count(),
        })
    }

    async fn download(&self, remote_path: &str, local: &Path) -> Result<()> {
        let gateway = Arc::clone(&self.gateway);
        let remote = remote_path.to_string();
        let local = local.to_path_buf();
        tokio::task::spawn_blocking(move || gateway.download(&remote, &local))
            .await
            .map_err(|e| BatchfeedError::Other(format!("Download task failed: {e}")))?
    }

    async fn decrypt(&self, local: PathBuf) -> Result<LiteralData> {
        let codec = Arc::clone(&self.codec);
        tokio::task::spawn_blocking(move || codec.decrypt_file(&local))
            .await
            .map_err(|e| BatchfeedError::Other(format!("Decrypt task failed: {e}")))?
    }

    async fn cleanup(&self, remote_path: &str) {
        if !self.delete_after_processing {
            return;
        }
        let gateway = Arc::clone(&self.gateway);
        let remote = remote_path.to_string();
        let deleted = tokio::task::spawn_blocking(move || gateway.delete(&remote)).await;
        match deleted {
            Ok(Ok(())) => tracing::debug!(remote = %remote_path, "Reply removed from inbox"),
            Ok(Err(e)) => tracing::warn!(remote = %remote_path, error = %e, "Reply not removed"),
            Err(e) => tracing::warn!(remote = %remote_path, error = %e, "Delete task failed"),
        }
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

fn single_payload(files: &[PathBuf]) -> Result<Option<PathBuf>> {
    let mut payloads = files.iter().filter(|f| has_extension(f, "xml"));
    let first = payloads.next().cloned();
    if payloads.next().is_some() {
        return Err(BatchfeedError::Validation(
            "Reply archive carries more than one payload document".to_string(),
        ));
    }
    Ok(first)
}

fn verify_against_sidecar(files: &[PathBuf], payload: &Path, bytes: &[u8]) -> Result<()> {
    let Some(sidecar) = files.iter().find(|f| has_extension(f, SIDECAR_EXTENSION)) else {
        return Ok(());
    };
    let text = fs::read_to_string(sidecar)?;
    let entry = checksum::verify_sidecar(bytes, &text)?;

    let payload_name = payload
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if entry.file_name != payload_name {
        return Err(BatchfeedError::Integrity(format!(
            "Sidecar names {} but the payload is {}",
            entry.file_name, payload_name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suffixes() -> Vec<String> {
        vec![".zip.enc".to_string(), ".xml".to_string()]
    }

    #[test]
    fn test_strip_longest_suffix_first() {
        assert_eq!(strip_known_suffix("BATCH_001.zip.enc", &suffixes()), "BATCH_001");
        assert_eq!(strip_known_suffix("BATCH_001.xml", &suffixes()), "BATCH_001");
        assert_eq!(strip_known_suffix("BATCH_001", &suffixes()), "BATCH_001");
        assert_eq!(strip_known_suffix(".xml", &suffixes()), ".xml");
    }

    #[test]
    fn test_single_payload() {
        let files = vec![PathBuf::from("/x/B.xml"), PathBuf::from("/x/B.sha256sum")];
        assert_eq!(single_payload(&files).unwrap(), Some(PathBuf::from("/x/B.xml")));
        assert_eq!(single_payload(&files[1..]).unwrap(), None);

        let two = vec![PathBuf::from("/x/A.xml"), PathBuf::from("/x/B.XML")];
        assert!(single_payload(&two).is_err());
    }

    #[test]
    fn test_sidecar_name_must_match_payload() {
        let tmp = tempfile::TempDir::new().unwrap();
        let payload = tmp.path().join("B.xml");
        let sidecar = tmp.path().join("B.sha256sum");
        fs::write(&payload, b"<Notification/>").unwrap();
        let hash = checksum::sha256_hex(b"<Notification/>");

        fs::write(&sidecar, checksum::sidecar_line(&hash, "B.xml")).unwrap();
        let files = vec![payload.clone(), sidecar.clone()];
        assert!(verify_against_sidecar(&files, &payload, b"<Notification/>").is_ok());

        fs::write(&sidecar, checksum::sidecar_line(&hash, "OTHER.xml")).unwrap();
        let err = verify_against_sidecar(&files, &payload, b"<Notification/>").unwrap_err();
        assert!(err.is_integrity());

        let err = verify_against_sidecar(&files, &payload, b"<Feedback/>").unwrap_err();
        assert!(err.is_integrity());
    }
}
