//! Outbound batch pipeline
//!
//! One generic five-stage pipeline serves every feed kind. Stages talk to
//! each other only through the batch workspace, persist exactly one status
//! transition each and can be replayed on their own.

use crate::adapters::database::BatchRepository;
use crate::adapters::transfer::TransferGateway;
use crate::config::{BatchfeedConfig, EncryptionConfig, FeedsConfig};
use crate::core::codec::envelope::EnvelopeCodec;
use crate::core::codec::{archive, checksum};
use crate::core::feed::{strategy_for, FeedBuilder, FeedStrategy};
use crate::core::pipeline::workspace::{Artifact, BatchWorkspace, Workspace};
use crate::domain::{
    BatchName, BatchRun, BatchStatus, BatchfeedError, FeedKind, InputRecord, Result,
};
use crate::{log_stage_complete, log_stage_start};
use chrono::Utc;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Upper bound on the sequence number tried when deriving a unique batch name
const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// Outbound stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Feed,
    Checksum,
    Archive,
    Encrypt,
    Upload,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Feed,
        Stage::Checksum,
        Stage::Archive,
        Stage::Encrypt,
        Stage::Upload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Feed => "feed",
            Stage::Checksum => "checksum",
            Stage::Archive => "archive",
            Stage::Encrypt => "encrypt",
            Stage::Upload => "upload",
        }
    }

    /// Status persisted once the stage succeeds
    pub fn completed_status(&self) -> BatchStatus {
        match self {
            Stage::Feed => BatchStatus::FeedGenerated,
            Stage::Checksum => BatchStatus::ChecksumGenerated,
            Stage::Archive => BatchStatus::Archived,
            Stage::Encrypt => BatchStatus::Encrypted,
            Stage::Upload => BatchStatus::Uploaded,
        }
    }

    /// Next unfinished stage for a batch at `status`
    pub fn after(status: BatchStatus) -> Option<Stage> {
        match status {
            BatchStatus::Created => Some(Stage::Feed),
            BatchStatus::FeedGenerated => Some(Stage::Checksum),
            BatchStatus::ChecksumGenerated => Some(Stage::Archive),
            BatchStatus::Archived => Some(Stage::Encrypt),
            BatchStatus::Encrypted => Some(Stage::Upload),
            BatchStatus::Uploaded
            | BatchStatus::NotificationReceived
            | BatchStatus::Processed => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!("Unknown stage '{s}'. Must be one of: feed, checksum, archive, encrypt, upload")
            })
    }
}

/// Drives batches through the outbound stages
pub struct BatchPipeline {
    repository: Arc<dyn BatchRepository>,
    gateway: Arc<dyn TransferGateway>,
    workspace: Workspace,
    feeds: FeedsConfig,
    encryption: EncryptionConfig,
    upload_dir: String,
}

impl BatchPipeline {
    pub fn new(
        config: &BatchfeedConfig,
        repository: Arc<dyn BatchRepository>,
        gateway: Arc<dyn TransferGateway>,
    ) -> Self {
        Self {
            repository,
            gateway,
            workspace: Workspace::new(config.workspace.work_dir.clone()),
            feeds: config.feeds.clone(),
            encryption: config.encryption.clone(),
            upload_dir: config.transfer.upload_dir.clone(),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn strategy(&self, kind: FeedKind) -> Arc<dyn FeedStrategy> {
        strategy_for(kind, &self.feeds)
    }

    /// Registers a new batch and snapshots its records into the workspace
    ///
    /// The name is `<prefix>_<timestamp>_<seq>`; `seq` starts at 1 and is
    /// incremented until neither a batch run nor a workspace uses the name.
    pub async fn create(&self, kind: FeedKind, records: &[InputRecord]) -> Result<BatchRun> {
        if records.is_empty() {
            return Err(BatchfeedError::Validation(
                "A batch needs at least one input record".to_string(),
            ));
        }

        let strategy = self.strategy(kind);
        let run = self.register(kind, strategy.batch_prefix()).await?;
        let name = run.name.clone();
        log_stage_start!(name, "create");

        let ws = self.workspace.batch(&name);
        ws.create()
            .and_then(|_| ws.write_input(records))
            .map_err(|e| e.in_stage(name.as_str(), "create"))?;

        tracing::info!(
            batch = %name,
            feed = %kind,
            records = records.len(),
            "Batch created"
        );
        log_stage_complete!(name, "create", run.status);
        Ok(run)
    }

    async fn register(&self, kind: FeedKind, prefix: &str) -> Result<BatchRun> {
        let now = Utc::now();
        for seq in 1..=MAX_NAME_ATTEMPTS {
            let name = BatchName::derive(prefix, now, seq).map_err(BatchfeedError::Validation)?;
            let taken = self.repository.find_by_name(name.as_str()).await?.is_some()
                || self.workspace.batch(&name).exists();
            if taken {
                continue;
            }
            // Another creator may have claimed the name since the lookup
            match self.repository.create_batch_run(&name, kind).await {
                Err(BatchfeedError::Conflict(_)) => continue,
                other => return other,
            }
        }
        Err(BatchfeedError::Validation(format!(
            "No free batch name for prefix '{prefix}'"
        )))
    }

    /// Creates a batch and runs every stage on it
    pub async fn initiate(&self, kind: FeedKind, records: &[InputRecord]) -> Result<BatchRun> {
        let run = self.create(kind, records).await?;
        self.run(run.name.as_str()).await
    }

    /// Runs every unfinished stage of a batch, starting after its current status
    pub async fn run(&self, name: &str) -> Result<BatchRun> {
        let mut run = self.load(name).await?;
        Self::ensure_not_acknowledged(&run)?;

        while let Some(stage) = Stage::after(run.status) {
            run = self.execute(name, stage).await?;
        }
        Ok(run)
    }

    pub async fn generate_feed(&self, name: &str) -> Result<BatchRun> {
        self.execute(name, Stage::Feed).await
    }

    pub async fn compute_checksum(&self, name: &str) -> Result<BatchRun> {
        self.execute(name, Stage::Checksum).await
    }

    pub async fn archive(&self, name: &str) -> Result<BatchRun> {
        self.execute(name, Stage::Archive).await
    }

    pub async fn encrypt(&self, name: &str) -> Result<BatchRun> {
        self.execute(name, Stage::Encrypt).await
    }

    pub async fn upload(&self, name: &str) -> Result<BatchRun> {
        self.execute(name, Stage::Upload).await
    }

    /// Runs one stage and persists its status
    ///
    /// Running a stage that already completed moves the status back to it,
    /// since artifacts of later stages are stale from then on.
    pub async fn execute(&self, name: &str, stage: Stage) -> Result<BatchRun> {
        let run = self.load(name).await?;
        Self::ensure_not_acknowledged(&run).map_err(|e| e.in_stage(name, stage.as_str()))?;

        log_stage_start!(run.name, stage);
        let ws = self.workspace.batch(&run.name);
        self.perform(stage, &run, &ws)
            .await
            .map_err(|e| e.in_stage(name, stage.as_str()))?;

        let status = stage.completed_status();
        if status < run.status {
            tracing::warn!(
                batch = %run.name,
                stage = %stage,
                from = %run.status,
                "Stage replayed, later artifacts are stale"
            );
        }
        let updated = self
            .repository
            .update_status(run.id, status)
            .await
            .map_err(|e| e.in_stage(name, stage.as_str()))?;
        log_stage_complete!(updated.name, stage, updated.status);
        Ok(updated)
    }

    async fn perform(&self, stage: Stage, run: &BatchRun, ws: &BatchWorkspace) -> Result<()> {
        let strategy = self.strategy(run.feed);
        match stage {
            Stage::Feed => self.write_feed(strategy.as_ref(), ws).await,
            Stage::Checksum => write_checksum(strategy.as_ref(), ws),
            Stage::Archive => write_archive(strategy.as_ref(), ws),
            Stage::Encrypt => self.write_envelope(ws),
            Stage::Upload => self.send(ws).await,
        }
    }

    async fn write_feed(&self, strategy: &dyn FeedStrategy, ws: &BatchWorkspace) -> Result<()> {
        let records = ws.read_input()?;
        let rules = self.repository.load_mapping_rules(strategy.kind()).await?;
        let builder = FeedBuilder::new(strategy, &rules)?;
        let document = builder.build(ws.name(), &records, Utc::now())?;
        let bytes = strategy.serialize(&document)?;
        ws.write_artifact(&ws.feed_path(strategy.extension()), &bytes)?;

        tracing::debug!(
            batch = %ws.name(),
            records = document.record_count(),
            bytes = bytes.len(),
            "Feed written"
        );
        Ok(())
    }

    fn write_envelope(&self, ws: &BatchWorkspace) -> Result<()> {
        let source = ws.archive_path();
        // Fails with NotFound before any key material is touched
        ws.read_artifact(&source)?;
        let target = ws.envelope_path(&self.encryption.envelope_extension);

        let codec = EnvelopeCodec::from_config(&self.encryption).and_then(|codec| {
            if codec.has_recipients() {
                Ok(codec)
            } else {
                Err(BatchfeedError::Configuration(
                    "No recipient public keys configured".to_string(),
                ))
            }
        });

        match codec {
            Ok(codec) => codec.encrypt_file(&source, &target),
            Err(e) if self.encryption.allow_unencrypted_fallback => {
                tracing::warn!(
                    batch = %ws.name(),
                    reason = %e,
                    "Key material unavailable; copying archive through UNENCRYPTED"
                );
                let bytes = ws.read_artifact(&source)?;
                ws.write_artifact(&target, &bytes)
            }
            Err(e) => Err(e),
        }
    }

    async fn send(&self, ws: &BatchWorkspace) -> Result<()> {
        let envelope = ws.envelope_path(&self.encryption.envelope_extension);
        if !envelope.is_file() {
            return Err(BatchfeedError::NotFound(format!(
                "Workspace artifact {} is missing",
                envelope.display()
            )));
        }

        let mut files = vec![envelope];
        let control = ws.control_path();
        if control.is_file() {
            files.push(control);
        }

        for file in files {
            let remote = self.upload_blocking(file).await?;
            tracing::info!(batch = %ws.name(), remote = %remote, "File uploaded");
        }
        Ok(())
    }

    async fn upload_blocking(&self, file: PathBuf) -> Result<String> {
        let gateway = Arc::clone(&self.gateway);
        let remote_dir = self.upload_dir.clone();
        tokio::task::spawn_blocking(move || gateway.upload(&file, &remote_dir))
            .await
            .map_err(|e| BatchfeedError::Other(format!("Upload task failed: {e}")))?
    }

    /// Contents of a workspace file, for operators
    pub async fn preview_artifact(&self, name: &str, artifact: Artifact) -> Result<String> {
        let run = self.load(name).await?;
        let ws = self.workspace.batch(&run.name);
        let path = match artifact {
            Artifact::Input => ws.input_path(),
            Artifact::Feed => ws.feed_path(self.strategy(run.feed).extension()),
            Artifact::Checksum => ws.sidecar_path(),
            Artifact::Control => ws.control_path(),
        };
        let bytes = ws.read_artifact(&path)?;
        String::from_utf8(bytes).map_err(|e| {
            BatchfeedError::Serialization(format!("{} is not UTF-8: {}", path.display(), e))
        })
    }

    /// Renders one record with the stored rules without creating a batch
    pub async fn preview_record(&self, kind: FeedKind, record: &InputRecord) -> Result<String> {
        let strategy = self.strategy(kind);
        let rules = self.repository.load_mapping_rules(kind).await?;
        FeedBuilder::new(strategy.as_ref(), &rules)?.preview(record, Utc::now())
    }

    async fn load(&self, name: &str) -> Result<BatchRun> {
        self.repository
            .find_by_name(name)
            .await?
            .ok_or_else(|| BatchfeedError::NotFound(format!("Batch run '{name}'")))
    }

    fn ensure_not_acknowledged(run: &BatchRun) -> Result<()> {
        if run.status.is_acknowledged() {
            return Err(BatchfeedError::Validation(format!(
                "Batch {} is already {}; the vendor has acknowledged the upload",
                run.name, run.status
            )));
        }
        Ok(())
    }
}

fn write_checksum(strategy: &dyn FeedStrategy, ws: &BatchWorkspace) -> Result<()> {
    let feed = ws.feed_path(strategy.extension());
    let bytes = ws.read_artifact(&feed)?;
    let file_name = format!("{}.{}", ws.name(), strategy.extension());
    let line = checksum::sidecar_line(&checksum::sha256_hex(&bytes), &file_name);
    ws.write_artifact(&ws.sidecar_path(), line.as_bytes())
}

fn write_archive(strategy: &dyn FeedStrategy, ws: &BatchWorkspace) -> Result<()> {
    let feed = ws.feed_path(strategy.extension());
    let sidecar = ws.sidecar_path();
    for path in [&feed, &sidecar] {
        if !path.is_file() {
            return Err(BatchfeedError::NotFound(format!(
                "Workspace artifact {} is missing",
                path.display()
            )));
        }
    }

    let bytes = archive::pack(&[feed, sidecar])?;
    ws.write_artifact(&ws.archive_path(), &bytes)?;

    let record_count = ws.read_input()?.len();
    if let Some(manifest) =
        strategy.control_manifest(&ws.archive_name(), &bytes, record_count, Utc::now())?
    {
        ws.write_artifact(&ws.control_path(), &manifest)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::InMemoryBatchRepository;
    use crate::adapters::transfer::LocalTransferGateway;
    use crate::core::codec::envelope::{KdfParams, Keyring, SecretKey};
    use crate::domain::{MappingRule, ReplyEffect};
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        remote: PathBuf,
        repository: Arc<InMemoryBatchRepository>,
        pipeline: BatchPipeline,
        secret: SecretKey,
    }

    fn fixture(with_keys: bool) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let remote = tmp.path().join("remote");
        let mut config = BatchfeedConfig::in_memory(tmp.path().join("work"));

        let secret = SecretKey::generate();
        if with_keys {
            let public = tmp.path().join("vendor.pub.asc");
            fs::write(&public, secret.public_key().to_armored()).unwrap();
            config.encryption.recipient_public_keys = vec![public];
        }

        let repository = Arc::new(InMemoryBatchRepository::new());
        let pipeline = BatchPipeline::new(
            &config,
            repository.clone(),
            Arc::new(LocalTransferGateway::new(&remote)),
        );
        Fixture {
            _tmp: tmp,
            remote,
            repository,
            pipeline,
            secret,
        }
    }

    fn records() -> Vec<InputRecord> {
        vec![
            InputRecord {
                client_id: Some(1001),
                first_name: Some("Jane".into()),
                last_name: Some("Doe".into()),
                ..Default::default()
            },
            InputRecord {
                client_id: Some(1002),
                last_name: Some("Roe".into()),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_stage_after_status() {
        assert_eq!(Stage::after(BatchStatus::Created), Some(Stage::Feed));
        assert_eq!(Stage::after(BatchStatus::Encrypted), Some(Stage::Upload));
        assert_eq!(Stage::after(BatchStatus::Uploaded), None);
        assert_eq!(Stage::after(BatchStatus::Processed), None);
        assert_eq!("Archive".parse::<Stage>().unwrap(), Stage::Archive);
    }

    #[tokio::test]
    async fn test_create_snapshots_input() {
        let f = fixture(true);
        let run = f.pipeline.create(FeedKind::Screening, &records()).await.unwrap();

        assert_eq!(run.status, BatchStatus::Created);
        assert!(run.name.as_str().starts_with("2475_RC_DELTA_"));
        assert!(run.name.as_str().ends_with("_1"));
        let ws = f.pipeline.workspace().batch(&run.name);
        assert_eq!(ws.read_input().unwrap(), records());
    }

    #[tokio::test]
    async fn test_names_are_unique_within_one_second() {
        let f = fixture(true);
        let a = f.pipeline.create(FeedKind::Risk, &records()).await.unwrap();
        let b = f.pipeline.create(FeedKind::Risk, &records()).await.unwrap();
        assert_ne!(a.name, b.name);
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let f = fixture(true);
        let err = f.pipeline.create(FeedKind::Risk, &[]).await.unwrap_err();
        assert!(matches!(err, BatchfeedError::Validation(_)));
    }

    #[tokio::test]
    async fn test_initiate_runs_all_stages() {
        let f = fixture(true);
        let run = f.pipeline.initiate(FeedKind::Screening, &records()).await.unwrap();
        assert_eq!(run.status, BatchStatus::Uploaded);

        let envelope = f.remote.join("upload").join(format!("{}.zip.enc", run.name));
        let armored = fs::read_to_string(envelope).unwrap();
        assert!(armored.starts_with("-----BEGIN BATCHFEED ENVELOPE-----"));

        let kdf = KdfParams {
            m_cost: 1024,
            t_cost: 1,
            p_cost: 1,
        };
        let keyring = Keyring::from_armored(&f.secret.to_armored(b"", kdf).unwrap()).unwrap();
        let literal = crate::core::codec::envelope::open(&armored, &keyring, b"").unwrap();
        assert_eq!(literal.file_name, format!("{}.zip", run.name));
    }

    #[tokio::test]
    async fn test_risk_batch_uploads_control_manifest() {
        let f = fixture(true);
        let run = f.pipeline.initiate(FeedKind::Risk, &records()).await.unwrap();

        let control = fs::read_to_string(f.remote.join("upload").join("control.json")).unwrap();
        assert!(control.contains(&format!("\"requestFilename\": \"{}.zip\"", run.name)));
        assert!(control.contains("\"totalNoOfRequests\": 2"));
    }

    #[tokio::test]
    async fn test_checksum_sidecar_matches_feed() {
        let f = fixture(true);
        let run = f.pipeline.create(FeedKind::Risk, &records()).await.unwrap();
        f.pipeline.generate_feed(run.name.as_str()).await.unwrap();
        let run = f.pipeline.compute_checksum(run.name.as_str()).await.unwrap();
        assert_eq!(run.status, BatchStatus::ChecksumGenerated);

        let ws = f.pipeline.workspace().batch(&run.name);
        let feed = fs::read(ws.feed_path("jsonl")).unwrap();
        let sidecar = fs::read_to_string(ws.sidecar_path()).unwrap();
        let entry = checksum::verify_sidecar(&feed, &sidecar).unwrap();
        assert_eq!(entry.file_name, format!("{}.jsonl", run.name));
    }

    #[tokio::test]
    async fn test_stage_without_artifact_keeps_status() {
        let f = fixture(true);
        let run = f.pipeline.create(FeedKind::Screening, &records()).await.unwrap();

        let err = f.pipeline.archive(run.name.as_str()).await.unwrap_err();
        match &err {
            BatchfeedError::Stage { stage, .. } => assert_eq!(stage, "archive"),
            other => panic!("expected stage error, got {other:?}"),
        }
        assert!(matches!(err.root(), BatchfeedError::NotFound(_)));

        let stored = f.repository.find_by_name(run.name.as_str()).await.unwrap().unwrap();
        assert_eq!(stored.status, BatchStatus::Created);
    }

    #[tokio::test]
    async fn test_missing_keys_fail_encrypt_without_fallback() {
        let f = fixture(false);
        let run = f.pipeline.create(FeedKind::Screening, &records()).await.unwrap();
        let err = f.pipeline.run(run.name.as_str()).await.unwrap_err();
        assert!(err.is_configuration());

        let stored = f.repository.find_by_name(run.name.as_str()).await.unwrap().unwrap();
        assert_eq!(stored.status, BatchStatus::Archived);
    }

    #[tokio::test]
    async fn test_unencrypted_fallback_when_allowed() {
        let tmp = TempDir::new().unwrap();
        let mut config = BatchfeedConfig::in_memory(tmp.path().join("work"));
        config.encryption.allow_unencrypted_fallback = true;
        let pipeline = BatchPipeline::new(
            &config,
            Arc::new(InMemoryBatchRepository::new()),
            Arc::new(LocalTransferGateway::new(tmp.path().join("remote"))),
        );

        let run = pipeline.initiate(FeedKind::Screening, &records()).await.unwrap();
        let ws = pipeline.workspace().batch(&run.name);
        assert_eq!(
            fs::read(ws.envelope_path("enc")).unwrap(),
            fs::read(ws.archive_path()).unwrap()
        );
    }

    #[tokio::test]
    async fn test_replay_regresses_status() {
        let f = fixture(true);
        let run = f.pipeline.initiate(FeedKind::Risk, &records()).await.unwrap();
        let replayed = f.pipeline.compute_checksum(run.name.as_str()).await.unwrap();
        assert_eq!(replayed.status, BatchStatus::ChecksumGenerated);

        let resumed = f.pipeline.run(run.name.as_str()).await.unwrap();
        assert_eq!(resumed.status, BatchStatus::Uploaded);
    }

    #[tokio::test]
    async fn test_acknowledged_batch_refuses_stages() {
        let f = fixture(true);
        let run = f.pipeline.initiate(FeedKind::Screening, &records()).await.unwrap();
        f.repository
            .apply_reply(
                run.id,
                &ReplyEffect::Notification {
                    vendor_status: Some("ACTC".into()),
                    errors: vec![],
                },
            )
            .await
            .unwrap();

        let err = f.pipeline.generate_feed(run.name.as_str()).await.unwrap_err();
        assert!(matches!(err.root(), BatchfeedError::Validation(_)));
        assert!(f.pipeline.run(run.name.as_str()).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_batch_is_not_found() {
        let f = fixture(true);
        let err = f.pipeline.generate_feed("NOPE_1").await.unwrap_err();
        assert!(matches!(err.root(), BatchfeedError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stored_rules_shape_feed_and_preview() {
        let f = fixture(true);
        f.repository
            .replace_mapping_rules(
                FeedKind::Screening,
                &[MappingRule::from_source("name.sur", "lastName")],
            )
            .await
            .unwrap();

        let preview = f
            .pipeline
            .preview_record(FeedKind::Screening, &records()[0])
            .await
            .unwrap();
        assert!(preview.contains("<pty:Sur>Doe</pty:Sur>"));

        let run = f.pipeline.create(FeedKind::Screening, &records()).await.unwrap();
        f.pipeline.generate_feed(run.name.as_str()).await.unwrap();
        let feed = f
            .pipeline
            .preview_artifact(run.name.as_str(), Artifact::Feed)
            .await
            .unwrap();
        assert!(feed.contains("<pty:Sur>Roe</pty:Sur>"));
    }
}
