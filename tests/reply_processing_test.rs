//! Integration tests for inbound reply processing
//!
//! Replies are built the way the vendor ships them: an XML payload with a
//! checksum sidecar, zipped, then sealed for our public key and dropped into
//! the inbox of a local transfer root.

use batchfeed::adapters::database::{BatchRepository, InMemoryBatchRepository};
use batchfeed::adapters::transfer::LocalTransferGateway;
use batchfeed::config::BatchfeedConfig;
use batchfeed::core::codec::envelope::{seal, EnvelopeCodec, KdfParams, Keyring, SecretKey};
use batchfeed::core::codec::{archive, checksum};
use batchfeed::core::reply::{ReplyOutcome, ReplyPoller, ReplyProcessor};
use batchfeed::domain::{BatchName, BatchStatus, FeedKind};
use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const NOTIFICATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<noti:Notification xmlns:noti="http://www.db.com/NLSNotification">
  <noti:Meta><noti:SrcId>2475</noti:SrcId><noti:Stat>RJCT</noti:Stat></noti:Meta>
  <noti:RecordNoti>
    <noti:Rec>
      <noti:UniRcrdId>1001</noti:UniRcrdId>
      <noti:Err><noti:ErrCode>E042</noti:ErrCode><noti:ErrDesc>Missing date of birth</noti:ErrDesc></noti:Err>
    </noti:Rec>
  </noti:RecordNoti>
</noti:Notification>"#;

const FEEDBACK: &str = r#"<Feedback>
  <Meta><Nor>2</Nor></Meta>
  <FbRecs>
    <FbRec>
      <UniRcrdId>1001</UniRcrdId>
      <Mat><MatchId>M1</MatchId><MatchName>Jane Doe</MatchName><Score>97</Score><Stat>OPEN</Stat></Mat>
    </FbRec>
    <FbRec>
      <UniRcrdId>1002</UniRcrdId>
      <Mat><MatchId>M7</MatchId><MatchName>J. Roe</MatchName><Score>64</Score><Stat>CLOSED</Stat></Mat>
    </FbRec>
  </FbRecs>
</Feedback>"#;

struct Vendor {
    tmp: TempDir,
    inbox: PathBuf,
    secret: SecretKey,
    repository: Arc<InMemoryBatchRepository>,
    processor: Arc<ReplyProcessor>,
}

impl Vendor {
    fn new() -> Self {
        Self::with_config(|_| {})
    }

    fn with_config(adjust: impl FnOnce(&mut BatchfeedConfig)) -> Self {
        let tmp = TempDir::new().unwrap();
        let remote = tmp.path().join("remote");
        let mut config = BatchfeedConfig::in_memory(tmp.path().join("work"));
        adjust(&mut config);
        let inbox = remote.join(config.transfer.inbox_dir.trim_start_matches('/'));
        fs::create_dir_all(&inbox).unwrap();

        let secret = SecretKey::generate();
        let kdf = KdfParams {
            m_cost: 1024,
            t_cost: 1,
            p_cost: 1,
        };
        let keyring = Keyring::from_armored(&secret.to_armored(b"", kdf).unwrap()).unwrap();
        let codec = EnvelopeCodec::new(vec![], Some(keyring), None);

        let repository = Arc::new(InMemoryBatchRepository::new());
        let processor = ReplyProcessor::with_codec(
            &config,
            repository.clone(),
            Arc::new(LocalTransferGateway::new(&remote)),
            codec,
        );
        Self {
            tmp,
            inbox,
            secret,
            repository,
            processor: Arc::new(processor),
        }
    }

    /// Drops `<stem>.zip.enc` carrying `payload` as `<stem>.xml` into the inbox
    fn deliver(&self, stem: &str, payload: &str) -> String {
        self.deliver_with_sidecar(stem, payload, payload)
    }

    fn deliver_with_sidecar(&self, stem: &str, payload: &str, hashed: &str) -> String {
        let staging = self.tmp.path().join("staging").join(stem);
        fs::create_dir_all(&staging).unwrap();
        let xml = staging.join(format!("{stem}.xml"));
        let sidecar = staging.join(format!("{stem}.sha256sum"));
        fs::write(&xml, payload).unwrap();
        fs::write(
            &sidecar,
            checksum::sidecar_line(
                &checksum::sha256_hex(hashed.as_bytes()),
                &format!("{stem}.xml"),
            ),
        )
        .unwrap();

        let zip = archive::pack(&[xml, sidecar]).unwrap();
        let file_name = format!("{stem}.zip.enc");
        let armored = seal(
            &zip,
            &format!("{stem}.zip"),
            Utc::now(),
            &[self.secret.public_key().clone()],
        )
        .unwrap();
        fs::write(self.inbox.join(&file_name), armored).unwrap();
        file_name
    }

    async fn batch(&self, name: &str) -> i64 {
        let name = BatchName::new(name).unwrap();
        self.repository
            .create_batch_run(&name, FeedKind::Screening)
            .await
            .unwrap()
            .id
    }
}

#[tokio::test]
async fn test_notification_with_one_error_is_recorded() {
    let vendor = Vendor::new();
    let id = vendor.batch("BATCH_001").await;
    let file = vendor.deliver("BATCH_001", NOTIFICATION);

    let outcome = vendor.processor.process(&file).await.unwrap();
    assert_eq!(
        outcome,
        ReplyOutcome::Applied {
            batch: BatchName::new("BATCH_001").unwrap(),
            status: BatchStatus::NotificationReceived,
            rows: 1,
        }
    );

    let run = vendor.repository.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(run.status, BatchStatus::NotificationReceived);
    assert_eq!(run.notification_status.as_deref(), Some("RJCT"));

    let errors = vendor.repository.errors_for(id).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].record_id.as_deref(), Some("1001"));
    assert_eq!(errors[0].error_code.as_deref(), Some("E042"));
    assert_eq!(errors[0].error_message.as_deref(), Some("Missing date of birth"));

    // Handled replies leave the inbox
    assert!(!vendor.inbox.join(&file).exists());
}

#[tokio::test]
async fn test_feedback_marks_batch_processed() {
    let vendor = Vendor::new();
    let id = vendor.batch("2475_RC_DELTA_20250101120000_1").await;
    let file = vendor.deliver("2475_RC_DELTA_20250101120000_1", FEEDBACK);

    vendor.processor.process(&file).await.unwrap();

    let run = vendor.repository.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(run.status, BatchStatus::Processed);
    assert_eq!(run.feedback_count, 2);

    let feedback = vendor.repository.feedback_for(id).await.unwrap();
    assert_eq!(feedback.len(), 2);
    assert_eq!(feedback[0].match_name.as_deref(), Some("Jane Doe"));
    assert_eq!(feedback[1].match_score.as_deref(), Some("64"));
    assert_eq!(feedback[1].status.as_deref(), Some("CLOSED"));
}

#[tokio::test]
async fn test_uncorrelated_reply_writes_nothing() {
    let vendor = Vendor::new();
    let id = vendor.batch("BATCH_001").await;
    let file = vendor.deliver("BATCH_999", NOTIFICATION);

    let outcome = vendor.processor.process(&file).await.unwrap();
    assert_eq!(
        outcome,
        ReplyOutcome::Uncorrelated {
            candidate: "BATCH_999".to_string()
        }
    );

    let run = vendor.repository.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(run.status, BatchStatus::Created);
    assert!(vendor.repository.errors_for(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_poller_continues_past_uncorrelated_file() {
    let vendor = Vendor::new();
    let id = vendor.batch("BATCH_002").await;
    // Listing order is by name: the uncorrelated file comes first
    vendor.deliver("BATCH_000", NOTIFICATION);
    vendor.deliver("BATCH_002", FEEDBACK);
    fs::write(vendor.inbox.join("README.txt"), "not a reply").unwrap();

    let poller = ReplyPoller::new(vendor.processor.clone(), &Default::default());
    let summary = poller.poll_once().await.unwrap();
    assert_eq!(summary.listed, 2);
    assert_eq!(summary.uncorrelated, 1);
    assert_eq!(summary.applied, 1);
    assert_eq!(summary.failed, 0);

    let run = vendor.repository.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(run.status, BatchStatus::Processed);

    // Nothing new on the second cycle
    let again = poller.poll_once().await.unwrap();
    assert_eq!(again.listed, 0);
}

#[tokio::test]
async fn test_checksum_mismatch_discards_file() {
    let vendor = Vendor::new();
    let id = vendor.batch("BATCH_001").await;
    let file = vendor.deliver_with_sidecar("BATCH_001", NOTIFICATION, "<Notification/>");

    let err = vendor.processor.process(&file).await.unwrap_err();
    assert!(err.is_integrity());

    let run = vendor.repository.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(run.status, BatchStatus::Created);
    assert!(vendor.repository.errors_for(id).await.unwrap().is_empty());
    assert!(!vendor.inbox.join(&file).exists());
}

#[tokio::test]
async fn test_envelope_for_other_key_is_left_in_inbox() {
    let vendor = Vendor::new();
    vendor.batch("BATCH_001").await;

    let stranger = SecretKey::generate();
    let recipients = [stranger.public_key().clone()];
    let armored = seal(b"PK", "BATCH_001.zip", Utc::now(), &recipients).unwrap();
    fs::write(vendor.inbox.join("BATCH_001.zip.enc"), armored).unwrap();

    let err = vendor.processor.process("BATCH_001.zip.enc").await.unwrap_err();
    assert!(!err.is_integrity());
    assert!(vendor.inbox.join("BATCH_001.zip.enc").exists());
}

#[tokio::test]
async fn test_unrecognized_document_is_ignored() {
    let vendor = Vendor::new();
    let id = vendor.batch("BATCH_001").await;
    let file = vendor.deliver("BATCH_001", "<Receipt><Meta/></Receipt>");

    let outcome = vendor.processor.process(&file).await.unwrap();
    assert!(matches!(outcome, ReplyOutcome::Ignored { .. }));

    let run = vendor.repository.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(run.status, BatchStatus::Created);
}

#[tokio::test]
async fn test_replies_kept_when_deletion_disabled() {
    let vendor = Vendor::with_config(|config| config.poller.delete_after_processing = false);
    vendor.batch("BATCH_001").await;
    let file = vendor.deliver("BATCH_001", NOTIFICATION);

    vendor.processor.process(&file).await.unwrap();
    assert!(vendor.inbox.join(&file).exists());
}

#[tokio::test]
async fn test_poller_forgets_files_removed_from_inbox() {
    let vendor = Vendor::with_config(|config| config.poller.delete_after_processing = false);
    vendor.batch("BATCH_001").await;
    let file = vendor.deliver("BATCH_001", NOTIFICATION);

    let poller = ReplyPoller::new(vendor.processor.clone(), &Default::default());
    assert_eq!(poller.poll_once().await.unwrap().listed, 1);
    assert_eq!(poller.poll_once().await.unwrap().listed, 0);
    assert_eq!(poller.remembered().await, 1);

    fs::remove_file(vendor.inbox.join(&file)).unwrap();
    assert_eq!(poller.poll_once().await.unwrap().listed, 0);
    assert_eq!(poller.remembered().await, 0);

    // A later delivery under the same name is picked up again
    vendor.deliver("BATCH_001", NOTIFICATION);
    assert_eq!(poller.poll_once().await.unwrap().listed, 1);
}
