//! Integration tests for the file-level codecs: archive, sidecar and envelope
//! used together the way the pipeline and the reply processor use them

use batchfeed::config::{secret_string, EncryptionConfig};
use batchfeed::core::codec::envelope::armor::{self, ArmorKind};
use batchfeed::core::codec::envelope::{EnvelopeCodec, KdfParams, SecretKey};
use batchfeed::core::codec::{archive, checksum};
use batchfeed::domain::{BatchfeedError, EnvelopeError};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const PASSPHRASE: &str = "batchfeed-test";

/// Writes a key pair to `dir` and returns a codec configured from the files
fn codec_from_files(dir: &Path) -> (EnvelopeCodec, SecretKey) {
    let secret = SecretKey::generate();
    let kdf = KdfParams {
        m_cost: 1024,
        t_cost: 1,
        p_cost: 1,
    };
    let public_path = dir.join("recipient.pub.asc");
    let keyring_path = dir.join("recipient.sec.asc");
    fs::write(&public_path, secret.public_key().to_armored()).unwrap();
    fs::write(&keyring_path, secret.to_armored(PASSPHRASE.as_bytes(), kdf).unwrap()).unwrap();

    let config = EncryptionConfig {
        recipient_public_keys: vec![public_path],
        secret_keyring: Some(keyring_path),
        passphrase: Some(secret_string(PASSPHRASE.to_string())),
        ..Default::default()
    };
    (EnvelopeCodec::from_config(&config).unwrap(), secret)
}

fn batch_files(dir: &Path) -> Vec<PathBuf> {
    let feed = dir.join("BATCH_001.xml");
    fs::write(&feed, "<NLSFeed><Request/></NLSFeed>").unwrap();
    let sidecar = dir.join("BATCH_001.sha256sum");
    let hash = checksum::sha256_hex(&fs::read(&feed).unwrap());
    fs::write(&sidecar, checksum::sidecar_line(&hash, "BATCH_001.xml")).unwrap();
    vec![feed, sidecar]
}

#[test]
fn test_archive_envelope_round_trip_through_files() {
    let tmp = TempDir::new().unwrap();
    let (codec, _) = codec_from_files(tmp.path());
    let files = batch_files(tmp.path());

    let zip_path = tmp.path().join("BATCH_001.zip");
    fs::write(&zip_path, archive::pack(&files).unwrap()).unwrap();
    let envelope = tmp.path().join("BATCH_001.zip.enc");
    codec.encrypt_file(&zip_path, &envelope).unwrap();

    let literal = codec.decrypt_file(&envelope).unwrap();
    assert_eq!(literal.file_name, "BATCH_001.zip");
    assert_eq!(literal.data, fs::read(&zip_path).unwrap());

    let out = tmp.path().join("out");
    let unpacked = archive::unpack(&literal.data, &out).unwrap();
    assert_eq!(unpacked.len(), 2);
    for original in &files {
        let name = original.file_name().unwrap();
        assert_eq!(fs::read(out.join(name)).unwrap(), fs::read(original).unwrap());
    }

    let sidecar = fs::read_to_string(out.join("BATCH_001.sha256sum")).unwrap();
    let feed = fs::read(out.join("BATCH_001.xml")).unwrap();
    let entry = checksum::verify_sidecar(&feed, &sidecar).unwrap();
    assert_eq!(entry.file_name, "BATCH_001.xml");
}

#[test]
fn test_envelope_for_another_key_is_key_not_found() {
    let tmp = TempDir::new().unwrap();
    let (ours, _) = codec_from_files(tmp.path());
    let other_dir = tmp.path().join("other");
    fs::create_dir_all(&other_dir).unwrap();
    let (theirs, _) = codec_from_files(&other_dir);

    let plain = tmp.path().join("payload.zip");
    fs::write(&plain, b"PK payload").unwrap();
    let envelope = tmp.path().join("payload.zip.enc");
    theirs.encrypt_file(&plain, &envelope).unwrap();

    match ours.decrypt_file(&envelope).unwrap_err() {
        BatchfeedError::Envelope(EnvelopeError::KeyNotFound(_)) => {}
        other => panic!("expected KeyNotFound, got {other:?}"),
    }
}

#[test]
fn test_one_flipped_byte_is_an_integrity_failure() {
    let tmp = TempDir::new().unwrap();
    let (codec, _) = codec_from_files(tmp.path());
    let plain = tmp.path().join("payload.zip");
    fs::write(&plain, b"PK payload that matters").unwrap();
    let envelope = tmp.path().join("payload.zip.enc");
    codec.encrypt_file(&plain, &envelope).unwrap();

    let armored = fs::read_to_string(&envelope).unwrap();
    let mut raw = armor::decode(ArmorKind::Envelope, &armored).unwrap();
    let last = raw.len() - 1;
    raw[last] ^= 0x40;
    fs::write(&envelope, armor::encode(ArmorKind::Envelope, &raw)).unwrap();

    let err = codec.decrypt_file(&envelope).unwrap_err();
    assert!(err.is_integrity());
}

#[test]
fn test_missing_key_file_is_configuration_error() {
    let config = EncryptionConfig {
        recipient_public_keys: vec![PathBuf::from("/nonexistent/vendor.pub.asc")],
        ..Default::default()
    };
    let err = EnvelopeCodec::from_config(&config).err().unwrap();
    assert!(err.is_configuration());
}

#[test]
fn test_traversal_entry_leaves_destination_untouched() {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buffer);
        zip.start_file("BATCH_001.xml", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"<Notification/>").unwrap();
        zip.start_file("../evil", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"gotcha").unwrap();
        zip.finish().unwrap();
    }

    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("dest");
    let err = archive::unpack(&buffer.into_inner(), &dest).unwrap_err();
    assert!(err.is_path_traversal());
    assert!(!tmp.path().join("evil").exists());
    assert!(!dest.exists());
}

#[test]
fn test_unreadable_archive_creates_no_destination() {
    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("dest");
    let err = archive::unpack(b"not a zip", &dest).unwrap_err();
    assert!(err.is_integrity());
    assert!(!dest.exists());
}
