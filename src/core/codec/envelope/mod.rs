//! Asymmetric envelope: compress, seal for one or more P-256 recipients, armor
//!
//! Binary layout inside the `BATCHFEED ENVELOPE` armor:
//!
//! ```text
//! "BFE1" | count u16
//!   count x ( key_id[8] | ephemeral SEC1[33] | wrap nonce[12] | wrapped session key[48] )
//! payload nonce[12] | AES-256-GCM(session key, deflate(packet), aad = everything above)
//! ```
//!
//! The packet is a literal-data record: tag `0x01`, u16 file name length, file
//! name, i64 big-endian unix timestamp, then the data.

pub mod armor;
pub mod keys;

pub use keys::{KdfParams, KeyId, Keyring, ProtectedSecretKey, PublicKey, SecretKey};

use crate::config::EncryptionConfig;
use crate::domain::{BatchfeedError, EnvelopeError, Result};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use armor::ArmorKind;
use chrono::{DateTime, Utc};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use hkdf::Hkdf;
use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::ExposeSecret;
use sha2::Sha256;
use std::io::{Read, Write};
use std::path::Path;
use zeroize::Zeroizing;

const MAGIC: &[u8; 4] = b"BFE1";
const RECIPIENT_LEN: usize = 8 + 33 + 12 + 48;
const NONCE_LEN: usize = 12;
const WRAP_INFO: &[u8] = b"batchfeed envelope v1 key wrap";

const TAG_LITERAL: u8 = 0x01;
const TAG_SIGNATURE: u8 = 0x02;

/// Plaintext recovered from an envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralData {
    pub file_name: String,
    pub timestamp: DateTime<Utc>,
    pub data: Vec<u8>,
}

/// Seals `data` for every recipient and returns the armored envelope
pub fn seal(
    data: &[u8],
    file_name: &str,
    timestamp: DateTime<Utc>,
    recipients: &[PublicKey],
) -> std::result::Result<String, EnvelopeError> {
    let name = file_name.as_bytes();
    let name_len = u16::try_from(name.len())
        .map_err(|_| EnvelopeError::Malformed("File name too long".to_string()))?;

    let mut packet = Vec::with_capacity(1 + 2 + name.len() + 8 + data.len());
    packet.push(TAG_LITERAL);
    packet.extend_from_slice(&name_len.to_be_bytes());
    packet.extend_from_slice(name);
    packet.extend_from_slice(&timestamp.timestamp().to_be_bytes());
    packet.extend_from_slice(data);

    seal_packet(&packet, recipients)
}

fn seal_packet(
    packet: &[u8],
    recipients: &[PublicKey],
) -> std::result::Result<String, EnvelopeError> {
    if recipients.is_empty() {
        return Err(EnvelopeError::Key("No recipient keys supplied".to_string()));
    }
    let count = u16::try_from(recipients.len())
        .map_err(|_| EnvelopeError::Key("Too many recipients".to_string()))?;

    let mut session_key = Zeroizing::new([0u8; 32]);
    OsRng.fill_bytes(session_key.as_mut());

    let mut header = Vec::with_capacity(6 + recipients.len() * RECIPIENT_LEN + NONCE_LEN);
    header.extend_from_slice(MAGIC);
    header.extend_from_slice(&count.to_be_bytes());

    for recipient in recipients {
        let ephemeral = EphemeralSecret::random(&mut OsRng);
        let ephemeral_public = ephemeral.public_key().to_encoded_point(true);
        let shared = ephemeral.diffie_hellman(recipient.inner());
        let wrap_key = wrap_key(
            shared.raw_secret_bytes().as_slice(),
            ephemeral_public.as_bytes(),
            recipient.key_id(),
        )?;

        let mut wrap_nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut wrap_nonce);
        let wrapped = aes_seal(
            wrap_key.as_ref(),
            &wrap_nonce,
            session_key.as_ref(),
            &recipient.key_id().0,
        )?;

        header.extend_from_slice(&recipient.key_id().0);
        header.extend_from_slice(ephemeral_public.as_bytes());
        header.extend_from_slice(&wrap_nonce);
        header.extend_from_slice(&wrapped);
    }

    let mut payload_nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut payload_nonce);
    header.extend_from_slice(&payload_nonce);

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(packet)
        .map_err(|e| EnvelopeError::Malformed(format!("Compression failed: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| EnvelopeError::Malformed(format!("Compression failed: {e}")))?;

    let ciphertext = aes_seal(session_key.as_ref(), &payload_nonce, &compressed, &header)?;

    let mut out = header;
    out.extend_from_slice(&ciphertext);
    Ok(armor::encode(ArmorKind::Envelope, &out))
}

/// Opens an armored envelope with a key from `keyring`
///
/// # Errors
///
/// - [`EnvelopeError::KeyNotFound`] when no recipient matches the keyring
/// - [`EnvelopeError::Passphrase`] when the matching key does not unlock
/// - [`EnvelopeError::Authentication`] when any integrity tag fails
/// - [`EnvelopeError::UnsupportedPayload`] for signature packets
/// - [`EnvelopeError::Malformed`] for structural damage
pub fn open(
    armored: &str,
    keyring: &Keyring,
    passphrase: &[u8],
) -> std::result::Result<LiteralData, EnvelopeError> {
    let raw = armor::decode(ArmorKind::Envelope, armored)?;
    let parsed = ParsedEnvelope::parse(&raw)?;

    let (recipient, protected) = parsed
        .recipients
        .iter()
        .find_map(|r| keyring.find(r.key_id).map(|k| (r, k)))
        .ok_or_else(|| {
            let ids: Vec<String> = parsed.recipients.iter().map(|r| r.key_id.to_string()).collect();
            EnvelopeError::KeyNotFound(ids.join(", "))
        })?;

    let secret = protected.unlock(passphrase)?;

    let ephemeral = p256::PublicKey::from_sec1_bytes(recipient.ephemeral)
        .map_err(|_| EnvelopeError::Malformed("Invalid ephemeral key".to_string()))?;
    let shared =
        p256::ecdh::diffie_hellman(secret.inner().to_nonzero_scalar(), ephemeral.as_affine());
    let wrap_key = wrap_key(
        shared.raw_secret_bytes().as_slice(),
        recipient.ephemeral,
        recipient.key_id,
    )?;

    let session_key = Zeroizing::new(aes_open(
        wrap_key.as_ref(),
        recipient.wrap_nonce,
        recipient.wrapped,
        &recipient.key_id.0,
    )?);
    let compressed = aes_open(
        &session_key,
        parsed.payload_nonce,
        parsed.ciphertext,
        parsed.header,
    )?;

    let mut packet = Vec::new();
    DeflateDecoder::new(compressed.as_slice())
        .read_to_end(&mut packet)
        .map_err(|e| EnvelopeError::Malformed(format!("Decompression failed: {e}")))?;

    parse_packet(&packet)
}

fn parse_packet(packet: &[u8]) -> std::result::Result<LiteralData, EnvelopeError> {
    match packet.first() {
        Some(&TAG_LITERAL) => {}
        Some(&TAG_SIGNATURE) => {
            return Err(EnvelopeError::UnsupportedPayload(
                "detached signature instead of literal data; signed messages are not supported"
                    .to_string(),
            ))
        }
        Some(other) => {
            return Err(EnvelopeError::UnsupportedPayload(format!(
                "unknown packet tag 0x{other:02x}"
            )))
        }
        None => return Err(EnvelopeError::Malformed("Empty payload".to_string())),
    }

    let truncated = || EnvelopeError::Malformed("Truncated literal packet".to_string());
    let name_len = packet
        .get(1..3)
        .map(|b| u16::from_be_bytes([b[0], b[1]]) as usize)
        .ok_or_else(truncated)?;
    let name_end = 3 + name_len;
    let name = packet.get(3..name_end).ok_or_else(truncated)?;
    let ts_bytes: [u8; 8] = packet
        .get(name_end..name_end + 8)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(truncated)?;

    let file_name = String::from_utf8(name.to_vec())
        .map_err(|_| EnvelopeError::Malformed("File name is not UTF-8".to_string()))?;
    let timestamp = DateTime::<Utc>::from_timestamp(i64::from_be_bytes(ts_bytes), 0)
        .ok_or_else(|| EnvelopeError::Malformed("Timestamp out of range".to_string()))?;

    Ok(LiteralData {
        file_name,
        timestamp,
        data: packet[name_end + 8..].to_vec(),
    })
}

struct RecipientEntry<'a> {
    key_id: KeyId,
    ephemeral: &'a [u8],
    wrap_nonce: &'a [u8],
    wrapped: &'a [u8],
}

struct ParsedEnvelope<'a> {
    header: &'a [u8],
    recipients: Vec<RecipientEntry<'a>>,
    payload_nonce: &'a [u8],
    ciphertext: &'a [u8],
}

impl<'a> ParsedEnvelope<'a> {
    fn parse(raw: &'a [u8]) -> std::result::Result<Self, EnvelopeError> {
        if raw.len() < 6 || &raw[..4] != MAGIC {
            return Err(EnvelopeError::Malformed("Not a batchfeed envelope".to_string()));
        }
        let count = u16::from_be_bytes([raw[4], raw[5]]) as usize;
        let header_len = 6 + count * RECIPIENT_LEN + NONCE_LEN;
        // The payload carries at least a GCM tag
        if count == 0 || raw.len() < header_len + 16 {
            return Err(EnvelopeError::Malformed("Truncated envelope header".to_string()));
        }

        let recipients = (0..count)
            .map(|i| {
                let at = 6 + i * RECIPIENT_LEN;
                let mut key_id = [0u8; 8];
                key_id.copy_from_slice(&raw[at..at + 8]);
                RecipientEntry {
                    key_id: KeyId(key_id),
                    ephemeral: &raw[at + 8..at + 41],
                    wrap_nonce: &raw[at + 41..at + 53],
                    wrapped: &raw[at + 53..at + RECIPIENT_LEN],
                }
            })
            .collect();

        Ok(Self {
            header: &raw[..header_len],
            recipients,
            payload_nonce: &raw[header_len - NONCE_LEN..header_len],
            ciphertext: &raw[header_len..],
        })
    }
}

fn wrap_key(
    shared_secret: &[u8],
    ephemeral_public: &[u8],
    key_id: KeyId,
) -> std::result::Result<Zeroizing<[u8; 32]>, EnvelopeError> {
    let hk = Hkdf::<Sha256>::new(Some(ephemeral_public), shared_secret);
    let mut info = Vec::with_capacity(WRAP_INFO.len() + 8);
    info.extend_from_slice(WRAP_INFO);
    info.extend_from_slice(&key_id.0);

    let mut okm = Zeroizing::new([0u8; 32]);
    hk.expand(&info, okm.as_mut())
        .map_err(|_| EnvelopeError::Key("Key wrap derivation failed".to_string()))?;
    Ok(okm)
}

fn aes_seal(
    key: &[u8],
    nonce: &[u8],
    msg: &[u8],
    aad: &[u8],
) -> std::result::Result<Vec<u8>, EnvelopeError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| EnvelopeError::Key("Invalid key length".to_string()))?;
    cipher
        .encrypt(Nonce::from_slice(nonce), Payload { msg, aad })
        .map_err(|_| EnvelopeError::Key("Encryption failed".to_string()))
}

fn aes_open(
    key: &[u8],
    nonce: &[u8],
    msg: &[u8],
    aad: &[u8],
) -> std::result::Result<Vec<u8>, EnvelopeError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| EnvelopeError::Malformed("Invalid key length".to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg, aad })
        .map_err(|_| EnvelopeError::Authentication)
}

/// File-level envelope operations bound to the configured key material
pub struct EnvelopeCodec {
    recipients: Vec<PublicKey>,
    keyring: Option<Keyring>,
    passphrase: Option<crate::config::SecretString>,
}

impl EnvelopeCodec {
    pub fn new(
        recipients: Vec<PublicKey>,
        keyring: Option<Keyring>,
        passphrase: Option<crate::config::SecretString>,
    ) -> Self {
        Self {
            recipients,
            keyring,
            passphrase,
        }
    }

    /// Reads recipient keys and the keyring named in the configuration
    ///
    /// Missing files are configuration errors. An empty recipient list is
    /// allowed here; [`Self::has_recipients`] lets the caller decide.
    pub fn from_config(config: &EncryptionConfig) -> Result<Self> {
        let recipients = config
            .recipient_public_keys
            .iter()
            .map(|path| {
                let text = read_key_file(path)?;
                PublicKey::from_armored(&text).map_err(|e| {
                    BatchfeedError::Configuration(format!(
                        "Invalid public key {}: {}",
                        path.display(),
                        e
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let keyring = match &config.secret_keyring {
            Some(path) => {
                let text = read_key_file(path)?;
                Some(Keyring::from_armored(&text).map_err(|e| {
                    BatchfeedError::Configuration(format!(
                        "Invalid keyring {}: {}",
                        path.display(),
                        e
                    ))
                })?)
            }
            None => None,
        };

        Ok(Self::new(recipients, keyring, config.passphrase.clone()))
    }

    pub fn has_recipients(&self) -> bool {
        !self.recipients.is_empty()
    }

    /// Seals the file at `src` into an armored envelope at `dest`
    pub fn encrypt_file(&self, src: &Path, dest: &Path) -> Result<()> {
        if self.recipients.is_empty() {
            return Err(BatchfeedError::Configuration(
                "No recipient public keys configured".to_string(),
            ));
        }
        let data = std::fs::read(src)?;
        let file_name = src
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let modified = std::fs::metadata(src)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let armored = seal(&data, file_name, modified, &self.recipients)?;
        std::fs::write(dest, armored)?;
        Ok(())
    }

    /// Opens the armored envelope at `src`
    pub fn decrypt_file(&self, src: &Path) -> Result<LiteralData> {
        let keyring = self.keyring.as_ref().ok_or_else(|| {
            BatchfeedError::Configuration("No secret keyring configured".to_string())
        })?;
        let text = std::fs::read_to_string(src).map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => {
                BatchfeedError::from(EnvelopeError::Malformed("Envelope is not text".to_string()))
            }
            _ => BatchfeedError::from(e),
        })?;

        let passphrase: &[u8] = self
            .passphrase
            .as_ref()
            .map(|p| p.expose_secret().as_str().as_bytes())
            .unwrap_or_default();
        Ok(open(&text, keyring, passphrase)?)
    }
}

fn read_key_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        BatchfeedError::Configuration(format!("Cannot read key file {}: {}", path.display(), e))
    })
}
