//! P-256 key material: public keys, passphrase-protected secret keys, keyrings
//!
//! Secret key file layout (before armoring):
//!
//! ```text
//! "BFK1" | key_id[8] | public SEC1 compressed[33] | m_cost u32 | t_cost u32 | p_cost u32
//!        | salt[16] | nonce[12] | AES-256-GCM(scalar[32]) [48]
//! ```
//!
//! Everything before the ciphertext is bound as associated data.

use super::armor::{self, ArmorKind};
use crate::config::KdfConfig;
use crate::domain::EnvelopeError;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

const SECRET_MAGIC: &[u8; 4] = b"BFK1";
const PUBLIC_LEN: usize = 33;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const SEALED_SCALAR_LEN: usize = 32 + 16;
const SECRET_HEADER_LEN: usize = 4 + 8 + PUBLIC_LEN + 12 + SALT_LEN + NONCE_LEN;

/// First 8 bytes of SHA-256 over the compressed SEC1 public key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId(pub [u8; 8]);

impl KeyId {
    fn of(public: &p256::PublicKey) -> Self {
        let digest = Sha256::digest(public.to_encoded_point(true).as_bytes());
        let mut id = [0u8; 8];
        id.copy_from_slice(&digest[..8]);
        KeyId(id)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

/// Argon2id cost parameters stored alongside each secret key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl From<KdfConfig> for KdfParams {
    fn from(config: KdfConfig) -> Self {
        Self {
            m_cost: config.memory_kib,
            t_cost: config.iterations,
            p_cost: config.parallelism,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        KdfConfig::default().into()
    }
}

impl KdfParams {
    fn derive(&self, passphrase: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; 32]>, EnvelopeError> {
        let params = Params::new(self.m_cost, self.t_cost, self.p_cost, Some(32))
            .map_err(|e| EnvelopeError::Key(format!("Invalid KDF parameters: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; 32]);
        argon2
            .hash_password_into(passphrase, salt, key.as_mut())
            .map_err(|e| EnvelopeError::Key(format!("Key derivation failed: {e}")))?;
        Ok(key)
    }
}

/// A recipient public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: p256::PublicKey,
    key_id: KeyId,
}

impl PublicKey {
    pub(crate) fn from_inner(inner: p256::PublicKey) -> Self {
        let key_id = KeyId::of(&inner);
        Self { inner, key_id }
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub(crate) fn inner(&self) -> &p256::PublicKey {
        &self.inner
    }

    /// Compressed SEC1 encoding (33 bytes)
    pub fn to_sec1(&self) -> Vec<u8> {
        self.inner.to_encoded_point(true).as_bytes().to_vec()
    }

    pub fn from_sec1(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        p256::PublicKey::from_sec1_bytes(bytes)
            .map(Self::from_inner)
            .map_err(|_| EnvelopeError::Key("Invalid P-256 public key".to_string()))
    }

    pub fn to_armored(&self) -> String {
        armor::encode(ArmorKind::PublicKey, &self.to_sec1())
    }

    pub fn from_armored(text: &str) -> Result<Self, EnvelopeError> {
        let bytes = armor::decode(ArmorKind::PublicKey, text)
            .map_err(|e| EnvelopeError::Key(e.to_string()))?;
        Self::from_sec1(&bytes)
    }
}

/// An unlocked secret key
pub struct SecretKey {
    inner: p256::SecretKey,
    public: PublicKey,
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("key_id", &self.public.key_id)
            .finish_non_exhaustive()
    }
}

impl SecretKey {
    /// Generates a fresh key pair
    pub fn generate() -> Self {
        let inner = p256::SecretKey::random(&mut OsRng);
        let public = PublicKey::from_inner(inner.public_key());
        Self { inner, public }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn key_id(&self) -> KeyId {
        self.public.key_id
    }

    pub(crate) fn inner(&self) -> &p256::SecretKey {
        &self.inner
    }

    /// Protects the key with `passphrase` and armors it
    pub fn to_armored(&self, passphrase: &[u8], kdf: KdfParams) -> Result<String, EnvelopeError> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let mut header = Vec::with_capacity(SECRET_HEADER_LEN + SEALED_SCALAR_LEN);
        header.extend_from_slice(SECRET_MAGIC);
        header.extend_from_slice(&self.public.key_id.0);
        header.extend_from_slice(&self.public.to_sec1());
        header.extend_from_slice(&kdf.m_cost.to_be_bytes());
        header.extend_from_slice(&kdf.t_cost.to_be_bytes());
        header.extend_from_slice(&kdf.p_cost.to_be_bytes());
        header.extend_from_slice(&salt);
        header.extend_from_slice(&nonce);

        let wrap_key = kdf.derive(passphrase, &salt)?;
        let cipher = Aes256Gcm::new_from_slice(wrap_key.as_ref())
            .map_err(|_| EnvelopeError::Key("Invalid wrapping key length".to_string()))?;
        let mut scalar = Zeroizing::new([0u8; 32]);
        scalar.copy_from_slice(&self.inner.to_bytes());
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: scalar.as_slice(),
                    aad: &header,
                },
            )
            .map_err(|_| EnvelopeError::Key("Failed to seal secret key".to_string()))?;

        header.extend_from_slice(&sealed);
        Ok(armor::encode(ArmorKind::SecretKey, &header))
    }
}

/// A secret key as stored: public part readable, scalar still sealed
#[derive(Debug, Clone)]
pub struct ProtectedSecretKey {
    raw: Vec<u8>,
    public: PublicKey,
    kdf: KdfParams,
}

impl ProtectedSecretKey {
    fn parse(raw: Vec<u8>) -> Result<Self, EnvelopeError> {
        if raw.len() != SECRET_HEADER_LEN + SEALED_SCALAR_LEN || &raw[..4] != SECRET_MAGIC {
            return Err(EnvelopeError::Key("Unrecognized secret key format".to_string()));
        }

        let public = PublicKey::from_sec1(&raw[12..12 + PUBLIC_LEN])?;
        if public.key_id.0[..] != raw[4..12] {
            return Err(EnvelopeError::Key(
                "Secret key id does not match its public key".to_string(),
            ));
        }

        let kdf_at = 12 + PUBLIC_LEN;
        let read_u32 = |at: usize| {
            let mut word = [0u8; 4];
            word.copy_from_slice(&raw[at..at + 4]);
            u32::from_be_bytes(word)
        };
        let kdf = KdfParams {
            m_cost: read_u32(kdf_at),
            t_cost: read_u32(kdf_at + 4),
            p_cost: read_u32(kdf_at + 8),
        };

        Ok(Self { raw, public, kdf })
    }

    pub fn key_id(&self) -> KeyId {
        self.public.key_id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn kdf(&self) -> KdfParams {
        self.kdf
    }

    /// Unseals the scalar with `passphrase`
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::Passphrase`] when the passphrase is wrong.
    pub fn unlock(&self, passphrase: &[u8]) -> Result<SecretKey, EnvelopeError> {
        let salt_at = 12 + PUBLIC_LEN + 12;
        let nonce_at = salt_at + SALT_LEN;
        let header = &self.raw[..SECRET_HEADER_LEN];
        let salt = &self.raw[salt_at..salt_at + SALT_LEN];
        let nonce = &self.raw[nonce_at..nonce_at + NONCE_LEN];
        let sealed = &self.raw[SECRET_HEADER_LEN..];

        let wrap_key = self.kdf.derive(passphrase, salt)?;
        let cipher = Aes256Gcm::new_from_slice(wrap_key.as_ref())
            .map_err(|_| EnvelopeError::Key("Invalid wrapping key length".to_string()))?;
        let scalar = Zeroizing::new(
            cipher
                .decrypt(
                    Nonce::from_slice(nonce),
                    Payload {
                        msg: sealed,
                        aad: header,
                    },
                )
                .map_err(|_| EnvelopeError::Passphrase)?,
        );

        let inner = p256::SecretKey::from_slice(&scalar)
            .map_err(|_| EnvelopeError::Key("Invalid P-256 secret scalar".to_string()))?;
        if inner.public_key() != *self.public.inner() {
            return Err(EnvelopeError::Key(
                "Secret scalar does not match stored public key".to_string(),
            ));
        }

        Ok(SecretKey {
            inner,
            public: self.public.clone(),
        })
    }
}

/// One or more protected secret keys, read from concatenated armor blocks
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    keys: Vec<ProtectedSecretKey>,
}

impl Keyring {
    pub fn from_armored(text: &str) -> Result<Self, EnvelopeError> {
        let keys = armor::decode_all(ArmorKind::SecretKey, text)
            .map_err(|e| EnvelopeError::Key(e.to_string()))?
            .into_iter()
            .map(ProtectedSecretKey::parse)
            .collect::<Result<Vec<_>, _>>()?;

        if keys.is_empty() {
            return Err(EnvelopeError::Key(
                "Keyring contains no secret keys".to_string(),
            ));
        }
        Ok(Self { keys })
    }

    pub fn find(&self, key_id: KeyId) -> Option<&ProtectedSecretKey> {
        self.keys.iter().find(|k| k.key_id() == key_id)
    }

    pub fn key_ids(&self) -> Vec<KeyId> {
        self.keys.iter().map(ProtectedSecretKey::key_id).collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_kdf() -> KdfParams {
        KdfParams {
            m_cost: 1024,
            t_cost: 1,
            p_cost: 1,
        }
    }

    #[test]
    fn test_public_key_armor_round_trip() {
        let secret = SecretKey::generate();
        let armored = secret.public_key().to_armored();
        assert!(armored.starts_with("-----BEGIN BATCHFEED PUBLIC KEY-----"));

        let public = PublicKey::from_armored(&armored).unwrap();
        assert_eq!(public.key_id(), secret.key_id());
    }

    #[test]
    fn test_secret_key_unlock() {
        let secret = SecretKey::generate();
        let armored = secret.to_armored(b"pass phrase", fast_kdf()).unwrap();

        let keyring = Keyring::from_armored(&armored).unwrap();
        let protected = keyring.find(secret.key_id()).unwrap();
        assert_eq!(protected.kdf(), fast_kdf());

        let unlocked = protected.unlock(b"pass phrase").unwrap();
        assert_eq!(unlocked.key_id(), secret.key_id());
    }

    #[test]
    fn test_wrong_passphrase() {
        let secret = SecretKey::generate();
        let armored = secret.to_armored(b"right", fast_kdf()).unwrap();
        let keyring = Keyring::from_armored(&armored).unwrap();

        let err = keyring.find(secret.key_id()).unwrap().unlock(b"wrong").unwrap_err();
        assert!(matches!(err, EnvelopeError::Passphrase));
    }

    #[test]
    fn test_keyring_holds_several_keys() {
        let a = SecretKey::generate();
        let b = SecretKey::generate();
        let mut text = a.to_armored(b"a", fast_kdf()).unwrap();
        text.push_str(&b.to_armored(b"b", fast_kdf()).unwrap());

        let keyring = Keyring::from_armored(&text).unwrap();
        assert_eq!(keyring.len(), 2);
        assert!(keyring.find(b.key_id()).is_some());
        assert!(keyring.find(KeyId([0; 8])).is_none());
    }

    #[test]
    fn test_empty_keyring_rejected() {
        assert!(Keyring::from_armored("nothing here").is_err());
    }

    #[test]
    fn test_key_id_display() {
        let id = KeyId([0xDE, 0xAD, 0xBE, 0xEF, 0, 1, 2, 3]);
        assert_eq!(id.to_string(), "DEADBEEF00010203");
    }
}
