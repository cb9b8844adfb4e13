//! Content hashing and GNU-style checksum sidecars
//!
//! A sidecar is one line of UTF-8 text: the lowercase SHA-256 of a file, two
//! spaces, then the file's base name.

use crate::domain::{BatchfeedError, Result};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of raw bytes (64 characters)
///
/// # Examples
///
/// ```
/// use batchfeed::core::codec::checksum::sha256_hex;
///
/// assert_eq!(
///     sha256_hex(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Uppercase hex SHA-256 of raw bytes
pub fn sha256_hex_upper(data: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(data))
}

/// Formats a sidecar line for `file_name` with the given digest
pub fn sidecar_line(hash_hex: &str, file_name: &str) -> String {
    format!("{}  {}\n", hash_hex.to_ascii_lowercase(), file_name)
}

/// A parsed sidecar entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarEntry {
    pub hash_hex: String,
    pub file_name: String,
}

/// Parses the first line of a sidecar file
///
/// Accepts the binary-mode marker (`hash *name`) that GNU tools emit as well.
///
/// # Errors
///
/// Returns [`BatchfeedError::Integrity`] when the line is not a 64-digit hex
/// digest followed by a file name.
pub fn parse_sidecar(text: &str) -> Result<SidecarEntry> {
    let line = text
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| BatchfeedError::Integrity("Checksum sidecar is empty".to_string()))?;

    let (hash, rest) = line
        .split_once(' ')
        .ok_or_else(|| BatchfeedError::Integrity(format!("Malformed checksum line: {line}")))?;

    if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(BatchfeedError::Integrity(format!(
            "Malformed checksum digest: {hash}"
        )));
    }

    let file_name = rest.trim_start_matches(' ').trim_start_matches('*').trim_end();
    if file_name.is_empty() {
        return Err(BatchfeedError::Integrity(format!(
            "Checksum line has no file name: {line}"
        )));
    }

    Ok(SidecarEntry {
        hash_hex: hash.to_ascii_lowercase(),
        file_name: file_name.to_string(),
    })
}

/// Verifies `content` against a sidecar
///
/// # Errors
///
/// Returns [`BatchfeedError::Integrity`] when the sidecar is malformed or the
/// digest does not match.
pub fn verify_sidecar(content: &[u8], sidecar_text: &str) -> Result<SidecarEntry> {
    let entry = parse_sidecar(sidecar_text)?;
    let actual = sha256_hex(content);
    if actual != entry.hash_hex {
        return Err(BatchfeedError::Integrity(format!(
            "Checksum mismatch for {}: expected {}, got {}",
            entry.file_name, entry.hash_hex, actual
        )));
    }
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            sha256_hex_upper(b"abc"),
            "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD"
        );
    }

    #[test]
    fn test_sidecar_line_format() {
        let hash = sha256_hex(b"<NLSFeed/>");
        let line = sidecar_line(&hash, "BATCH_001.xml");
        assert_eq!(line, format!("{hash}  BATCH_001.xml\n"));
    }

    #[test]
    fn test_verify_sidecar() {
        let content = b"{\"header\":{}}\n";
        let sidecar = sidecar_line(&sha256_hex(content), "RISK_BATCH_1.jsonl");

        let entry = verify_sidecar(content, &sidecar).unwrap();
        assert_eq!(entry.file_name, "RISK_BATCH_1.jsonl");

        let err = verify_sidecar(b"tampered", &sidecar).unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn test_parse_sidecar_binary_marker() {
        let hash = sha256_hex(b"x");
        let entry = parse_sidecar(&format!("{hash} *reply.xml")).unwrap();
        assert_eq!(entry.file_name, "reply.xml");
    }

    #[test]
    fn test_parse_sidecar_malformed() {
        assert!(parse_sidecar("").is_err());
        assert!(parse_sidecar("nothex  file.xml").is_err());
        assert!(parse_sidecar(&sha256_hex(b"x")).is_err());
    }
}
