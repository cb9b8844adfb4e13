//! ASCII armor: `-----BEGIN BATCHFEED <KIND>-----`, base64 in 64 columns, END line

use crate::domain::EnvelopeError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

const LINE_WIDTH: usize = 64;

/// Kinds of armored blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmorKind {
    Envelope,
    PublicKey,
    SecretKey,
}

impl ArmorKind {
    fn label(&self) -> &'static str {
        match self {
            ArmorKind::Envelope => "BATCHFEED ENVELOPE",
            ArmorKind::PublicKey => "BATCHFEED PUBLIC KEY",
            ArmorKind::SecretKey => "BATCHFEED SECRET KEY",
        }
    }
}

/// Armors binary data
pub fn encode(kind: ArmorKind, data: &[u8]) -> String {
    let body = STANDARD.encode(data);
    let mut out = String::with_capacity(body.len() + body.len() / LINE_WIDTH + 80);
    out.push_str(&format!("-----BEGIN {}-----\n", kind.label()));
    for chunk in body.as_bytes().chunks(LINE_WIDTH) {
        // base64 output is ASCII
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push('\n');
    }
    out.push_str(&format!("-----END {}-----\n", kind.label()));
    out
}

/// Decodes the first block of `kind` found in `text`
pub fn decode(kind: ArmorKind, text: &str) -> Result<Vec<u8>, EnvelopeError> {
    decode_all(kind, text)?
        .into_iter()
        .next()
        .ok_or_else(|| EnvelopeError::Malformed(format!("No {} block found", kind.label())))
}

/// Decodes every block of `kind` in `text`, in order
///
/// Text outside of blocks is ignored, so several armored keys can be kept in
/// one keyring file.
pub fn decode_all(kind: ArmorKind, text: &str) -> Result<Vec<Vec<u8>>, EnvelopeError> {
    let begin = format!("-----BEGIN {}-----", kind.label());
    let end = format!("-----END {}-----", kind.label());

    let mut blocks = Vec::new();
    let mut body: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if body.is_none() {
            if line == begin {
                body = Some(String::new());
            }
        } else if line == end {
            let encoded = body.take().unwrap_or_default();
            let bytes = STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| EnvelopeError::Malformed(format!("Invalid base64 armor: {e}")))?;
            blocks.push(bytes);
        } else if let Some(acc) = body.as_mut() {
            acc.push_str(line);
        }
    }

    if body.is_some() {
        return Err(EnvelopeError::Malformed(format!(
            "Unterminated {} block",
            kind.label()
        )));
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_armor_line_width() {
        let data = vec![0xA5u8; 200];
        let text = encode(ArmorKind::Envelope, &data);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.first(), Some(&"-----BEGIN BATCHFEED ENVELOPE-----"));
        assert_eq!(lines.last(), Some(&"-----END BATCHFEED ENVELOPE-----"));
        assert!(lines[1..lines.len() - 1].iter().all(|l| l.len() <= LINE_WIDTH));
        assert_eq!(decode(ArmorKind::Envelope, &text).unwrap(), data);
    }

    #[test]
    fn test_decode_all_keyring() {
        let mut keyring = encode(ArmorKind::SecretKey, b"first");
        keyring.push_str("\n# comment between keys\n");
        keyring.push_str(&encode(ArmorKind::SecretKey, b"second"));

        let blocks = decode_all(ArmorKind::SecretKey, &keyring).unwrap();
        assert_eq!(blocks, vec![b"first".to_vec(), b"second".to_vec()]);
        assert!(decode_all(ArmorKind::PublicKey, &keyring).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_broken_armor() {
        let text = "-----BEGIN BATCHFEED ENVELOPE-----\n!!!!\n-----END BATCHFEED ENVELOPE-----\n";
        assert!(matches!(
            decode(ArmorKind::Envelope, text),
            Err(EnvelopeError::Malformed(_))
        ));

        let text = "-----BEGIN BATCHFEED ENVELOPE-----\nAAAA\n";
        assert!(decode(ArmorKind::Envelope, text).is_err());
        assert!(decode(ArmorKind::Envelope, "plain text").is_err());
    }
}
