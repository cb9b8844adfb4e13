//! Byte-level codecs used by the pipeline stages
//!
//! - [`checksum`] - SHA-256 digests and GNU sidecar files
//! - [`archive`] - flat ZIP packing and safe extraction
//! - [`envelope`] - P-256 sealed, armored envelopes and key files

pub mod archive;
pub mod checksum;
pub mod envelope;
