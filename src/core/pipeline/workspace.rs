//! Per-batch workspace directories
//!
//! Each batch owns `<work_dir>/<batch name>/`. Stages only talk to each other
//! through the files in it, so any stage can be replayed as long as the
//! directory survives.

use crate::domain::{BatchName, BatchfeedError, InputRecord, Result};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const INPUT_FILE: &str = "input.json";
pub const CONTROL_FILE: &str = "control.json";
pub const SIDECAR_EXTENSION: &str = "sha256sum";
pub const ARCHIVE_EXTENSION: &str = "zip";

const REPLY_SCRATCH_DIR: &str = ".replies";

/// Root of all batch workspaces
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn batch(&self, name: &BatchName) -> BatchWorkspace {
        BatchWorkspace {
            dir: self.root.join(name.as_str()),
            name: name.clone(),
        }
    }

    /// Fresh scratch directory for one reply file
    pub fn reply_scratch(&self) -> Result<PathBuf> {
        let dir = self
            .root
            .join(REPLY_SCRATCH_DIR)
            .join(Uuid::new_v4().to_string());
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Workspace files that can be previewed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Input,
    Feed,
    Checksum,
    Control,
}

impl std::str::FromStr for Artifact {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "input" => Ok(Artifact::Input),
            "feed" | "xml" | "jsonl" => Ok(Artifact::Feed),
            "checksum" | "sha256sum" => Ok(Artifact::Checksum),
            "control" => Ok(Artifact::Control),
            other => Err(format!(
                "Unknown file '{other}'. Must be one of: input, feed, checksum, control"
            )),
        }
    }
}

/// Workspace of one batch
#[derive(Debug, Clone)]
pub struct BatchWorkspace {
    dir: PathBuf,
    name: BatchName,
}

impl BatchWorkspace {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &BatchName {
        &self.name
    }

    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    pub fn create(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            BatchfeedError::Io(format!(
                "Failed to create workspace {}: {}",
                self.dir.display(),
                e
            ))
        })
    }

    pub fn input_path(&self) -> PathBuf {
        self.dir.join(INPUT_FILE)
    }

    pub fn feed_path(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.name, extension))
    }

    pub fn sidecar_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.name, SIDECAR_EXTENSION))
    }

    pub fn archive_name(&self) -> String {
        format!("{}.{}", self.name, ARCHIVE_EXTENSION)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.dir.join(self.archive_name())
    }

    pub fn control_path(&self) -> PathBuf {
        self.dir.join(CONTROL_FILE)
    }

    pub fn envelope_path(&self, envelope_extension: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.archive_name(), envelope_extension))
    }

    /// Writes through a temporary file and a rename, so readers never see a partial artifact
    pub fn write_artifact(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BatchfeedError::Io(format!("Bad artifact path {}", path.display())))?;
        let tmp = self.dir.join(format!(".{file_name}.tmp"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Reads an artifact an earlier stage should have written
    ///
    /// # Errors
    ///
    /// Returns [`BatchfeedError::NotFound`] naming the missing file.
    pub fn read_artifact(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BatchfeedError::NotFound(format!(
                "Workspace artifact {} is missing",
                path.display()
            )),
            _ => BatchfeedError::Io(format!("Failed to read {}: {}", path.display(), e)),
        })
    }

    pub fn write_input(&self, records: &[InputRecord]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records)?;
        self.write_artifact(&self.input_path(), &bytes)
    }

    pub fn read_input(&self) -> Result<Vec<InputRecord>> {
        let bytes = self.read_artifact(&self.input_path())?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_names() {
        let ws = Workspace::new("/work").batch(&BatchName::new("B_20250101000000_1").unwrap());
        assert_eq!(ws.dir(), Path::new("/work/B_20250101000000_1"));
        assert_eq!(
            ws.feed_path("xml"),
            Path::new("/work/B_20250101000000_1/B_20250101000000_1.xml")
        );
        assert_eq!(
            ws.sidecar_path().file_name().unwrap(),
            "B_20250101000000_1.sha256sum"
        );
        assert_eq!(ws.archive_name(), "B_20250101000000_1.zip");
        assert_eq!(
            ws.envelope_path("enc").file_name().unwrap(),
            "B_20250101000000_1.zip.enc"
        );
        assert_eq!(ws.control_path().file_name().unwrap(), "control.json");
    }

    #[test]
    fn test_input_snapshot_round_trip() {
        let tmp = TempDir::new().unwrap();
        let ws = Workspace::new(tmp.path()).batch(&BatchName::new("B_1").unwrap());
        ws.create().unwrap();

        let records = vec![InputRecord {
            client_id: Some(5),
            last_name: Some("Doe".into()),
            ..Default::default()
        }];
        ws.write_input(&records).unwrap();
        assert_eq!(ws.read_input().unwrap(), records);
        assert!(!ws.dir().join(".input.json.tmp").exists());
    }

    #[test]
    fn test_missing_artifact_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let ws = Workspace::new(tmp.path()).batch(&BatchName::new("B_1").unwrap());
        ws.create().unwrap();
        let err = ws.read_artifact(&ws.archive_path()).unwrap_err();
        assert!(matches!(err, BatchfeedError::NotFound(_)));
    }

    #[test]
    fn test_reply_scratch_is_unique() {
        let tmp = TempDir::new().unwrap();
        let ws = Workspace::new(tmp.path());
        let a = ws.reply_scratch().unwrap();
        let b = ws.reply_scratch().unwrap();
        assert_ne!(a, b);
        assert!(a.is_dir() && b.is_dir());
    }
}
