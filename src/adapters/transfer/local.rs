//! Directory tree standing in for the remote endpoint
//!
//! Remote paths are resolved below `root`; a leading `/` is ignored.

use crate::adapters::transfer::traits::{remote_join, TransferGateway};
use crate::domain::{BatchfeedError, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

pub struct LocalTransferGateway {
    root: PathBuf,
}

impl LocalTransferGateway {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, remote: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for component in Path::new(remote).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(BatchfeedError::PathTraversal(remote.to_string()));
                }
            }
        }
        Ok(path)
    }
}

fn transport(action: &str, path: &Path, e: std::io::Error) -> BatchfeedError {
    BatchfeedError::Transport(format!("{action} {} failed: {e}", path.display()))
}

impl TransferGateway for LocalTransferGateway {
    fn upload(&self, local_file: &Path, remote_dir: &str) -> Result<String> {
        let file_name = local_file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                BatchfeedError::Validation(format!("No file name in {}", local_file.display()))
            })?;

        let dir = self.resolve(remote_dir)?;
        fs::create_dir_all(&dir).map_err(|e| transport("Creating", &dir, e))?;
        let target = dir.join(file_name);
        fs::copy(local_file, &target).map_err(|e| transport("Uploading to", &target, e))?;

        let remote = remote_join(remote_dir, file_name);
        tracing::debug!(remote = %remote, "Uploaded to local transfer root");
        Ok(remote)
    }

    fn download(&self, remote_file: &str, local_file: &Path) -> Result<()> {
        let source = self.resolve(remote_file)?;
        if let Some(parent) = local_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&source, local_file).map_err(|e| transport("Downloading", &source, e))?;
        Ok(())
    }

    fn list(&self, remote_dir: &str) -> Result<Vec<String>> {
        let dir = self.resolve(remote_dir)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| transport("Listing", &dir, e))? {
            let entry = entry.map_err(|e| transport("Listing", &dir, e))?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&self, remote_file: &str) -> Result<()> {
        let path = self.resolve(remote_file)?;
        fs::remove_file(&path).map_err(|e| transport("Deleting", &path, e))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
