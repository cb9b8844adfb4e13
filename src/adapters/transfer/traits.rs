//! Remote file-transfer abstraction

use crate::domain::Result;
use std::path::Path;

/// Blocking operations against the managed file-transfer endpoint
///
/// Implementations never retry. Async callers run them on the blocking pool.
pub trait TransferGateway: Send + Sync {
    /// Upload `local_file` into `remote_dir`, creating the directory if absent
    ///
    /// Returns the remote path of the uploaded file.
    fn upload(&self, local_file: &Path, remote_dir: &str) -> Result<String>;

    /// Download `remote_file` to `local_file`
    fn download(&self, remote_file: &str, local_file: &Path) -> Result<()>;

    /// File names (not paths) in `remote_dir`
    fn list(&self, remote_dir: &str) -> Result<Vec<String>>;

    fn delete(&self, remote_file: &str) -> Result<()>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// Joins a remote directory and a file name with exactly one `/`
pub fn remote_join(dir: &str, file: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        format!("/{file}")
    } else {
        format!("{dir}/{file}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_join() {
        assert_eq!(remote_join("/inbox", "a.zip.enc"), "/inbox/a.zip.enc");
        assert_eq!(remote_join("/inbox/", "a"), "/inbox/a");
        assert_eq!(remote_join("upload", "a"), "upload/a");
        assert_eq!(remote_join("", "a"), "/a");
    }
}
