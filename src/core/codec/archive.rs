//! Flat ZIP archives with path-traversal protection on extraction

use crate::domain::{BatchfeedError, Result};
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const PREALLOCATE_LIMIT: u64 = 1 << 20;

/// Packs files into a deflated ZIP, each stored under its base name
///
/// # Errors
///
/// Returns an error if a file cannot be read, has no base name, or two files
/// share the same base name.
pub fn pack(files: &[PathBuf]) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut seen: Vec<String> = Vec::with_capacity(files.len());

        for path in files {
            let name = base_name(path)?;
            if seen.contains(&name) {
                return Err(BatchfeedError::Validation(format!(
                    "Duplicate archive entry name: {name}"
                )));
            }
            let data = fs::read(path).map_err(|e| {
                BatchfeedError::Io(format!("Failed to read {}: {}", path.display(), e))
            })?;

            zip.start_file(name.as_str(), options).map_err(|e| {
                BatchfeedError::Io(format!("Failed to start ZIP entry '{name}': {e}"))
            })?;
            zip.write_all(&data).map_err(|e| {
                BatchfeedError::Io(format!("Failed to write ZIP entry '{name}': {e}"))
            })?;
            seen.push(name);
        }

        zip.finish()
            .map_err(|e| BatchfeedError::Io(format!("Failed to finish ZIP archive: {e}")))?;
    }
    Ok(buffer.into_inner())
}

/// Extracts every entry of `archive` under `dest_dir`
///
/// All entry names are resolved against the canonical destination before the
/// first byte is written. Any entry that resolves outside of it rejects the
/// whole archive and nothing is written.
///
/// # Errors
///
/// - [`BatchfeedError::PathTraversal`] for escaping or absolute entry names
/// - [`BatchfeedError::Integrity`] when the bytes are not a readable archive
pub fn unpack(archive: &[u8], dest_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut zip = ZipArchive::new(Cursor::new(archive))
        .map_err(|e| BatchfeedError::Integrity(format!("Unreadable archive: {e}")))?;

    let mut plan: Vec<(usize, PathBuf, bool)> = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let entry = zip
            .by_index(index)
            .map_err(|e| BatchfeedError::Integrity(format!("Unreadable archive entry: {e}")))?;
        let relative = resolve_entry(entry.name())?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        plan.push((index, relative, entry.is_dir()));
    }

    fs::create_dir_all(dest_dir)?;
    let root = dest_dir.canonicalize()?;
    let plan = plan
        .into_iter()
        .map(|(index, relative, is_dir)| (index, root.join(relative), is_dir));

    let mut written = Vec::new();
    for (index, target, is_dir) in plan {
        if is_dir {
            fs::create_dir_all(&target)?;
            continue;
        }

        let parent = target.parent().unwrap_or(&root);
        fs::create_dir_all(parent)?;
        // Symlinks already inside the destination could still redirect the write
        if !parent.canonicalize()?.starts_with(&root) {
            return Err(BatchfeedError::PathTraversal(target.display().to_string()));
        }

        let mut entry = zip
            .by_index(index)
            .map_err(|e| BatchfeedError::Integrity(format!("Unreadable archive entry: {e}")))?;
        // Declared sizes are untrusted
        let mut data = Vec::with_capacity(entry.size().min(PREALLOCATE_LIMIT) as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| BatchfeedError::Integrity(format!("Corrupt archive entry: {e}")))?;
        fs::write(&target, &data)?;
        written.push(target);
    }

    Ok(written)
}

/// Resolves an entry name lexically; the result never leaves the destination
fn resolve_entry(name: &str) -> Result<PathBuf> {
    let mut resolved = PathBuf::new();
    let mut depth = 0usize;

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(BatchfeedError::PathTraversal(name.to_string()));
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(BatchfeedError::PathTraversal(name.to_string()));
            }
        }
    }
    Ok(resolved)
}

fn base_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            BatchfeedError::Validation(format!("No file name in path {}", path.display()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn malicious_archive(entry: &str) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buffer);
            let options = SimpleFileOptions::default();
            zip.start_file("safe.txt", options).unwrap();
            zip.write_all(b"fine").unwrap();
            zip.start_file(entry, options).unwrap();
            zip.write_all(b"gotcha").unwrap();
            zip.finish().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn test_pack_unpack_flat() {
        let src = TempDir::new().unwrap();
        let nested = src.path().join("deep").join("dir");
        fs::create_dir_all(&nested).unwrap();
        let a = nested.join("BATCH_001.xml");
        let b = src.path().join("BATCH_001.sha256sum");
        fs::write(&a, b"<NLSFeed/>").unwrap();
        fs::write(&b, b"abc  BATCH_001.xml\n").unwrap();

        let bytes = pack(&[a, b]).unwrap();

        let dest = TempDir::new().unwrap();
        let written = unpack(&bytes, dest.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(
            fs::read(dest.path().join("BATCH_001.xml")).unwrap(),
            b"<NLSFeed/>"
        );
        assert!(dest.path().join("BATCH_001.sha256sum").exists());
        assert!(!dest.path().join("deep").exists());
    }

    #[test]
    fn test_unpack_rejects_parent_escape() {
        let dest = TempDir::new().unwrap();
        let inner = dest.path().join("inner");

        let err = unpack(&malicious_archive("../evil"), &inner).unwrap_err();
        assert!(err.is_path_traversal());
        assert!(!dest.path().join("evil").exists());
        assert!(!inner.exists());
    }

    #[test]
    fn test_unpack_rejects_absolute_entry() {
        let dest = TempDir::new().unwrap();
        let err = unpack(&malicious_archive("/tmp/evil"), dest.path()).unwrap_err();
        assert!(err.is_path_traversal());
        assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_resolve_entry_allows_internal_parent() {
        assert_eq!(resolve_entry("a/../b.xml").unwrap(), PathBuf::from("b.xml"));
        assert_eq!(resolve_entry("./c.xml").unwrap(), PathBuf::from("c.xml"));
        assert!(resolve_entry("a/../../b.xml").is_err());
    }

    #[test]
    fn test_unpack_garbage_is_integrity_error() {
        let dest = TempDir::new().unwrap();
        let err = unpack(b"definitely not a zip", dest.path()).unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn test_pack_rejects_duplicate_names() {
        let src = TempDir::new().unwrap();
        let a = src.path().join("x").join("same.txt");
        let b = src.path().join("same.txt");
        fs::create_dir_all(a.parent().unwrap()).unwrap();
        fs::write(&a, b"1").unwrap();
        fs::write(&b, b"2").unwrap();
        assert!(pack(&[a, b]).is_err());
    }
}
