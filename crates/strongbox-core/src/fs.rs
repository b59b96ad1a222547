//! Filesystem utilities for atomic writes.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use uuid::Uuid;

use crate::error::{Result, VaultError};

/// Write `data` to `path` so readers see either the old file or the new one.
///
/// Writes a sibling temp file, syncs it, restricts its permissions, then
/// renames it over the destination.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| VaultError::Storage("Invalid destination filename".to_string()))?;
    let temp_path = parent.join(format!(".{}.{}.tmp", filename, Uuid::new_v4().simple()));

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(|e| VaultError::Storage(format!("Temp file create failed: {}", e)))?;
    let written = file
        .write_all(data)
        .and_then(|_| file.sync_all())
        .map_err(|e| VaultError::Storage(format!("Temp file write failed: {}", e)));
    discard_on_error(&temp_path, written)?;
    drop(file);

    discard_on_error(&temp_path, restrict_permissions(&temp_path))?;
    rename_with_fallback(&temp_path, path)
        .map_err(|e| VaultError::Storage(format!("Atomic rename failed: {}", e)))?;

    Ok(())
}

/// Remove the temp file if `result` is an error, then pass it through.
fn discard_on_error<T>(temp_path: &Path, result: Result<T>) -> Result<T> {
    if result.is_err() {
        let _ = fs::remove_file(temp_path);
    }
    result
}

/// Limit a file to its owner (0600) where the platform supports it.
pub fn restrict_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Rename a file, with fallback for platforms where rename fails if the target exists.
///
/// If the rename ultimately fails, the temp file is cleaned up.
fn rename_with_fallback(temp_path: &Path, destination: &Path) -> io::Result<()> {
    if let Err(initial_err) = fs::rename(temp_path, destination) {
        let _ = fs::remove_file(destination);
        fs::rename(temp_path, destination).map_err(|retry_err| {
            let _ = fs::remove_file(temp_path);
            io::Error::new(
                retry_err.kind(),
                format!(
                    "initial: {}, retry: {}",
                    initial_err, retry_err
                ),
            )
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_atomic_new_file() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("bundle.json");

        write_atomic(&dest, b"test").unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "test");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_write_atomic_overwrites_existing() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("bundle.json");

        fs::write(&dest, b"old").unwrap();
        write_atomic(&dest, b"new").unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
    }

    #[test]
    fn test_discard_on_error_removes_temp_file() {
        let dir = tempdir().unwrap();
        let temp = dir.path().join(".bundle.json.tmp");
        fs::write(&temp, b"partial").unwrap();

        let result: Result<()> = discard_on_error(
            &temp,
            Err(VaultError::Storage("permission change failed".to_string())),
        );

        assert!(matches!(result, Err(VaultError::Storage(_))));
        assert!(!temp.exists());
    }

    #[test]
    fn test_discard_on_error_keeps_temp_file_on_success() {
        let dir = tempdir().unwrap();
        let temp = dir.path().join(".bundle.json.tmp");
        fs::write(&temp, b"complete").unwrap();

        discard_on_error(&temp, Ok(())).unwrap();
        assert!(temp.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let dest = dir.path().join("bundle.json");
        write_atomic(&dest, b"secret-ish").unwrap();

        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
