//! Best-effort timestamped copies taken before a write.

use crate::error::{RegistryError, Result};
use chrono::Local;
use std::path::{Path, PathBuf};

/// `<stem>.backup_<YYYYmmdd_HHMMSS>[_n].json` next to `path`.
fn backup_path(path: &Path, stamp: &str, attempt: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let name = if attempt == 0 {
        format!("{stem}.backup_{stamp}.json")
    } else {
        format!("{stem}.backup_{stamp}_{attempt}.json")
    };
    path.with_file_name(name)
}

/// Copy the current contents of `path` aside.
///
/// Returns `Ok(None)` when there is nothing to back up yet.
pub fn snapshot(path: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut attempt = 0;
    let mut target = backup_path(path, &stamp, attempt);
    while target.exists() {
        attempt += 1;
        target = backup_path(path, &stamp, attempt);
    }
    std::fs::copy(path, &target).map_err(|source| RegistryError::BackupFailed {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(backup = %target.display(), "backed up region document");
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_copies_and_never_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("odesa_oblast.json");
        std::fs::write(&path, "{\"v\": 1}").unwrap();

        let first = snapshot(&path).unwrap().unwrap();
        let second = snapshot(&path).unwrap().unwrap();
        assert_ne!(first, second);

        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("odesa_oblast.backup_"));
        assert!(name.ends_with(".json"));
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "{\"v\": 1}");
    }

    #[test]
    fn test_snapshot_of_missing_file_is_none() {
        let dir = tempdir().unwrap();
        assert!(snapshot(&dir.path().join("missing.json")).unwrap().is_none());
    }
}
