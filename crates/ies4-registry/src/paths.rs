//! Locating a region's document on disk.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Env var pointing at an installation root; `$IES4_HOME/data` is searched.
pub const HOME_ENV: &str = "IES4_HOME";

/// Fixed install location searched after the working-directory variants.
pub const INSTALL_DIR: &str = "/opt/ies4/data";

/// Everything an operation needs to know about its target region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionContext {
    pub code: String,
    pub display_name: String,
    pub path: PathBuf,
}

impl RegionContext {
    pub fn new(code: impl Into<String>, display_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            code: code.into(),
            display_name: display_name.into(),
            path: path.into(),
        }
    }
}

/// Ordered list of directories a region file may live in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    dirs: Vec<PathBuf>,
}

impl PathResolver {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// `./data`, `.`, `../data`, `$IES4_HOME/data`, the install dir, then
    /// `extra`. Relative entries are anchored at the working directory.
    pub fn standard(extra: &[PathBuf]) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let mut dirs = vec![cwd.join("data"), cwd.clone(), cwd.join("..").join("data")];
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            dirs.push(PathBuf::from(home).join("data"));
        }
        dirs.push(PathBuf::from(INSTALL_DIR));
        dirs.extend(extra.iter().map(|d| if d.is_absolute() { d.clone() } else { cwd.join(d) }));
        Self { dirs }
    }

    pub fn candidates(&self, file: &str) -> Vec<PathBuf> {
        self.dirs.iter().map(|d| d.join(file)).collect()
    }

    /// First existing candidate, or the first candidate unverified.
    pub fn resolve(&self, file: &str) -> PathBuf {
        let candidates = self.candidates(file);
        for candidate in &candidates {
            let exists = candidate.is_file();
            tracing::debug!(path = %candidate.display(), exists, "region file candidate");
            if exists {
                return candidate.clone();
            }
        }
        candidates
            .into_iter()
            .next()
            .unwrap_or_else(|| Path::new(file).to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_first_existing_candidate_wins() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        let c = tempdir().unwrap();
        std::fs::write(b.path().join("odesa_oblast.json"), "{}").unwrap();
        std::fs::write(c.path().join("odesa_oblast.json"), "{}").unwrap();

        let resolver = PathResolver::new(vec![
            a.path().to_path_buf(),
            b.path().to_path_buf(),
            c.path().to_path_buf(),
        ]);
        assert_eq!(resolver.resolve("odesa_oblast.json"), b.path().join("odesa_oblast.json"));
    }

    #[test]
    fn test_missing_everywhere_returns_default_candidate() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        let resolver = PathResolver::new(vec![a.path().to_path_buf(), b.path().to_path_buf()]);
        let path = resolver.resolve("sumy_oblast.json");
        assert_eq!(path, a.path().join("sumy_oblast.json"));
        assert!(!path.exists());
    }

    #[test]
    fn test_directories_are_not_mistaken_for_files() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        std::fs::create_dir(a.path().join("kyiv_oblast.json")).unwrap();
        std::fs::write(b.path().join("kyiv_oblast.json"), "{}").unwrap();
        let resolver = PathResolver::new(vec![a.path().to_path_buf(), b.path().to_path_buf()]);
        assert_eq!(resolver.resolve("kyiv_oblast.json"), b.path().join("kyiv_oblast.json"));
    }

    #[test]
    fn test_standard_order() {
        let extra = PathBuf::from("/srv/ies4");
        let resolver = PathResolver::standard(&[extra.clone()]);
        let candidates = resolver.candidates("x.json");
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(candidates[0], cwd.join("data").join("x.json"));
        assert_eq!(candidates[1], cwd.join("x.json"));
        assert!(candidates.contains(&PathBuf::from(INSTALL_DIR).join("x.json")));
        assert_eq!(candidates.last().unwrap(), &extra.join("x.json"));
    }
}
