//! Executables discovered in a runtime's bin directory

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Executable name to absolute path, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutableCatalog {
    entries: BTreeMap<String, PathBuf>,
}

impl ExecutableCatalog {
    /// Build a catalog from every non-directory entry of `bin_dir`.
    pub fn scan(bin_dir: &Path) -> io::Result<Self> {
        let mut entries = BTreeMap::new();
        for entry in fs::read_dir(bin_dir)? {
            let entry = entry?;
            if fs::metadata(entry.path()).map(|m| m.is_dir()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.insert(name, entry.path());
        }
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.entries.get(name).map(PathBuf::as_path)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_skips_directories() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("python3"), b"").unwrap();
        fs::write(temp.path().join("pip3"), b"").unwrap();
        fs::create_dir(temp.path().join("__pycache__")).unwrap();

        let catalog = ExecutableCatalog::scan(temp.path()).unwrap();
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["pip3", "python3"]);
        assert_eq!(catalog.get("pip3"), Some(temp.path().join("pip3").as_path()));
        assert!(!catalog.contains("__pycache__"));
    }

    #[test]
    fn test_scan_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert!(ExecutableCatalog::scan(&temp.path().join("nope")).is_err());
    }

    #[test]
    fn test_rescan_drops_stale_entries() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("old-tool"), b"").unwrap();
        let first = ExecutableCatalog::scan(temp.path()).unwrap();
        assert!(first.contains("old-tool"));

        fs::remove_file(temp.path().join("old-tool")).unwrap();
        fs::write(temp.path().join("new-tool"), b"").unwrap();
        let second = ExecutableCatalog::scan(temp.path()).unwrap();
        assert!(!second.contains("old-tool"));
        assert!(second.contains("new-tool"));
        assert_eq!(second.len(), 1);
    }
}
