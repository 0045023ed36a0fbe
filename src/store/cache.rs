//! Removal of derived index artifacts.
//!
//! The recognition backend serializes per-store search indexes (for example
//! `representations_arcface.pkl`) next to the images it indexed. Such an index is
//! only valid for the membership it was built from, so every store mutation
//! deletes all of them before returning.

use std::{fs, io, path::Path};

use globset::{Glob, GlobSet, GlobSetBuilder};

use super::StoreError;

#[derive(Debug, Clone)]
pub struct CacheInvalidator {
    patterns: GlobSet,
}

impl CacheInvalidator {
    pub fn new(patterns: &[String]) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let norm = pattern.trim();
            if norm.is_empty() {
                continue;
            }
            builder.add(Glob::new(norm)?);
        }
        Ok(Self { patterns: builder.build()? })
    }

    /// Whether a bare file name is a derived index artifact rather than a store member.
    pub fn is_artifact(&self, file_name: &str) -> bool {
        self.patterns.is_match(file_name)
    }

    /// Deletes every artifact directly under `root` and returns how many were removed.
    ///
    /// Nothing to delete (including a missing `root`) is not an error. An artifact that
    /// disappears between listing and removal is treated as removed.
    pub fn invalidate(&self, root: &Path) -> Result<usize, StoreError> {
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0usize;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !self.is_artifact(name) || !entry.file_type()?.is_file() {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        if removed > 0 {
            tracing::debug!("Removed {} derived index artifact(s) from {}", removed, root.display());
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn invalidator() -> CacheInvalidator {
        CacheInvalidator::new(&["representations_*.pkl".to_string()]).unwrap()
    }

    #[test]
    fn test_is_artifact() {
        let inv = invalidator();
        assert!(inv.is_artifact("representations_arcface.pkl"));
        assert!(!inv.is_artifact("alice.jpg"));
        assert!(!inv.is_artifact("representations.txt"));
    }

    #[test]
    fn test_invalidate_removes_only_artifacts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("representations_vgg_face.pkl"), b"x").unwrap();
        fs::write(dir.path().join("representations_arcface.pkl"), b"x").unwrap();
        fs::write(dir.path().join("alice.jpg"), b"img").unwrap();

        let removed = invalidator().invalidate(dir.path()).unwrap();
        assert_eq!(removed, 2);
        assert!(dir.path().join("alice.jpg").exists());
        assert!(!dir.path().join("representations_arcface.pkl").exists());
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let inv = invalidator();
        assert_eq!(inv.invalidate(dir.path()).unwrap(), 0);
        assert_eq!(inv.invalidate(dir.path()).unwrap(), 0);
        assert_eq!(inv.invalidate(&dir.path().join("missing")).unwrap(), 0);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        assert!(CacheInvalidator::new(&["[invalid".to_string()]).is_err());
    }
}
