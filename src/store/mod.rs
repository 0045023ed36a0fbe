//! Flat directory of registered identity images.
//!
//! Every regular file directly under the store root whose extension is one of the
//! configured image extensions is a member. Hidden entries and derived index
//! artifacts (see [`cache`]) are never members. Names are compared as exact,
//! case-sensitive strings including the extension, so `Bob.jpg` and `bob.jpg` are
//! two different identities.
//!
//! Mutating operations take `&mut self`; callers share the store behind a
//! readers-writer lock so that mutations exclude each other and in-flight lookups.

pub mod cache;

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::config::StoreConfig;
pub use cache::CacheInvalidator;

/// Longest accepted image name, in bytes.
pub(crate) const MAX_NAME_LENGTH: usize = 255;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("image store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("{0} already exists in the image store")]
    NameConflict(String),
    #[error("{0} does not exist in the image store")]
    NotFound(String),
    #[error("{} image(s) could not be removed", remaining.len())]
    PartialFailure { remaining: Vec<String> },
    #[error("no image found in the image store")]
    EmptyStore,
    #[error("recognition failed: {0}")]
    RecognitionFailed(String),
    #[error("recognition did not finish within {0} seconds")]
    RecognitionTimeout(u64),
    #[error("invalid image name: {0}")]
    InvalidName(String),
    #[error("could not process image: {0}")]
    DecodeFailure(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A registered identity image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredImage {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct ImageStore {
    root: PathBuf,
    extensions: Vec<String>,
    invalidator: CacheInvalidator,
}

impl ImageStore {
    /// Opens the store described by `cfg`, creating the root directory if needed.
    pub fn open(cfg: &StoreConfig) -> anyhow::Result<Self> {
        fs::create_dir_all(&cfg.root)?;
        let store = Self::with_root(&cfg.root, &cfg.image_extensions, &cfg.cache_patterns)?;
        tracing::info!("Image store at {} holds {} image(s)", store.root.display(), store.count()?);
        Ok(store)
    }

    /// Builds a store over an existing directory without touching the filesystem.
    pub fn with_root(
        root: impl Into<PathBuf>,
        extensions: &[String],
        cache_patterns: &[String],
    ) -> Result<Self, globset::Error> {
        let extensions = extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Ok(Self { root: root.into(), extensions, invalidator: CacheInvalidator::new(cache_patterns)? })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Member names in lexicographic order.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = fs::read_dir(&self.root).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::StoreUnavailable(self.root.display().to_string()),
            _ => StoreError::Io(e),
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else { continue };
            // Follows symlinks, matching `contains`
            if !self.is_member_name(&name) || !entry.path().is_file() {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        Ok(self.list()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.count()? == 0)
    }

    /// Exact-name existence check.
    pub fn contains(&self, name: &str) -> bool {
        self.is_member_name(name) && is_plain_file_name(name) && self.root.join(name).is_file()
    }

    pub fn add(&mut self, name: &str, bytes: &[u8]) -> Result<StoredImage, StoreError> {
        self.validate_name(name)?;
        if self.contains(name) {
            return Err(StoreError::NameConflict(name.to_string()));
        }

        let path = self.root.join(name);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StoreError::NameConflict(name.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::StoreUnavailable(self.root.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        if let Err(e) = file.write_all(bytes).and_then(|_| file.sync_all()) {
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }

        tracing::info!("Registered {} ({} bytes)", name, bytes.len());
        self.invalidator.invalidate(&self.root)?;
        Ok(StoredImage { name: name.to_string(), path })
    }

    /// Renames `old_name` to `new_name`. A `new_name` without extension keeps the old one.
    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<StoredImage, StoreError> {
        if !is_plain_file_name(old_name) {
            return Err(StoreError::InvalidName(old_name.to_string()));
        }
        if !self.contains(old_name) {
            return Err(StoreError::NotFound(old_name.to_string()));
        }

        let target = inherit_extension(new_name.trim(), old_name);
        self.validate_name(&target)?;
        if target == old_name || self.contains(&target) {
            return Err(StoreError::NameConflict(target));
        }

        let path = self.root.join(&target);
        fs::rename(self.root.join(old_name), &path)?;

        tracing::info!("Renamed {} to {}", old_name, target);
        self.invalidator.invalidate(&self.root)?;
        Ok(StoredImage { name: target, path })
    }

    pub fn delete(&mut self, name: &str) -> Result<(), StoreError> {
        if !is_plain_file_name(name) {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        if !self.contains(name) {
            return Err(StoreError::NotFound(name.to_string()));
        }
        match fs::remove_file(self.root.join(name)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!("Deleted {}", name);
        self.invalidator.invalidate(&self.root)?;
        Ok(())
    }

    /// Removes every member and returns how many were removed.
    ///
    /// Success is decided by listing the store again afterwards, not by the
    /// individual removal results.
    pub fn delete_all(&mut self) -> Result<usize, StoreError> {
        let before = self.list()?;
        for name in &before {
            if let Err(e) = fs::remove_file(self.root.join(name)) {
                tracing::warn!("Failed to delete {}: {}", name, e);
            }
        }
        let invalidated = self.invalidator.invalidate(&self.root);

        let remaining = self.list()?;
        if !remaining.is_empty() {
            tracing::warn!("{} of {} image(s) remain after delete-all", remaining.len(), before.len());
            if let Err(e) = invalidated {
                tracing::warn!("Index invalidation also failed: {}", e);
            }
            return Err(StoreError::PartialFailure { remaining });
        }
        invalidated?;
        tracing::info!("Deleted all {} image(s)", before.len());
        Ok(before.len())
    }

    /// Whether `name` would be listed if a regular file of that name existed.
    fn is_member_name(&self, name: &str) -> bool {
        if name.starts_with('.') || self.invalidator.is_artifact(name) {
            return false;
        }
        match Path::new(name).extension().and_then(|e| e.to_str()) {
            Some(ext) => self.extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    fn validate_name(&self, name: &str) -> Result<(), StoreError> {
        if !is_plain_file_name(name) {
            return Err(StoreError::InvalidName(format!("{:?} is not a plain file name", name)));
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(StoreError::InvalidName(format!("name exceeds {} bytes", MAX_NAME_LENGTH)));
        }
        if name.starts_with('.') {
            return Err(StoreError::InvalidName(format!("{} is a hidden name", name)));
        }
        if self.invalidator.is_artifact(name) {
            return Err(StoreError::InvalidName(format!("{} is reserved for index artifacts", name)));
        }
        if !self.is_member_name(name) {
            return Err(StoreError::InvalidName(format!(
                "{} must end with one of: {}",
                name,
                self.extensions.join(", ")
            )));
        }
        Ok(())
    }
}

/// Appends the extension of `source` to `name` when `name` has none.
///
/// `inherit_extension("im2", "img1.jpeg")` is `"im2.jpeg"`; a name that already
/// carries an extension is returned unchanged.
pub fn inherit_extension(name: &str, source: &str) -> String {
    if Path::new(name).extension().is_some() {
        return name.to_string();
    }
    match Path::new(source).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", name, ext),
        None => name.to_string(),
    }
}

/// A single path component without separators, NUL bytes, or dot-only names.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && Path::new(name).file_name().map(|f| f == name).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inherit_extension() {
        assert_eq!(inherit_extension("im2", "img1.jpeg"), "im2.jpeg");
        assert_eq!(inherit_extension("im2.png", "img1.jpeg"), "im2.png");
        assert_eq!(inherit_extension("im2", "noext"), "im2");
    }

    #[test]
    fn test_plain_file_name() {
        assert!(is_plain_file_name("alice.jpg"));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("../alice.jpg"));
        assert!(!is_plain_file_name("dir/alice.jpg"));
        assert!(!is_plain_file_name("dir\\alice.jpg"));
        assert!(!is_plain_file_name("ali\0ce.jpg"));
    }
}
