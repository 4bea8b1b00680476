//! Path utilities and project root handling

use crate::utils::errors::{AideError, ConfigError};
use std::path::{Component, Path, PathBuf};

/// A validated project root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRoot {
    root: PathBuf,
}

impl ProjectRoot {
    /// Resolve `root` to an absolute directory path
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, AideError> {
        let root_path = root.as_ref();
        if root_path.as_os_str().is_empty() {
            return Err(ConfigError::RootNotSet.into());
        }

        let root = root_path.canonicalize().map_err(|_| ConfigError::RootNotFound {
            path: root_path.to_path_buf(),
        })?;

        if !root.is_dir() {
            return Err(ConfigError::RootNotFound { path: root }.into());
        }

        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Whether the directory still exists
    pub fn is_valid(&self) -> bool {
        self.root.is_dir()
    }

    /// Resolve a relative key (as stored in the summary index or named by
    /// the model) against the root
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(clean_relative(relative))
    }
}

/// Normalize a relative path to the forward-slash form used as cache key
pub fn normalize_path<P: AsRef<Path>>(path: P) -> String {
    let parts: Vec<String> = path
        .as_ref()
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    parts.join("/").replace('\\', "/")
}

/// Turn a loosely written relative path (`\src\a.py`, `./src/a.py`,
/// `/src/a.py`) into the cache key form `src/a.py`
pub fn clean_relative(path: &str) -> String {
    path.trim()
        .replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Lower-cased extension with a leading dot, e.g. `.py`
pub fn dotted_extension<P: AsRef<Path>>(path: P) -> Option<String> {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}
