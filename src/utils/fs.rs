//! Project file scanning with gitignore-style filtering

use crate::utils::errors::{AideError, ConfigError};
use crate::utils::path::{dotted_extension, normalize_path};
use crate::utils::text::read_text_file;
use crate::Result;
use ignore::WalkBuilder;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Relative path (forward slashes) → decoded file content, sorted by path
pub type FileContents = BTreeMap<String, String>;

/// Name of the ignore file read from the project root
pub const IGNORE_FILE: &str = ".gitignore";

/// Paths that are never scanned, whatever the ignore file says
pub const BUILTIN_IGNORES: &[&str] = &[".git", ".aide_doc", "build.spec", "requirements.txt"];

/// Extensions scanned when the user does not choose any
pub const DEFAULT_FILE_TYPES: &[&str] = &[
    ".txt", ".py", ".js", ".java", ".c", ".cpp", ".h", ".html", ".css", ".json", ".xml", ".yml",
    ".yaml", ".md", ".ini", ".conf", ".sh", ".bat",
];

/// Default extension list as owned strings
pub fn default_file_types() -> Vec<String> {
    DEFAULT_FILE_TYPES.iter().map(|s| s.to_string()).collect()
}

/// Normalize user-supplied extensions to lower-case `.ext` form
pub fn normalize_file_types<I, S>(types: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for ty in types {
        let ty = ty.as_ref().trim().to_lowercase();
        if ty.is_empty() {
            continue;
        }
        let ty = if ty.starts_with('.') { ty } else { format!(".{}", ty) };
        if !normalized.contains(&ty) {
            normalized.push(ty);
        }
    }
    normalized
}

#[derive(Debug, Clone)]
struct IgnorePattern {
    pattern: glob::Pattern,
    /// Pattern had a trailing slash and only matches directories
    dir_only: bool,
    /// Pattern contains a separator and is also matched against the full path
    has_separator: bool,
}

/// Ignore rules from the project's `.gitignore` plus the built-in list.
///
/// A path is ignored when a pattern matches its final segment or any of its
/// components. Trailing-slash patterns only match directory components.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    patterns: Vec<IgnorePattern>,
}

impl IgnoreRules {
    /// Build rules from raw pattern lines
    pub fn from_patterns<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns = Vec::new();

        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('!') {
                tracing::debug!("Negated ignore pattern not supported: {}", line);
                continue;
            }

            let dir_only = line.ends_with('/');
            let body = line.trim_end_matches('/').trim_start_matches('/');
            if body.is_empty() {
                continue;
            }

            match glob::Pattern::new(body) {
                Ok(pattern) => patterns.push(IgnorePattern {
                    pattern,
                    dir_only,
                    has_separator: body.contains('/'),
                }),
                Err(e) => tracing::warn!("Skipping invalid ignore pattern '{}': {}", line, e),
            }
        }

        Self { patterns }
    }

    /// Read `.gitignore` at `root` (if any) and append the built-in ignores
    pub fn load(root: &Path) -> Self {
        let ignore_path = root.join(IGNORE_FILE);
        let mut lines: Vec<String> = match std::fs::read_to_string(&ignore_path) {
            Ok(content) => content.lines().map(str::to_string).collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", ignore_path.display(), e);
                Vec::new()
            }
        };
        lines.extend(BUILTIN_IGNORES.iter().map(|s| s.to_string()));
        Self::from_patterns(lines)
    }

    /// Check a path relative to the project root
    pub fn is_ignored(&self, relative: &Path, is_dir: bool) -> bool {
        let parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            return false;
        }

        // Components that name directories
        let dir_parts = if is_dir { &parts[..] } else { &parts[..parts.len() - 1] };
        let full = parts.join("/");

        self.patterns.iter().any(|p| {
            let candidates = if p.dir_only { dir_parts } else { &parts[..] };
            if candidates.iter().any(|part| p.pattern.matches(part)) {
                return true;
            }
            if p.has_separator {
                let target = if p.dir_only && !is_dir {
                    dir_parts.join("/")
                } else {
                    full.clone()
                };
                return !target.is_empty() && p.pattern.matches(&target);
            }
            false
        })
    }
}

/// Walks a project root and reads every accepted text file
#[derive(Debug, Clone)]
pub struct FileScanner {
    root: PathBuf,
    file_types: Option<Vec<String>>,
    rules: IgnoreRules,
}

impl FileScanner {
    /// Create a scanner. `file_types` of `None` accepts every extension.
    pub fn new<P: Into<PathBuf>>(root: P, file_types: Option<Vec<String>>) -> Self {
        let root = root.into();
        let rules = IgnoreRules::load(&root);
        Self {
            root,
            file_types: file_types.map(normalize_file_types),
            rules,
        }
    }

    fn accepts_extension(&self, path: &Path) -> bool {
        match &self.file_types {
            None => true,
            Some(types) => dotted_extension(path)
                .map(|ext| types.contains(&ext))
                .unwrap_or(false),
        }
    }

    /// Scan the tree. Ignored directories are never entered and unreadable
    /// files are skipped with a warning.
    pub fn scan(&self) -> Result<FileContents> {
        if !self.root.is_dir() {
            return Err(AideError::from(ConfigError::RootNotFound {
                path: self.root.clone(),
            }));
        }

        let start_time = std::time::Instant::now();
        let rules = self.rules.clone();
        let root = self.root.clone();

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .standard_filters(false)
            .hidden(false)
            .follow_links(false)
            .filter_entry(move |entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                let is_dir = entry.file_type().map_or(false, |ft| ft.is_dir());
                !rules.is_ignored(relative, is_dir)
            });

        let mut files = FileContents::new();
        let mut skipped = 0usize;

        for result in builder.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("Failed to process file entry: {}", err);
                    continue;
                }
            };

            let path = entry.path();
            let is_file = match entry.file_type() {
                // Links are resolved here; the walk itself never follows them
                Some(ft) if ft.is_symlink() => std::fs::metadata(path)
                    .map(|meta| meta.is_file())
                    .unwrap_or(false),
                Some(ft) => ft.is_file(),
                None => false,
            };
            if !is_file {
                continue;
            }

            if !self.accepts_extension(path) {
                continue;
            }

            let relative = match path.strip_prefix(&self.root) {
                Ok(rel) => normalize_path(rel),
                Err(_) => continue,
            };

            match read_text_file(path) {
                Ok(content) => {
                    files.insert(relative, content);
                }
                Err(e) => {
                    tracing::warn!("Failed to read file {}: {}", path.display(), e);
                    skipped += 1;
                }
            }
        }

        tracing::info!(
            "Scanned {} files in {} ({} unreadable) in {}ms",
            files.len(),
            self.root.display(),
            skipped,
            start_time.elapsed().as_millis()
        );

        Ok(files)
    }
}
