//! Persisted list of previously configured projects

use crate::utils::errors::ConfigError;
use crate::Result;
use chrono::Local;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const HISTORY_FILE: &str = "projects_history.json";

/// Format of `last_used`, local time
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Settings remembered for one project root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectHistoryEntry {
    #[serde(default)]
    pub assistant_api_key: String,
    #[serde(default)]
    pub summarizer_api_key: String,
    #[serde(default)]
    pub file_types: Vec<String>,
    #[serde(default)]
    pub last_used: String,
}

/// Absolute project path → remembered settings, in insertion order
#[derive(Debug, Clone)]
pub struct ProjectHistory {
    path: PathBuf,
    entries: IndexMap<String, ProjectHistoryEntry>,
}

impl ProjectHistory {
    /// Default location under the user's data directory
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| ConfigError::FileNotFound {
            path: PathBuf::from("data directory"),
        })?;
        Ok(data_dir.join(crate::APP_NAME).join(HISTORY_FILE))
    }

    /// Load from `path`. A missing or unreadable file gives an empty history.
    pub fn load<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Ignoring corrupt project history {}: {}", path.display(), e);
                    IndexMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexMap::new(),
            Err(e) => {
                tracing::warn!("Failed to read project history {}: {}", path.display(), e);
                IndexMap::new()
            }
        };

        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &ProjectHistoryEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get<P: AsRef<Path>>(&self, root: P) -> Option<&ProjectHistoryEntry> {
        self.entries.get(&Self::key(root.as_ref()))
    }

    /// Upsert `root` with the current time and write the file
    pub fn record<P: AsRef<Path>>(
        &mut self,
        root: P,
        assistant_api_key: &str,
        summarizer_api_key: &str,
        file_types: &[String],
    ) -> Result<()> {
        let entry = ProjectHistoryEntry {
            assistant_api_key: assistant_api_key.to_string(),
            summarizer_api_key: summarizer_api_key.to_string(),
            file_types: file_types.to_vec(),
            last_used: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        };
        self.entries.insert(Self::key(root.as_ref()), entry);
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError { source: e })?;
            }
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, json).map_err(|e| ConfigError::WriteError { source: e })?;
        Ok(())
    }

    /// Best fuzzy match of `query` against the recorded project paths
    pub fn find_fuzzy(&self, query: &str) -> Option<(&str, &ProjectHistoryEntry)> {
        if let Some((key, entry)) = self.entries.get_key_value(query) {
            return Some((key.as_str(), entry));
        }

        let matcher = SkimMatcherV2::default();
        self.entries
            .iter()
            .filter_map(|(key, entry)| {
                matcher
                    .fuzzy_match(key, query)
                    .map(|score| (score, key.as_str(), entry))
            })
            .max_by_key(|(score, _, _)| *score)
            .map(|(_, key, entry)| (key, entry))
    }

    fn key(root: &Path) -> String {
        root.to_string_lossy().into_owned()
    }
}
