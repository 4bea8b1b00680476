//! On-disk cache of per-file summaries keyed by content hash
//!
//! Layout under the project root:
//!
//! ```text
//! .aide_doc/
//!   summary_index.json            {"src/a.py": {"hash": "...", "processed": true}}
//!   summaries/src/a.py.summary.txt
//! ```

use super::summarizer::Summarizer;
use crate::utils::fs::FileContents;
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Cache directory created at the project root
pub const DOC_DIR: &str = ".aide_doc";
pub const SUMMARY_DIR: &str = "summaries";
pub const INDEX_FILE: &str = "summary_index.json";
pub const SUMMARY_SUFFIX: &str = ".summary.txt";

/// Hex SHA-256 of the file content's UTF-8 bytes
pub fn content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryIndexEntry {
    pub hash: String,
    #[serde(default)]
    pub processed: bool,
}

/// Outcome of a summary refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub regenerated: Vec<String>,
    pub unchanged: Vec<String>,
    /// Path and error message of files whose summary could not be generated
    pub failed: Vec<(String, String)>,
}

impl UpdateReport {
    pub fn is_noop(&self) -> bool {
        self.regenerated.is_empty() && self.failed.is_empty()
    }
}

/// Outcome of writing the cache to disk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub index_saved: bool,
    pub summaries_written: usize,
    pub failed: Vec<(String, String)>,
}

/// Summary cache for one project root
#[derive(Debug, Clone)]
pub struct SummaryStore {
    root: PathBuf,
    index: IndexMap<String, SummaryIndexEntry>,
    summaries: IndexMap<String, String>,
    concurrency: usize,
}

impl SummaryStore {
    /// Empty store for `root`; nothing is read until [`SummaryStore::load`]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            index: IndexMap::new(),
            summaries: IndexMap::new(),
            concurrency: 1,
        }
    }

    /// Create and load in one step
    pub fn open<P: Into<PathBuf>>(root: P) -> Self {
        let mut store = Self::new(root);
        store.load();
        store
    }

    /// Number of summaries generated at once during [`SummaryStore::update`]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn doc_dir(&self) -> PathBuf {
        self.root.join(DOC_DIR)
    }

    pub fn index_path(&self) -> PathBuf {
        self.doc_dir().join(INDEX_FILE)
    }

    pub fn summary_path(&self, relative: &str) -> PathBuf {
        self.doc_dir()
            .join(SUMMARY_DIR)
            .join(format!("{}{}", relative, SUMMARY_SUFFIX))
    }

    pub fn index(&self) -> &IndexMap<String, SummaryIndexEntry> {
        &self.index
    }

    pub fn summaries(&self) -> &IndexMap<String, String> {
        &self.summaries
    }

    pub fn summary(&self, relative: &str) -> Option<&str> {
        self.summaries.get(relative).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    /// Replace in-memory state with what is on disk and return the number of
    /// summaries loaded. A missing or corrupt index yields an empty store;
    /// index entries without a readable summary file are kept without text.
    pub fn load(&mut self) -> usize {
        self.index.clear();
        self.summaries.clear();

        let index_path = self.index_path();
        match std::fs::read_to_string(&index_path) {
            Ok(content) => match serde_json::from_str::<IndexMap<String, SummaryIndexEntry>>(&content) {
                Ok(index) => self.index = index,
                Err(e) => {
                    tracing::warn!("Ignoring corrupt summary index {}: {}", index_path.display(), e);
                    return 0;
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                tracing::warn!("Failed to read summary index {}: {}", index_path.display(), e);
                return 0;
            }
        }

        let paths: Vec<String> = self.index.keys().cloned().collect();
        for path in paths {
            let summary_path = self.summary_path(&path);
            match std::fs::read_to_string(&summary_path) {
                Ok(summary) => {
                    self.summaries.insert(path, summary);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("No summary file for {}", path);
                }
                Err(e) => {
                    tracing::warn!("Failed to read summary {}: {}", summary_path.display(), e);
                }
            }
        }

        tracing::info!(
            "Loaded {} summaries from {}",
            self.summaries.len(),
            self.doc_dir().display()
        );
        self.summaries.len()
    }

    /// Write the index and every indexed summary. The index is replaced
    /// atomically; individual write failures are logged and reported.
    pub fn save(&self) -> SaveReport {
        let mut report = SaveReport::default();

        match self.write_index() {
            Ok(()) => report.index_saved = true,
            Err(e) => {
                tracing::error!("Failed to save summary index: {}", e);
                report.failed.push((INDEX_FILE.to_string(), e.to_string()));
            }
        }

        for (path, summary) in &self.summaries {
            if !self.index.contains_key(path) {
                continue;
            }
            let summary_path = self.summary_path(path);
            let written = summary_path
                .parent()
                .map_or(Ok(()), std::fs::create_dir_all)
                .and_then(|_| std::fs::write(&summary_path, summary));
            match written {
                Ok(()) => report.summaries_written += 1,
                Err(e) => {
                    tracing::error!("Failed to save summary for {}: {}", path, e);
                    report.failed.push((path.clone(), e.to_string()));
                }
            }
        }

        report
    }

    fn write_index(&self) -> std::io::Result<()> {
        let doc_dir = self.doc_dir();
        std::fs::create_dir_all(&doc_dir)?;

        let json = serde_json::to_string_pretty(&self.index)?;
        let tmp_path = doc_dir.join(format!("{}.tmp", INDEX_FILE));
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, self.index_path())
    }

    /// Subset of `files` whose content hash differs from the index
    pub fn stale_paths(&self, files: &FileContents) -> FileContents {
        files
            .iter()
            .filter(|(path, content)| {
                self.index
                    .get(path.as_str())
                    .map_or(true, |entry| entry.hash != content_hash(content))
            })
            .map(|(path, content)| (path.clone(), content.clone()))
            .collect()
    }

    /// Regenerate summaries for `candidates` whose hash changed (or all of
    /// them when `force` is set), then persist the store.
    ///
    /// A failed summary leaves that file's previous index entry and text in
    /// place and does not abort the remaining files.
    pub async fn update(
        &mut self,
        candidates: &FileContents,
        force: bool,
        summarizer: &Summarizer,
    ) -> UpdateReport {
        let mut report = UpdateReport::default();
        let mut pending: Vec<(String, &str, String)> = Vec::new();

        for (path, content) in candidates {
            let hash = content_hash(content);
            let unchanged = self.index.get(path).map_or(false, |entry| entry.hash == hash);
            if unchanged && !force {
                report.unchanged.push(path.clone());
                continue;
            }
            pending.push((path.clone(), content.as_str(), hash));
        }

        if pending.is_empty() {
            return report;
        }

        let total = pending.len();
        let results: Vec<_> = stream::iter(pending.into_iter().enumerate().map(
            |(i, (path, content, hash))| async move {
                tracing::info!("Summarizing {} ({}/{})", path, i + 1, total);
                let result = summarizer.summarize(content).await;
                (path, hash, result)
            },
        ))
        .buffered(self.concurrency)
        .collect()
        .await;

        for (path, hash, result) in results {
            match result {
                Ok(summary) => {
                    self.summaries.insert(path.clone(), summary);
                    self.index.insert(
                        path.clone(),
                        SummaryIndexEntry {
                            hash,
                            processed: true,
                        },
                    );
                    report.regenerated.push(path);
                }
                Err(e) => {
                    tracing::warn!("Failed to summarize {}: {}", path, e);
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        self.save();
        report
    }

    /// Overview text sent as the assistant's project context, one block per
    /// summarized file in index order
    pub fn overview(&self) -> String {
        let mut overview = String::new();
        for (path, summary) in &self.summaries {
            overview.push_str(&format!("[{}]:\n{}\n-----\n", path, summary));
        }
        overview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedProvider;
    use std::sync::Arc;

    fn files(entries: &[(&str, &str)]) -> FileContents {
        entries
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect()
    }

    #[test]
    fn test_content_hash_is_hex_sha256() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(content_hash("a"), content_hash("b"));
    }

    #[tokio::test]
    async fn test_unchanged_file_is_not_resummarized() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec!["S1", "S2"]));
        let summarizer = Summarizer::new(provider.clone(), "m");
        let mut store = SummaryStore::new(dir.path());

        let report = store.update(&files(&[("a.py", "print(1)")]), false, &summarizer).await;
        assert_eq!(report.regenerated, vec!["a.py"]);
        assert_eq!(store.summary("a.py"), Some("S1"));

        let report = store.update(&files(&[("a.py", "print(1)")]), false, &summarizer).await;
        assert!(report.is_noop());
        assert_eq!(report.unchanged, vec!["a.py"]);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(store.summary("a.py"), Some("S1"));
    }

    #[tokio::test]
    async fn test_changed_file_is_resummarized_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec!["SA", "SB1", "SB2"]));
        let summarizer = Summarizer::new(provider.clone(), "m");
        let mut store = SummaryStore::new(dir.path());

        let report = store
            .update(&files(&[("a.py", "print(1)"), ("b.py", "x = 1")]), false, &summarizer)
            .await;
        assert_eq!(report.regenerated, vec!["a.py", "b.py"]);
        assert_eq!(store.index()["a.py"].hash, content_hash("print(1)"));
        assert_eq!(store.index()["b.py"].hash, content_hash("x = 1"));

        let report = store
            .update(&files(&[("a.py", "print(1)"), ("b.py", "x = 2")]), false, &summarizer)
            .await;
        assert_eq!(report.regenerated, vec!["b.py"]);
        assert_eq!(report.unchanged, vec!["a.py"]);
        assert_eq!(provider.call_count(), 3);

        assert_eq!(store.summary("a.py"), Some("SA"));
        assert_eq!(store.summary("b.py"), Some("SB2"));
        assert_eq!(store.index()["b.py"].hash, content_hash("x = 2"));
        assert!(store.index()["b.py"].processed);

        let reloaded = SummaryStore::open(dir.path());
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.index(), store.index());
        assert_eq!(reloaded.summaries(), store.summaries());
        assert!(dir
            .path()
            .join(".aide_doc/summaries/b.py.summary.txt")
            .is_file());
    }

    #[tokio::test]
    async fn test_nested_paths_and_force() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec!["first", "second"]));
        let summarizer = Summarizer::new(provider.clone(), "m");
        let mut store = SummaryStore::new(dir.path());
        let input = files(&[("pkg/sub/mod.py", "x = 1")]);

        store.update(&input, false, &summarizer).await;
        let report = store.update(&input, true, &summarizer).await;

        assert_eq!(report.regenerated, vec!["pkg/sub/mod.py"]);
        assert_eq!(provider.call_count(), 2);
        assert_eq!(
            std::fs::read_to_string(store.summary_path("pkg/sub/mod.py")).unwrap(),
            "second"
        );
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_state_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec!["A", "B"]).failing_on("broken"));
        let summarizer = Summarizer::new(provider.clone(), "m");
        let mut store = SummaryStore::new(dir.path());

        let report = store
            .update(&files(&[("a.py", "broken"), ("b.py", "fine")]), false, &summarizer)
            .await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "a.py");
        assert_eq!(report.regenerated, vec!["b.py"]);
        assert!(store.index().get("a.py").is_none());
        assert!(store.summary("b.py").is_some());
    }

    #[tokio::test]
    async fn test_concurrent_update_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let summarizer = Summarizer::new(provider.clone(), "m");
        let mut store = SummaryStore::new(dir.path()).with_concurrency(4);

        let input = files(&[("a.py", "1"), ("b.py", "2"), ("c.py", "3")]);
        let report = store.update(&input, false, &summarizer).await;

        assert_eq!(report.regenerated, vec!["a.py", "b.py", "c.py"]);
        let keys: Vec<&str> = store.summaries().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a.py", "b.py", "c.py"]);
    }

    #[test]
    fn test_corrupt_index_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join(DOC_DIR);
        std::fs::create_dir_all(&doc).unwrap();
        std::fs::write(doc.join(INDEX_FILE), "{not json").unwrap();

        let mut store = SummaryStore::new(dir.path());
        assert_eq!(store.load(), 0);
        assert!(store.is_empty());
        assert!(store.index().is_empty());
    }

    #[test]
    fn test_missing_summary_file_keeps_index_entry() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join(DOC_DIR);
        std::fs::create_dir_all(&doc).unwrap();
        std::fs::write(
            doc.join(INDEX_FILE),
            r#"{"a.py": {"hash": "abc", "processed": true}}"#,
        )
        .unwrap();

        let store = SummaryStore::open(dir.path());
        assert_eq!(store.index().len(), 1);
        assert!(store.summary("a.py").is_none());
    }

    #[test]
    fn test_stale_paths_and_overview() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SummaryStore::new(dir.path());
        store.index.insert(
            "a.py".to_string(),
            SummaryIndexEntry {
                hash: content_hash("same"),
                processed: true,
            },
        );
        store.summaries.insert("a.py".to_string(), "does a".to_string());

        let stale = store.stale_paths(&files(&[("a.py", "same"), ("b.py", "new")]));
        assert_eq!(stale.keys().collect::<Vec<_>>(), vec!["b.py"]);

        assert_eq!(store.overview(), "[a.py]:\ndoes a\n-----\n");
    }
}
