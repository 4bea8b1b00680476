//! Chat session over one project
//!
//! A [`Session`] owns the validated project root, the summary cache and the
//! two model clients. Each turn optionally refreshes the cache, builds the
//! project overview and asks the assistant, with an optional preliminary
//! query that lets the model pull full files into context.

use super::selection::{parse_file_selection, selection_instruction};
use super::store::{SummaryStore, UpdateReport};
use super::summarizer::Summarizer;
use crate::config::{validate_base_url, Config, LimitsConfig, ProjectHistory};
use crate::llm::{self, LlmProvider, LlmProviderFactory, Message, DEFAULT_MODEL, REASONER_MODEL};
use crate::utils::errors::{AideError, ConfigError};
use crate::utils::fs::{default_file_types, normalize_file_types, FileScanner};
use crate::utils::path::ProjectRoot;
use crate::utils::text::read_text_file;
use crate::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const OVERVIEW_HEADER: &str = "Below is an overview of the project's files:\n";
const OVERVIEW_FOOTER: &str = "\nAnswer the user's question based on the information above.";
const PULLED_FILES_HEADER: &str = "\n\nReference project files:\n";

/// Marker in a file list that disables extension filtering
const ALL_FILE_TYPES: &str = "*";

/// Result of one chat turn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    /// Files whose content was added to the question, in model order
    pub referenced_files: Vec<String>,
    /// Set when the model's file selection could not be parsed and the
    /// answer was produced without pulled files
    pub selection_error: Option<String>,
}

/// Per-session knobs that can change while the session is live
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub model: String,
    pub selection_model: String,
    pub file_types: Vec<String>,
    pub limits: LimitsConfig,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            selection_model: DEFAULT_MODEL.to_string(),
            file_types: default_file_types(),
            limits: LimitsConfig::default(),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.provider.model.clone(),
            selection_model: config.provider.selection_model.clone(),
            file_types: config.scan.file_types.clone(),
            limits: config.limits,
        }
    }
}

/// Everything needed to open a session
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub root: Option<PathBuf>,
    pub assistant_api_key: String,
    /// Falls back to the assistant key when unset or blank
    pub summarizer_api_key: Option<String>,
    pub base_url: Option<String>,
    pub summary_model: String,
    pub timeout_seconds: u64,
    /// Take keys and file types from the project history entry for `root`
    pub load_history: bool,
    pub settings: SessionSettings,
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: None,
            assistant_api_key: config.resolve_api_key().unwrap_or_default(),
            summarizer_api_key: config.resolve_summarizer_api_key(),
            base_url: Some(config.provider.base_url.clone()),
            summary_model: config.provider.summary_model.clone(),
            timeout_seconds: config.provider.timeout_seconds,
            load_history: false,
            settings: SessionSettings::from_config(config),
        }
    }

    fn apply_history(&mut self, history: &ProjectHistory) {
        let Some(root) = &self.root else {
            return;
        };
        let absolute = root.canonicalize().unwrap_or_else(|_| root.clone());
        let Some(entry) = history.get(&absolute) else {
            tracing::debug!("No history entry for {}", absolute.display());
            return;
        };

        tracing::info!("Using saved settings for {}", absolute.display());
        self.assistant_api_key = entry.assistant_api_key.clone();
        self.summarizer_api_key = Some(entry.summarizer_api_key.clone());
        if !entry.file_types.is_empty() {
            self.settings.file_types = entry.file_types.clone();
        }
    }
}

pub struct Session {
    root: ProjectRoot,
    assistant: Arc<dyn LlmProvider>,
    summarizer: Summarizer,
    store: SummaryStore,
    settings: SessionSettings,
}

impl Session {
    /// Open a session on `root`, loading whatever summaries are cached there
    pub fn new(
        root: ProjectRoot,
        assistant: Arc<dyn LlmProvider>,
        summarizer: Summarizer,
        mut settings: SessionSettings,
    ) -> Self {
        settings.file_types = Self::clean_file_types(settings.file_types);
        let store =
            SummaryStore::open(root.path()).with_concurrency(settings.limits.summary_concurrency);
        Self {
            root,
            assistant,
            summarizer,
            store,
            settings,
        }
    }

    /// Validate `options`, build both model clients, open the session and
    /// record the project in `history`.
    ///
    /// Returns the session and a status line for the user. Invalid options
    /// fail with a [`ConfigError`] whose message is meant for display.
    pub fn configure(
        mut options: SessionOptions,
        history: &mut ProjectHistory,
    ) -> Result<(Self, String)> {
        if options.load_history {
            options.apply_history(history);
        }

        let assistant_key = options.assistant_api_key.trim().to_string();
        let summarizer_key = options
            .summarizer_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .unwrap_or(&assistant_key)
            .to_string();
        if assistant_key.is_empty() || summarizer_key.is_empty() {
            return Err(ConfigError::MissingApiKey.into());
        }

        let root = ProjectRoot::new(options.root.clone().unwrap_or_default())?;

        let base_url = options.base_url.as_deref();
        if let Some(url) = base_url {
            validate_base_url("base_url", url)?;
        }
        let assistant: Arc<dyn LlmProvider> = Arc::from(LlmProviderFactory::create_provider(
            &assistant_key,
            base_url,
            options.timeout_seconds,
        )?);
        let summarizer_provider: Arc<dyn LlmProvider> = Arc::from(
            LlmProviderFactory::create_provider(&summarizer_key, base_url, options.timeout_seconds)?,
        );
        let summarizer = Summarizer::new(summarizer_provider, options.summary_model.clone())
            .with_max_input_chars(options.settings.limits.max_input_chars);

        let session = Self::new(root, assistant, summarizer, options.settings);

        if let Err(e) = history.record(
            session.root(),
            &assistant_key,
            &summarizer_key,
            &session.settings.file_types,
        ) {
            tracing::warn!("Failed to save project history: {}", e);
        }

        let status = format!(
            "Session ready for {} | loaded {} file summaries",
            session.root().display(),
            session.summary_count()
        );
        tracing::info!("{}", status);
        Ok((session, status))
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub fn selection_model(&self) -> &str {
        &self.settings.selection_model
    }

    pub fn file_types(&self) -> &[String] {
        &self.settings.file_types
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.settings.limits
    }

    pub fn store(&self) -> &SummaryStore {
        &self.store
    }

    pub fn summary_count(&self) -> usize {
        self.store.len()
    }

    /// Switch to another project root and load its cache
    pub fn change_root<P: AsRef<Path>>(&mut self, root: P) -> Result<()> {
        let root = ProjectRoot::new(root)?;
        self.store = SummaryStore::open(root.path())
            .with_concurrency(self.settings.limits.summary_concurrency);
        self.root = root;
        tracing::info!(
            "Project root changed to {} ({} summaries)",
            self.root.path().display(),
            self.store.len()
        );
        Ok(())
    }

    /// Replace the extension filter. An empty list restores the defaults;
    /// `*` scans every file.
    pub fn change_file_types(&mut self, file_types: Vec<String>) {
        self.settings.file_types = Self::clean_file_types(file_types);
    }

    /// Use `model`, or toggle between the chat and reasoner models when
    /// `None`. Returns the model now in use.
    pub fn change_model(&mut self, model: Option<String>) -> &str {
        self.settings.model = match model.map(|m| m.trim().to_string()) {
            Some(model) if !model.is_empty() => model,
            _ if self.settings.model == DEFAULT_MODEL => REASONER_MODEL.to_string(),
            _ => DEFAULT_MODEL.to_string(),
        };
        tracing::info!("Answering model set to {}", self.settings.model);
        &self.settings.model
    }

    /// First `n` indexed paths
    pub fn summary_preview(&self, n: usize) -> Vec<String> {
        self.store.index().keys().take(n).cloned().collect()
    }

    /// Scan the project and regenerate summaries of new or changed files,
    /// or of every file when `force` is set
    pub async fn refresh(&mut self, force: bool) -> Result<UpdateReport> {
        let scanner = FileScanner::new(self.root.path(), self.file_filter());
        let files = scanner.scan()?;

        let candidates = if force {
            files
        } else {
            self.store.stale_paths(&files)
        };
        if candidates.is_empty() {
            tracing::info!("All {} summaries are up to date", self.store.len());
            return Ok(UpdateReport::default());
        }

        tracing::info!("Updating summaries for {} files", candidates.len());
        Ok(self.store.update(&candidates, force, &self.summarizer).await)
    }

    /// Project overview wrapped in the assistant's instructions
    pub fn system_prompt(&self) -> String {
        format!("{}{}{}", OVERVIEW_HEADER, self.store.overview(), OVERVIEW_FOOTER)
    }

    /// Answer `question` given the prior conversation `history`.
    ///
    /// With `rescan` (or an empty cache) the project is scanned first. With
    /// `pull_files` the model is asked which files it needs and their full
    /// content is appended to the question before the final query.
    pub async fn answer(
        &mut self,
        question: &str,
        history: &[Message],
        rescan: bool,
        pull_files: bool,
    ) -> Result<Answer> {
        if !self.root.is_valid() {
            return Err(ConfigError::RootNotFound {
                path: self.root.path().to_path_buf(),
            }
            .into());
        }

        if rescan || self.store.is_empty() {
            let report = self.refresh(false).await?;
            if !report.failed.is_empty() {
                tracing::warn!("{} summaries could not be generated", report.failed.len());
            }
        }

        let system = self.system_prompt();
        let max_system_chars = self.settings.limits.max_system_chars;
        tracing::debug!("System prompt is {} chars", system.chars().count());

        if !pull_files {
            let text = llm::complete(
                self.assistant.as_ref(),
                &self.settings.model,
                &system,
                history,
                question,
                max_system_chars,
            )
            .await?;
            return Ok(Answer {
                text,
                ..Answer::default()
            });
        }

        let (files, selection_error) = match self.select_files(question, history, &system).await {
            Ok(files) => (files, None),
            Err(AideError::Selection(e)) => {
                tracing::warn!("{}; answering without project files", e);
                (Vec::new(), Some(e.to_string()))
            }
            Err(e) => return Err(e),
        };

        let augmented = self.append_file_contents(question, &files);
        let text = llm::complete(
            self.assistant.as_ref(),
            &self.settings.model,
            &system,
            history,
            &augmented,
            max_system_chars,
        )
        .await?;

        Ok(Answer {
            text,
            referenced_files: files,
            selection_error,
        })
    }

    /// Ask the selection model which files it needs for `question`.
    ///
    /// Fails with [`AideError::Selection`] when the reply has no bracketed
    /// list.
    pub async fn select_files(
        &self,
        question: &str,
        history: &[Message],
        system: &str,
    ) -> Result<Vec<String>> {
        let max_files = self.settings.limits.max_selected_files;
        let selection_query = format!("{}\n{}", question, selection_instruction(max_files));
        let reply = llm::complete(
            self.assistant.as_ref(),
            &self.settings.selection_model,
            system,
            history,
            &selection_query,
            self.settings.limits.max_system_chars,
        )
        .await?;

        let files = parse_file_selection(&reply, max_files)?;
        tracing::info!("Model selected {} files: {:?}", files.len(), files);
        Ok(files)
    }

    fn append_file_contents(&self, question: &str, files: &[String]) -> String {
        if files.is_empty() {
            return question.to_string();
        }

        let mut prompt = format!("{}{}", question, PULLED_FILES_HEADER);
        for file in files {
            if file.split('/').any(|part| part == "..") {
                tracing::warn!("Refusing to read {} outside the project root", file);
                prompt.push_str(&format!(
                    "{}: failed to read file: path is outside the project\n",
                    file
                ));
                continue;
            }

            match read_text_file(self.root.resolve(file)) {
                Ok(content) => prompt.push_str(&format!("{}:\n{}\n\n", file, content)),
                Err(e) => {
                    tracing::warn!("Failed to read selected file {}: {}", file, e);
                    prompt.push_str(&format!("{}: failed to read file: {}\n", file, e));
                }
            }
        }
        prompt
    }

    fn file_filter(&self) -> Option<Vec<String>> {
        if self
            .settings
            .file_types
            .iter()
            .any(|t| t == ALL_FILE_TYPES)
        {
            None
        } else {
            Some(self.settings.file_types.clone())
        }
    }

    fn clean_file_types(file_types: Vec<String>) -> Vec<String> {
        if file_types.iter().any(|t| t.trim() == ALL_FILE_TYPES) {
            return vec![ALL_FILE_TYPES.to_string()];
        }
        let normalized = normalize_file_types(file_types);
        if normalized.is_empty() {
            default_file_types()
        } else {
            normalized
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("root", &self.root)
            .field("settings", &self.settings)
            .field("summaries", &self.store.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedProvider;
    use std::fs;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "print('a')").unwrap();
        fs::create_dir_all(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib/b.py"), "def b(): pass").unwrap();
        dir
    }

    fn session_with(
        dir: &Path,
        assistant: Arc<ScriptedProvider>,
        summarizer: Arc<ScriptedProvider>,
    ) -> Session {
        Session::new(
            ProjectRoot::new(dir).unwrap(),
            assistant,
            Summarizer::new(summarizer, "summary-model"),
            SessionSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_answer_without_pull_makes_one_call() {
        let dir = project();
        let assistant = Arc::new(ScriptedProvider::new(vec!["It prints a."]));
        let summaries = Arc::new(ScriptedProvider::new(vec!["prints a", "defines b"]));
        let mut session = session_with(dir.path(), assistant.clone(), summaries.clone());

        let answer = session.answer("What does a.py do?", &[], false, false).await.unwrap();

        assert_eq!(answer.text, "It prints a.");
        assert!(answer.referenced_files.is_empty());
        assert!(answer.selection_error.is_none());
        assert_eq!(assistant.call_count(), 1);
        assert_eq!(summaries.call_count(), 2);

        let call = &assistant.calls()[0];
        assert_eq!(call.model, DEFAULT_MODEL);
        let system = &call.messages[0].content;
        assert!(system.starts_with(OVERVIEW_HEADER));
        assert!(system.contains("[a.py]:\nprints a\n-----\n"));
        assert!(system.contains("[lib/b.py]:\ndefines b\n-----\n"));
        assert_eq!(call.messages[1].content, "What does a.py do?");
    }

    #[tokio::test]
    async fn test_second_turn_reuses_cache() {
        let dir = project();
        let assistant = Arc::new(ScriptedProvider::new(vec![]));
        let summaries = Arc::new(ScriptedProvider::new(vec![]));
        let mut session = session_with(dir.path(), assistant.clone(), summaries.clone());

        session.answer("q1", &[], false, false).await.unwrap();
        session.answer("q2", &[], true, false).await.unwrap();
        assert_eq!(summaries.call_count(), 2);

        fs::write(dir.path().join("lib/b.py"), "def b(): return 1").unwrap();
        session.answer("q3", &[], true, false).await.unwrap();
        assert_eq!(summaries.call_count(), 3);
        assert!(summaries.calls()[2].messages[0].content.contains("return 1"));
    }

    #[tokio::test]
    async fn test_answer_with_pulled_files() {
        let dir = project();
        let assistant = Arc::new(ScriptedProvider::new(vec![
            "Relevant: [a.py, missing.py]",
            "Final answer",
        ]));
        let summaries = Arc::new(ScriptedProvider::new(vec![]));
        let mut session = session_with(dir.path(), assistant.clone(), summaries);

        let history = vec![Message::user("hi"), Message::assistant("hello")];
        let answer = session.answer("Explain a.py", &history, false, true).await.unwrap();

        assert_eq!(answer.text, "Final answer");
        assert_eq!(answer.referenced_files, vec!["a.py", "missing.py"]);
        assert!(answer.selection_error.is_none());

        let calls = assistant.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].messages.len(), 4);
        assert!(calls[0].messages[3].content.contains("at most 5"));

        let final_question = &calls[1].messages[3].content;
        assert!(final_question.starts_with("Explain a.py"));
        assert!(final_question.contains("a.py:\nprint('a')\n\n"));
        assert!(final_question.contains("missing.py: failed to read file:"));
    }

    #[tokio::test]
    async fn test_unparseable_selection_falls_back() {
        let dir = project();
        let assistant = Arc::new(ScriptedProvider::new(vec!["look at a.py", "Answer anyway"]));
        let summaries = Arc::new(ScriptedProvider::new(vec![]));
        let mut session = session_with(dir.path(), assistant.clone(), summaries);

        let answer = session.answer("q", &[], false, true).await.unwrap();

        assert_eq!(answer.text, "Answer anyway");
        assert!(answer.referenced_files.is_empty());
        assert!(answer.selection_error.is_some());
        assert_eq!(assistant.calls()[1].messages[1].content, "q");
    }

    #[tokio::test]
    async fn test_select_files_reports_missing_list() {
        let dir = project();
        let assistant = Arc::new(ScriptedProvider::new(vec!["a.py please", "[a.py, lib/b.py]"]));
        let summaries = Arc::new(ScriptedProvider::new(vec![]));
        let session = session_with(dir.path(), assistant.clone(), summaries);

        let err = session.select_files("q", &[], "system").await.unwrap_err();
        assert!(matches!(err, AideError::Selection(_)));
        assert!(!err.is_configuration());

        let files = session.select_files("q", &[], "system").await.unwrap();
        assert_eq!(files, vec!["a.py", "lib/b.py"]);
        assert_eq!(assistant.calls()[0].model, session.selection_model());
    }

    #[tokio::test]
    async fn test_selected_path_outside_root_is_not_read() {
        let dir = project();
        let assistant = Arc::new(ScriptedProvider::new(vec!["[../secret.txt]", "done"]));
        let summaries = Arc::new(ScriptedProvider::new(vec![]));
        let mut session = session_with(dir.path(), assistant.clone(), summaries);

        session.answer("q", &[], false, true).await.unwrap();
        assert!(assistant.calls()[1].messages[1]
            .content
            .contains("../secret.txt: failed to read file: path is outside the project"));
    }

    #[tokio::test]
    async fn test_missing_root_fails_before_any_call() {
        let parent = tempfile::tempdir().unwrap();
        let root = parent.path().join("proj");
        fs::create_dir_all(&root).unwrap();

        let assistant = Arc::new(ScriptedProvider::new(vec![]));
        let summaries = Arc::new(ScriptedProvider::new(vec![]));
        let mut session = session_with(&root, assistant.clone(), summaries.clone());
        fs::remove_dir_all(&root).unwrap();

        let err = session.answer("q", &[], false, false).await.unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(assistant.call_count(), 0);
        assert_eq!(summaries.call_count(), 0);
    }

    #[test]
    fn test_change_model_and_file_types() {
        let dir = project();
        let mut session = session_with(
            dir.path(),
            Arc::new(ScriptedProvider::new(vec![])),
            Arc::new(ScriptedProvider::new(vec![])),
        );

        assert_eq!(session.change_model(None), REASONER_MODEL);
        assert_eq!(session.change_model(None), DEFAULT_MODEL);
        assert_eq!(session.change_model(Some("custom".to_string())), "custom");
        assert_eq!(session.change_model(None), DEFAULT_MODEL);

        session.change_file_types(vec!["RS".to_string(), "py".to_string()]);
        assert_eq!(session.file_types(), [".rs", ".py"]);
        session.change_file_types(Vec::new());
        assert_eq!(session.file_types(), default_file_types().as_slice());
        session.change_file_types(vec!["*".to_string()]);
        assert!(session.file_filter().is_none());
    }

    #[tokio::test]
    async fn test_change_root_loads_other_cache() {
        let first = project();
        let second = project();
        let assistant = Arc::new(ScriptedProvider::new(vec![]));
        let summaries = Arc::new(ScriptedProvider::new(vec![]));
        let mut session = session_with(first.path(), assistant, summaries.clone());

        session.refresh(false).await.unwrap();
        assert_eq!(session.summary_count(), 2);
        assert_eq!(session.summary_preview(1), vec!["a.py"]);

        session.change_root(second.path()).unwrap();
        assert_eq!(session.summary_count(), 0);

        let err = session.change_root(second.path().join("nope")).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(session.root(), second.path().canonicalize().unwrap());
    }

    #[test]
    fn test_configure_validates_and_records_history() {
        let dir = project();
        let history_dir = tempfile::tempdir().unwrap();
        let mut history = ProjectHistory::load(history_dir.path().join("h.json"));

        let options = SessionOptions {
            root: Some(dir.path().to_path_buf()),
            ..SessionOptions::default()
        };
        let err = Session::configure(options.clone(), &mut history).unwrap_err();
        assert!(matches!(err, AideError::Config(ConfigError::MissingApiKey)));

        let missing = SessionOptions {
            root: Some(dir.path().join("missing")),
            assistant_api_key: "key".to_string(),
            ..SessionOptions::default()
        };
        let err = Session::configure(missing, &mut history).unwrap_err();
        assert!(matches!(err, AideError::Config(ConfigError::RootNotFound { .. })));
        assert!(history.is_empty());

        let bad_url = SessionOptions {
            assistant_api_key: "key".to_string(),
            base_url: Some("api.deepseek.com".to_string()),
            ..options.clone()
        };
        let err = Session::configure(bad_url, &mut history).unwrap_err();
        assert!(matches!(err, AideError::Validation { .. }));
        assert!(history.is_empty());

        let options = SessionOptions {
            assistant_api_key: "key".to_string(),
            summary_model: DEFAULT_MODEL.to_string(),
            timeout_seconds: 30,
            ..options
        };
        let (session, status) = Session::configure(options, &mut history).unwrap();
        assert!(status.ends_with("| loaded 0 file summaries"));
        let entry = history.get(session.root()).unwrap();
        assert_eq!(entry.assistant_api_key, "key");
        assert_eq!(entry.summarizer_api_key, "key");
    }

    #[test]
    fn test_configure_from_history() {
        let dir = project();
        let history_dir = tempfile::tempdir().unwrap();
        let mut history = ProjectHistory::load(history_dir.path().join("h.json"));
        let root = dir.path().canonicalize().unwrap();
        history
            .record(&root, "saved-key", "saved-sum", &[".rs".to_string()])
            .unwrap();

        let options = SessionOptions {
            root: Some(dir.path().to_path_buf()),
            load_history: true,
            timeout_seconds: 30,
            ..SessionOptions::default()
        };
        let (session, _) = Session::configure(options, &mut history).unwrap();
        assert_eq!(session.file_types(), [".rs"]);
        assert_eq!(history.get(&root).unwrap().summarizer_api_key, "saved-sum");
    }
}
