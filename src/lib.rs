//! aide - a project-aware chat assistant
//!
//! This library scans a local source tree, keeps a content-hashed cache of
//! per-file summaries produced by a remote language model, and answers
//! questions about the project using those summaries as shared context.

pub mod config;
pub mod context;
pub mod llm;
pub mod ui;
pub mod utils;

// Re-export commonly used types and traits
pub use config::{Config, ConfigManager, ProjectHistory, ProviderConfig};
pub use context::{Answer, Session, SessionOptions, SummaryStore, Summarizer};
pub use llm::{LlmError, LlmProvider, Message, MessageRole};
pub use utils::errors::{AideError, ConfigError};

/// The main result type used throughout the application
pub type Result<T> = std::result::Result<T, AideError>;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "aide";
