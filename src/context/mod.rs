//! Project context: summary cache, summarization and the chat session

pub mod selection;
pub mod session;
pub mod store;
pub mod summarizer;

pub use selection::{parse_file_selection, SelectionError};
pub use session::{Answer, Session, SessionOptions, SessionSettings};
pub use store::{SummaryStore, UpdateReport};
pub use summarizer::Summarizer;
