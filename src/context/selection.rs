//! Extraction of the model's file selection from free text
//!
//! The selection query asks the model for a bracketed, comma separated list
//! such as `[src/a.py,src/b.py]`. Parsing is tolerant about whitespace,
//! quotes and path separators but never guesses: a reply without a
//! bracketed list is an explicit error, distinct from `[]`.

use crate::utils::path::clean_relative;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

/// Upper bound on files pulled into a single answer
pub const MAX_SELECTED_FILES: usize = 5;

lazy_static! {
    /// Innermost bracket group, so `[[a,b]]` yields `a,b`
    static ref BRACKETED_LIST: Regex = Regex::new(r"\[([^\[\]]*)\]").expect("valid regex");
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("model reply contains no bracketed file list: {preview}")]
    MissingList { preview: String },
}

/// Instruction appended to the user's question for the selection query
pub fn selection_instruction(max_files: usize) -> String {
    format!(
        "List only the relative paths of the key project files needed to answer my question \
         (at most {max}, the fewer the better). Do not wrap paths in quotes. Put [ before the \
         first path and ] after the last one, separated by \",\". \
         Example format: [relpath/A.py,relpath/B.java]",
        max = max_files
    )
}

/// Parse the bracketed list out of `reply`, keeping at most `max_files`
/// distinct paths in the order the model named them.
pub fn parse_file_selection(reply: &str, max_files: usize) -> Result<Vec<String>, SelectionError> {
    let captures = BRACKETED_LIST
        .captures(reply)
        .ok_or_else(|| SelectionError::MissingList {
            preview: crate::utils::text::truncate(reply.trim(), 80),
        })?;

    let mut files: Vec<String> = Vec::new();
    for raw in captures[1].split(',') {
        let unquoted = raw.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`');
        let path = clean_relative(unquoted);
        if files.len() >= max_files {
            break;
        }
        if path.is_empty() || files.contains(&path) {
            continue;
        }
        files.push(path);
    }

    Ok(files)
}
