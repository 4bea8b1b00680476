//! Console slash commands

/// Number of paths shown by `/summaries` without an argument
pub const DEFAULT_PREVIEW: usize = 20;

/// Commands understood by the console chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    /// Toggle rescanning the project before each turn
    Rescan,
    /// Toggle pulling model-selected files into context
    Pull,
    /// Set the answering model, or toggle chat/reasoner without a name
    Model(Option<String>),
    /// Change the project root, or show it without a path
    Root(Option<String>),
    /// Change the scanned extensions, or show them without a list
    Types(Option<String>),
    /// List the first N summarized files
    Summaries(usize),
    /// Pick a previous project from history
    History,
    Clear,
    Help,
    Exit,
    Unknown(String),
}

const COMMANDS: &[(&str, &str)] = &[
    ("/rescan", "Toggle rescanning the project before each question"),
    ("/pull", "Toggle letting the model pull full files into context"),
    ("/model [name]", "Set the model, or toggle chat/reasoner"),
    ("/root [path]", "Show or change the project directory"),
    ("/types [list]", "Show or change scanned extensions (comma separated, * for all)"),
    ("/summaries [n]", "List summarized files"),
    ("/history", "Switch to a previously used project"),
    ("/clear", "Clear the conversation"),
    ("/help", "Show this help message"),
    ("/exit", "Exit the application"),
];

impl SlashCommand {
    /// Parse console input. Returns `None` when the input is a question
    /// rather than a command.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let rest = input.strip_prefix('/')?;

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim().to_string()).filter(|a| !a.is_empty())),
            None => (rest, None),
        };

        let command = match name.to_lowercase().as_str() {
            "rescan" => Self::Rescan,
            "pull" => Self::Pull,
            "model" => Self::Model(arg),
            "root" | "cd" => Self::Root(arg),
            "types" => Self::Types(arg),
            "summaries" => match arg {
                Some(n) => match n.parse() {
                    Ok(n) => Self::Summaries(n),
                    Err(_) => Self::Unknown(input.to_string()),
                },
                None => Self::Summaries(DEFAULT_PREVIEW),
            },
            "history" => Self::History,
            "clear" => Self::Clear,
            "help" | "?" => Self::Help,
            "exit" | "quit" | "q" => Self::Exit,
            _ => Self::Unknown(input.to_string()),
        };
        Some(command)
    }

    /// Command names and descriptions for help output
    pub fn help_entries() -> &'static [(&'static str, &'static str)] {
        COMMANDS
    }

    /// Known commands close to a mistyped one
    pub fn suggestions(input: &str) -> Vec<&'static str> {
        let query = input
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_lowercase();
        if query.len() < 2 {
            return Vec::new();
        }

        COMMANDS
            .iter()
            .map(|&(usage, _)| usage.split_whitespace().next().unwrap_or(usage))
            .filter(|cmd| cmd.contains(&query) || levenshtein_distance(cmd, &query) <= 2)
            .collect()
    }
}

/// Simple Levenshtein distance calculation for command suggestions
fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut matrix = vec![vec![0; b.len() + 1]; a.len() + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b.len() {
        matrix[0][j] = j;
    }

    for (i, c1) in a.iter().enumerate() {
        for (j, c2) in b.iter().enumerate() {
            let cost = if c1 == c2 { 0 } else { 1 };
            matrix[i + 1][j + 1] = (matrix[i][j + 1] + 1)
                .min(matrix[i + 1][j] + 1)
                .min(matrix[i][j] + cost);
        }
    }

    matrix[a.len()][b.len()]
}
