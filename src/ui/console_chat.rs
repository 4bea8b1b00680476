//! Simple console-based chat over a project session

use crate::config::ProjectHistory;
use crate::context::{Answer, Session, SessionOptions};
use crate::llm::Message;
use crate::ui::commands::SlashCommand;
use crate::utils::errors::AideError;
use crate::utils::text::split_list;
use crate::Result;
use colored::*;
use inquire::{Password, PasswordDisplayMode, Select};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Ask for an API key without echoing it
pub fn prompt_api_key(label: &str) -> Result<String> {
    let key = Password::new(label)
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .with_help_message("Stored in the project history once the session opens")
        .prompt()?;
    Ok(key)
}

/// Let the user pick one of the recorded projects, most recent last
pub fn select_history_project(history: &ProjectHistory) -> Result<Option<PathBuf>> {
    if history.is_empty() {
        println!("{}", "No projects in history yet.".yellow());
        return Ok(None);
    }

    let choices: Vec<String> = history
        .entries()
        .map(|(path, entry)| format!("{}  ({})", path, entry.last_used))
        .collect();
    let paths: Vec<String> = history.entries().map(|(path, _)| path.to_string()).collect();

    match Select::new("Select a project:", choices.clone())
        .with_help_message("Keys and file types are restored from the history")
        .prompt_skippable()?
    {
        Some(choice) => {
            let index = choices.iter().position(|c| *c == choice).unwrap_or_default();
            Ok(paths.get(index).map(PathBuf::from))
        }
        None => Ok(None),
    }
}

pub struct ConsoleChat {
    session: Session,
    history: ProjectHistory,
    /// Template used when switching to a project from history
    options: SessionOptions,
    messages: Vec<Message>,
    rescan: bool,
    pull_files: bool,
}

impl ConsoleChat {
    pub fn new(session: Session, history: ProjectHistory, options: SessionOptions) -> Self {
        Self {
            session,
            history,
            options,
            messages: Vec::new(),
            rescan: false,
            pull_files: false,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        loop {
            print!("{} ", "›".bright_blue().bold());
            io::stdout().flush()?;

            let mut input = String::new();
            if io::stdin().read_line(&mut input)? == 0 {
                println!();
                break;
            }
            let input = input.trim();
            if input.is_empty() {
                continue;
            }

            match SlashCommand::parse(input) {
                Some(SlashCommand::Exit) => {
                    println!("{}", "Goodbye!".bright_yellow());
                    break;
                }
                Some(command) => {
                    if let Err(e) = self.handle_command(command).await {
                        println!("{}", e.user_message().bright_red());
                    }
                }
                None => self.ask(input).await,
            }

            println!();
        }

        Ok(())
    }

    async fn ask(&mut self, question: &str) {
        print!("{} ", "…".bright_yellow());
        let _ = io::stdout().flush();

        let started = Instant::now();
        let result = self
            .session
            .answer(question, &self.messages, self.rescan, self.pull_files)
            .await;
        println!();

        match result {
            Ok(answer) => {
                self.display_answer(&answer, started.elapsed());
                self.messages.push(Message::user(question));
                self.messages.push(Message::assistant(answer.text));
            }
            Err(e) => {
                tracing::error!("Turn failed: {}", e);
                println!("{}", e.user_message().bright_red());
            }
        }
    }

    async fn handle_command(&mut self, command: SlashCommand) -> Result<()> {
        match command {
            SlashCommand::Rescan => {
                self.rescan = !self.rescan;
                println!("Rescan before each question: {}", on_off(self.rescan));
            }
            SlashCommand::Pull => {
                self.pull_files = !self.pull_files;
                println!("Pull files into context: {}", on_off(self.pull_files));
            }
            SlashCommand::Model(model) => {
                let model = self.session.change_model(model).to_string();
                println!("✓ Model set to: {}", model.bright_cyan());
            }
            SlashCommand::Root(None) => {
                println!("Project: {}", self.session.root().display().to_string().bright_cyan());
            }
            SlashCommand::Root(Some(path)) => {
                self.session.change_root(&path)?;
                self.messages.clear();
                println!(
                    "✓ Project set to {} | loaded {} file summaries",
                    self.session.root().display(),
                    self.session.summary_count()
                );
            }
            SlashCommand::Types(None) => {
                println!("Scanned file types: {}", self.session.file_types().join(", "));
            }
            SlashCommand::Types(Some(list)) => {
                self.session.change_file_types(split_list(&list));
                println!("✓ Scanned file types: {}", self.session.file_types().join(", "));
            }
            SlashCommand::Summaries(n) => self.show_summaries(n),
            SlashCommand::History => self.switch_project().await?,
            SlashCommand::Clear => {
                self.messages.clear();
                self.clear_screen();
            }
            SlashCommand::Help => self.show_help(),
            SlashCommand::Exit => {}
            SlashCommand::Unknown(input) => {
                println!("❓ Unknown command: {}", input);
                let suggestions = SlashCommand::suggestions(&input);
                if !suggestions.is_empty() {
                    println!("💡 Did you mean: {}", suggestions.join(", "));
                }
                println!("   Type /help for all available commands");
            }
        }
        Ok(())
    }

    async fn switch_project(&mut self) -> Result<()> {
        let history = self.history.clone();
        let selected = tokio::task::spawn_blocking(move || select_history_project(&history))
            .await
            .map_err(|e| AideError::ui(format!("Failed to show project selector: {}", e)))??;

        let Some(root) = selected else {
            return Ok(());
        };

        let options = SessionOptions {
            root: Some(root),
            load_history: true,
            ..self.options.clone()
        };
        let (session, status) = Session::configure(options, &mut self.history)?;
        self.session = session;
        self.messages.clear();
        println!("✓ {}", status);
        Ok(())
    }

    fn display_answer(&self, answer: &Answer, elapsed: Duration) {
        println!("{}", answer.text);

        if let Some(error) = &answer.selection_error {
            println!("{}", format!("⚠ {}", error).yellow());
        }

        let mut footer = format!(
            "⏱ {:.1}s | {} summaries | {}",
            elapsed.as_secs_f64(),
            self.session.summary_count(),
            self.session.model()
        );
        if self.pull_files {
            if answer.referenced_files.is_empty() {
                footer.push_str(" | no files read");
            } else {
                footer.push_str(&format!(" | files read: {}", answer.referenced_files.join(", ")));
            }
        }
        println!("{}", footer.dimmed());
    }

    fn show_summaries(&self, n: usize) {
        let paths = self.session.summary_preview(n);
        if paths.is_empty() {
            println!("{}", "No summaries yet. Ask a question or use /rescan.".yellow());
            return;
        }
        for path in &paths {
            println!("  {}", path);
        }
        let total = self.session.store().index().len();
        if total > paths.len() {
            println!("{}", format!("  … {} more", total - paths.len()).dimmed());
        }
    }

    fn print_banner(&self) {
        println!("{}", format!("🤖 aide {}", crate::VERSION).bright_green().bold());
        println!(
            "{} {} ({} summaries)",
            "Project:".dimmed(),
            self.session.root().display(),
            self.session.summary_count()
        );
        println!("{}", "Ask about your project. Type /help for commands, /exit to quit.".dimmed());
        println!();
    }

    fn clear_screen(&self) {
        print!("\x1B[2J\x1B[H");
        let _ = io::stdout().flush();
        self.print_banner();
    }

    fn show_help(&self) {
        println!();
        println!("{}", "Available commands:".bright_cyan().bold());
        for (usage, description) in SlashCommand::help_entries() {
            println!("  {} - {}", usage.bright_yellow(), description);
        }
        println!();
        println!(
            "{} rescan {}, pull files {}, model {}",
            "Current:".dimmed(),
            on_off(self.rescan),
            on_off(self.pull_files),
            self.session.model()
        );
        println!();
    }
}

fn on_off(flag: bool) -> ColoredString {
    if flag {
        "on".green()
    } else {
        "off".dimmed()
    }
}
