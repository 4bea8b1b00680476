//! aide - chat with an assistant that knows your project

use aide::{
    config::{validate_base_url, Config, ConfigManager, ProjectHistory},
    context::{Session, SessionOptions},
    llm::LlmProviderFactory,
    ui::console_chat::{prompt_api_key, select_history_project},
    ui::ConsoleChat,
    utils::errors::{AideError, ConfigError},
    utils::text::mask_secret,
};
use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// aide: a project-aware chat assistant
#[derive(Parser)]
#[command(name = "aide")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Project history file path
    #[arg(long, global = true)]
    history_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Session settings used when no subcommand is given
    #[command(flatten)]
    session: SessionArgs,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Flags shared by every command that opens a project session
#[derive(Args, Clone, Debug, Default, PartialEq)]
struct SessionArgs {
    /// Project directory (defaults to the current directory)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// API key for answers (overrides config and AIDE_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// API key for file summaries (defaults to the answer key)
    #[arg(long)]
    summarizer_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long)]
    base_url: Option<String>,

    /// Model used for answers
    #[arg(short, long)]
    model: Option<String>,

    /// Comma separated extensions to scan, `*` for all
    #[arg(long, value_delimiter = ',')]
    file_types: Option<Vec<String>>,

    /// Restore keys and file types saved for this project
    #[arg(long)]
    load_history: bool,
}

impl SessionArgs {
    /// Fill flags left unset after the subcommand from those given before it
    fn or(self, outer: SessionArgs) -> SessionArgs {
        SessionArgs {
            root: self.root.or(outer.root),
            api_key: self.api_key.or(outer.api_key),
            summarizer_api_key: self.summarizer_api_key.or(outer.summarizer_api_key),
            base_url: self.base_url.or(outer.base_url),
            model: self.model.or(outer.model),
            file_types: self.file_types.or(outer.file_types),
            load_history: self.load_history || outer.load_history,
        }
    }
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Interactive chat mode (default)
    Chat {
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Ask a single question and exit
    Ask {
        /// The question to ask
        question: String,
        /// Rescan the project before answering
        #[arg(long)]
        rescan: bool,
        /// Let the model pull full files into context
        #[arg(long)]
        pull_files: bool,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Scan the project and update file summaries
    Scan {
        /// Regenerate every summary, even unchanged ones
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Inspect previously used projects
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },
    /// List models offered by the API
    Models {
        #[command(flatten)]
        session: SessionArgs,
    },
}

#[derive(Subcommand, Clone)]
enum HistoryAction {
    /// List recorded projects
    List,
    /// Show the saved settings of a project (fuzzy path match)
    Show { query: String },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_manager = match &cli.config {
        Some(path) => ConfigManager::load_from(path),
        None => ConfigManager::new(),
    }
    .context("Failed to load configuration")?;

    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config_manager.config().logging.level.clone());
    init_logging(&log_level)?;

    info!("Starting aide v{}", aide::VERSION);
    info!("Using configuration {}", config_manager.config_path().display());

    if let Err(e) = run(cli, config_manager.config()).await {
        if e.is_configuration() {
            eprintln!("{}", e.user_message().bright_red());
            std::process::exit(2);
        }
        return Err(e.into());
    }

    Ok(())
}

/// Initialize logging
fn init_logging(log_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(log_level).context("Invalid log level")?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to set logger")?;

    Ok(())
}

async fn run(cli: Cli, config: &Config) -> aide::Result<()> {
    config.validate()?;

    let history_path = match &cli.history_file {
        Some(path) => path.clone(),
        None => ProjectHistory::default_path()?,
    };
    let mut history = ProjectHistory::load(history_path);

    let outer = cli.session;
    match cli.command.unwrap_or(Commands::Chat {
        session: SessionArgs::default(),
    }) {
        Commands::Chat { session } => {
            run_interactive_mode(config, &session.or(outer), history).await
        }
        Commands::Ask {
            question,
            rescan,
            pull_files,
            format,
            session,
        } => {
            run_single_question(
                config,
                &session.or(outer),
                &mut history,
                &question,
                rescan,
                pull_files,
                format,
            )
            .await
        }
        Commands::Scan { force, session } => {
            run_scan(config, &session.or(outer), &mut history, force).await
        }
        Commands::History { action } => {
            if outer != SessionArgs::default() {
                return Err(AideError::validation(
                    "history",
                    "project flags such as --root do not apply to this command",
                ));
            }
            show_history(&history, action.unwrap_or(HistoryAction::List))
        }
        Commands::Models { session } => list_models(config, &session.or(outer)).await,
    }
}

/// Merge config file, environment and flags into session options
fn session_options(config: &Config, args: &SessionArgs) -> SessionOptions {
    let mut options = SessionOptions::from_config(config);

    options.root = args.root.clone();
    if let Some(key) = &args.api_key {
        options.assistant_api_key = key.clone();
    }
    if let Some(key) = &args.summarizer_api_key {
        options.summarizer_api_key = Some(key.clone());
    }
    if let Some(url) = &args.base_url {
        options.base_url = Some(url.clone());
    }
    if let Some(model) = &args.model {
        options.settings.model = model.clone();
    }
    if let Some(types) = &args.file_types {
        options.settings.file_types = types.clone();
    }
    options.load_history = args.load_history;

    options
}

/// Open a session. Interactive callers may be asked for a project from
/// history and for a missing API key.
fn open_session(
    config: &Config,
    args: &SessionArgs,
    history: &mut ProjectHistory,
    interactive: bool,
) -> aide::Result<(Session, String, SessionOptions)> {
    let mut options = session_options(config, args);

    if options.root.is_none() && options.load_history && interactive {
        options.root = select_history_project(history)?;
    }
    if options.root.is_none() {
        options.root = Some(std::env::current_dir()?);
    }

    match Session::configure(options.clone(), history) {
        Ok((session, status)) => Ok((session, status, options)),
        Err(AideError::Config(ConfigError::MissingApiKey)) if interactive => {
            options.assistant_api_key = prompt_api_key("API key:")?;
            options.load_history = false;
            let (session, status) = Session::configure(options.clone(), history)?;
            Ok((session, status, options))
        }
        Err(e) => Err(e),
    }
}

/// Run interactive chat mode
async fn run_interactive_mode(
    config: &Config,
    args: &SessionArgs,
    mut history: ProjectHistory,
) -> aide::Result<()> {
    info!("Starting interactive mode");

    let (session, status, options) = open_session(config, args, &mut history, true)?;
    println!("{}", status.dimmed());

    let mut chat = ConsoleChat::new(session, history, options);
    chat.run().await?;

    info!("aide shutdown complete");
    Ok(())
}

/// Answer one question and exit
async fn run_single_question(
    config: &Config,
    args: &SessionArgs,
    history: &mut ProjectHistory,
    question: &str,
    rescan: bool,
    pull_files: bool,
    format: OutputFormat,
) -> aide::Result<()> {
    info!("Answering single question");

    let (mut session, _, _) = open_session(config, args, history, false)?;
    let answer = session.answer(question, &[], rescan, pull_files).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&answer)?),
        OutputFormat::Text => {
            println!("{}", answer.text);
            if let Some(error) = &answer.selection_error {
                eprintln!("{}", format!("⚠ {}", error).yellow());
            }
            if !answer.referenced_files.is_empty() {
                println!();
                println!("{}", "Referenced files:".dimmed());
                for file in &answer.referenced_files {
                    println!("  {}", file);
                }
            }
        }
    }

    Ok(())
}

/// Scan the project and refresh summaries
async fn run_scan(
    config: &Config,
    args: &SessionArgs,
    history: &mut ProjectHistory,
    force: bool,
) -> aide::Result<()> {
    let (mut session, status, _) = open_session(config, args, history, false)?;
    println!("{}", status);

    let report = session.refresh(force).await?;
    println!(
        "✅ {} regenerated, {} unchanged, {} failed | {} summaries cached",
        report.regenerated.len(),
        report.unchanged.len(),
        report.failed.len(),
        session.summary_count()
    );
    for (path, error) in &report.failed {
        println!("   {} {}: {}", "✗".red(), path, error);
    }

    Ok(())
}

fn show_history(history: &ProjectHistory, action: HistoryAction) -> aide::Result<()> {
    match action {
        HistoryAction::List => {
            if history.is_empty() {
                println!("No projects in history ({})", history.path().display());
                return Ok(());
            }
            for (path, entry) in history.entries() {
                println!("{}  {}", entry.last_used.dimmed(), path);
            }
        }
        HistoryAction::Show { query } => {
            let (path, entry) = history
                .find_fuzzy(&query)
                .ok_or_else(|| AideError::not_found(format!("Project matching '{}'", query)))?;
            println!("{}", path.bright_cyan());
            println!("  last used:      {}", entry.last_used);
            println!("  assistant key:  {}", mask_secret(&entry.assistant_api_key));
            println!("  summarizer key: {}", mask_secret(&entry.summarizer_api_key));
            println!("  file types:     {}", entry.file_types.join(", "));
        }
    }
    Ok(())
}

async fn list_models(config: &Config, args: &SessionArgs) -> aide::Result<()> {
    let options = session_options(config, args);
    if options.assistant_api_key.trim().is_empty() {
        return Err(ConfigError::MissingApiKey.into());
    }
    if let Some(url) = &options.base_url {
        validate_base_url("base_url", url)?;
    }
    let provider = LlmProviderFactory::create_provider(
        &options.assistant_api_key,
        options.base_url.as_deref(),
        options.timeout_seconds,
    )?;

    let models = provider.list_models().await?;
    println!("Available models ({}):", models.len());
    for model in models {
        match model.owned_by {
            Some(owner) => println!("  {} ({})", model.id, owner.dimmed()),
            None => println!("  {}", model.id),
        }
    }
    Ok(())
}
