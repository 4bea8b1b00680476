//! Terminal interface: console chat and its slash commands

pub mod commands;
pub mod console_chat;

pub use commands::SlashCommand;
pub use console_chat::ConsoleChat;
