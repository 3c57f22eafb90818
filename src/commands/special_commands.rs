//! Special commands parser for interactive chat mode
//!
//! This module parses the special commands that can be entered during
//! interactive chat sessions. Special commands allow users to:
//! - Clear the conversation
//! - Review the recorded turns
//! - Attach an image or summarize a document
//! - View session status and help
//! - Exit the session
//!
//! Commands are prefixed with `/`; the command word is case-insensitive while
//! its arguments (file paths, prompts) are kept verbatim.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
///
/// These commands act on the session or the terminal rather than being
/// sent to the model as a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Clear the conversation history
    Reset,

    /// Print the recorded turns
    ShowHistory,

    /// Send an image with an optional prompt
    AttachImage {
        /// Image file path or `http(s)` URL
        source: String,
        /// Prompt sent with the image; a default analysis prompt when absent
        prompt: Option<String>,
    },

    /// Summarize a document in the current conversation
    Summarize(PathBuf),

    /// Display provider, model, and session state
    ShowStatus,

    /// List available models from the provider
    ListModels,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command
    ///
    /// The input should be sent to the model as a regular message.
    None,
}

/// Parse user input into a special command
///
/// # Errors
///
/// Returns `CommandError` for unknown commands, unexpected arguments, or
/// missing required arguments
///
/// # Examples
///
/// ```
/// use gemma_chat::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/reset").unwrap(), SpecialCommand::Reset);
/// assert_eq!(parse_special_command("quit").unwrap(), SpecialCommand::Exit);
/// assert_eq!(
///     parse_special_command("Tell me about Paris.").unwrap(),
///     SpecialCommand::None
/// );
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    // If input doesn't start with "/", it's not a command (except exit/quit)
    if lower == "exit" || lower == "quit" {
        return Ok(SpecialCommand::Exit);
    }
    if !trimmed.starts_with('/') {
        return Ok(SpecialCommand::None);
    }

    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word.to_lowercase(), rest.trim()),
        None => (lower.clone(), ""),
    };

    match word.as_str() {
        "/reset" | "/clear" => no_argument(&word, rest, SpecialCommand::Reset),
        "/history" => no_argument(&word, rest, SpecialCommand::ShowHistory),
        "/status" => no_argument(&word, rest, SpecialCommand::ShowStatus),
        "/models" => no_argument(&word, rest, SpecialCommand::ListModels),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" => Ok(SpecialCommand::Exit),

        "/image" => {
            if rest.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "/image".to_string(),
                    usage: "/image <path|url> [prompt]".to_string(),
                });
            }
            let (source, prompt) = match rest.split_once(char::is_whitespace) {
                Some((source, prompt)) => (source, Some(prompt.trim().to_string())),
                None => (rest, None),
            };
            Ok(SpecialCommand::AttachImage {
                source: source.to_string(),
                prompt: prompt.filter(|p| !p.is_empty()),
            })
        }

        "/summarize" => {
            if rest.is_empty() {
                Err(CommandError::MissingArgument {
                    command: "/summarize".to_string(),
                    usage: "/summarize <path>".to_string(),
                })
            } else {
                Ok(SpecialCommand::Summarize(PathBuf::from(rest)))
            }
        }

        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

fn no_argument(
    command: &str,
    rest: &str,
    parsed: SpecialCommand,
) -> Result<SpecialCommand, CommandError> {
    if rest.is_empty() {
        Ok(parsed)
    } else {
        Err(CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: rest.to_string(),
        })
    }
}

/// Print help for the special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat Mode
===========================================

CONVERSATION:
  /reset              - Clear the conversation history (also /clear)
  /history            - Show the turns recorded so far

ATTACHMENTS (requires --vision):
  /image <path|url> [prompt] - Send an image file or URL, optionally with a question
  /summarize <path>   - Summarize a text, PDF, or DOCX document, or describe an image

SESSION INFORMATION:
  /status             - Show provider, model, and session state
  /models             - List models available from the provider
  /help               - Show this help message

EXIT:
  /exit, exit, quit   - Leave the chat (also Ctrl-D)
"#
    );
}
