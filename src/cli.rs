//! Command-line interface definition for gemma-chat
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for chat, one-shot generation, document helpers,
//! model listing, and the HTTP server.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// gemma-chat - Multi-turn conversations with Gemma 3 models
///
/// Talk to Gemma 3 through the hosted Gemini API or a local Ollama server.
#[derive(Parser, Debug, Clone)]
#[command(name = "gemma-chat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the provider from config (gemini, ollama)
    #[arg(short, long, global = true)]
    pub provider: Option<String>,

    /// Override the model of the selected provider
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Use randomized sampling at this temperature instead of greedy decoding
    #[arg(short, long, global = true)]
    pub temperature: Option<f32>,

    /// Send only the current message, without prior turns
    #[arg(long, global = true)]
    pub single_turn: bool,

    /// Enable image attachments (requires a multimodal model variant)
    #[arg(long, global = true)]
    pub vision: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for gemma-chat
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive multi-turn chat
    Chat,

    /// Generate a single reply to a prompt
    Generate {
        /// Prompt text
        #[arg(long)]
        prompt: String,
    },

    /// Analyze an image
    Image {
        /// Path or `http(s)` URL of the image
        #[arg(long)]
        path: String,

        /// Question or instruction about the image
        #[arg(long)]
        prompt: Option<String>,
    },

    /// Summarize a text, PDF, or DOCX document or describe an image file
    Summarize {
        /// Path to the document
        #[arg(long)]
        path: PathBuf,
    },

    /// Chat with a model primed as an expert on a topic
    Expert {
        /// Topic of expertise
        #[arg(long)]
        topic: String,

        /// Optional file with background knowledge about the topic
        #[arg(long)]
        knowledge: Option<PathBuf>,
    },

    /// Manage AI models
    Models {
        /// Model management subcommand
        #[command(subcommand)]
        command: ModelCommand,
    },

    /// Serve the HTTP API
    Serve {
        /// Address to bind, overriding server.bind from config
        #[arg(long)]
        bind: Option<String>,
    },
}

/// Model management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ModelCommand {
    /// List available models
    List {
        /// Output the list as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            provider: None,
            model: None,
            temperature: None,
            single_turn: false,
            vision: false,
            command: Commands::Chat,
        }
    }
}
