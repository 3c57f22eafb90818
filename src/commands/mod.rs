/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `chat`      - Interactive multi-turn chat
- `generate`  - One reply to one prompt
- `image`     - One-shot image analysis
- `summarize` - Document summary
- `expert`    - Interactive chat with a topic expert
- `serve`     - HTTP API

Handlers stay small: they build a provider and a session from the
configuration and hand the work to the library types.
*/

use crate::config::Config;
use crate::error::Result;
use crate::providers::{create_provider, Provider};
use crate::session::{ConversationSession, Modality, SessionOptions};
use std::sync::Arc;

// Special commands parser for the interactive loops
pub mod special_commands;

// Model management commands
pub mod models;

/// Build the configured provider as a shared handle
fn shared_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    let provider = create_provider(&config.provider.provider_type, &config.provider)?;
    Ok(Arc::from(provider))
}

/// Build a session on the configured provider
fn build_session(config: &Config, options: SessionOptions) -> Result<ConversationSession> {
    tracing::debug!(
        provider = %config.provider.provider_type,
        model = config.active_model(),
        "Creating session"
    );
    ConversationSession::new(shared_provider(config)?, options)
}

/// Options for a one-shot command: a single turn and no history carried over
fn one_shot_options(config: &Config, modality: Modality) -> SessionOptions {
    SessionOptions {
        multi_turn: false,
        modality,
        ..config.session.to_options()
    }
}

fn print_reply(reply: &str) {
    println!("\n{}\n", reply);
}

// Chat command handler
pub mod chat {
    //! Interactive chat handler.
    //!
    //! Runs a readline loop over one session. Lines starting with `/` are
    //! special commands; everything else is sent to the model.

    use super::*;
    use crate::assistant::DocumentAssistant;
    use crate::attachments::ImageAttachment;
    use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
    use crate::session::Role;
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// Start interactive chat mode
    ///
    /// # Errors
    ///
    /// Returns error if the provider or the terminal cannot be set up.
    /// Failures of individual messages are printed and the loop continues.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gemma_chat::commands::chat;
    /// use gemma_chat::config::Config;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// chat::run_chat(Config::default()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_chat(config: Config) -> Result<()> {
        tracing::info!("Starting interactive chat mode");

        let assistant = DocumentAssistant::new(build_session(&config, config.session.to_options())?);
        let mut rl = DefaultEditor::new()?;

        print_welcome_banner(&config, assistant.session());

        loop {
            match rl.readline(&format!("{} ", "you>".green().bold())) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(trimmed)?;

                    let command = match parse_special_command(trimmed) {
                        Ok(command) => command,
                        Err(e) => {
                            eprintln!("{}", e.to_string().red());
                            continue;
                        }
                    };

                    let outcome = match command {
                        SpecialCommand::Exit => break,
                        SpecialCommand::Help => {
                            print_help();
                            continue;
                        }
                        SpecialCommand::Reset => match assistant.session().reset() {
                            Ok(()) => {
                                println!("{}\n", "Conversation reset.".yellow());
                                continue;
                            }
                            Err(e) => Err(e),
                        },
                        SpecialCommand::ShowHistory => {
                            print_history(assistant.session());
                            continue;
                        }
                        SpecialCommand::ShowStatus => {
                            print_status_display(&config, assistant.session());
                            continue;
                        }
                        SpecialCommand::ListModels => {
                            match models::fetch_models(assistant.session().provider().as_ref())
                                .await
                            {
                                Ok(list) if list.is_empty() => println!("No models available\n"),
                                Ok(list) => {
                                    models::models_table(&list).printstd();
                                    println!();
                                }
                                Err(e) => eprintln!("{}\n", format!("Error: {:#}", e).red()),
                            }
                            continue;
                        }
                        SpecialCommand::AttachImage { source, prompt } => {
                            match ImageAttachment::load(&source).await {
                                Ok(image) => assistant.analyze_image(image, prompt.as_deref()).await,
                                Err(e) => Err(e),
                            }
                        }
                        SpecialCommand::Summarize(path) => {
                            println!("{}", format!("Summarizing {}", path.display()).cyan());
                            assistant.summarize_document(&path).await
                        }
                        SpecialCommand::None => {
                            assistant.session().send_message(trimmed, Vec::new()).await
                        }
                    };

                    match outcome {
                        Ok(reply) => print_reply(&reply),
                        Err(e) => eprintln!("{}\n", format!("Error: {:#}", e).red()),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome_banner(config: &Config, session: &ConversationSession) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║              gemma-chat Interactive Chat                     ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!(
            "Model: {} via {}",
            config.active_model().cyan(),
            config.provider.provider_type
        );
        if !session.options().multi_turn {
            println!("{}", "Single-turn mode: earlier messages are not sent".yellow());
        }
        println!("Type '/help' for available commands, 'exit' to quit\n");
    }

    /// Display the session's provider, options, and size
    fn print_status_display(config: &Config, session: &ConversationSession) {
        let options = session.options();
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                   gemma-chat Session Status                  ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!("Provider:          {}", config.provider.provider_type);
        println!("Model:             {}", config.active_model());
        println!("Session:           {}", session.id());
        println!("Multi-turn:        {}", options.multi_turn);
        println!("Modality:          {:?}", options.modality);
        println!("Sampling:          {}", options.sampling);
        match options.max_context_tokens {
            Some(budget) => println!("Context Budget:    {} tokens", budget),
            None => println!("Context Budget:    unlimited"),
        }
        println!("Conversation Size: {} turns", session.turn_count());
        println!();
    }

    fn print_history(session: &ConversationSession) {
        let history = session.history();
        if history.is_empty() {
            println!("No turns yet\n");
            return;
        }
        for turn in history.iter() {
            let label = match turn.role() {
                Role::User => "user".green().bold(),
                Role::Model => "model".blue().bold(),
            };
            let images = if turn.attachments().is_empty() {
                String::new()
            } else {
                format!(" [{} image(s)]", turn.attachments().len())
            };
            println!("{}{}: {}", label, images.dimmed(), turn.text());
        }
        println!();
    }
}

// One-shot generation handler
pub mod generate {
    //! Single prompt, single reply.

    use super::*;

    /// Send `prompt` on a fresh single-turn session and print the reply
    ///
    /// # Errors
    ///
    /// Returns error if the provider cannot be created or generation fails
    pub async fn run_generate(config: Config, prompt: String) -> Result<()> {
        tracing::info!("Generating a single reply");
        let options = one_shot_options(&config, Modality::TextOnly);
        let session = build_session(&config, options)?;
        let reply = session.send_message(prompt, Vec::new()).await?;
        print_reply(&reply);
        Ok(())
    }
}

// Image analysis handler
pub mod image {
    //! One-shot image analysis. Always runs a multimodal session.

    use super::*;
    use crate::assistant::DocumentAssistant;
    use crate::attachments::ImageAttachment;

    /// Analyze the image at `source`, a file path or `http(s)` URL,
    /// optionally answering `prompt`
    ///
    /// # Errors
    ///
    /// Returns `GemmaChatError::Image` if the image cannot be loaded or is not
    /// a supported format, or the generation failure
    pub async fn run_image(config: Config, source: &str, prompt: Option<String>) -> Result<()> {
        tracing::info!("Analyzing image {}", source);
        let image = ImageAttachment::load(source).await?;
        let options = one_shot_options(&config, Modality::Multimodal);
        let assistant = DocumentAssistant::new(build_session(&config, options)?);
        let reply = assistant.analyze_image(image, prompt.as_deref()).await?;
        print_reply(&reply);
        Ok(())
    }
}

// Document summary handler
pub mod summarize {
    //! Summarize a text, PDF, or DOCX document or describe an image file.

    use super::*;
    use crate::assistant::DocumentAssistant;
    use std::path::Path;

    /// Summarize the document at `path`
    ///
    /// Image files get a multimodal session; other documents are sent as
    /// text. Long documents are summarized part by part, each part on a
    /// fresh window.
    ///
    /// # Errors
    ///
    /// Returns `GemmaChatError::Document` for unsupported or empty files,
    /// or the generation failure
    pub async fn run_summarize(config: Config, path: &Path) -> Result<()> {
        tracing::info!("Summarizing {}", path.display());
        let options = one_shot_options(&config, Modality::Multimodal);
        let assistant = DocumentAssistant::new(build_session(&config, options)?);
        let summary = assistant.summarize_document(path).await?;
        print_reply(&summary);
        Ok(())
    }
}

// Topic expert handler
pub mod expert {
    //! Interactive chat with a model primed as a topic expert.

    use super::*;
    use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
    use crate::expert::{load_knowledge, TopicExpert};
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use std::path::PathBuf;

    /// Prime an expert on `topic` and answer questions until exit
    ///
    /// Supports `/reset` (which re-primes), `/help`, and `/exit`; other
    /// special commands are reported as unavailable.
    ///
    /// # Errors
    ///
    /// Returns error if the knowledge file cannot be read, the provider
    /// cannot be created, or priming fails
    pub async fn run_expert(config: Config, topic: String, knowledge: Option<PathBuf>) -> Result<()> {
        tracing::info!("Starting topic expert on {}", topic);

        let knowledge = knowledge.map(|path| load_knowledge(&path)).transpose()?;
        let session = build_session(&config, config.session.to_options())?;
        let expert = TopicExpert::new(session, topic, knowledge);

        println!("{}", format!("Priming expert on {}...", expert.topic()).cyan());
        let acknowledgement = expert.prime().await?;
        print_reply(&acknowledgement);

        let mut rl = DefaultEditor::new()?;
        let prompt = format!("{} ", format!("{}>", expert.topic()).green().bold());

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(trimmed)?;

                    let outcome = match parse_special_command(trimmed) {
                        Ok(SpecialCommand::Exit) => break,
                        Ok(SpecialCommand::Help) => {
                            print_help();
                            continue;
                        }
                        Ok(SpecialCommand::Reset) => expert.reset().await,
                        Ok(SpecialCommand::None) => expert.ask(trimmed).await,
                        Ok(other) => {
                            eprintln!(
                                "{}\n",
                                format!("{:?} is not available in expert mode", other).yellow()
                            );
                            continue;
                        }
                        Err(e) => {
                            eprintln!("{}", e.to_string().red());
                            continue;
                        }
                    };

                    match outcome {
                        Ok(reply) => print_reply(&reply),
                        Err(e) => eprintln!("{}\n", format!("Error: {:#}", e).red()),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }
}

// HTTP server handler
pub mod serve {
    //! Run the HTTP API.

    use super::*;

    /// Serve the API on `bind`, or `server.bind` from config
    ///
    /// # Errors
    ///
    /// Returns error if the provider cannot be created or the address
    /// cannot be bound
    pub async fn run_serve(config: Config, bind: Option<String>) -> Result<()> {
        let bind = bind.unwrap_or_else(|| config.server.bind.clone());
        let provider = shared_provider(&config)?;
        crate::server::serve(&config, provider, &bind).await
    }
}
