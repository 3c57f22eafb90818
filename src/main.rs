//! gemma-chat - Multi-turn conversations with Gemma 3 models
//!
#![doc = "gemma-chat - Multi-turn conversations with Gemma 3 models"]
#![doc = "Main entry point for the gemma-chat application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gemma_chat::cli::{Cli, Commands, ModelCommand};
use gemma_chat::commands;
use gemma_chat::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up GOOGLE_API_KEY and GEMMA_CHAT_* from a local .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Chat => {
            commands::chat::run_chat(config).await?;
            Ok(())
        }
        Commands::Generate { prompt } => {
            tracing::debug!("Prompt length: {} characters", prompt.chars().count());
            commands::generate::run_generate(config, prompt).await?;
            Ok(())
        }
        Commands::Image { path, prompt } => {
            commands::image::run_image(config, &path, prompt).await?;
            Ok(())
        }
        Commands::Summarize { path } => {
            commands::summarize::run_summarize(config, &path).await?;
            Ok(())
        }
        Commands::Expert { topic, knowledge } => {
            if let Some(k) = &knowledge {
                tracing::debug!("Loading knowledge from: {}", k.display());
            }
            commands::expert::run_expert(config, topic, knowledge).await?;
            Ok(())
        }
        Commands::Models { command } => match command {
            ModelCommand::List { json } => {
                commands::models::list_models(&config, json).await?;
                Ok(())
            }
        },
        Commands::Serve { bind } => {
            tracing::info!("Starting HTTP server");
            commands::serve::run_serve(config, bind).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects debug output.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "gemma_chat=debug"
    } else {
        "gemma_chat=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
