//! Model listing command for gemma-chat
//!
//! Lists the models the configured provider offers, as a table or JSON.

use crate::config::Config;
use crate::error::{GemmaChatError, Result};
use crate::providers::{self, ModelInfo, Provider};
use prettytable::{cell, row, Table};

/// List available models from the configured provider
///
/// # Examples
///
/// ```no_run
/// use gemma_chat::cli::Cli;
/// use gemma_chat::config::Config;
/// use gemma_chat::commands::models::list_models;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::load("config/config.yaml", &Cli::default())?;
/// list_models(&config, false).await?;
/// # Ok(())
/// # }
/// ```
pub async fn list_models(config: &Config, json: bool) -> Result<()> {
    let provider_type = config.provider.provider_type.as_str();
    tracing::info!("Listing models from provider: {}", provider_type);

    let provider = providers::create_provider(provider_type, &config.provider)?;
    let models = fetch_models(provider.as_ref()).await?;

    if models.is_empty() {
        if json {
            println!("[]");
        } else {
            println!("No models available from provider: {}", provider_type);
        }
        return Ok(());
    }

    if json {
        println!("{}", serialize_pretty(&models)?);
    } else {
        println!("\nAvailable models from {}:\n", provider_type);
        models_table(&models).printstd();
        println!("\nTotal models found: {}\n", models.len());
    }

    Ok(())
}

/// Fetch the provider's models sorted by name
pub async fn fetch_models(provider: &dyn Provider) -> Result<Vec<ModelInfo>> {
    let mut models = provider.list_models().await?;
    models.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(models)
}

pub(crate) fn models_table(models: &[ModelInfo]) -> Table {
    let mut table = Table::new();
    table.add_row(row![
        "Model Name",
        "Display Name",
        "Context Window",
        "Capabilities"
    ]);

    for model in models {
        let capabilities = if model.capabilities.is_empty() {
            "None".to_string()
        } else {
            model
                .capabilities
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };

        table.add_row(row![
            model.name,
            model.display_name,
            format!("{} tokens", model.context_window),
            capabilities
        ]);
    }

    table
}

fn serialize_pretty(models: &[ModelInfo]) -> Result<String> {
    Ok(serde_json::to_string_pretty(models).map_err(GemmaChatError::Serialization)?)
}
