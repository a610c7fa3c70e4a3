use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use welfare_record::ai::{FieldExtractor, GeminiClient};
use welfare_record::cli::{Cli, Commands};
use welfare_record::config::Config;
use welfare_record::{server, AppState};
use welfare_record_common::TemplateRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env は任意
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::from_args(&cli.server);
    let registry = TemplateRegistry::from_file(&config.mapping_config).with_context(|| {
        format!("テンプレート設定を読み込めません: {}", config.mapping_config.display())
    })?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Templates { validate } => {
            println!("テンプレート: {}件 ({})", registry.len(), config.mapping_config.display());
            for template in registry.iter() {
                let interim = if template.reads_interim { " [中間評価読込]" } else { "" };
                println!("  {} - {} ({}項目){}", template.id, template.name, template.mapping.len(), interim);
                println!("      {}", template.filename);
            }

            if validate {
                registry.validate()?;
                println!("✔ セル座標はすべて有効です");
            }
        }

        Commands::Serve => {
            registry.validate()?;
            config.ensure_dirs()?;
            tracing::info!(?config, templates = registry.len(), "設定読み込み完了");

            let extractor: Option<Arc<dyn FieldExtractor>> = match GeminiClient::from_config(&config) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    tracing::warn!("{}", e);
                    None
                }
            };

            server::serve(AppState::new(config, registry, extractor)).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
