// Loggings - Discord server logging bot
// Posts guild membership events into a configured channel

mod api;
mod commands;
mod features;
mod models;
mod utils;

use std::env;
use std::sync::Arc;

use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::database::{PostgresStore, SettingsStore, SqliteStore};
use crate::features::settings_manager::SettingsManager;
use crate::utils::config::{AppConfig, DatabaseDriver, DEFAULT_CONFIG_FILE};

/// User data shared across all commands and event handlers
pub struct Data {
    pub settings: Arc<SettingsManager>,
}

// Manual Debug impl since SettingsManager holds a trait-object store
impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("settings", &"SettingsManager")
            .finish()
    }
}

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Register all slash commands
fn get_commands() -> Vec<poise::Command<Data, Error>> {
    vec![commands::logging::logging()]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "loggings=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_file = env::var("LOGGINGS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
    let config = AppConfig::load(&config_file)?;

    info!("Starting loggings...");

    let store: Arc<dyn SettingsStore> = match config.database.driver {
        DatabaseDriver::Sqlite => Arc::new(
            SqliteStore::open(&config.database.dsn)
                .with_context(|| format!("Failed to open database {}", config.database.dsn))?,
        ),
        DatabaseDriver::Postgres => Arc::new(
            PostgresStore::connect(&config.database.dsn)
                .await
                .context("Failed to connect to postgres")?,
        ),
    };
    info!("Using {:?} settings store", config.database.driver);

    // No partial-load mode: without every guild's settings the bot does not start
    let settings = SettingsManager::load(store)
        .await
        .context("Failed to load guild settings")?;
    info!("Loaded settings for {} guild(s)", settings.len().await);
    let settings = Arc::new(settings);

    // Setup framework
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: get_commands(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(features::member_log::handle_event(ctx, event, framework, data))
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Command error: {:?}", error);
                            let _ = ctx.say(format!("error: {}", error)).await;
                        }
                        err => {
                            error!("Framework error: {:?}", err);
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                info!("Bot is ready! Registering commands...");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Commands registered successfully!");

                Ok(Data { settings })
            })
        })
        .build();

    // GUILD_MEMBERS is privileged, enable it in the Discord Developer Portal
    let intents = serenity::GatewayIntents::GUILDS | serenity::GatewayIntents::GUILD_MEMBERS;

    let mut client = serenity::ClientBuilder::new(&config.discord.token, intents)
        .framework(framework)
        .await
        .context("Failed to create client")?;

    // Run with graceful shutdown
    let shard_manager = client.shard_manager.clone();

    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(signal) => info!("Received {}, shutting down...", signal),
            Err(e) => {
                error!("Failed to register shutdown signal handler: {:?}", e);
                return;
            }
        }
        shard_manager.shutdown_all().await;
    });

    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    info!("Goodbye!");
    Ok(())
}

/// Wait for Ctrl+C, or SIGTERM on unix (container and service stops)
async fn shutdown_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|_| "Ctrl+C")
    }
}
