use ::serenity::all::ClientBuilder;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tunes::commands::general::{animal::*, hello::*, poll::*, roll::*};
use tunes::config::Config;
use tunes::{CommandResult, Context, Data, Error};

#[poise::command(slash_command, category = "General")]
async fn help(
    ctx: Context<'_>,
    #[description = "Specific command to show help about"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> CommandResult {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            show_context_menu_commands: true,
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.into())
}

#[poise::command(prefix_command, hide_in_help)]
async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx)
        .await
        .map_err(|e| e.into())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize logging with debug level for our crate
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tunes=debug,warn")),
        )
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true)
        .with_ansi(true)
        .pretty()
        .init();

    dotenv().ok();

    let config = Config::from_env()?;

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let mut commands = vec![
        // Default commands
        register(),
        help(),
        // General commands
        hello(),
        roll(),
        poll(),
        animal(),
    ];

    // Handle Music feature
    #[cfg(feature = "music")]
    {
        use tunes::commands::music::{
            connect::*, disconnect::*, play::*, queue::*, skip::*,
        };

        commands.extend(vec![play(), skip(), queue(), connect(), disconnect()]);
    }

    let data = build_data(&config);
    let guild_id = config.guild_id;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands,
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                match guild_id {
                    Some(guild_id) => {
                        poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            guild_id,
                        )
                        .await?;
                        info!("Registered slash commands in guild {}", guild_id);
                    }
                    None => {
                        poise::builtins::register_globally(ctx, &framework.options().commands)
                            .await?;
                        info!("Registered slash commands globally");
                    }
                }
                Ok(data)
            })
        });

    let client_builder = ClientBuilder::new(&config.discord_token, intents).framework(framework.build());

    // Create and run client
    build_and_start_client(client_builder).await
}

#[cfg(feature = "music")]
fn build_data(config: &Config) -> Data {
    use std::sync::Arc;
    use tunes::{PlaybackManager, YtDlpResolver};

    let resolver = Arc::new(YtDlpResolver::from_config(config));
    info!("Downloading audio to {}", config.song_dir.display());

    Data {
        playback: PlaybackManager::new(resolver),
        default_volume: config.default_volume,
    }
}

#[cfg(not(feature = "music"))]
fn build_data(_config: &Config) -> Data {
    Data {}
}

async fn build_and_start_client(client_builder: ClientBuilder) -> Result<(), Error> {
    #[cfg(feature = "music")]
    let mut client = {
        use songbird::SerenityInit;

        client_builder.register_songbird().await?
    };

    #[cfg(not(feature = "music"))]
    let mut client = client_builder.await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, closing shards");
                shard_manager.shutdown_all().await;
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    client.start().await.map_err(Into::into)
}
