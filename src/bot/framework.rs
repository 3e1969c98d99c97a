use std::sync::Arc;

use chrono::Utc;
use poise::serenity_prelude::{self as serenity, GatewayIntents, GuildId};
use tracing::{error, info, warn};

use crate::bot::data::Data;
use crate::bot::error::Error;
use crate::commands;
use crate::config::Settings;
use crate::services::moderation::platform::{DiscordPlatform, Platform};
use crate::services::moderation::sweeper;

pub async fn run(settings: Settings) -> Result<(), Error> {
    let token = settings.discord_token.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: None, // Slash commands only
                ..Default::default()
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Command error: {:?}", error);
                            let _ = ctx.say(format!("Error: {}", error)).await;
                        }
                        poise::FrameworkError::ArgumentParse { error, ctx, .. } => {
                            let _ = ctx.say(format!("Invalid argument: {}", error)).await;
                        }
                        poise::FrameworkError::UnknownCommand { .. } => {
                            // Pings and stray prefix messages, nothing to do
                        }
                        err => {
                            error!("Framework error: {:?}", err);
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot connected as {}", ready.user.name);

                let platform: Arc<dyn Platform> =
                    Arc::new(DiscordPlatform::new(ctx.http.clone(), ctx.cache.clone()));
                let data = Data::new(settings, platform);

                // Lift or reschedule mutes persisted before the last shutdown
                if let Err(e) = data.punisher.reconcile(Utc::now()).await {
                    warn!("Could not reconcile active punishments: {}", e);
                }

                let handle = sweeper::spawn_sweeper(
                    data.ledger.clone(),
                    data.configs.clone(),
                    data.punisher.clone(),
                    data.notifier.clone(),
                );
                data.set_sweeper(handle);
                info!("Started warning expiry sweeper");

                match data.settings.guild_id {
                    Some(guild_id) => {
                        let guild_id = GuildId::new(guild_id);
                        info!("Registering commands in guild {}", guild_id);
                        poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            guild_id,
                        )
                        .await
                        .map_err(Error::Serenity)?;
                    }
                    None => {
                        info!(
                            "Registering {} commands globally",
                            framework.options().commands.len()
                        );
                        poise::builtins::register_globally(ctx, &framework.options().commands)
                            .await
                            .map_err(Error::Serenity)?;
                    }
                }

                Ok(data)
            })
        })
        .build();

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MEMBERS;

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .map_err(Error::Serenity)?;

    info!("Starting Discord client...");
    client.start().await.map_err(Error::Serenity)
}
