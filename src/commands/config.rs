use poise::serenity_prelude::GuildChannel;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::embeds;
use crate::models::escalation::{EscalationRule, PunishmentAction};
use crate::models::guild_config::GuildConfig;
use crate::utils::formatting::format_seconds;

/// Configure moderation for this server
#[poise::command(
    slash_command,
    guild_only,
    rename = "modconfig",
    required_permissions = "MANAGE_GUILD",
    default_member_permissions = "MANAGE_GUILD",
    subcommands("view", "threshold", "toggle", "log_channel", "timers", "reset")
)]
pub async fn modconfig(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show the current configuration
#[poise::command(slash_command, guild_only)]
pub async fn view(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();
    let data = ctx.data();
    let config = data.configs.get(guild_id).await?;
    let rules = data.escalation.resolved_rules(guild_id).await;

    let rules_text = if rules.is_empty() {
        "No thresholds configured (escalation disabled).".to_string()
    } else {
        rules
            .0
            .iter()
            .map(|(threshold, rule)| match rule.action {
                PunishmentAction::Mute => format!(
                    "{} points: mute for {}",
                    threshold,
                    format_seconds(rule.duration_seconds)
                ),
                action => format!("{} points: {}", threshold, action),
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let log_channel = match config.log_channel {
        Some(id) => format!("<#{}>", id),
        None => "not set".to_string(),
    };

    let embed = embeds::info_embed()
        .title("Moderation Configuration")
        .field("Log channel", log_channel, true)
        .field(
            "DM notifications",
            on_off(config.dm_notifications),
            true,
        )
        .field("Require reason", on_off(config.require_reason), true)
        .field("Allow appeals", on_off(config.allow_appeals), true)
        .field("Auto pardon", on_off(config.auto_pardon), true)
        .field(
            "Warning expiry",
            format!("{} days", config.warning_expiry_days),
            true,
        )
        .field(
            "History retention",
            format!("{} days", config.history_retention_days),
            true,
        )
        .field(
            "Cleanup interval",
            format!("{} hours", config.cleanup_interval_hours),
            true,
        )
        .field(
            "Appeal cooldown",
            format!("{} days", config.appeal_cooldown_days),
            true,
        )
        .field("Escalation thresholds", rules_text, false);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

#[derive(Debug, poise::ChoiceParameter)]
pub enum ThresholdAction {
    #[name = "mute"]
    Mute,
    #[name = "kick"]
    Kick,
    #[name = "ban"]
    Ban,
    #[name = "remove"]
    Remove,
}

/// Set or remove an escalation threshold
#[poise::command(slash_command, guild_only)]
pub async fn threshold(
    ctx: Context<'_>,
    #[description = "Accumulated severity points that trigger the rule"]
    #[min = 1]
    points: u32,
    #[description = "Action at this threshold, or remove"] action: ThresholdAction,
    #[description = "Mute duration in seconds (required for mute)"]
    #[min = 60]
    duration_seconds: Option<u64>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();
    let data = ctx.data();
    let mut rules = data.escalation.resolved_rules(guild_id).await;

    let description = match action {
        ThresholdAction::Remove => {
            if rules.0.remove(&points).is_none() {
                let embed = embeds::error_embed()
                    .title("No Such Threshold")
                    .description(format!("No rule is set at {} points.", points));
                ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
                    .await?;
                return Ok(());
            }
            format!("Removed the rule at {} points.", points)
        }
        ThresholdAction::Mute => {
            let Some(duration) = duration_seconds else {
                let embed = embeds::error_embed()
                    .title("Duration Required")
                    .description("Mute thresholds need a duration in seconds.");
                ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
                    .await?;
                return Ok(());
            };
            rules.0.insert(
                points,
                EscalationRule {
                    action: PunishmentAction::Mute,
                    duration_seconds: duration,
                },
            );
            format!(
                "{} points now mutes for {}.",
                points,
                format_seconds(duration)
            )
        }
        ThresholdAction::Kick | ThresholdAction::Ban => {
            let punishment = match action {
                ThresholdAction::Kick => PunishmentAction::Kick,
                _ => PunishmentAction::Ban,
            };
            rules.0.insert(
                points,
                EscalationRule {
                    action: punishment,
                    duration_seconds: 0,
                },
            );
            format!("{} points now triggers a {}.", points, punishment)
        }
    };

    data.escalation.set_guild_rules(guild_id, rules).await?;

    let embed = embeds::success_embed()
        .title("Threshold Updated")
        .description(description);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

#[derive(Debug, poise::ChoiceParameter)]
pub enum ConfigFlag {
    #[name = "dm_notifications"]
    DmNotifications,
    #[name = "auto_pardon"]
    AutoPardon,
    #[name = "require_reason"]
    RequireReason,
    #[name = "allow_appeals"]
    AllowAppeals,
}

/// Flip a boolean setting on or off
#[poise::command(slash_command, guild_only)]
pub async fn toggle(
    ctx: Context<'_>,
    #[description = "Setting to change"] flag: ConfigFlag,
    #[description = "New value"] enabled: bool,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();
    let data = ctx.data();
    let mut config = data.configs.get(guild_id).await?;

    let name = match flag {
        ConfigFlag::DmNotifications => {
            config.dm_notifications = enabled;
            "DM notifications"
        }
        ConfigFlag::AutoPardon => {
            config.auto_pardon = enabled;
            "Auto pardon"
        }
        ConfigFlag::RequireReason => {
            config.require_reason = enabled;
            "Require reason"
        }
        ConfigFlag::AllowAppeals => {
            config.allow_appeals = enabled;
            "Allow appeals"
        }
    };
    data.configs.set(guild_id, &config).await?;

    let embed = embeds::success_embed()
        .title("Setting Updated")
        .description(format!("{} is now {}.", name, on_off(enabled)));
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

/// Set or clear the moderation log channel
#[poise::command(slash_command, guild_only, rename = "logchannel")]
pub async fn log_channel(
    ctx: Context<'_>,
    #[description = "Channel for moderation notices; omit to clear"] channel: Option<GuildChannel>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();
    let data = ctx.data();
    let mut config = data.configs.get(guild_id).await?;

    config.log_channel = channel.as_ref().map(|c| c.id.get());
    data.configs.set(guild_id, &config).await?;

    let description = match config.log_channel {
        Some(id) => format!("Moderation notices will go to <#{}>.", id),
        None => "Moderation notices are disabled.".to_string(),
    };
    let embed = embeds::success_embed()
        .title("Log Channel Updated")
        .description(description);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

/// Adjust expiry, retention and cleanup timers
#[poise::command(slash_command, guild_only)]
pub async fn timers(
    ctx: Context<'_>,
    #[description = "Days before a warning stops counting toward escalation"]
    #[min = 1]
    warning_expiry_days: Option<u32>,
    #[description = "Days a warning stays on record"]
    #[min = 1]
    history_retention_days: Option<u32>,
    #[description = "Hours between cleanup sweeps"]
    #[min = 1]
    cleanup_interval_hours: Option<u32>,
    #[description = "Days between appeals of the same warning"]
    #[min = 1]
    appeal_cooldown_days: Option<u32>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();
    let data = ctx.data();
    let mut config = data.configs.get(guild_id).await?;

    let mut changes = Vec::new();
    if let Some(days) = warning_expiry_days {
        config.warning_expiry_days = days;
        changes.push(format!("warning expiry: {} days", days));
    }
    if let Some(days) = history_retention_days {
        config.history_retention_days = days;
        changes.push(format!("history retention: {} days", days));
    }
    if let Some(hours) = cleanup_interval_hours {
        config.cleanup_interval_hours = hours;
        changes.push(format!("cleanup interval: {} hours", hours));
    }
    if let Some(days) = appeal_cooldown_days {
        config.appeal_cooldown_days = days;
        changes.push(format!("appeal cooldown: {} days", days));
    }

    if changes.is_empty() {
        let embed = embeds::error_embed()
            .title("Nothing To Change")
            .description("Provide at least one timer to update.");
        ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
            .await?;
        return Ok(());
    }

    data.configs.set(guild_id, &config).await?;

    let embed = embeds::success_embed()
        .title("Timers Updated")
        .description(changes.join("\n"));
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

/// Restore this server's configuration to defaults
#[poise::command(slash_command, guild_only)]
pub async fn reset(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();
    let data = ctx.data();

    data.configs.set(guild_id, &GuildConfig::default()).await?;
    data.escalation.clear_guild_rules(guild_id).await?;

    let embed = embeds::success_embed()
        .title("Configuration Reset")
        .description("All settings and escalation thresholds are back to defaults.");
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
