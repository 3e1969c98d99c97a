use chrono::Utc;
use poise::serenity_prelude::User;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::embeds;
use crate::models::escalation::PunishmentAction;
use crate::services::moderation::notifier::Notice;
use crate::utils::formatting::{format_seconds, truncate};

/// Warn a user; accumulated severity may trigger automatic punishment
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MODERATE_MEMBERS",
    default_member_permissions = "MODERATE_MEMBERS"
)]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "User to warn"] user: User,
    #[description = "Reason for the warning"] reason: String,
    #[description = "Severity 1-3 (default 1)"]
    #[min = 1]
    #[max = 3]
    severity: Option<u32>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();
    let severity = severity.unwrap_or(1) as u8;
    let data = ctx.data();

    let config = data.configs.get(guild_id).await?;
    if config.require_reason && reason.trim().is_empty() {
        let embed = embeds::error_embed()
            .title("Reason Required")
            .description("This server requires a reason for every warning.");
        ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
            .await?;
        return Ok(());
    }

    // Decide the escalation before recording, so the new warning's severity
    // is not counted twice
    let decision = data
        .escalation
        .calculate_punishment(guild_id, user.id.get(), severity, Utc::now())
        .await?;

    let warning = data
        .ledger
        .add_warning(guild_id, user.id.get(), &reason, severity, ctx.author().id.get())
        .await?;

    // The warning is durable at this point; a failed punishment never rolls
    // it back
    let mut applied = None;
    let mut punishment_note = None;
    if let Some(d) = &decision {
        match data
            .punisher
            .apply(guild_id, user.id.get(), d.action, d.duration_seconds, &d.explanation)
            .await
        {
            Ok(()) => applied = Some((d.action, d.duration_seconds)),
            Err(e) => {
                tracing::warn!(
                    "Automatic punishment failed for user {} in guild {}: {}",
                    user.id,
                    guild_id,
                    e
                );
                punishment_note = Some(format!("Automatic punishment failed: {}", e));
            }
        }
    }

    if config.dm_notifications && !matches!(applied, Some((PunishmentAction::Ban, _))) {
        let mut dm_text = format!(
            "You received a warning (severity {}) in this server: {}",
            severity, reason
        );
        if let Some((action, duration)) = applied {
            dm_text.push_str(&format!("\n{}", describe_punishment(action, duration)));
        }
        data.platform.dm(user.id.get(), &dm_text).await;
    }

    data.notifier
        .announce(
            guild_id,
            Notice::WarningIssued {
                user_id: user.id.get(),
                warning_id: warning.id.clone(),
                severity,
                reason: reason.clone(),
                moderator_id: ctx.author().id.get(),
                punishment: applied,
            },
        )
        .await;

    let mut embed = embeds::warning_embed()
        .title("Warning Issued")
        .field("User", format!("<@{}>", user.id), true)
        .field("Severity", format!("Level {}", severity), true)
        .field("Warning ID", warning.id.clone(), true)
        .field("Reason", reason, false);
    if let Some((action, duration)) = applied {
        embed = embed.field(
            "Automated Punishment",
            describe_punishment(action, duration),
            false,
        );
    }
    if let Some(note) = punishment_note {
        embed = embed.field("Note", note, false);
    }
    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

/// Lift an active timed mute early
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MODERATE_MEMBERS",
    default_member_permissions = "MODERATE_MEMBERS"
)]
pub async fn unmute(
    ctx: Context<'_>,
    #[description = "User to unmute"] user: User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();

    let lifted = ctx.data().punisher.unmute(guild_id, user.id.get()).await?;

    let embed = if lifted {
        embeds::success_embed()
            .title("User Unmuted")
            .description(format!("<@{}> has been unmuted.", user.id))
    } else {
        embeds::error_embed()
            .title("Not Muted")
            .description(format!("<@{}> has no active mute on record.", user.id))
    };
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

/// View a user's warning record
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MODERATE_MEMBERS",
    default_member_permissions = "MODERATE_MEMBERS"
)]
pub async fn infractions(
    ctx: Context<'_>,
    #[description = "User to look up"] user: User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();
    let warnings = ctx.data().ledger.get_warnings(guild_id, user.id.get()).await?;

    let description = if warnings.is_empty() {
        "No warnings on record.".to_string()
    } else {
        warnings
            .iter()
            .map(|w| {
                let status = if w.redeemed {
                    "redeemed"
                } else if w.appealed {
                    "appeal pending"
                } else {
                    "active"
                };
                format!(
                    "`{}` Level {} — {} ({}, <t:{}:R>)",
                    w.id,
                    w.severity,
                    truncate(&w.reason, 80),
                    status,
                    w.timestamp.timestamp()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let embed = embeds::info_embed()
        .title(format!("Infractions for {}", user.name))
        .description(description);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

/// Appeal one of your warnings
#[poise::command(slash_command, guild_only)]
pub async fn appeal(
    ctx: Context<'_>,
    #[description = "Warning id, e.g. w1"] warning_id: String,
    #[description = "Why the warning should be lifted"] reason: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();
    let data = ctx.data();
    let user_id = ctx.author().id.get();

    match data
        .ledger
        .mark_appealed(guild_id, user_id, &warning_id, &reason, Utc::now())
        .await
    {
        Ok(_) => {
            data.notifier
                .announce(
                    guild_id,
                    Notice::AppealSubmitted {
                        user_id,
                        warning_id: warning_id.clone(),
                        reason,
                    },
                )
                .await;
            let embed = embeds::success_embed()
                .title("Appeal Submitted")
                .description("Moderators will review your appeal soon.");
            ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
                .await?;
        }
        Err(Error::Validation(msg)) => {
            let embed = embeds::error_embed().title("Appeal Rejected").description(msg);
            ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
                .await?;
        }
        Err(e) => return Err(e),
    }

    Ok(())
}

#[derive(Debug, poise::ChoiceParameter)]
pub enum AppealDecision {
    #[name = "approve"]
    Approve,
    #[name = "deny"]
    Deny,
}

/// Approve or deny a warning appeal
#[poise::command(
    slash_command,
    guild_only,
    rename = "manageappeal",
    required_permissions = "MODERATE_MEMBERS",
    default_member_permissions = "MODERATE_MEMBERS"
)]
pub async fn manage_appeal(
    ctx: Context<'_>,
    #[description = "User whose appeal to resolve"] user: User,
    #[description = "Warning id, e.g. w1"] warning_id: String,
    #[description = "Decision"] decision: AppealDecision,
    #[description = "Note sent to the user"] response: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();
    let data = ctx.data();
    let approved = matches!(decision, AppealDecision::Approve);

    let resolved = match data
        .ledger
        .resolve_appeal(
            guild_id,
            user.id.get(),
            &warning_id,
            approved,
            ctx.author().id.get(),
            response.as_deref(),
        )
        .await
    {
        Ok(w) => w,
        Err(Error::Validation(msg)) => {
            let embed = embeds::error_embed().title("Cannot Resolve").description(msg);
            ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
                .await?;
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let config = data.configs.get(guild_id).await?;
    if config.dm_notifications {
        let dm_text = if approved {
            format!("Your appeal for warning {} was approved.", warning_id)
        } else {
            format!("Your appeal for warning {} was denied.", warning_id)
        };
        let dm_text = match &resolved.appeal_response {
            Some(note) => format!("{}\nModerator note: {}", dm_text, note),
            None => dm_text,
        };
        data.platform.dm(user.id.get(), &dm_text).await;
    }

    data.notifier
        .announce(
            guild_id,
            Notice::AppealResolved {
                user_id: user.id.get(),
                warning_id: warning_id.clone(),
                approved,
                handler_id: ctx.author().id.get(),
                response: resolved.appeal_response.clone(),
            },
        )
        .await;

    let embed = embeds::success_embed()
        .title(if approved { "Appeal Approved" } else { "Appeal Denied" })
        .description(format!(
            "Appeal on warning {} for <@{}> has been {}.",
            warning_id,
            user.id,
            if approved { "approved" } else { "denied" }
        ));
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

fn describe_punishment(action: PunishmentAction, duration_seconds: u64) -> String {
    match action {
        PunishmentAction::Mute => format!("Muted for {}", format_seconds(duration_seconds)),
        PunishmentAction::Kick => "Kicked from server".to_string(),
        PunishmentAction::Ban => "Banned from server".to_string(),
    }
}
