use std::sync::Arc;

use async_trait::async_trait;

use crate::models::escalation::PunishmentAction;
use crate::models::guild_config::GuildConfig;
use crate::services::moderation::platform::Platform;
use crate::store::ConfigCache;
use crate::utils::formatting::format_seconds;

/// Structured moderation notices. The core decides what to announce; how a
/// notice is rendered belongs to the implementation.
#[derive(Debug, Clone)]
pub enum Notice {
    WarningIssued {
        user_id: u64,
        warning_id: String,
        severity: u8,
        reason: String,
        moderator_id: u64,
        punishment: Option<(PunishmentAction, u64)>,
    },
    AutoPardon {
        user_id: u64,
        warning_id: String,
        reason: String,
        age_days: i64,
    },
    AppealSubmitted {
        user_id: u64,
        warning_id: String,
        reason: String,
    },
    AppealResolved {
        user_id: u64,
        warning_id: String,
        approved: bool,
        handler_id: u64,
        response: Option<String>,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn announce(&self, guild_id: u64, notice: Notice);
}

/// Posts notices to the guild's configured log channel; a guild without one
/// gets no announcements
pub struct DiscordNotifier {
    platform: Arc<dyn Platform>,
    configs: Arc<ConfigCache<GuildConfig>>,
}

impl DiscordNotifier {
    pub fn new(platform: Arc<dyn Platform>, configs: Arc<ConfigCache<GuildConfig>>) -> Self {
        Self { platform, configs }
    }

    fn render(notice: &Notice) -> String {
        match notice {
            Notice::WarningIssued {
                user_id,
                warning_id,
                severity,
                reason,
                moderator_id,
                punishment,
            } => {
                let mut text = format!(
                    "Warning {} issued to <@{}> (severity {}) by <@{}>: {}",
                    warning_id, user_id, severity, moderator_id, reason
                );
                if let Some((action, duration)) = punishment {
                    match action {
                        PunishmentAction::Mute => {
                            text.push_str(&format!(
                                "\nAutomated punishment: muted for {}",
                                format_seconds(*duration)
                            ));
                        }
                        PunishmentAction::Kick => {
                            text.push_str("\nAutomated punishment: kicked from server");
                        }
                        PunishmentAction::Ban => {
                            text.push_str("\nAutomated punishment: banned from server");
                        }
                    }
                }
                text
            }
            Notice::AutoPardon {
                user_id,
                warning_id,
                reason,
                age_days,
            } => format!(
                "Warning {} automatically pardoned for <@{}>\nOriginal reason: {}\nWarning age: {} days",
                warning_id, user_id, reason, age_days
            ),
            Notice::AppealSubmitted {
                user_id,
                warning_id,
                reason,
            } => format!(
                "<@{}> appealed warning {}: {}",
                user_id, warning_id, reason
            ),
            Notice::AppealResolved {
                user_id,
                warning_id,
                approved,
                handler_id,
                response,
            } => {
                let mut text = format!(
                    "Appeal on warning {} for <@{}> {} by <@{}>",
                    warning_id,
                    user_id,
                    if *approved { "approved" } else { "denied" },
                    handler_id
                );
                if let Some(response) = response {
                    text.push_str(&format!("\nNote: {}", response));
                }
                text
            }
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn announce(&self, guild_id: u64, notice: Notice) {
        let channel = match self.configs.get(guild_id).await {
            Ok(config) => config.log_channel,
            Err(_) => None,
        };
        let Some(channel_id) = channel else {
            return;
        };
        self.platform
            .send_to_channel(channel_id, &Self::render(&notice))
            .await;
    }
}
