use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::all::{
    Cache, ChannelId, CreateMessage, EditMember, GuildId, Http, Permissions, Timestamp, UserId,
};
use tracing::debug;

use crate::bot::error::Error;
use crate::models::escalation::PunishmentAction;

/// The chat platform's moderation surface, behind a trait so the punisher can
/// be exercised against a mock. Every method is a fallible remote call.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Whether the bot holds the permission `action` requires in this guild
    async fn can_act(&self, guild_id: u64, action: PunishmentAction) -> Result<bool, Error>;

    /// Whether the bot's highest role outranks the target's
    async fn outranks(&self, guild_id: u64, target_id: u64) -> Result<bool, Error>;

    async fn timeout(
        &self,
        guild_id: u64,
        user_id: u64,
        until: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), Error>;

    async fn remove_timeout(&self, guild_id: u64, user_id: u64) -> Result<(), Error>;

    async fn kick(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), Error>;

    async fn ban(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
        delete_message_days: u8,
    ) -> Result<(), Error>;

    /// Best-effort direct message; closed DMs are not an error
    async fn dm(&self, user_id: u64, content: &str);

    /// Best-effort message to a guild channel
    async fn send_to_channel(&self, channel_id: u64, content: &str);
}

/// Production implementation over the Discord REST API
pub struct DiscordPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }

    fn required_permission(action: PunishmentAction) -> Permissions {
        match action {
            PunishmentAction::Mute => Permissions::MODERATE_MEMBERS,
            PunishmentAction::Kick => Permissions::KICK_MEMBERS,
            PunishmentAction::Ban => Permissions::BAN_MEMBERS,
        }
    }
}

#[async_trait]
impl Platform for DiscordPlatform {
    async fn can_act(&self, guild_id: u64, action: PunishmentAction) -> Result<bool, Error> {
        let bot_id = self.cache.current_user().id;
        let member = GuildId::new(guild_id)
            .member((&self.cache, &*self.http), bot_id)
            .await?;
        let permissions = member.permissions(&self.cache)?;
        Ok(permissions.administrator() || permissions.contains(Self::required_permission(action)))
    }

    async fn outranks(&self, guild_id: u64, target_id: u64) -> Result<bool, Error> {
        let bot_id = self.cache.current_user().id;
        let Some(guild) = self.cache.guild(GuildId::new(guild_id)) else {
            // Without the guild cached we cannot compare roles; refuse to act
            return Ok(false);
        };
        let higher =
            guild.greater_member_hierarchy(&self.cache, bot_id, UserId::new(target_id));
        Ok(higher == Some(bot_id))
    }

    async fn timeout(
        &self,
        guild_id: u64,
        user_id: u64,
        until: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), Error> {
        let until = Timestamp::from_unix_timestamp(until.timestamp())
            .map_err(|e| Error::custom(format!("Invalid timeout end time: {}", e)))?;
        let edit = EditMember::new()
            .disable_communication_until_datetime(until)
            .audit_log_reason(reason);
        GuildId::new(guild_id)
            .edit_member(&self.http, UserId::new(user_id), edit)
            .await?;
        Ok(())
    }

    async fn remove_timeout(&self, guild_id: u64, user_id: u64) -> Result<(), Error> {
        let edit = EditMember::new().enable_communication();
        GuildId::new(guild_id)
            .edit_member(&self.http, UserId::new(user_id), edit)
            .await?;
        Ok(())
    }

    async fn kick(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), Error> {
        GuildId::new(guild_id)
            .kick_with_reason(&self.http, UserId::new(user_id), reason)
            .await?;
        Ok(())
    }

    async fn ban(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
        delete_message_days: u8,
    ) -> Result<(), Error> {
        GuildId::new(guild_id)
            .ban_with_reason(&self.http, UserId::new(user_id), delete_message_days, reason)
            .await?;
        Ok(())
    }

    async fn dm(&self, user_id: u64, content: &str) {
        let user_id = UserId::new(user_id);
        match user_id.create_dm_channel(&*self.http).await {
            Ok(dm_channel) => {
                let message = CreateMessage::new().content(content);
                if let Err(e) = dm_channel.send_message(&self.http, message).await {
                    debug!("Could not DM user {}: {:?}", user_id, e);
                }
            }
            Err(e) => {
                debug!("Could not create DM channel for user {}: {:?}", user_id, e);
            }
        }
    }

    async fn send_to_channel(&self, channel_id: u64, content: &str) {
        let channel_id = ChannelId::new(channel_id);
        if let Err(e) = channel_id.say(&self.http, content).await {
            debug!("Could not send to channel {}: {:?}", channel_id, e);
        }
    }
}
