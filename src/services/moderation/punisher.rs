use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bot::error::Error;
use crate::constants::defaults::BAN_DELETE_MESSAGE_DAYS;
use crate::constants::namespaces;
use crate::models::escalation::PunishmentAction;
use crate::models::punishment::{ActivePunishment, ActivePunishmentsDocument};
use crate::services::moderation::platform::Platform;
use crate::store::DocumentStore;

/// Executes calculated punishments against the platform and tracks timed
/// ones until their scheduled reversal.
///
/// Active mutes are persisted, so `reconcile` can lift or reschedule them
/// after a restart instead of leaving a timeout stuck. Both gates (bot
/// permission, role hierarchy) run before any mutating platform call.
pub struct Punisher {
    platform: Arc<dyn Platform>,
    store: Arc<DocumentStore>,
    active: DashMap<(u64, u64), ActiveEntry>,
}

struct ActiveEntry {
    punishment: ActivePunishment,
    reversal: Option<JoinHandle<()>>,
}

impl Punisher {
    pub fn new(platform: Arc<dyn Platform>, store: Arc<DocumentStore>) -> Arc<Self> {
        Arc::new(Self {
            platform,
            store,
            active: DashMap::new(),
        })
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    /// Whether a timed punishment is currently tracked for this user
    pub fn has_active(&self, guild_id: u64, user_id: u64) -> bool {
        self.active.contains_key(&(guild_id, user_id))
    }

    /// Apply a punishment. Permission and hierarchy checks run first and a
    /// failure of either returns `PermissionDenied` with nothing done.
    pub async fn apply(
        self: &Arc<Self>,
        guild_id: u64,
        user_id: u64,
        action: PunishmentAction,
        duration_seconds: u64,
        reason: &str,
    ) -> Result<(), Error> {
        if !self.platform.can_act(guild_id, action).await? {
            return Err(Error::permission(format!(
                "Bot lacks the permission required to {} members",
                action
            )));
        }
        if !self.platform.outranks(guild_id, user_id).await? {
            return Err(Error::permission(
                "Bot's role is not above the target's in the hierarchy",
            ));
        }

        match action {
            PunishmentAction::Mute => {
                let end_time = Utc::now() + chrono::Duration::seconds(duration_seconds as i64);
                self.platform
                    .timeout(guild_id, user_id, end_time, reason)
                    .await?;

                self.track_mute(guild_id, user_id, end_time, duration_seconds);
                self.persist().await;
                info!(
                    "Muted user {} in guild {} for {}s ({})",
                    user_id, guild_id, duration_seconds, reason
                );
            }
            PunishmentAction::Kick => {
                self.platform.kick(guild_id, user_id, reason).await?;
                info!("Kicked user {} from guild {} ({})", user_id, guild_id, reason);
            }
            PunishmentAction::Ban => {
                self.platform
                    .ban(guild_id, user_id, reason, BAN_DELETE_MESSAGE_DAYS)
                    .await?;
                info!("Banned user {} from guild {} ({})", user_id, guild_id, reason);
            }
        }
        Ok(())
    }

    /// Lift a tracked mute early. Returns false when no mute was tracked.
    pub async fn unmute(self: &Arc<Self>, guild_id: u64, user_id: u64) -> Result<bool, Error> {
        let Some((_, entry)) = self.active.remove(&(guild_id, user_id)) else {
            return Ok(false);
        };
        if let Some(task) = entry.reversal {
            task.abort();
        }
        self.platform.remove_timeout(guild_id, user_id).await?;
        self.persist().await;
        info!("Unmuted user {} in guild {}", user_id, guild_id);
        Ok(true)
    }

    /// Restore state after a restart: lift already-expired mutes, reschedule
    /// reversal timers for the rest.
    pub async fn reconcile(self: &Arc<Self>, now: DateTime<Utc>) -> Result<(), Error> {
        let persisted: ActivePunishmentsDocument = self
            .store
            .load_or_default(namespaces::ACTIVE_PUNISHMENTS, namespaces::DEFAULT_KEY)
            .await?;

        let mut restored = 0usize;
        let mut lifted = 0usize;
        for punishment in persisted {
            if punishment.is_expired(now) {
                if let Err(e) = self
                    .platform
                    .remove_timeout(punishment.guild_id, punishment.user_id)
                    .await
                {
                    warn!(
                        "Could not lift expired mute for user {} in guild {}: {}",
                        punishment.user_id, punishment.guild_id, e
                    );
                }
                lifted += 1;
            } else {
                let remaining = (punishment.end_time - now).num_seconds().max(0) as u64;
                self.track_mute(
                    punishment.guild_id,
                    punishment.user_id,
                    punishment.end_time,
                    remaining,
                );
                restored += 1;
            }
        }

        self.persist().await;
        if restored > 0 || lifted > 0 {
            info!(
                "Reconciled active punishments: {} rescheduled, {} lifted as expired",
                restored, lifted
            );
        }
        Ok(())
    }

    /// Drop tracked punishments whose end time has passed, lifting the
    /// timeout if the reversal task has not already done so
    pub async fn prune_expired(self: &Arc<Self>, now: DateTime<Utc>) {
        let expired: Vec<(u64, u64)> = self
            .active
            .iter()
            .filter(|entry| entry.punishment.is_expired(now))
            .map(|entry| *entry.key())
            .collect();

        for (guild_id, user_id) in expired {
            if let Err(e) = self.unmute(guild_id, user_id).await {
                warn!(
                    "Could not prune expired mute for user {} in guild {}: {}",
                    user_id, guild_id, e
                );
            }
        }
    }

    /// Abort reversal timers on shutdown. Entries stay persisted, so the next
    /// startup reconciles them.
    pub fn shutdown(&self) {
        for mut entry in self.active.iter_mut() {
            if let Some(task) = entry.reversal.take() {
                task.abort();
            }
        }
    }

    fn track_mute(
        self: &Arc<Self>,
        guild_id: u64,
        user_id: u64,
        end_time: DateTime<Utc>,
        duration_seconds: u64,
    ) {
        self.active.insert(
            (guild_id, user_id),
            ActiveEntry {
                punishment: ActivePunishment {
                    guild_id,
                    user_id,
                    kind: PunishmentAction::Mute,
                    end_time,
                },
                reversal: None,
            },
        );

        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(duration_seconds)).await;
            if let Some(punisher) = weak.upgrade() {
                punisher.complete_reversal(guild_id, user_id).await;
            }
        });

        if let Some(mut entry) = self.active.get_mut(&(guild_id, user_id)) {
            entry.reversal = Some(handle);
        }
    }

    /// Reversal-task path: must not abort its own join handle, or the
    /// timeout removal would be cancelled mid-flight
    async fn complete_reversal(self: &Arc<Self>, guild_id: u64, user_id: u64) {
        // An explicit unmute may have cleared the entry already
        if self.active.remove(&(guild_id, user_id)).is_none() {
            debug!(
                "Reversal for user {} in guild {} already handled",
                user_id, guild_id
            );
            return;
        }
        if let Err(e) = self.platform.remove_timeout(guild_id, user_id).await {
            error!(
                "Failed to lift expired mute for user {} in guild {}: {}",
                user_id, guild_id, e
            );
        } else {
            info!("Mute expired for user {} in guild {}", user_id, guild_id);
        }
        self.persist().await;
    }

    /// Snapshot the tracked punishments to the store. A failed save is
    /// logged, not propagated: the punishment itself already took effect.
    async fn persist(&self) {
        let snapshot: ActivePunishmentsDocument = self
            .active
            .iter()
            .map(|entry| entry.punishment.clone())
            .collect();
        if let Err(e) = self
            .store
            .save(namespaces::ACTIVE_PUNISHMENTS, namespaces::DEFAULT_KEY, &snapshot)
            .await
        {
            warn!("Failed to persist active punishments: {}", e);
        }
    }
}
