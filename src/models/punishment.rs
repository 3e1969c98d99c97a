use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::escalation::PunishmentAction;

/// A timed punishment awaiting automatic reversal.
///
/// Persisted so a restart during an active mute can reschedule or lift the
/// reversal instead of leaving the timeout stuck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivePunishment {
    pub guild_id: u64,
    pub user_id: u64,
    pub kind: PunishmentAction,
    pub end_time: DateTime<Utc>,
}

impl ActivePunishment {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_time <= now
    }
}

/// The persisted `active_punishments/default` document
pub type ActivePunishmentsDocument = Vec<ActivePunishment>;
