use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity weight of a warning, 1 (minor) through 3 (severe)
pub const MIN_SEVERITY: u8 = 1;
pub const MAX_SEVERITY: u8 = 3;

/// A single warning on a user's record.
///
/// Core fields are set once at creation; the flag fields are layered on by
/// redemption, the pardon sweep, or appeal resolution. Optional fields carry
/// `serde(default)` so documents written before a field existed still
/// deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    /// Sequential per-user id: w1, w2, ...
    pub id: String,
    pub reason: String,
    pub severity: u8,
    pub timestamp: DateTime<Utc>,
    pub moderator_id: u64,

    #[serde(default)]
    pub redeemed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pardon_reason: Option<String>,

    #[serde(default)]
    pub appealed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appeal_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appeal_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appeal_status: Option<AppealStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appeal_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appeal_handler: Option<u64>,
    /// Cooldown anchor for repeat appeals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_appeal: Option<DateTime<Utc>>,
}

impl Warning {
    pub fn new(
        id: String,
        reason: String,
        severity: u8,
        moderator_id: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            reason,
            severity,
            timestamp,
            moderator_id,
            redeemed: false,
            pardon_reason: None,
            appealed: false,
            appeal_reason: None,
            appeal_time: None,
            appeal_status: None,
            appeal_response: None,
            appeal_handler: None,
            last_appeal: None,
        }
    }

    /// Whether this warning still counts toward escalation at `now`
    pub fn is_active(&self, expiry_seconds: u64, now: DateTime<Utc>) -> bool {
        if self.redeemed {
            return false;
        }
        let age = now.signed_duration_since(self.timestamp).num_seconds();
        age >= 0 && (age as u64) < expiry_seconds
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppealStatus {
    Pending,
    Approved,
    Denied,
}

/// All infractions for one (guild, user) pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfractionRecord {
    #[serde(default)]
    pub warns: Vec<Warning>,
}

/// user_id -> record, for one guild
pub type GuildInfractions = HashMap<u64, InfractionRecord>;

/// guild_id -> guild infractions; the single persisted ledger document
pub type InfractionsDocument = HashMap<u64, GuildInfractions>;
