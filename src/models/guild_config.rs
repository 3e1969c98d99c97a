use serde::{Deserialize, Serialize};

use crate::constants::defaults::{
    DEFAULT_APPEAL_COOLDOWN_DAYS, DEFAULT_CLEANUP_INTERVAL_HOURS, DEFAULT_HISTORY_RETENTION_DAYS,
    DEFAULT_WARNING_EXPIRY_DAYS, SECONDS_PER_DAY, SECONDS_PER_HOUR,
};
use crate::models::escalation::EscalationRules;

pub const GUILD_CONFIG_SCHEMA_VERSION: u32 = 1;

/// Per-guild moderation settings.
///
/// The schema is fixed and versioned; every field has a serde default, so a
/// document written by an older version gains new fields on load instead of
/// needing scattered key checks. Created lazily with these defaults on first
/// access, only ever overwritten, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildConfig {
    pub schema_version: u32,
    /// Channel that receives moderation notices, when configured
    pub log_channel: Option<u64>,
    /// Legacy role-based mute support; timeouts are used when absent
    pub mute_role: Option<u64>,
    /// Days before a warning stops counting toward escalation
    pub warning_expiry_days: u32,
    pub dm_notifications: bool,
    /// When set, the sweeper pardons expired warnings instead of dropping them
    pub auto_pardon: bool,
    pub require_reason: bool,
    pub allow_appeals: bool,
    pub appeal_cooldown_days: u32,
    /// Days a warning stays on record before the sweeper prunes it
    pub history_retention_days: u32,
    pub cleanup_interval_hours: u32,
    pub escalation_rules: EscalationRules,
}

impl Default for GuildConfig {
    fn default() -> Self {
        Self {
            schema_version: GUILD_CONFIG_SCHEMA_VERSION,
            log_channel: None,
            mute_role: None,
            warning_expiry_days: DEFAULT_WARNING_EXPIRY_DAYS,
            dm_notifications: true,
            auto_pardon: false,
            require_reason: true,
            allow_appeals: true,
            appeal_cooldown_days: DEFAULT_APPEAL_COOLDOWN_DAYS,
            history_retention_days: DEFAULT_HISTORY_RETENTION_DAYS,
            cleanup_interval_hours: DEFAULT_CLEANUP_INTERVAL_HOURS,
            escalation_rules: EscalationRules::builtin(),
        }
    }
}

impl GuildConfig {
    /// Escalation-active window in seconds
    pub fn warning_expiry_seconds(&self) -> u64 {
        self.warning_expiry_days as u64 * SECONDS_PER_DAY
    }

    /// Sweep retention window in seconds
    pub fn history_retention_seconds(&self) -> u64 {
        self.history_retention_days as u64 * SECONDS_PER_DAY
    }

    pub fn appeal_cooldown_seconds(&self) -> u64 {
        self.appeal_cooldown_days as u64 * SECONDS_PER_DAY
    }

    pub fn cleanup_interval_seconds(&self) -> u64 {
        self.cleanup_interval_hours as u64 * SECONDS_PER_HOUR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = GuildConfig::default();
        assert_eq!(config.warning_expiry_days, 30);
        assert_eq!(config.history_retention_days, 180);
        assert_eq!(config.cleanup_interval_hours, 24);
        assert_eq!(config.appeal_cooldown_days, 7);
        assert!(config.dm_notifications);
        assert!(config.require_reason);
        assert!(config.allow_appeals);
        assert!(!config.auto_pardon);
        assert!(config.log_channel.is_none());
    }

    #[test]
    fn partial_document_gains_missing_fields_on_load() {
        // A config written before most fields existed still deserializes,
        // with defaults merged in for everything absent.
        let json = r#"{"log_channel": 1234, "auto_pardon": true}"#;
        let config: GuildConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.log_channel, Some(1234));
        assert!(config.auto_pardon);
        assert_eq!(config.warning_expiry_days, 30);
        assert_eq!(config.escalation_rules, EscalationRules::builtin());
    }
}
