//! Document store namespaces used by the moderation core.

/// All guilds' infraction records, keyed under one document
pub const INFRACTIONS: &str = "infractions";

/// Per-guild settings documents, one key per guild
pub const GUILD_CONFIGS: &str = "guild_configs";

/// Per-guild escalation rule overrides
pub const ESCALATION_CONFIG: &str = "escalation_config";

/// Timed punishments awaiting reversal, reconciled on startup
pub const ACTIVE_PUNISHMENTS: &str = "active_punishments";

/// Shared key for namespaces that store a single document
pub const DEFAULT_KEY: &str = "default";
