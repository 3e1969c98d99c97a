/// Guild config cache TTL (can be overridden via CONFIG_CACHE_TTL_SECONDS)
pub const DEFAULT_CONFIG_CACHE_TTL_SECONDS: u64 = 300;

/// Days before a warning stops counting toward escalation
pub const DEFAULT_WARNING_EXPIRY_DAYS: u32 = 30;

/// Days a warning is kept on record before the sweeper prunes it
pub const DEFAULT_HISTORY_RETENTION_DAYS: u32 = 180;

/// Hours between expiry sweeps
pub const DEFAULT_CLEANUP_INTERVAL_HOURS: u32 = 24;

/// Days a user must wait between appeals of the same warning
pub const DEFAULT_APPEAL_COOLDOWN_DAYS: u32 = 7;

/// Backoff after a failed sweep cycle
pub const SWEEP_ERROR_BACKOFF_SECONDS: u64 = 3600;

/// Message history window deleted alongside an escalation ban
pub const BAN_DELETE_MESSAGE_DAYS: u8 = 1;

pub const SECONDS_PER_DAY: u64 = 86400;
pub const SECONDS_PER_HOUR: u64 = 3600;
