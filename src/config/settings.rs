use std::env;
use std::path::PathBuf;

use crate::constants::defaults::DEFAULT_CONFIG_CACHE_TTL_SECONDS;

#[derive(Debug, Clone)]
pub struct Settings {
    pub discord_token: String,
    /// Root directory for the JSON document store
    pub data_dir: PathBuf,
    pub guild_id: Option<u64>,
    /// Guild config cache staleness window in seconds
    pub config_cache_ttl_seconds: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self, String> {
        let discord_token = env::var("DISCORD_TOKEN")
            .map_err(|_| "DISCORD_TOKEN environment variable not set")?;

        let data_dir = env::var("DATA_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));

        let guild_id = env::var("GUILD_ID")
            .ok()
            .and_then(|s| s.parse::<u64>().ok());

        let config_cache_ttl_seconds = env::var("CONFIG_CACHE_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CONFIG_CACHE_TTL_SECONDS);

        Ok(Self {
            discord_token,
            data_dir,
            guild_id,
            config_cache_ttl_seconds,
        })
    }
}
