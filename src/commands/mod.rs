pub mod config;
pub mod moderation;

use std::sync::Arc;

use crate::bot::data::Data;
use crate::bot::error::Error;

/// All slash commands the bot registers
pub fn all() -> Vec<poise::Command<Arc<Data>, Error>> {
    vec![
        moderation::warn(),
        moderation::unmute(),
        moderation::infractions(),
        moderation::appeal(),
        moderation::manage_appeal(),
        config::modconfig(),
    ]
}
