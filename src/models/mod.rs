pub mod escalation;
pub mod guild_config;
pub mod punishment;
pub mod warning;

pub use escalation::{EscalationRule, EscalationRules, PunishmentAction};
pub use guild_config::GuildConfig;
pub use punishment::{ActivePunishment, ActivePunishmentsDocument};
pub use warning::{AppealStatus, GuildInfractions, InfractionRecord, InfractionsDocument, Warning};
