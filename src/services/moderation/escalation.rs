use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::bot::error::Error;
use crate::constants::namespaces;
use crate::models::escalation::{EscalationRules, PunishmentAction};
use crate::models::guild_config::GuildConfig;
use crate::services::moderation::ledger::InfractionLedger;
use crate::store::{ConfigCache, DocumentStore};

/// The punishment an accumulated severity total calls for
#[derive(Debug, Clone, PartialEq)]
pub struct PunishmentDecision {
    pub action: PunishmentAction,
    pub duration_seconds: u64,
    pub total_severity: u32,
    pub explanation: String,
}

/// Maps accumulated warning severity to an automatic punishment.
///
/// Read-only: it consults the ledger and rule tables but never mutates
/// either. Malformed or missing rule tables fail open to "no action".
pub struct EscalationEngine {
    ledger: Arc<InfractionLedger>,
    configs: Arc<ConfigCache<GuildConfig>>,
    store: Arc<DocumentStore>,
}

impl EscalationEngine {
    pub fn new(
        ledger: Arc<InfractionLedger>,
        configs: Arc<ConfigCache<GuildConfig>>,
        store: Arc<DocumentStore>,
    ) -> Self {
        Self {
            ledger,
            configs,
            store,
        }
    }

    /// Decide the punishment for a warning about to be recorded.
    ///
    /// Sums the user's active warning severities plus `new_severity`, then
    /// picks the highest qualifying threshold. Returns `None` when no
    /// threshold is met. Call this before recording the new warning, so its
    /// severity is not counted twice.
    pub async fn calculate_punishment(
        &self,
        guild_id: u64,
        user_id: u64,
        new_severity: u8,
        now: DateTime<Utc>,
    ) -> Result<Option<PunishmentDecision>, Error> {
        let active = self.ledger.get_active_warnings(guild_id, user_id, now).await?;
        let total_severity: u32 =
            active.iter().map(|w| w.severity as u32).sum::<u32>() + new_severity as u32;

        let rules = self.resolved_rules(guild_id).await;
        let Some((threshold, rule)) = rules.select(total_severity) else {
            return Ok(None);
        };

        Ok(Some(PunishmentDecision {
            action: rule.action,
            duration_seconds: rule.duration_seconds,
            total_severity,
            explanation: format!(
                "Automated escalation: {} warning point(s) reached threshold {}",
                total_severity, threshold
            ),
        }))
    }

    /// Rule table for a guild: stored override if present, else the guild
    /// config's table (which defaults to the built-in one).
    pub async fn resolved_rules(&self, guild_id: u64) -> EscalationRules {
        match self.load_overrides().await {
            Ok(overrides) => {
                if let Some(rules) = overrides.get(&guild_id) {
                    if !rules.is_empty() {
                        return rules.clone();
                    }
                }
            }
            Err(e) => {
                // Fail open: a broken override document must not block the
                // warn flow.
                warn!("Could not load escalation overrides: {}", e);
            }
        }

        match self.configs.get(guild_id).await {
            Ok(config) => config.escalation_rules,
            Err(e) => {
                warn!("Could not load guild {} config: {}", guild_id, e);
                EscalationRules::builtin()
            }
        }
    }

    pub async fn set_guild_rules(
        &self,
        guild_id: u64,
        rules: EscalationRules,
    ) -> Result<(), Error> {
        let mut overrides = self.load_overrides().await?;
        overrides.insert(guild_id, rules);
        self.save_overrides(&overrides).await
    }

    /// Drop a guild's override so it falls back to defaults
    pub async fn clear_guild_rules(&self, guild_id: u64) -> Result<(), Error> {
        let mut overrides = self.load_overrides().await?;
        if overrides.remove(&guild_id).is_some() {
            self.save_overrides(&overrides).await?;
        }
        Ok(())
    }

    async fn load_overrides(&self) -> Result<HashMap<u64, EscalationRules>, Error> {
        self.store
            .load_or_default(namespaces::ESCALATION_CONFIG, namespaces::DEFAULT_KEY)
            .await
    }

    async fn save_overrides(&self, overrides: &HashMap<u64, EscalationRules>) -> Result<(), Error> {
        self.store
            .save(namespaces::ESCALATION_CONFIG, namespaces::DEFAULT_KEY, overrides)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::escalation::EscalationRule;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn scratch_engine() -> (Arc<InfractionLedger>, EscalationEngine) {
        let dir = std::env::temp_dir().join(format!("warden-esc-{}", uuid::Uuid::new_v4()));
        let store = Arc::new(DocumentStore::new(dir));
        let configs = Arc::new(ConfigCache::new(
            store.clone(),
            namespaces::GUILD_CONFIGS,
            Duration::from_secs(300),
        ));
        let ledger = Arc::new(InfractionLedger::new(store.clone(), configs.clone()));
        let engine = EscalationEngine::new(ledger.clone(), configs, store);
        (ledger, engine)
    }

    async fn seed_active_severities(ledger: &InfractionLedger, severities: &[u8]) {
        for s in severities {
            ledger.add_warning(1, 10, "seed", *s, 99).await.unwrap();
        }
    }

    #[tokio::test]
    async fn crossing_a_threshold_selects_its_rule() {
        let (ledger, engine) = scratch_engine();
        // Active severities sum to 4; a new severity-1 warning makes 5
        seed_active_severities(&ledger, &[1, 3]).await;

        let decision = engine
            .calculate_punishment(1, 10, 1, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decision.total_severity, 5);
        assert_eq!(decision.action, PunishmentAction::Mute);
        assert_eq!(decision.duration_seconds, 86400);
    }

    #[tokio::test]
    async fn exact_threshold_is_inclusive() {
        let (ledger, engine) = scratch_engine();
        seed_active_severities(&ledger, &[2]).await;

        let decision = engine
            .calculate_punishment(1, 10, 1, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decision.total_severity, 3);
        assert_eq!(decision.action, PunishmentAction::Mute);
        assert_eq!(decision.duration_seconds, 3600);
    }

    #[tokio::test]
    async fn below_every_threshold_yields_no_action() {
        let (ledger, engine) = scratch_engine();
        seed_active_severities(&ledger, &[1]).await;

        let decision = engine
            .calculate_punishment(1, 10, 1, Utc::now())
            .await
            .unwrap();
        assert!(decision.is_none());
    }

    #[tokio::test]
    async fn first_warning_alone_triggers_nothing_by_default() {
        let (_ledger, engine) = scratch_engine();
        let decision = engine
            .calculate_punishment(1, 10, 1, Utc::now())
            .await
            .unwrap();
        assert!(decision.is_none());
    }

    #[tokio::test]
    async fn redeemed_warnings_do_not_count() {
        let (ledger, engine) = scratch_engine();
        let w = ledger.add_warning(1, 10, "severe", 3, 99).await.unwrap();
        ledger.mark_redeemed(1, 10, &w.id, "pardoned").await.unwrap();

        let decision = engine
            .calculate_punishment(1, 10, 1, Utc::now())
            .await
            .unwrap();
        // total is 1, not 4
        assert!(decision.is_none());
    }

    #[tokio::test]
    async fn guild_override_takes_precedence() {
        let (_ledger, engine) = scratch_engine();
        let mut table = BTreeMap::new();
        table.insert(
            1,
            EscalationRule {
                action: PunishmentAction::Kick,
                duration_seconds: 0,
            },
        );
        engine
            .set_guild_rules(1, EscalationRules(table))
            .await
            .unwrap();

        let decision = engine
            .calculate_punishment(1, 10, 1, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decision.action, PunishmentAction::Kick);

        // Clearing falls back to the built-in table
        engine.clear_guild_rules(1).await.unwrap();
        let decision = engine
            .calculate_punishment(1, 10, 1, Utc::now())
            .await
            .unwrap();
        assert!(decision.is_none());
    }

    #[tokio::test]
    async fn calculation_does_not_mutate_the_ledger() {
        let (ledger, engine) = scratch_engine();
        seed_active_severities(&ledger, &[3, 3]).await;

        engine
            .calculate_punishment(1, 10, 3, Utc::now())
            .await
            .unwrap();

        let warns = ledger.get_warnings(1, 10).await.unwrap();
        assert_eq!(warns.len(), 2);
    }
}
