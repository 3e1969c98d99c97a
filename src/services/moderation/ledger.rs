use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::bot::error::Error;
use crate::constants::namespaces;
use crate::models::guild_config::GuildConfig;
use crate::models::warning::{
    AppealStatus, InfractionsDocument, Warning, MAX_SEVERITY, MIN_SEVERITY,
};
use crate::store::{ConfigCache, DocumentStore};

/// Owner of all warning records.
///
/// The store has no per-key locking, so the ledger serializes every mutation
/// itself: a per-(guild, user) mutex orders logical operations on the same
/// user, and a document mutex guards each read-modify-write of the shared
/// infractions document so concurrent operations on different users cannot
/// clobber each other either.
pub struct InfractionLedger {
    store: Arc<DocumentStore>,
    configs: Arc<ConfigCache<GuildConfig>>,
    doc_lock: Mutex<()>,
    user_locks: DashMap<(u64, u64), Arc<Mutex<()>>>,
}

/// A warning the sweeper pardoned or pruned, for announcement
#[derive(Debug, Clone)]
pub struct SweptWarning {
    pub user_id: u64,
    pub warning_id: String,
    pub reason: String,
    pub age_days: i64,
    pub pardoned: bool,
}

impl InfractionLedger {
    pub fn new(store: Arc<DocumentStore>, configs: Arc<ConfigCache<GuildConfig>>) -> Self {
        Self {
            store,
            configs,
            doc_lock: Mutex::new(()),
            user_locks: DashMap::new(),
        }
    }

    fn user_lock(&self, guild_id: u64, user_id: u64) -> Arc<Mutex<()>> {
        self.user_locks
            .entry((guild_id, user_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load_document(&self) -> Result<InfractionsDocument, Error> {
        self.store
            .load_or_default(namespaces::INFRACTIONS, namespaces::DEFAULT_KEY)
            .await
    }

    async fn save_document(&self, document: &InfractionsDocument) -> Result<(), Error> {
        self.store
            .save(namespaces::INFRACTIONS, namespaces::DEFAULT_KEY, document)
            .await
    }

    /// All warnings on record for a user; empty when there is no record
    pub async fn get_warnings(&self, guild_id: u64, user_id: u64) -> Result<Vec<Warning>, Error> {
        let document = self.load_document().await?;
        Ok(document
            .get(&guild_id)
            .and_then(|guild| guild.get(&user_id))
            .map(|record| record.warns.clone())
            .unwrap_or_default())
    }

    /// Warnings that still count toward escalation: not redeemed and younger
    /// than the guild's expiry window
    pub async fn get_active_warnings(
        &self,
        guild_id: u64,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Warning>, Error> {
        let expiry = self.configs.get(guild_id).await?.warning_expiry_seconds();
        let warnings = self.get_warnings(guild_id, user_id).await?;
        Ok(warnings
            .into_iter()
            .filter(|w| w.is_active(expiry, now))
            .collect())
    }

    /// Record a new warning. The id is sequential within the user's record
    /// (w1, w2, ...) and the warning is durable before this returns.
    pub async fn add_warning(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
        severity: u8,
        moderator_id: u64,
    ) -> Result<Warning, Error> {
        if !(MIN_SEVERITY..=MAX_SEVERITY).contains(&severity) {
            return Err(Error::validation(format!(
                "Severity must be between {} and {}, got {}",
                MIN_SEVERITY, MAX_SEVERITY, severity
            )));
        }

        let lock = self.user_lock(guild_id, user_id);
        let _user_guard = lock.lock().await;
        let _doc_guard = self.doc_lock.lock().await;

        let mut document = self.load_document().await?;
        let record = document.entry(guild_id).or_default().entry(user_id).or_default();

        let warning = Warning::new(
            format!("w{}", record.warns.len() + 1),
            reason.to_string(),
            severity,
            moderator_id,
            Utc::now(),
        );
        record.warns.push(warning.clone());

        self.save_document(&document).await?;
        info!(
            "Warning {} (severity {}) recorded for user {} in guild {}",
            warning.id, severity, user_id, guild_id
        );
        Ok(warning)
    }

    /// Mark a warning redeemed so it no longer counts toward escalation
    pub async fn mark_redeemed(
        &self,
        guild_id: u64,
        user_id: u64,
        warning_id: &str,
        reason: &str,
    ) -> Result<(), Error> {
        let lock = self.user_lock(guild_id, user_id);
        let _user_guard = lock.lock().await;
        let _doc_guard = self.doc_lock.lock().await;

        let mut document = self.load_document().await?;
        let warning = find_warning(&mut document, guild_id, user_id, warning_id)?;

        warning.redeemed = true;
        warning.pardon_reason = Some(reason.to_string());

        self.save_document(&document).await?;
        debug!(
            "Warning {} redeemed for user {} in guild {}",
            warning_id, user_id, guild_id
        );
        Ok(())
    }

    /// Open an appeal on a warning. Validates that appeals are enabled, the
    /// warning exists and is still open, and the cooldown has elapsed; no
    /// state changes on a validation failure.
    pub async fn mark_appealed(
        &self,
        guild_id: u64,
        user_id: u64,
        warning_id: &str,
        appeal_reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Warning, Error> {
        let config = self.configs.get(guild_id).await?;
        if !config.allow_appeals {
            return Err(Error::validation("Appeals are not enabled on this server"));
        }

        let lock = self.user_lock(guild_id, user_id);
        let _user_guard = lock.lock().await;
        let _doc_guard = self.doc_lock.lock().await;

        let mut document = self.load_document().await?;
        let warning = find_warning(&mut document, guild_id, user_id, warning_id)?;

        if warning.appealed {
            return Err(Error::validation("This warning has already been appealed"));
        }
        if warning.redeemed {
            return Err(Error::validation("This warning has already been redeemed"));
        }
        if let Some(last) = warning.last_appeal {
            let elapsed = now.signed_duration_since(last).num_seconds().max(0) as u64;
            let cooldown = config.appeal_cooldown_seconds();
            if elapsed < cooldown {
                let days_left = (cooldown - elapsed) / 86400;
                return Err(Error::validation(format!(
                    "Please wait {} more day(s) before appealing again",
                    days_left.max(1)
                )));
            }
        }

        warning.appealed = true;
        warning.appeal_reason = Some(appeal_reason.to_string());
        warning.appeal_time = Some(now);
        warning.last_appeal = Some(now);
        warning.appeal_status = Some(AppealStatus::Pending);
        let updated = warning.clone();

        self.save_document(&document).await?;
        info!(
            "Appeal opened on warning {} for user {} in guild {}",
            warning_id, user_id, guild_id
        );
        Ok(updated)
    }

    /// Resolve an open appeal. Approval redeems the warning; denial leaves it
    /// counting but records the outcome. Re-appeal stays possible after a
    /// denial once the cooldown passes.
    pub async fn resolve_appeal(
        &self,
        guild_id: u64,
        user_id: u64,
        warning_id: &str,
        approved: bool,
        handler_id: u64,
        response: Option<&str>,
    ) -> Result<Warning, Error> {
        let lock = self.user_lock(guild_id, user_id);
        let _user_guard = lock.lock().await;
        let _doc_guard = self.doc_lock.lock().await;

        let mut document = self.load_document().await?;
        let warning = find_warning(&mut document, guild_id, user_id, warning_id)?;

        if !warning.appealed {
            return Err(Error::validation("This warning has not been appealed"));
        }

        if approved {
            warning.redeemed = true;
            warning.appeal_status = Some(AppealStatus::Approved);
            warning.appeal_response =
                Some(response.unwrap_or("Appeal approved").to_string());
        } else {
            warning.appealed = false;
            warning.appeal_status = Some(AppealStatus::Denied);
            warning.appeal_response = Some(response.unwrap_or("Appeal denied").to_string());
        }
        warning.appeal_handler = Some(handler_id);
        let updated = warning.clone();

        self.save_document(&document).await?;
        info!(
            "Appeal on warning {} for user {} in guild {} {}",
            warning_id,
            user_id,
            guild_id,
            if approved { "approved" } else { "denied" }
        );
        Ok(updated)
    }

    /// Guilds that currently have ledger data, for the sweeper
    pub async fn guild_ids(&self) -> Result<Vec<u64>, Error> {
        let document = self.load_document().await?;
        Ok(document.keys().copied().collect())
    }

    /// Apply the retention window to one guild's records.
    ///
    /// Warnings older than `retention_seconds` are dropped, or kept and
    /// flagged `redeemed` with an automatic pardon reason when `auto_pardon`
    /// is set. Persists only if something changed. Returns what was swept so
    /// the caller can announce pardons.
    pub async fn sweep_guild(
        &self,
        guild_id: u64,
        retention_seconds: u64,
        auto_pardon: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<SweptWarning>, Error> {
        let _doc_guard = self.doc_lock.lock().await;

        let mut document = self.load_document().await?;
        let Some(guild) = document.get_mut(&guild_id) else {
            return Ok(Vec::new());
        };

        let mut swept = Vec::new();
        let mut changed = false;

        for (&user_id, record) in guild.iter_mut() {
            let mut retained = Vec::with_capacity(record.warns.len());
            for mut warn in record.warns.drain(..) {
                let age = now.signed_duration_since(warn.timestamp).num_seconds().max(0) as u64;
                if age < retention_seconds {
                    retained.push(warn);
                } else if auto_pardon && !warn.redeemed {
                    warn.redeemed = true;
                    warn.pardon_reason = Some("Automatic expiration".to_string());
                    swept.push(SweptWarning {
                        user_id,
                        warning_id: warn.id.clone(),
                        reason: warn.reason.clone(),
                        age_days: (age / 86400) as i64,
                        pardoned: true,
                    });
                    retained.push(warn);
                    changed = true;
                } else {
                    swept.push(SweptWarning {
                        user_id,
                        warning_id: warn.id.clone(),
                        reason: warn.reason.clone(),
                        age_days: (age / 86400) as i64,
                        pardoned: false,
                    });
                    changed = true;
                }
            }
            record.warns = retained;
        }

        if changed {
            self.save_document(&document).await?;
            debug!("Sweep updated {} record(s) in guild {}", swept.len(), guild_id);
        }
        Ok(swept)
    }
}

fn find_warning<'a>(
    document: &'a mut InfractionsDocument,
    guild_id: u64,
    user_id: u64,
    warning_id: &str,
) -> Result<&'a mut Warning, Error> {
    document
        .get_mut(&guild_id)
        .and_then(|guild| guild.get_mut(&user_id))
        .and_then(|record| record.warns.iter_mut().find(|w| w.id == warning_id))
        .ok_or_else(|| {
            Error::validation(format!(
                "Warning {} not found; use /infractions to list warnings",
                warning_id
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    fn scratch_ledger() -> Arc<InfractionLedger> {
        let dir = std::env::temp_dir().join(format!("warden-ledger-{}", uuid::Uuid::new_v4()));
        let store = Arc::new(DocumentStore::new(dir));
        let configs = Arc::new(ConfigCache::new(
            store.clone(),
            namespaces::GUILD_CONFIGS,
            Duration::from_secs(300),
        ));
        Arc::new(InfractionLedger::new(store, configs))
    }

    #[tokio::test]
    async fn warning_ids_are_sequential_per_user() {
        let ledger = scratch_ledger();

        let w = ledger.add_warning(1, 10, "spam", 1, 99).await.unwrap();
        assert_eq!(w.id, "w1");

        // Interleave another user's warning; ids stay scoped per user
        let other = ledger.add_warning(1, 20, "spam", 1, 99).await.unwrap();
        assert_eq!(other.id, "w1");

        let w = ledger.add_warning(1, 10, "flooding", 2, 99).await.unwrap();
        assert_eq!(w.id, "w2");
        let w = ledger.add_warning(1, 10, "slurs", 3, 99).await.unwrap();
        assert_eq!(w.id, "w3");
    }

    #[tokio::test]
    async fn severity_out_of_range_is_rejected_without_mutation() {
        let ledger = scratch_ledger();
        let err = ledger.add_warning(1, 10, "bad", 4, 99).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(ledger.get_warnings(1, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_warnings_for_unknown_user_is_empty() {
        let ledger = scratch_ledger();
        assert!(ledger.get_warnings(1, 999).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn redeemed_warnings_are_not_active() {
        let ledger = scratch_ledger();
        let w = ledger.add_warning(1, 10, "spam", 3, 99).await.unwrap();
        ledger.mark_redeemed(1, 10, &w.id, "task done").await.unwrap();

        let active = ledger.get_active_warnings(1, 10, Utc::now()).await.unwrap();
        assert!(active.is_empty());

        // Still on the full record
        let all = ledger.get_warnings(1, 10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].redeemed);
        assert_eq!(all[0].pardon_reason.as_deref(), Some("task done"));
    }

    #[tokio::test]
    async fn warnings_past_expiry_window_are_not_active() {
        let ledger = scratch_ledger();
        ledger.add_warning(1, 10, "spam", 2, 99).await.unwrap();

        // Default expiry is 30 days; jump past it
        let later = Utc::now() + ChronoDuration::days(31);
        let active = ledger.get_active_warnings(1, 10, later).await.unwrap();
        assert!(active.is_empty());

        let soon = Utc::now() + ChronoDuration::days(29);
        let active = ledger.get_active_warnings(1, 10, soon).await.unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn appeal_lifecycle() {
        let ledger = scratch_ledger();
        let w = ledger.add_warning(1, 10, "spam", 2, 99).await.unwrap();

        let appealed = ledger
            .mark_appealed(1, 10, &w.id, "it was not me", Utc::now())
            .await
            .unwrap();
        assert!(appealed.appealed);
        assert_eq!(appealed.appeal_status, Some(AppealStatus::Pending));

        // Double appeal is rejected
        let err = ledger
            .mark_appealed(1, 10, &w.id, "again", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let resolved = ledger
            .resolve_appeal(1, 10, &w.id, true, 500, Some("fair enough"))
            .await
            .unwrap();
        assert!(resolved.redeemed);
        assert_eq!(resolved.appeal_status, Some(AppealStatus::Approved));
        assert_eq!(resolved.appeal_handler, Some(500));
        assert_eq!(resolved.appeal_response.as_deref(), Some("fair enough"));
    }

    #[tokio::test]
    async fn denied_appeal_respects_cooldown_then_allows_retry() {
        let ledger = scratch_ledger();
        let w = ledger.add_warning(1, 10, "spam", 2, 99).await.unwrap();

        let now = Utc::now();
        ledger.mark_appealed(1, 10, &w.id, "please", now).await.unwrap();
        let denied = ledger
            .resolve_appeal(1, 10, &w.id, false, 500, None)
            .await
            .unwrap();
        assert!(!denied.redeemed);
        assert_eq!(denied.appeal_status, Some(AppealStatus::Denied));

        // Within the 7-day cooldown: rejected
        let err = ledger
            .mark_appealed(1, 10, &w.id, "please again", now + ChronoDuration::days(2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // After the cooldown: accepted
        ledger
            .mark_appealed(1, 10, &w.id, "please again", now + ChronoDuration::days(8))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn appeal_of_unknown_warning_is_a_validation_error() {
        let ledger = scratch_ledger();
        ledger.add_warning(1, 10, "spam", 1, 99).await.unwrap();
        let err = ledger
            .mark_appealed(1, 10, "w9", "what", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn concurrent_warn_and_appeal_resolution_lose_no_update() {
        let ledger = scratch_ledger();
        let w = ledger.add_warning(1, 10, "spam", 1, 99).await.unwrap();
        ledger
            .mark_appealed(1, 10, &w.id, "unfair", Utc::now())
            .await
            .unwrap();

        let warn_side = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.add_warning(1, 10, "flooding", 2, 99).await })
        };
        let appeal_side = {
            let ledger = ledger.clone();
            let id = w.id.clone();
            tokio::spawn(async move {
                ledger.resolve_appeal(1, 10, &id, true, 500, None).await
            })
        };

        warn_side.await.unwrap().unwrap();
        appeal_side.await.unwrap().unwrap();

        let warns = ledger.get_warnings(1, 10).await.unwrap();
        assert_eq!(warns.len(), 2);
        let first = warns.iter().find(|x| x.id == "w1").unwrap();
        assert!(first.redeemed);
        assert!(warns.iter().any(|x| x.id == "w2"));
    }

    #[tokio::test]
    async fn sweep_drops_or_pardons_expired_warnings() {
        let ledger = scratch_ledger();
        ledger.add_warning(1, 10, "old offense", 1, 99).await.unwrap();

        let retention = 86400u64;
        let two_days_on = Utc::now() + ChronoDuration::days(2);

        // auto_pardon off: dropped outright
        let swept = ledger.sweep_guild(1, retention, false, two_days_on).await.unwrap();
        assert_eq!(swept.len(), 1);
        assert!(!swept[0].pardoned);
        assert!(ledger.get_warnings(1, 10).await.unwrap().is_empty());

        // auto_pardon on: kept but flagged
        ledger.add_warning(1, 10, "another", 1, 99).await.unwrap();
        let swept = ledger.sweep_guild(1, retention, true, two_days_on).await.unwrap();
        assert_eq!(swept.len(), 1);
        assert!(swept[0].pardoned);
        let warns = ledger.get_warnings(1, 10).await.unwrap();
        assert_eq!(warns.len(), 1);
        assert!(warns[0].redeemed);
        assert_eq!(warns[0].pardon_reason.as_deref(), Some("Automatic expiration"));
    }

    #[tokio::test]
    async fn sweep_within_retention_changes_nothing() {
        let ledger = scratch_ledger();
        ledger.add_warning(1, 10, "recent", 1, 99).await.unwrap();
        let swept = ledger
            .sweep_guild(1, 86400 * 180, false, Utc::now())
            .await
            .unwrap();
        assert!(swept.is_empty());
        assert_eq!(ledger.get_warnings(1, 10).await.unwrap().len(), 1);
    }
}
