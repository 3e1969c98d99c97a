use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bot::error::Error;
use crate::constants::defaults::{
    DEFAULT_CLEANUP_INTERVAL_HOURS, SECONDS_PER_HOUR, SWEEP_ERROR_BACKOFF_SECONDS,
};
use crate::models::guild_config::GuildConfig;
use crate::services::moderation::ledger::InfractionLedger;
use crate::services::moderation::notifier::{Notice, Notifier};
use crate::services::moderation::punisher::Punisher;
use crate::store::ConfigCache;

/// Start the periodic expiry sweep. The loop only exits via the returned
/// handle's abort; per-guild failures are logged and skipped, and a whole
/// failed cycle backs off for an hour before retrying.
pub fn spawn_sweeper(
    ledger: Arc<InfractionLedger>,
    configs: Arc<ConfigCache<GuildConfig>>,
    punisher: Arc<Punisher>,
    notifier: Arc<dyn Notifier>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let next_wait = match sweep_once(&ledger, &configs, &punisher, &notifier, Utc::now())
                .await
            {
                Ok(interval) => interval,
                Err(e) => {
                    error!("Warning sweep cycle failed: {}", e);
                    Duration::from_secs(SWEEP_ERROR_BACKOFF_SECONDS)
                }
            };
            tokio::time::sleep(next_wait).await;
        }
    })
}

/// One sweep cycle over every guild with ledger data. Returns the wait until
/// the next cycle: the shortest cleanup interval configured by any guild.
pub async fn sweep_once(
    ledger: &Arc<InfractionLedger>,
    configs: &Arc<ConfigCache<GuildConfig>>,
    punisher: &Arc<Punisher>,
    notifier: &Arc<dyn Notifier>,
    now: DateTime<Utc>,
) -> Result<Duration, Error> {
    let mut next_interval = DEFAULT_CLEANUP_INTERVAL_HOURS as u64 * SECONDS_PER_HOUR;

    for guild_id in ledger.guild_ids().await? {
        match sweep_guild(ledger, configs, notifier, guild_id, now).await {
            Ok(interval_seconds) => {
                next_interval = next_interval.min(interval_seconds);
            }
            Err(e) => {
                // One broken guild must not stop the sweep for the rest
                warn!("Skipping sweep for guild {}: {}", guild_id, e);
            }
        }
    }

    // Completed timed punishments whose reversal never fired
    punisher.prune_expired(now).await;

    debug!("Sweep cycle complete; next in {}s", next_interval);
    Ok(Duration::from_secs(next_interval))
}

async fn sweep_guild(
    ledger: &Arc<InfractionLedger>,
    configs: &Arc<ConfigCache<GuildConfig>>,
    notifier: &Arc<dyn Notifier>,
    guild_id: u64,
    now: DateTime<Utc>,
) -> Result<u64, Error> {
    let config = configs.get(guild_id).await?;
    let swept = ledger
        .sweep_guild(
            guild_id,
            config.history_retention_seconds(),
            config.auto_pardon,
            now,
        )
        .await?;

    let pardoned = swept.iter().filter(|s| s.pardoned).count();
    if !swept.is_empty() {
        info!(
            "Swept {} warning(s) in guild {} ({} pardoned)",
            swept.len(),
            guild_id,
            pardoned
        );
    }

    for entry in swept.into_iter().filter(|s| s.pardoned) {
        notifier
            .announce(
                guild_id,
                Notice::AutoPardon {
                    user_id: entry.user_id,
                    warning_id: entry.warning_id,
                    reason: entry.reason,
                    age_days: entry.age_days,
                },
            )
            .await;
    }

    Ok(config.cleanup_interval_seconds())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::namespaces;
    use crate::services::moderation::punisher::tests::MockPlatform;
    use crate::store::DocumentStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingNotifier {
        notices: Mutex<Vec<(u64, Notice)>>,
    }

    impl RecordingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                notices: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn announce(&self, guild_id: u64, notice: Notice) {
            self.notices.lock().unwrap().push((guild_id, notice));
        }
    }

    struct Fixture {
        ledger: Arc<InfractionLedger>,
        configs: Arc<ConfigCache<GuildConfig>>,
        punisher: Arc<Punisher>,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture() -> Fixture {
        let dir = std::env::temp_dir().join(format!("warden-sweep-{}", uuid::Uuid::new_v4()));
        let store = Arc::new(DocumentStore::new(dir));
        let configs = Arc::new(ConfigCache::new(
            store.clone(),
            namespaces::GUILD_CONFIGS,
            Duration::from_secs(300),
        ));
        let ledger = Arc::new(InfractionLedger::new(store.clone(), configs.clone()));
        let punisher = Punisher::new(MockPlatform::permissive(), store);
        let notifier = RecordingNotifier::new();
        Fixture {
            ledger,
            configs,
            punisher,
            notifier,
        }
    }

    #[tokio::test]
    async fn sweep_announces_auto_pardons() {
        let f = fixture();

        let mut config = GuildConfig::default();
        config.auto_pardon = true;
        config.history_retention_days = 1;
        f.configs.set(1, &config).await.unwrap();

        f.ledger.add_warning(1, 10, "ancient", 1, 99).await.unwrap();

        let notifier: Arc<dyn Notifier> = f.notifier.clone();
        let later = Utc::now() + chrono::Duration::days(2);
        sweep_once(&f.ledger, &f.configs, &f.punisher, &notifier, later)
            .await
            .unwrap();

        let notices = f.notifier.notices.lock().unwrap();
        assert_eq!(notices.len(), 1);
        assert!(matches!(notices[0].1, Notice::AutoPardon { .. }));

        drop(notices);
        let warns = f.ledger.get_warnings(1, 10).await.unwrap();
        assert_eq!(warns.len(), 1);
        assert!(warns[0].redeemed);
    }

    #[tokio::test]
    async fn sweep_without_auto_pardon_drops_silently() {
        let f = fixture();

        let mut config = GuildConfig::default();
        config.history_retention_days = 1;
        f.configs.set(1, &config).await.unwrap();

        f.ledger.add_warning(1, 10, "ancient", 1, 99).await.unwrap();

        let notifier: Arc<dyn Notifier> = f.notifier.clone();
        let later = Utc::now() + chrono::Duration::days(2);
        sweep_once(&f.ledger, &f.configs, &f.punisher, &notifier, later)
            .await
            .unwrap();

        assert!(f.notifier.notices.lock().unwrap().is_empty());
        assert!(f.ledger.get_warnings(1, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn next_interval_is_the_shortest_configured() {
        let f = fixture();

        let mut fast = GuildConfig::default();
        fast.cleanup_interval_hours = 2;
        f.configs.set(1, &fast).await.unwrap();
        f.configs.set(2, &GuildConfig::default()).await.unwrap();

        f.ledger.add_warning(1, 10, "a", 1, 99).await.unwrap();
        f.ledger.add_warning(2, 20, "b", 1, 99).await.unwrap();

        let notifier: Arc<dyn Notifier> = f.notifier.clone();
        let wait = sweep_once(&f.ledger, &f.configs, &f.punisher, &notifier, Utc::now())
            .await
            .unwrap();
        assert_eq!(wait, Duration::from_secs(2 * 3600));
    }

    #[tokio::test]
    async fn sweep_with_no_guilds_uses_default_interval() {
        let f = fixture();
        let notifier: Arc<dyn Notifier> = f.notifier.clone();
        let wait = sweep_once(&f.ledger, &f.configs, &f.punisher, &notifier, Utc::now())
            .await
            .unwrap();
        assert_eq!(wait, Duration::from_secs(24 * 3600));
    }
}
