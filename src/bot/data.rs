use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::Settings;
use crate::constants::namespaces;
use crate::models::guild_config::GuildConfig;
use crate::services::moderation::escalation::EscalationEngine;
use crate::services::moderation::ledger::InfractionLedger;
use crate::services::moderation::notifier::{DiscordNotifier, Notifier};
use crate::services::moderation::platform::Platform;
use crate::services::moderation::punisher::Punisher;
use crate::store::{ConfigCache, DocumentStore};

/// Shared data available to all commands and background tasks
pub struct Data {
    pub settings: Settings,
    pub store: Arc<DocumentStore>,
    pub configs: Arc<ConfigCache<GuildConfig>>,
    pub ledger: Arc<InfractionLedger>,
    pub escalation: EscalationEngine,
    pub punisher: Arc<Punisher>,
    pub notifier: Arc<dyn Notifier>,
    pub platform: Arc<dyn Platform>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Data {
    pub fn new(settings: Settings, platform: Arc<dyn Platform>) -> Arc<Self> {
        let store = Arc::new(DocumentStore::new(settings.data_dir.clone()));
        let configs = Arc::new(ConfigCache::new(
            store.clone(),
            namespaces::GUILD_CONFIGS,
            Duration::from_secs(settings.config_cache_ttl_seconds),
        ));
        let ledger = Arc::new(InfractionLedger::new(store.clone(), configs.clone()));
        let escalation = EscalationEngine::new(ledger.clone(), configs.clone(), store.clone());
        let punisher = Punisher::new(platform.clone(), store.clone());
        let notifier: Arc<dyn Notifier> =
            Arc::new(DiscordNotifier::new(platform.clone(), configs.clone()));

        Arc::new(Self {
            settings,
            store,
            configs,
            ledger,
            escalation,
            punisher,
            notifier,
            platform,
            sweeper: Mutex::new(None),
        })
    }

    pub fn set_sweeper(&self, handle: JoinHandle<()>) {
        if let Ok(mut slot) = self.sweeper.lock() {
            *slot = Some(handle);
        }
    }

    /// Cancel background tasks. In-flight store writes complete atomically;
    /// persisted active punishments are reconciled on next startup.
    pub fn shutdown(&self) {
        if let Ok(mut slot) = self.sweeper.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
        self.punisher.shutdown();
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("data_dir", &self.settings.data_dir)
            .finish_non_exhaustive()
    }
}

pub type Context<'a> = poise::Context<'a, Arc<Data>, crate::bot::error::Error>;
