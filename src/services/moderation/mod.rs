pub mod escalation;
pub mod ledger;
pub mod notifier;
pub mod platform;
pub mod punisher;
pub mod sweeper;
