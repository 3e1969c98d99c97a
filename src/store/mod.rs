pub mod config_cache;
pub mod document_store;

pub use config_cache::ConfigCache;
pub use document_store::DocumentStore;
