pub mod defaults;
pub mod embeds;
pub mod namespaces;
