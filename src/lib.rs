pub mod bot;
pub mod commands;
pub mod config;
pub mod constants;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;
