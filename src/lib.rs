pub mod cache;
pub mod config;
pub mod env_config;
pub mod errors;
pub mod events;
pub mod groups;
pub mod logging;
pub mod models;
pub mod platform;
pub mod reliability;
pub mod request_id;
pub mod roster;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod translation;
