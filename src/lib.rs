pub mod ads;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod feed;
pub mod identity;
pub mod ledger;
pub mod models;
pub mod openapi;
pub mod ranking;
pub mod rate_limit;
pub mod repo;
pub mod routes;
pub mod security;
pub mod storage;

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
pub use security::SecurityHeaders;
