pub mod albums;
pub mod auth;
pub mod comments;
pub mod config;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod models;
pub mod openapi;
pub mod posts;
pub mod profiles;
pub mod rate_limit; // in-memory rate limiting
pub mod repo;
pub mod routes;
pub mod security;
pub mod storage;
pub mod tags;

// Re-export commonly used items for tests / the binary
pub use config::AppConfig;
pub use routes::{config, AppState};
pub use security::SecurityHeaders;
