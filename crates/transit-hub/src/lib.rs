pub mod agencies;
pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;
