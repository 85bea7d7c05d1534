// Shared infrastructure
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod telemetry;

// Domain layer
pub mod notification;
pub mod pagination;
pub mod template;

// Application layer
pub mod api;
pub mod server;
