pub mod app;
pub mod config;
pub mod enrich;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod state;
