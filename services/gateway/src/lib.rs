//! Gateway Service
//!
//! HTTP and websocket front end for the ad space marketplace. Owns the
//! single engine instance, authenticates callers, caches public listing
//! reads, pushes engine events to connected clients and keeps the documents
//! on disk through periodic snapshots.

pub mod auth;
pub mod background;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod hub;
pub mod models;
pub mod rate_limit;
pub mod router;
pub mod snapshots;
pub mod state;

pub use config::GatewayConfig;
pub use router::create_router;
pub use state::AppState;
