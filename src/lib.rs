//! # Discord State
//!
//! A gateway-driven entity cache for a Discord client library:
//! - Scoped in-memory stores for every cached kind
//! - One broker per kind as the single write path into the cache
//! - Stable entity identities with reference-counted handles
//! - Dispatch processors applying gateway events in per-guild order
//! - A client façade with cache-or-fetch reads over REST
//!
//! ## Architecture
//!
//! - **Domain Layer**: Wire models, snowflakes, scopes and permissions
//! - **Application Layer**: Brokers, entities, dispatch processors and the client
//! - **Infrastructure Layer**: Stores, codec, REST executor and metrics
//! - **Gateway**: The ordered dispatch intake loop
//!
//! ## Module Structure
//!
//! ```text
//! discord_state/
//! +-- config/         Configuration management
//! +-- domain/         Models, value objects and permission math
//! +-- application/    State, dispatch processors, events and client
//! +-- infrastructure/ Stores, codec, REST and metrics
//! +-- gateway/        Gateway frames and the event loop
//! +-- shared/         Errors and validation helpers
//! ```

// Configuration module
pub mod config;

// Domain layer - Models and value objects
pub mod domain;

// Application layer - Cache state and the client
pub mod application;

// Infrastructure layer - Stores, codec, REST
pub mod infrastructure;

// Gateway intake
pub mod gateway;

// Shared utilities
pub mod shared;

// Application startup for the replay binary
pub mod startup;

// Telemetry and observability
pub mod telemetry;

pub use application::client::{CacheMode, Client, ClientBuilder, EntityAccessor};
pub use config::Settings;
