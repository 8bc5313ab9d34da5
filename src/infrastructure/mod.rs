//! Infrastructure Layer
//!
//! Contains the collaborators behind the cache:
//! - Entity stores and the scope registry
//! - The model codec for gateway and REST payloads
//! - The REST executor used on cache misses
//! - Prometheus metrics

pub mod codec;
pub mod metrics;
pub mod rest;
pub mod store;
