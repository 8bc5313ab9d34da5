//! Application Layer
//!
//! The stateful part of the crate: entity brokers and the state controller,
//! the dispatch processors that apply gateway events to them, the cache
//! event stream, and the client façade that ties the cache to REST.

pub mod client;
pub mod dispatch;
pub mod events;
pub mod state;
