//! # Entity State
//!
//! Identity-stable entities over the store, and the brokers that keep them
//! current.
//!
//! - **Entity**: one per cached id, model swapped atomically on update
//! - **EntityHandle**: reference-counted lease; a leased entity is never evicted
//! - **Broker**: the single write path per kind, serialized per scope
//! - **StateController**: owns every broker and the scope tree

mod broker;
mod controller;
mod entity;
mod eviction;
mod handle;
mod relations;

pub use broker::Broker;
pub use controller::{CacheStats, StateController};
pub use entity::{Entity, EntityState};
pub use eviction::{EvictionCandidate, EvictionPolicy, IdleFor, MaxEntriesPerScope, NeverEvict};
pub use handle::EntityHandle;
pub use relations::{GuildScoped, HasChannels, HasMembers, HasMessages, HasRoles, HasThreads};
