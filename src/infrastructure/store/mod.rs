//! Store Module
//!
//! Keyed model containers, one per entity kind, partitioned by [`Scope`].
//!
//! This module provides:
//! - An `EntityStore` trait abstracting the backing container
//! - A `MemoryStore` implementation on concurrent maps
//! - A `StoreBackend` factory so alternative backends can be plugged in
//! - A `StoreProvider` holding one store per kind with cross-kind cascade
//! - A `ScopeRegistry` tracking which scopes currently exist
//!
//! # Architecture
//!
//! ```text
//! +-------------------+
//! |   Broker<M>       |
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! |  EntityStore<M>   |  <-- Abstract interface
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! |  MemoryStore<M>   |  <-- Scope partitions + id index
//! +-------------------+
//! ```

mod memory;
mod provider;
mod registry;

pub use memory::{MemoryBackend, MemoryStore};
pub use provider::StoreProvider;
pub use registry::ScopeRegistry;

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::models::Model;
use crate::domain::value_objects::{Scope, Snowflake};
use crate::shared::error::StoreError;

/// Keyed container for one model kind.
///
/// Every entry is keyed by `(scope, id)`. Missing keys are `Ok(None)`,
/// never errors. The only error a conforming backend raises for in-memory
/// state is [`StoreError::InvalidScope`], when a scope's shape cannot hold
/// this kind.
#[async_trait]
pub trait EntityStore<M: Model>: Send + Sync {
    /// Retrieves the model stored under `(scope, id)`.
    ///
    /// # Returns
    /// * `Ok(Some(model))` - If an entry exists
    /// * `Ok(None)` - If there is no entry
    /// * `Err(StoreError)` - If `scope` cannot hold this kind
    async fn get(&self, scope: Scope, id: Snowflake) -> Result<Option<Arc<M>>, StoreError>;

    /// Retrieves a model by id alone, with the scope it lives under.
    async fn find(&self, id: Snowflake) -> Result<Option<(Scope, Arc<M>)>, StoreError>;

    /// All models stored under `scope`.
    async fn get_all(&self, scope: Scope) -> Result<Vec<Arc<M>>, StoreError>;

    /// All ids stored under `scope`.
    async fn get_all_ids(&self, scope: Scope) -> Result<Vec<Snowflake>, StoreError>;

    /// Inserts or replaces the model under `(scope, model.id())`.
    ///
    /// Idempotent. If the id was previously stored under another scope the
    /// old entry is moved, so an id lives under at most one scope.
    async fn upsert(&self, scope: Scope, model: Arc<M>) -> Result<(), StoreError>;

    /// Inserts or replaces many models under one scope.
    ///
    /// Each model becomes visible atomically; readers may observe the batch
    /// partially applied, but never a partially written model.
    async fn upsert_batch(&self, scope: Scope, models: Vec<Arc<M>>) -> Result<(), StoreError>;

    /// Removes and returns the entry under `(scope, id)`.
    async fn remove(&self, scope: Scope, id: Snowflake) -> Result<Option<Arc<M>>, StoreError>;

    /// Removes every entry under `scope` and returns their ids.
    ///
    /// Cascading into descendant scopes spans several kinds and is done by
    /// [`StoreProvider::purge_scope`].
    async fn purge_scope(&self, scope: Scope) -> Result<Vec<Snowflake>, StoreError>;

    /// Total number of entries across all scopes.
    async fn len(&self) -> usize;
}

/// Factory for stores of any model kind.
pub trait StoreBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    fn open<M: Model>(&self) -> Arc<dyn EntityStore<M>>;
}

/// Reject scopes whose shape cannot hold `M`.
pub(crate) fn check_scope<M: Model>(scope: Scope) -> Result<(), StoreError> {
    if M::KIND.accepts(scope.shape()) {
        Ok(())
    } else {
        Err(StoreError::InvalidScope {
            kind: M::KIND,
            scope,
        })
    }
}
