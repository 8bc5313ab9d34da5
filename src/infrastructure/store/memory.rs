//! In-memory store backend.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::trace;

use super::{check_scope, EntityStore, StoreBackend};
use crate::domain::models::Model;
use crate::domain::value_objects::{Scope, Snowflake};
use crate::shared::error::StoreError;

/// Concurrent in-memory store: one partition per scope plus an id index.
///
/// Models are held behind `Arc`, so a write is a single pointer swap in the
/// partition map and readers never see a half-written model.
///
/// User-keyed kinds (members, voice states, presences) legitimately repeat
/// an id across guilds; for them the index is not kept and an id is never
/// moved between scopes.
pub struct MemoryStore<M: Model> {
    /// Scope -> (id -> model)
    partitions: DashMap<Scope, DashMap<Snowflake, Arc<M>>>,
    /// id -> scope it currently lives under, for globally unique ids
    index: DashMap<Snowflake, Scope>,
    _kind: PhantomData<fn() -> M>,
}

impl<M: Model> MemoryStore<M> {
    pub fn new() -> Self {
        Self {
            partitions: DashMap::new(),
            index: DashMap::new(),
            _kind: PhantomData,
        }
    }

    fn insert(&self, scope: Scope, model: Arc<M>) {
        let id = model.id();
        self.partitions.entry(scope).or_default().insert(id, model);
        if M::KIND.is_user_keyed() {
            return;
        }

        // Re-parented ids leave their old partition
        if let Some(previous) = self.index.insert(id, scope) {
            if previous != scope {
                if let Some(old) = self.partitions.get(&previous) {
                    old.remove(&id);
                }
                trace!(kind = %M::KIND, %id, from = %previous, to = %scope, "Entry moved between scopes");
            }
        }
    }
}

impl<M: Model> Default for MemoryStore<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<M: Model> EntityStore<M> for MemoryStore<M> {
    async fn get(&self, scope: Scope, id: Snowflake) -> Result<Option<Arc<M>>, StoreError> {
        check_scope::<M>(scope)?;
        Ok(self
            .partitions
            .get(&scope)
            .and_then(|partition| partition.get(&id).map(|m| Arc::clone(m.value()))))
    }

    async fn find(&self, id: Snowflake) -> Result<Option<(Scope, Arc<M>)>, StoreError> {
        if M::KIND.is_user_keyed() {
            return Ok(self.partitions.iter().find_map(|partition| {
                partition
                    .get(&id)
                    .map(|m| (*partition.key(), Arc::clone(m.value())))
            }));
        }

        let Some(scope) = self.index.get(&id).map(|s| *s.value()) else {
            return Ok(None);
        };
        Ok(self
            .partitions
            .get(&scope)
            .and_then(|partition| partition.get(&id).map(|m| (scope, Arc::clone(m.value())))))
    }

    async fn get_all(&self, scope: Scope) -> Result<Vec<Arc<M>>, StoreError> {
        check_scope::<M>(scope)?;
        Ok(self
            .partitions
            .get(&scope)
            .map(|partition| partition.iter().map(|e| Arc::clone(e.value())).collect())
            .unwrap_or_default())
    }

    async fn get_all_ids(&self, scope: Scope) -> Result<Vec<Snowflake>, StoreError> {
        check_scope::<M>(scope)?;
        Ok(self
            .partitions
            .get(&scope)
            .map(|partition| partition.iter().map(|e| *e.key()).collect())
            .unwrap_or_default())
    }

    async fn upsert(&self, scope: Scope, model: Arc<M>) -> Result<(), StoreError> {
        check_scope::<M>(scope)?;
        self.insert(scope, model);
        Ok(())
    }

    async fn upsert_batch(&self, scope: Scope, models: Vec<Arc<M>>) -> Result<(), StoreError> {
        check_scope::<M>(scope)?;
        for model in models {
            self.insert(scope, model);
        }
        Ok(())
    }

    async fn remove(&self, scope: Scope, id: Snowflake) -> Result<Option<Arc<M>>, StoreError> {
        check_scope::<M>(scope)?;
        let removed = self
            .partitions
            .get(&scope)
            .and_then(|partition| partition.remove(&id).map(|(_, model)| model));

        if removed.is_some() {
            self.index.remove_if(&id, |_, current| *current == scope);
        }
        Ok(removed)
    }

    async fn purge_scope(&self, scope: Scope) -> Result<Vec<Snowflake>, StoreError> {
        let Some((_, partition)) = self.partitions.remove(&scope) else {
            return Ok(Vec::new());
        };

        let ids: Vec<Snowflake> = partition.into_iter().map(|(id, _)| id).collect();
        for id in &ids {
            self.index.remove_if(id, |_, current| *current == scope);
        }
        Ok(ids)
    }

    async fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.len()).sum()
    }
}

/// Backend that opens a fresh [`MemoryStore`] per kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryBackend;

impl StoreBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn open<M: Model>(&self) -> Arc<dyn EntityStore<M>> {
        Arc::new(MemoryStore::<M>::new())
    }
}
