//! Per-kind synchronization broker.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, instrument, trace};

use super::controller::StateController;
use super::entity::Entity;
use super::eviction::{EvictionCandidate, EvictionPolicy};
use super::handle::EntityHandle;
use crate::domain::models::Model;
use crate::domain::value_objects::{Scope, Snowflake};
use crate::infrastructure::metrics;
use crate::infrastructure::store::{EntityStore, ScopeRegistry};
use crate::shared::error::CacheError;

/// Identity of an entity within one broker.
///
/// Globally unique ids are keyed by id alone so a placeholder attached under
/// a guessed scope is found again when its real model arrives elsewhere.
/// User-keyed kinds include the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EntityKey {
    scope: Option<Scope>,
    id: Snowflake,
}

/// The single writer path for one entity kind.
///
/// Every model for the kind, whether from the gateway or from REST, goes
/// through [`Broker::create_or_update`]. Writes into one scope are serialized
/// by a per-scope async mutex; different scopes proceed concurrently. The
/// mutex is never held across anything but store calls.
pub struct Broker<M: Model> {
    store: Arc<dyn EntityStore<M>>,
    scopes: Arc<ScopeRegistry>,
    entities: DashMap<EntityKey, Arc<Entity<M>>>,
    locks: DashMap<Scope, Arc<Mutex<()>>>,
    policy: Arc<dyn EvictionPolicy>,
    controller: Weak<StateController>,
}

impl<M: Model> Broker<M> {
    pub(crate) fn new(
        store: Arc<dyn EntityStore<M>>,
        scopes: Arc<ScopeRegistry>,
        policy: Arc<dyn EvictionPolicy>,
        controller: Weak<StateController>,
    ) -> Self {
        Self {
            store,
            scopes,
            entities: DashMap::new(),
            locks: DashMap::new(),
            policy,
            controller,
        }
    }

    fn key(scope: Scope, id: Snowflake) -> EntityKey {
        EntityKey {
            scope: M::KIND.is_user_keyed().then_some(scope),
            id,
        }
    }

    fn scope_lock(&self, scope: Scope) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(scope).or_default().value())
    }

    fn check_shape(scope: Scope) -> Result<(), CacheError> {
        if M::KIND.accepts(scope.shape()) {
            Ok(())
        } else {
            Err(CacheError::InvalidScope {
                kind: M::KIND,
                scope,
            })
        }
    }

    fn check_writable(&self, scope: Scope) -> Result<(), CacheError> {
        Self::check_shape(scope)?;
        if !self.scopes.contains(scope) {
            return Err(CacheError::UnknownScope {
                kind: M::KIND,
                scope,
            });
        }
        Ok(())
    }

    fn open_owned_scope(&self, scope: Scope, id: Snowflake) {
        if let Some(owned) = M::KIND.owned_scope(id) {
            self.scopes.register(owned, scope);
        }
    }

    fn report_size(&self) {
        metrics::set_cached_entities(M::KIND.as_str(), self.entities.len());
    }

    /// Write path: the model is newer than whatever the entity holds.
    fn materialize(&self, scope: Scope, model: Arc<M>) -> EntityHandle<M> {
        let key = Self::key(scope, model.id());
        match self.entities.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().update_in(scope, Arc::clone(&model)) {
                    return occupied.get().acquire();
                }
                let fresh = Entity::live(scope, model, self.controller.clone());
                let handle = fresh.acquire();
                occupied.insert(fresh);
                handle
            }
            Entry::Vacant(vacant) => {
                let fresh = Entity::live(scope, model, self.controller.clone());
                let handle = fresh.acquire();
                vacant.insert(fresh);
                handle
            }
        }
    }

    /// Read path: a model loaded from the store only fills a missing or
    /// latent entity, it never overwrites a live one.
    fn adopt(&self, scope: Scope, model: Arc<M>) -> EntityHandle<M> {
        let key = Self::key(scope, model.id());
        match self.entities.entry(key) {
            Entry::Occupied(occupied) => {
                let entity = occupied.get();
                if !entity.is_live() {
                    entity.update_in(scope, model);
                }
                entity.acquire()
            }
            Entry::Vacant(vacant) => {
                let fresh = Entity::live(scope, model, self.controller.clone());
                let handle = fresh.acquire();
                vacant.insert(fresh);
                handle
            }
        }
    }

    /// Insert or update the entity for `model` under `scope`.
    ///
    /// An existing entity keeps its identity and has its model swapped. A
    /// latent placeholder is filled in, and moved if it was attached under
    /// another scope.
    ///
    /// # Errors
    /// * `CacheError::InvalidScope` - `scope` cannot hold this kind
    /// * `CacheError::UnknownScope` - `scope` is not registered
    #[instrument(skip(self, model), fields(kind = %M::KIND, id = %model.id()), level = "debug")]
    pub async fn create_or_update(
        &self,
        scope: Scope,
        model: M,
    ) -> Result<EntityHandle<M>, CacheError> {
        self.check_writable(scope)?;

        let lock = self.scope_lock(scope);
        let _guard = lock.lock().await;

        self.write(scope, model).await
    }

    /// Update the entity for `model` only if the broker already holds it,
    /// live or latent.
    ///
    /// Returns `None` without writing when the entity is unknown, was
    /// deleted, or `scope` is not registered.
    #[instrument(skip(self, model), fields(kind = %M::KIND, id = %model.id()), level = "debug")]
    pub async fn update_existing(
        &self,
        scope: Scope,
        model: M,
    ) -> Result<Option<EntityHandle<M>>, CacheError> {
        Self::check_shape(scope)?;
        let id = model.id();
        if !self.scopes.contains(scope) {
            trace!(%scope, %id, "Update in unknown scope ignored");
            return Ok(None);
        }

        let lock = self.scope_lock(scope);
        let _guard = lock.lock().await;

        let held = self
            .entities
            .get(&Self::key(scope, id))
            .is_some_and(|entity| !entity.is_deleted());
        if !held && self.store.get(scope, id).await?.is_none() {
            trace!(%scope, %id, "Update for uncached entity ignored");
            return Ok(None);
        }

        self.write(scope, model).await.map(Some)
    }

    /// Store `model` and swap it into its entity. Callers hold the scope lock.
    async fn write(&self, scope: Scope, model: M) -> Result<EntityHandle<M>, CacheError> {
        let model = Arc::new(model);
        let id = model.id();
        self.store.upsert(scope, Arc::clone(&model)).await?;
        let handle = self.materialize(scope, model);
        self.open_owned_scope(scope, id);

        self.report_size();
        Ok(handle)
    }

    /// Apply many models to one scope, in order, as a single locked unit.
    #[instrument(skip(self, models), fields(kind = %M::KIND, count = models.len()), level = "debug")]
    pub async fn batch_update(
        &self,
        scope: Scope,
        models: Vec<M>,
    ) -> Result<Vec<EntityHandle<M>>, CacheError> {
        self.check_writable(scope)?;
        if models.is_empty() {
            return Ok(Vec::new());
        }

        let lock = self.scope_lock(scope);
        let _guard = lock.lock().await;

        let models: Vec<Arc<M>> = models.into_iter().map(Arc::new).collect();
        self.store.upsert_batch(scope, models.clone()).await?;

        let handles = models
            .into_iter()
            .map(|model| {
                let id = model.id();
                let handle = self.materialize(scope, model);
                self.open_owned_scope(scope, id);
                handle
            })
            .collect();

        self.report_size();
        Ok(handles)
    }

    /// Remove the entity under `(scope, id)`.
    ///
    /// Outstanding handles keep reading the last model; the entity is marked
    /// deleted and new lookups miss. Unknown scopes and unknown ids are
    /// no-ops.
    #[instrument(skip(self), fields(kind = %M::KIND), level = "debug")]
    pub async fn remove(&self, scope: Scope, id: Snowflake) -> Result<Option<Arc<M>>, CacheError> {
        Self::check_shape(scope)?;
        if !self.scopes.contains(scope) {
            trace!(%scope, %id, "Remove in unknown scope ignored");
            return Ok(None);
        }

        let lock = self.scope_lock(scope);
        let _guard = lock.lock().await;

        let stored = self.store.remove(scope, id).await?;
        let entity = self
            .entities
            .remove_if(&Self::key(scope, id), |_, entity| entity.scope() == scope)
            .map(|(_, entity)| entity);

        let last = entity.and_then(|entity| {
            entity.mark_deleted();
            entity.model()
        });

        self.report_size();
        Ok(stored.or(last))
    }

    /// Register a placeholder for `id` under `scope` before its model exists.
    ///
    /// The placeholder opens its owned scope so children can be written
    /// immediately. If an entity already exists it is returned unchanged.
    #[instrument(skip(self), fields(kind = %M::KIND), level = "debug")]
    pub fn attach_latent(&self, scope: Scope, id: Snowflake) -> Result<EntityHandle<M>, CacheError> {
        self.check_writable(scope)?;

        let handle = match self.entities.entry(Self::key(scope, id)) {
            Entry::Occupied(occupied) => occupied.get().acquire(),
            Entry::Vacant(vacant) => {
                let latent = Entity::latent(id, scope, self.controller.clone());
                let handle = latent.acquire();
                vacant.insert(latent);
                debug!(%scope, %id, "Latent entity attached");
                handle
            }
        };

        if let Some(owned) = M::KIND.owned_scope(id) {
            if !self.scopes.contains(owned) {
                self.scopes.register(owned, scope);
            }
        }
        Ok(handle)
    }

    /// Look up a live entity, materializing it from the store on a miss.
    pub async fn get(&self, scope: Scope, id: Snowflake) -> Result<Option<EntityHandle<M>>, CacheError> {
        Self::check_shape(scope)?;

        if let Some(entity) = self.entities.get(&Self::key(scope, id)) {
            if entity.is_live() && entity.scope() == scope {
                return Ok(Some(entity.value().acquire()));
            }
        }

        if !self.scopes.contains(scope) {
            return Ok(None);
        }

        Ok(self
            .store
            .get(scope, id)
            .await?
            .map(|model| self.adopt(scope, model)))
    }

    /// Look up a live entity by id alone, whatever scope it lives under.
    pub async fn get_by_id(&self, id: Snowflake) -> Result<Option<EntityHandle<M>>, CacheError> {
        if !M::KIND.is_user_keyed() {
            if let Some(entity) = self.entities.get(&EntityKey { scope: None, id }) {
                if entity.is_live() {
                    return Ok(Some(entity.value().acquire()));
                }
            }
        }

        Ok(self
            .store
            .find(id)
            .await?
            .map(|(scope, model)| self.adopt(scope, model)))
    }

    /// Every live entity under `scope`.
    pub async fn get_all(&self, scope: Scope) -> Result<Vec<EntityHandle<M>>, CacheError> {
        Self::check_shape(scope)?;
        Ok(self
            .store
            .get_all(scope)
            .await?
            .into_iter()
            .map(|model| self.adopt(scope, model))
            .collect())
    }

    pub async fn get_all_ids(&self, scope: Scope) -> Result<Vec<Snowflake>, CacheError> {
        Self::check_shape(scope)?;
        Ok(self.store.get_all_ids(scope).await?)
    }

    /// Drop every entry under `scope`, marking its entities deleted.
    #[instrument(skip(self), fields(kind = %M::KIND), level = "debug")]
    pub async fn purge_scope(&self, scope: Scope) -> Result<usize, CacheError> {
        Self::check_shape(scope)?;

        let lock = self.scope_lock(scope);
        let _guard = lock.lock().await;

        let removed = self.store.purge_scope(scope).await?;
        self.entities.retain(|_, entity| {
            if entity.scope() == scope {
                entity.mark_deleted();
                false
            } else {
                true
            }
        });

        self.report_size();
        Ok(removed.len())
    }

    /// Run the eviction policy once. Pinned entities are never evicted.
    pub async fn evict(&self) -> Result<usize, CacheError> {
        let now = Instant::now();
        let mut candidates = Vec::new();
        let mut scope_sizes: HashMap<Scope, usize> = HashMap::new();

        for entry in self.entities.iter() {
            let entity = entry.value();
            if !entity.is_live() {
                continue;
            }
            let scope = entity.scope();
            *scope_sizes.entry(scope).or_default() += 1;
            if !entity.is_pinned() {
                candidates.push(EvictionCandidate {
                    id: entity.id(),
                    scope,
                    last_access: entity.last_access(),
                });
            }
        }

        let selected = self.policy.select(&candidates, &scope_sizes, now);
        if selected.is_empty() {
            return Ok(0);
        }

        let mut evicted = 0;

        for (scope, id) in selected {
            let lock = self.scope_lock(scope);
            let _guard = lock.lock().await;

            // Store first, so a concurrent miss cannot re-materialize a stale entry
            let Some(model) = self.store.remove(scope, id).await? else {
                continue;
            };
            let removed = self
                .entities
                .remove_if(&Self::key(scope, id), |_, entity| {
                    entity.is_live() && !entity.is_pinned() && entity.scope() == scope
                })
                .is_some();

            if removed {
                evicted += 1;
            } else {
                // Pinned in the meantime
                self.store.upsert(scope, model).await?;
            }
        }

        if evicted > 0 {
            debug!(kind = %M::KIND, evicted, "Entities evicted");
            metrics::record_evictions(M::KIND.as_str(), evicted);
            self.report_size();
        }
        Ok(evicted)
    }

    /// Number of entities held, placeholders included.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of models in the backing store.
    pub async fn stored(&self) -> usize {
        self.store.len().await
    }
}
