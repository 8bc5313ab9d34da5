//! Reference-counted entity leases.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use super::entity::Entity;
use crate::domain::models::Model;

/// A lease on a cached entity.
///
/// While at least one handle exists the entity is pinned and eviction skips
/// it. Cloning takes another lease; dropping releases one, on every exit
/// path.
pub struct EntityHandle<M: Model> {
    entity: Arc<Entity<M>>,
}

impl<M: Model> EntityHandle<M> {
    pub(crate) fn new(entity: Arc<Entity<M>>) -> Self {
        entity.retain();
        Self { entity }
    }

    /// Whether two handles lease the same entity instance.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.entity, &b.entity)
    }

    pub fn entity(&self) -> &Arc<Entity<M>> {
        &self.entity
    }
}

impl<M: Model> Clone for EntityHandle<M> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.entity))
    }
}

impl<M: Model> Drop for EntityHandle<M> {
    fn drop(&mut self) {
        self.entity.release();
    }
}

impl<M: Model> Deref for EntityHandle<M> {
    type Target = Entity<M>;

    fn deref(&self) -> &Self::Target {
        &self.entity
    }
}

impl<M: Model> fmt::Debug for EntityHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityHandle").field(&self.entity).finish()
    }
}
