//! Identity-stable entities.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use super::controller::StateController;
use super::handle::EntityHandle;
use crate::domain::models::Model;
use crate::domain::value_objects::{Scope, Snowflake};

/// Lifecycle of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Latent placeholder; no model has arrived yet
    Unmaterialized,
    /// Backed by a current model
    Live,
    /// Removed from the cache; keeps its last model for outstanding handles
    Deleted,
}

struct Slot<M> {
    state: EntityState,
    scope: Scope,
    model: Option<Arc<M>>,
}

/// A cached object with a stable identity.
///
/// The id never changes. The model is replaced wholesale under a lock, so a
/// reader sees either the previous or the next model, never a mix. Relations
/// to other entities go through a weak reference to the state controller.
pub struct Entity<M: Model> {
    id: Snowflake,
    slot: RwLock<Slot<M>>,
    handles: AtomicUsize,
    last_access: Mutex<Instant>,
    controller: Weak<StateController>,
}

impl<M: Model> Entity<M> {
    pub(crate) fn live(
        scope: Scope,
        model: Arc<M>,
        controller: Weak<StateController>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: model.id(),
            slot: RwLock::new(Slot {
                state: EntityState::Live,
                scope,
                model: Some(model),
            }),
            handles: AtomicUsize::new(0),
            last_access: Mutex::new(Instant::now()),
            controller,
        })
    }

    pub(crate) fn latent(
        id: Snowflake,
        scope: Scope,
        controller: Weak<StateController>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            slot: RwLock::new(Slot {
                state: EntityState::Unmaterialized,
                scope,
                model: None,
            }),
            handles: AtomicUsize::new(0),
            last_access: Mutex::new(Instant::now()),
            controller,
        })
    }

    pub fn id(&self) -> Snowflake {
        self.id
    }

    /// The scope this entity is stored under.
    pub fn scope(&self) -> Scope {
        self.slot.read().scope
    }

    pub fn state(&self) -> EntityState {
        self.slot.read().state
    }

    pub fn is_live(&self) -> bool {
        self.state() == EntityState::Live
    }

    pub fn is_deleted(&self) -> bool {
        self.state() == EntityState::Deleted
    }

    /// The current model; the last known one once deleted. `None` while latent.
    pub fn model(&self) -> Option<Arc<M>> {
        self.slot.read().model.clone()
    }

    /// Read through the current model.
    pub fn with_model<T>(&self, f: impl FnOnce(&M) -> T) -> Option<T> {
        self.slot.read().model.as_deref().map(f)
    }

    /// Swap in a newer model. A no-op returning `false` once deleted.
    ///
    /// A latent placeholder becomes live.
    pub fn update(&self, model: Arc<M>) -> bool {
        let mut slot = self.slot.write();
        if slot.state == EntityState::Deleted {
            return false;
        }
        slot.model = Some(model);
        slot.state = EntityState::Live;
        true
    }

    pub(crate) fn update_in(&self, scope: Scope, model: Arc<M>) -> bool {
        let mut slot = self.slot.write();
        if slot.state == EntityState::Deleted {
            return false;
        }
        slot.scope = scope;
        slot.model = Some(model);
        slot.state = EntityState::Live;
        true
    }

    pub(crate) fn mark_deleted(&self) {
        self.slot.write().state = EntityState::Deleted;
    }

    /// Take a new lease on this entity.
    pub fn acquire(self: &Arc<Self>) -> EntityHandle<M> {
        EntityHandle::new(Arc::clone(self))
    }

    /// Number of outstanding handles.
    pub fn handle_count(&self) -> usize {
        self.handles.load(Ordering::Acquire)
    }

    pub fn is_pinned(&self) -> bool {
        self.handle_count() > 0
    }

    pub fn last_access(&self) -> Instant {
        *self.last_access.lock()
    }

    pub(crate) fn retain(&self) {
        self.handles.fetch_add(1, Ordering::AcqRel);
        *self.last_access.lock() = Instant::now();
    }

    pub(crate) fn release(&self) {
        self.handles.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn controller(&self) -> Option<Arc<StateController>> {
        self.controller.upgrade()
    }
}

impl<M: Model> fmt::Debug for Entity<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.read();
        f.debug_struct("Entity")
            .field("kind", &M::KIND)
            .field("id", &self.id)
            .field("scope", &slot.scope)
            .field("state", &slot.state)
            .field("handles", &self.handle_count())
            .finish()
    }
}
