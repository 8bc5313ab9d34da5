//! Live scope registry.

use dashmap::DashMap;

use crate::domain::value_objects::Scope;

/// Tracks which scopes exist and the scope each one was opened under.
///
/// A guild scope is opened by its guild (stored globally); a channel scope
/// by its channel or thread (stored globally or under a guild). The global
/// scope always exists.
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    /// scope -> parent scope
    scopes: DashMap<Scope, Scope>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `scope` as a child of `parent`, replacing any previous parent.
    pub fn register(&self, scope: Scope, parent: Scope) {
        if scope != Scope::Global {
            self.scopes.insert(scope, parent);
        }
    }

    pub fn contains(&self, scope: Scope) -> bool {
        scope == Scope::Global || self.scopes.contains_key(&scope)
    }

    pub fn parent(&self, scope: Scope) -> Option<Scope> {
        self.scopes.get(&scope).map(|p| *p.value())
    }

    /// Direct children of `scope`.
    pub fn children(&self, scope: Scope) -> Vec<Scope> {
        self.scopes
            .iter()
            .filter(|e| *e.value() == scope && *e.key() != scope)
            .map(|e| *e.key())
            .collect()
    }

    /// All scopes below `scope`, deepest first.
    pub fn descendants(&self, scope: Scope) -> Vec<Scope> {
        let mut out = Vec::new();
        let mut frontier = self.children(scope);
        while let Some(next) = frontier.pop() {
            frontier.extend(self.children(next));
            out.push(next);
        }
        out.reverse();
        out
    }

    /// Remove `scope`. The global scope cannot be removed.
    pub fn unregister(&self, scope: Scope) -> bool {
        self.scopes.remove(&scope).is_some()
    }

    /// Number of live scopes, global included.
    pub fn count(&self) -> usize {
        self.scopes.len() + 1
    }
}
