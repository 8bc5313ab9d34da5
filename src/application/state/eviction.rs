//! Eviction policies.
//!
//! A policy only ever sees unpinned, live entities. Whatever it selects is
//! re-checked for outstanding handles at removal time.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::domain::value_objects::{Scope, Snowflake};

/// An entity the policy may choose to evict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionCandidate {
    pub id: Snowflake,
    pub scope: Scope,
    pub last_access: Instant,
}

/// Chooses which unpinned entities to drop.
///
/// Selections are `(scope, id)` pairs: user-keyed kinds hold one entity per
/// guild under the same id.
pub trait EvictionPolicy: fmt::Debug + Send + Sync {
    /// # Arguments
    /// * `candidates` - Unpinned live entities
    /// * `scope_sizes` - Live entity count per scope, pinned ones included
    /// * `now` - Reference instant for age calculations
    fn select(
        &self,
        candidates: &[EvictionCandidate],
        scope_sizes: &HashMap<Scope, usize>,
        now: Instant,
    ) -> Vec<(Scope, Snowflake)>;
}

/// Keep everything until deleted or purged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverEvict;

impl EvictionPolicy for NeverEvict {
    fn select(
        &self,
        _candidates: &[EvictionCandidate],
        _scope_sizes: &HashMap<Scope, usize>,
        _now: Instant,
    ) -> Vec<(Scope, Snowflake)> {
        Vec::new()
    }
}

/// Bound each scope to `max` entries, least recently used first.
#[derive(Debug, Clone, Copy)]
pub struct MaxEntriesPerScope {
    pub max: usize,
}

impl MaxEntriesPerScope {
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl EvictionPolicy for MaxEntriesPerScope {
    fn select(
        &self,
        candidates: &[EvictionCandidate],
        scope_sizes: &HashMap<Scope, usize>,
        _now: Instant,
    ) -> Vec<(Scope, Snowflake)> {
        let mut by_scope: HashMap<Scope, Vec<&EvictionCandidate>> = HashMap::new();
        for candidate in candidates {
            by_scope.entry(candidate.scope).or_default().push(candidate);
        }

        let mut selected = Vec::new();
        for (scope, mut group) in by_scope {
            let size = scope_sizes.get(&scope).copied().unwrap_or(group.len());
            let excess = size.saturating_sub(self.max);
            if excess == 0 {
                continue;
            }
            group.sort_by_key(|c| (c.last_access, c.id));
            selected.extend(group.into_iter().take(excess).map(|c| (c.scope, c.id)));
        }
        selected
    }
}

/// Drop entries not accessed for `idle`.
#[derive(Debug, Clone, Copy)]
pub struct IdleFor {
    pub idle: Duration,
}

impl IdleFor {
    pub fn new(idle: Duration) -> Self {
        Self { idle }
    }
}

impl EvictionPolicy for IdleFor {
    fn select(
        &self,
        candidates: &[EvictionCandidate],
        _scope_sizes: &HashMap<Scope, usize>,
        now: Instant,
    ) -> Vec<(Scope, Snowflake)> {
        candidates
            .iter()
            .filter(|c| now.saturating_duration_since(c.last_access) >= self.idle)
            .map(|c| (c.scope, c.id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn candidate(id: u64, scope: Scope, age_secs: u64, now: Instant) -> EvictionCandidate {
        EvictionCandidate {
            id: Snowflake::new(id),
            scope,
            last_access: now - Duration::from_secs(age_secs),
        }
    }

    #[test]
    fn test_never_selects_nothing() {
        let now = Instant::now();
        let candidates = vec![candidate(1, Scope::Global, 100, now)];
        assert!(NeverEvict.select(&candidates, &HashMap::new(), now).is_empty());
    }

    #[test]
    fn test_max_entries_drops_oldest_per_scope() {
        let now = Instant::now();
        let a = Scope::Channel(Snowflake::new(10));
        let b = Scope::Channel(Snowflake::new(11));
        let candidates = vec![
            candidate(1, a, 30, now),
            candidate(2, a, 10, now),
            candidate(3, a, 20, now),
            candidate(4, b, 50, now),
        ];
        let sizes = HashMap::from([(a, 3), (b, 1)]);

        let mut selected = MaxEntriesPerScope::new(2).select(&candidates, &sizes, now);
        selected.sort();

        assert_eq!(selected, vec![(a, Snowflake::new(1))]);
    }

    #[test]
    fn test_max_entries_counts_pinned_entries() {
        let now = Instant::now();
        let a = Scope::Channel(Snowflake::new(10));
        // Three live entries, only two unpinned
        let candidates = vec![candidate(1, a, 30, now), candidate(2, a, 10, now)];
        let sizes = HashMap::from([(a, 3)]);

        let selected = MaxEntriesPerScope::new(1).select(&candidates, &sizes, now);

        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_idle_for_threshold() {
        let now = Instant::now();
        let candidates = vec![
            candidate(1, Scope::Global, 120, now),
            candidate(2, Scope::Global, 10, now),
        ];

        let selected = IdleFor::new(Duration::from_secs(60)).select(&candidates, &HashMap::new(), now);

        assert_eq!(selected, vec![(Scope::Global, Snowflake::new(1))]);
    }

    #[test]
    fn test_idle_for_keeps_scope_of_shared_ids() {
        let now = Instant::now();
        let a = Scope::Guild(Snowflake::new(100));
        let b = Scope::Guild(Snowflake::new(200));
        // Same user id in two guilds, only the first one idle
        let candidates = vec![candidate(5, a, 120, now), candidate(5, b, 10, now)];

        let selected = IdleFor::new(Duration::from_secs(60)).select(&candidates, &HashMap::new(), now);

        assert_eq!(selected, vec![(a, Snowflake::new(5))]);
    }
}
