//! Diff engine for sub-resource collections.
//!
//! Computes the minimal create/update/delete operation sets needed to
//! reconcile a desired collection against the current one. Entities are
//! matched strictly by remote-assigned identity, never by position: an
//! entity without an identity is always a create, and identities present
//! only in the current collection become deletes.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use tracing::debug;

/// Contract for entities the diff engine can reconcile.
pub trait Reconcilable {
    /// Identity type assigned by the remote system.
    type Id: Eq + Hash + Clone + Debug;

    /// The remote-assigned identity, absent until first create.
    fn identity(&self) -> Option<Self::Id>;

    /// Returns true if the kind-specific payload differs from `current`
    /// and an update call is required. Field-for-field equal entities must
    /// return false so reconciliation stays idempotent.
    fn differs_from(&self, current: &Self) -> bool;
}

/// Engine for computing collection diffs.
#[derive(Debug, Default)]
pub struct DiffEngine;

/// Operation sets produced by a diff.
#[derive(Debug)]
pub struct DiffResult<T: Reconcilable> {
    /// Entities to create, in plan order.
    pub creates: Vec<T>,
    /// Entities to update, as (identity, desired entity) pairs.
    pub updates: Vec<(T::Id, T)>,
    /// Identities to delete.
    pub deletes: Vec<T::Id>,
    /// Number of matched entities requiring no operation.
    pub unchanged: usize,
}

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the operation sets reconciling `state` toward `plan`.
    pub fn compute<T>(&self, plan: &[T], state: &[T]) -> DiffResult<T>
    where
        T: Reconcilable + Clone,
    {
        // Index the current collection by identity so matching stays linear.
        let current_by_id: HashMap<T::Id, &T> = state
            .iter()
            .filter_map(|e| e.identity().map(|id| (id, e)))
            .collect();

        let mut creates = Vec::new();
        let mut updates = Vec::new();
        let mut unchanged = 0;
        let mut matched: HashSet<T::Id> = HashSet::new();

        for desired in plan {
            match desired.identity() {
                None => creates.push(desired.clone()),
                Some(id) => {
                    matched.insert(id.clone());
                    match current_by_id.get(&id) {
                        Some(current) if desired.differs_from(current) => {
                            debug!("Entity {id:?} changed, scheduling update");
                            updates.push((id, desired.clone()));
                        }
                        Some(_) => unchanged += 1,
                        // Identity known to the plan but gone remotely;
                        // recreate it.
                        None => {
                            debug!("Entity {id:?} missing remotely, scheduling create");
                            creates.push(desired.clone());
                        }
                    }
                }
            }
        }

        let deletes: Vec<T::Id> = state
            .iter()
            .filter_map(Reconcilable::identity)
            .filter(|id| !matched.contains(id))
            .collect();

        DiffResult {
            creates,
            updates,
            deletes,
            unchanged,
        }
    }
}

impl<T: Reconcilable> DiffResult<T> {
    /// Returns true if any operation is required.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.creates.is_empty() || !self.updates.is_empty() || !self.deletes.is_empty()
    }

    /// Returns the total number of operations.
    #[must_use]
    pub fn total_changes(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Disk {
        id: Option<i64>,
        path: String,
    }

    impl Disk {
        fn new(id: Option<i64>, path: &str) -> Self {
            Self {
                id,
                path: path.to_string(),
            }
        }
    }

    impl Reconcilable for Disk {
        type Id = i64;

        fn identity(&self) -> Option<i64> {
            self.id
        }

        fn differs_from(&self, current: &Self) -> bool {
            self.path != current.path
        }
    }

    #[test]
    fn test_equal_collections_produce_no_operations() {
        let engine = DiffEngine::new();
        let plan = vec![Disk::new(Some(1), "/a"), Disk::new(Some(2), "/b")];
        let state = plan.clone();

        let result = engine.compute(&plan, &state);

        assert!(!result.has_changes());
        assert_eq!(result.unchanged, 2);
    }

    #[test]
    fn test_matching_is_by_identity_not_position() {
        let engine = DiffEngine::new();
        let plan = vec![Disk::new(Some(2), "/b"), Disk::new(Some(1), "/a")];
        let state = vec![Disk::new(Some(1), "/a"), Disk::new(Some(2), "/b")];

        let result = engine.compute(&plan, &state);

        assert!(!result.has_changes());
        assert_eq!(result.unchanged, 2);
    }

    #[test]
    fn test_mixed_create_update_delete() {
        let engine = DiffEngine::new();
        let plan = vec![Disk::new(None, "/a"), Disk::new(Some(50), "/b")];
        let state = vec![Disk::new(Some(50), "/old"), Disk::new(Some(60), "/c")];

        let result = engine.compute(&plan, &state);

        assert_eq!(result.creates, vec![Disk::new(None, "/a")]);
        assert_eq!(result.updates, vec![(50, Disk::new(Some(50), "/b"))]);
        assert_eq!(result.deletes, vec![60]);
        assert_eq!(result.total_changes(), 3);
    }

    #[test]
    fn test_missing_identity_always_means_create() {
        let engine = DiffEngine::new();
        // Content-identical to state, but no identity: still a create.
        let plan = vec![Disk::new(None, "/a")];
        let state = vec![Disk::new(Some(1), "/a")];

        let result = engine.compute(&plan, &state);

        assert_eq!(result.creates.len(), 1);
        assert_eq!(result.deletes, vec![1]);
    }

    #[test]
    fn test_remotely_removed_entity_is_recreated() {
        let engine = DiffEngine::new();
        let plan = vec![Disk::new(Some(7), "/a")];
        let state: Vec<Disk> = vec![];

        let result = engine.compute(&plan, &state);

        assert_eq!(result.creates.len(), 1);
        assert!(result.updates.is_empty());
        assert!(result.deletes.is_empty());
    }

    #[test]
    fn test_plan_order_preserved_for_creates() {
        let engine = DiffEngine::new();
        let plan = vec![
            Disk::new(None, "/first"),
            Disk::new(None, "/second"),
            Disk::new(None, "/third"),
        ];

        let result = engine.compute(&plan, &[]);

        let paths: Vec<&str> = result.creates.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["/first", "/second", "/third"]);
    }
}
