use rustc_hash::FxHashMap;

use crate::module_id::ModuleId;

/// Reverse dependency graph: dependency -> modules that required it.
///
/// Edges are only ever added one at a time; a node loses all of its
/// dependants at once when it is evicted.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    dependants: FxHashMap<ModuleId, Vec<ModuleId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `dependent` required `dependency`.
    ///
    /// Returns false when the edge was already present. Repeated requires of
    /// a cached dependency keep a single entry, so the lists do not grow with
    /// every reload of the dependent.
    pub fn record_edge(&mut self, dependency: ModuleId, dependent: ModuleId) -> bool {
        let dependants = self.dependants.entry(dependency).or_default();
        if dependants.contains(&dependent) {
            return false;
        }
        dependants.push(dependent);
        true
    }

    /// Drop every dependant recorded for `id`. Idempotent.
    pub fn evict(&mut self, id: &ModuleId) -> bool {
        self.dependants.remove(id).is_some()
    }

    /// Recorded dependants in insertion order, empty if none.
    pub fn dependants_of(&self, id: &ModuleId) -> &[ModuleId] {
        self.dependants.get(id).map_or(&[], Vec::as_slice)
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.dependants.contains_key(id)
    }

    /// Number of modules that have at least one recorded dependant.
    pub fn len(&self) -> usize {
        self.dependants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependants.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.dependants.values().map(Vec::len).sum()
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleId> {
        self.dependants.keys()
    }
}
