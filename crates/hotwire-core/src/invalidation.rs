use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::accept::{noop_callback, AcceptCallback, AcceptRegistry};
use crate::graph::DependencyGraph;
use crate::module_id::ModuleId;

/// Result of planning one change: what to evict and what to reload.
pub struct InvalidationPlan {
    /// The module whose file changed.
    pub changed: ModuleId,

    /// Every visited module, in the order it is evicted (dependants first).
    pub evictions: Vec<ModuleId>,

    /// Modules to re-evaluate with the callback to notify, in visit order.
    pub reload: IndexMap<ModuleId, AcceptCallback>,

    /// Set when nothing accepted the change and the entry module was chosen.
    pub fell_back_to_entry: bool,
}

impl InvalidationPlan {
    pub fn reload_ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.reload.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.reload.is_empty() && self.evictions.is_empty()
    }
}

impl std::fmt::Debug for InvalidationPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationPlan")
            .field("changed", &self.changed)
            .field("evictions", &self.evictions)
            .field("reload", &self.reload.keys().collect::<Vec<_>>())
            .field("fell_back_to_entry", &self.fell_back_to_entry)
            .finish()
    }
}

/// Engine for computing which modules a change invalidates
///
/// Planning is pure: it reads the graph and registry as they are when the
/// change arrives and never mutates them. The session applies the evictions
/// afterwards, before any module is re-evaluated.
pub struct InvalidationEngine<'a> {
    graph: &'a DependencyGraph,
    accepted: &'a AcceptRegistry,
    entry: Option<&'a ModuleId>,
}

impl<'a> InvalidationEngine<'a> {
    pub fn new(graph: &'a DependencyGraph, accepted: &'a AcceptRegistry) -> Self {
        Self {
            graph,
            accepted,
            entry: None,
        }
    }

    /// Module to reload when nothing accepts a change.
    pub fn with_entry(mut self, entry: Option<&'a ModuleId>) -> Self {
        self.entry = entry;
        self
    }

    /// Walk dependants upward from `changed` until accepting modules are hit.
    ///
    /// An accepting module joins the reload set and shields its own
    /// dependants. A module without acceptance propagates to every dependant.
    /// Either way the module is evicted, so that whoever re-requires it later
    /// gets a fresh evaluation. Each module is expanded at most once, which
    /// also makes require cycles terminate.
    pub fn plan(&self, changed: &ModuleId) -> InvalidationPlan {
        let mut plan = InvalidationPlan {
            changed: changed.clone(),
            evictions: Vec::new(),
            reload: IndexMap::new(),
            fell_back_to_entry: false,
        };

        let mut visited = FxHashSet::default();
        // (module, dependants already pushed)
        let mut stack = vec![(changed.clone(), false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                plan.evictions.push(id);
                continue;
            }
            if !visited.insert(id.clone()) {
                continue;
            }

            stack.push((id.clone(), true));
            match self.accepted.accepted_callback(&id) {
                Some(callback) => {
                    plan.reload.insert(id, callback);
                }
                None => {
                    for dependant in self.graph.dependants_of(&id).iter().rev() {
                        if !visited.contains(dependant) {
                            stack.push((dependant.clone(), false));
                        }
                    }
                }
            }
        }

        if plan.reload.is_empty() {
            if let Some(entry) = self.entry {
                let callback = self
                    .accepted
                    .accepted_callback(entry)
                    .unwrap_or_else(noop_callback);
                plan.reload.insert(entry.clone(), callback);
                // A change that never reached the entry still has to restart it.
                if !visited.contains(entry) {
                    plan.evictions.push(entry.clone());
                }
                plan.fell_back_to_entry = true;
            }
        }

        plan
    }
}
