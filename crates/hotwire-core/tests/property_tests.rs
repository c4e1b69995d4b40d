//! Property-based tests for invalidation planning
//!
//! Random dependency graphs with random accepting modules, checked against
//! the guarantees every plan must give.

use hotwire_core::{noop_callback, AcceptRegistry, DependencyGraph, InvalidationEngine, ModuleId};
use proptest::prelude::*;
use std::collections::HashSet;

const MODULES: usize = 12;

fn module(index: usize) -> ModuleId {
    ModuleId::new(format!("/app/m{}.hot", index))
}

/// Edges as (dependency, dependent) index pairs, cycles allowed
fn edges_strategy() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..MODULES, 0..MODULES), 0..40)
}

fn accepted_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), MODULES)
}

fn build(edges: &[(usize, usize)], accepted: &[bool]) -> (DependencyGraph, AcceptRegistry) {
    let mut graph = DependencyGraph::new();
    for &(dependency, dependent) in edges {
        if dependency != dependent {
            graph.record_edge(module(dependency), module(dependent));
        }
    }

    let mut registry = AcceptRegistry::new();
    for (index, &is_accepted) in accepted.iter().enumerate() {
        if is_accepted {
            registry.mark_accepted(module(index), Some(noop_callback()));
        }
    }
    (graph, registry)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Property: every recorded edge is visible, and duplicates collapse
    #[test]
    fn prop_recorded_edges_are_visible(edges in edges_strategy()) {
        let (graph, _) = build(&edges, &[]);

        let mut distinct = HashSet::new();
        for &(dependency, dependent) in &edges {
            if dependency == dependent {
                continue;
            }
            distinct.insert((dependency, dependent));
            prop_assert!(graph.dependants_of(&module(dependency)).contains(&module(dependent)));
        }
        prop_assert_eq!(graph.edge_count(), distinct.len());
    }

    // Property: plans evict each module once, and only reload evicted modules
    #[test]
    fn prop_plan_is_well_formed(
        edges in edges_strategy(),
        accepted in accepted_strategy(),
        changed in 0..MODULES,
        entry in 0..MODULES,
    ) {
        let (graph, registry) = build(&edges, &accepted);
        let entry = module(entry);
        let changed = module(changed);
        let plan = InvalidationEngine::new(&graph, &registry)
            .with_entry(Some(&entry))
            .plan(&changed);

        let evicted: HashSet<_> = plan.evictions.iter().cloned().collect();
        prop_assert_eq!(evicted.len(), plan.evictions.len());
        prop_assert!(evicted.contains(&changed));
        prop_assert!(!plan.reload.is_empty());

        for id in plan.reload_ids() {
            prop_assert!(evicted.contains(id));
            prop_assert!(registry.is_accepted(id) || (plan.fell_back_to_entry && *id == entry));
        }
    }

    // Property: propagation stops exactly at accepting modules
    #[test]
    fn prop_unaccepted_modules_propagate_to_all_dependants(
        edges in edges_strategy(),
        accepted in accepted_strategy(),
        changed in 0..MODULES,
    ) {
        let (graph, registry) = build(&edges, &accepted);
        let plan = InvalidationEngine::new(&graph, &registry).plan(&module(changed));
        let evicted: HashSet<_> = plan.evictions.iter().cloned().collect();

        for id in &plan.evictions {
            if registry.is_accepted(id) {
                prop_assert!(plan.reload.contains_key(id));
            } else {
                for dependant in graph.dependants_of(id) {
                    prop_assert!(evicted.contains(dependant));
                }
            }
        }
    }

    // Property: planning never mutates the graph or the registry
    #[test]
    fn prop_planning_is_pure(
        edges in edges_strategy(),
        accepted in accepted_strategy(),
        changed in 0..MODULES,
    ) {
        let (graph, registry) = build(&edges, &accepted);
        let edge_count = graph.edge_count();
        let accepted_count = registry.len();

        let _ = InvalidationEngine::new(&graph, &registry)
            .with_entry(Some(&module(0)))
            .plan(&module(changed));

        prop_assert_eq!(graph.edge_count(), edge_count);
        prop_assert_eq!(registry.len(), accepted_count);
    }
}
