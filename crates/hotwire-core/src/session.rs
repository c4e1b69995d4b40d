use rustc_hash::FxHashSet;
use std::fmt::Display;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::accept::{AcceptCallback, AcceptRegistry};
use crate::config::HotOptions;
use crate::crash::CrashSafetyNet;
use crate::diagnostics::DiagnosticHandler;
use crate::eligibility::EligibilityFilter;
use crate::errors::{HotError, Result};
use crate::graph::DependencyGraph;
use crate::invalidation::InvalidationEngine;
use crate::loader::ModuleLoader;
use crate::module_id::ModuleId;
use crate::reload::{self, ReloadReport};
use crate::watcher::ModuleWatcher;

/// Mutable tracking state shared by every module loaded in one session.
pub(crate) struct ModuleTracker {
    pub(crate) graph: DependencyGraph,
    pub(crate) accepted: AcceptRegistry,
    pub(crate) filter: EligibilityFilter,
    pub(crate) entry: Option<ModuleId>,
    /// Eligible modules that began evaluating and were not evicted since
    pub(crate) loaded: FxHashSet<ModuleId>,
    pub(crate) watcher: Box<dyn ModuleWatcher>,
    pub(crate) diagnostics: Arc<dyn DiagnosticHandler>,
    pub(crate) safety_net: CrashSafetyNet,
    pub(crate) silent_require_error: bool,
}

impl ModuleTracker {
    /// Hook run when a module starts evaluating.
    ///
    /// Clears the module's previous acceptance (it has to accept again in
    /// this evaluation) and starts watching its file. Returns whether the
    /// module is tracked at all.
    pub(crate) fn on_module_begin_load(&mut self, id: &ModuleId) -> bool {
        if !self.filter.is_eligible(id) {
            trace!("Not tracking {}", id);
            return false;
        }
        self.accepted.clear_accepted(id);
        self.loaded.insert(id.clone());
        self.watch(id);
        true
    }

    /// Hook run after `parent` successfully required `child`.
    pub(crate) fn on_dependency_resolved(&mut self, parent: &ModuleId, child: &ModuleId) {
        if !self.filter.is_eligible(child) || !self.filter.is_eligible(parent) {
            return;
        }
        self.watch(child);
        if self.graph.record_edge(child.clone(), parent.clone()) {
            trace!("Recorded edge {} -> {}", child, parent);
        }
    }

    /// Keep an evicted module tracked although it was not reloaded, so its
    /// next change still reaches the session.
    pub(crate) fn keep_tracking(&mut self, id: &ModuleId) {
        if self.filter.is_eligible(id) && self.loaded.insert(id.clone()) {
            self.watch(id);
        }
    }

    fn watch(&mut self, id: &ModuleId) {
        if let Err(e) = self.watcher.watch(id) {
            warn!("Failed to watch {}: {}", id, e);
        }
    }

    /// Remove every trace of `id`: graph entry, acceptance, watch and cached
    /// instance.
    pub(crate) fn evict(&mut self, id: &ModuleId, loader: &dyn ModuleLoader) {
        self.graph.evict(id);
        self.accepted.clear_accepted(id);
        self.loaded.remove(id);
        if let Err(e) = self.watcher.unwatch(id) {
            warn!("Failed to unwatch {}: {}", id, e);
        }
        loader.evict_from_cache(id);
        debug!("Evicted {}", id);
    }

    pub(crate) fn contain_failure(&mut self, failure: &dyn Display) -> usize {
        self.safety_net.contain(
            &mut self.accepted,
            self.entry.as_ref(),
            failure,
            self.diagnostics.as_ref(),
        )
    }
}

/// Load `id` through the loader unless it is already cached.
pub(crate) fn load_module(
    tracker: &mut ModuleTracker,
    loader: &dyn ModuleLoader,
    id: &ModuleId,
) -> Result<()> {
    if loader.is_cached(id) {
        return Ok(());
    }

    let hot = tracker.on_module_begin_load(id);
    let mut scope = ModuleScope {
        tracker,
        loader,
        module: id.clone(),
        hot,
    };
    debug!("Evaluating {}", id);
    loader
        .evaluate(id, &mut scope)
        .map_err(|source| HotError::Evaluation {
            module: id.clone(),
            source,
        })
}

/// What a module sees of the session while its code runs.
///
/// Requires made through the scope are tracked as dependencies of the
/// module, and `accept` registers the module as a stabilization boundary.
pub struct ModuleScope<'a> {
    tracker: &'a mut ModuleTracker,
    loader: &'a dyn ModuleLoader,
    module: ModuleId,
    hot: bool,
}

impl ModuleScope<'_> {
    /// The module being evaluated.
    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    /// Whether this module is tracked and may accept reloads.
    pub fn is_hot(&self) -> bool {
        self.hot
    }

    /// Load a dependency of this module and record the edge.
    pub fn require(&mut self, request: &str) -> Result<ModuleId> {
        let child = self.loader.resolve(request, Some(&self.module))?;
        load_module(&mut *self.tracker, self.loader, &child)?;
        self.tracker.on_dependency_resolved(&self.module, &child);
        Ok(child)
    }

    /// Accept reloads of this module without a callback.
    pub fn accept(&mut self) {
        self.register(None);
    }

    /// Accept reloads of this module, calling `callback` after each one.
    ///
    /// A later call replaces the earlier callback.
    pub fn accept_with(&mut self, callback: impl Fn(Option<&HotError>) + 'static) {
        let callback: AcceptCallback = Rc::new(callback);
        self.register(Some(callback));
    }

    fn register(&mut self, callback: Option<AcceptCallback>) {
        if !self.hot {
            trace!("Ignoring accept from untracked module {}", self.module);
            return;
        }
        self.tracker
            .accepted
            .mark_accepted(self.module.clone(), callback);
    }
}

/// One hot-reload session: the dependency graph, the accept registry and the
/// loader they describe.
///
/// Sessions are independent of each other; nothing is process-global.
pub struct Session<L: ModuleLoader> {
    tracker: ModuleTracker,
    loader: L,
}

impl<L: ModuleLoader> Session<L> {
    pub fn new(
        loader: L,
        watcher: Box<dyn ModuleWatcher>,
        options: &HotOptions,
        filter: EligibilityFilter,
        diagnostics: Arc<dyn DiagnosticHandler>,
    ) -> Self {
        Self {
            tracker: ModuleTracker {
                graph: DependencyGraph::new(),
                accepted: AcceptRegistry::new(),
                filter,
                entry: None,
                loaded: FxHashSet::default(),
                watcher,
                diagnostics,
                safety_net: CrashSafetyNet::new(!options.no_exception_catch),
                silent_require_error: options.silent_require_error,
            },
            loader,
        }
    }

    /// Load the program's entry module and remember it as the fallback
    /// reload target.
    pub fn load_entry(&mut self, request: &str) -> Result<ModuleId> {
        let entry = self.loader.resolve(request, None)?;
        self.tracker.entry = Some(entry.clone());
        load_module(&mut self.tracker, &self.loader, &entry)?;
        Ok(entry)
    }

    /// Load a module outside any parent; no edge is recorded.
    pub fn require(&mut self, request: &str) -> Result<ModuleId> {
        let id = self.loader.resolve(request, None)?;
        load_module(&mut self.tracker, &self.loader, &id)?;
        Ok(id)
    }

    /// Hook for hosts that drive evaluation themselves.
    pub fn on_module_begin_load(&mut self, id: &ModuleId) -> bool {
        self.tracker.on_module_begin_load(id)
    }

    /// Hook for hosts that drive evaluation themselves.
    pub fn on_dependency_resolved(&mut self, parent: &ModuleId, child: &ModuleId) {
        self.tracker.on_dependency_resolved(parent, child);
    }

    /// React to a change of `changed` on disk.
    ///
    /// Plans the invalidation, evicts every visited module, and only then
    /// reloads the reload set. Changes to modules the session does not track
    /// are ignored.
    pub fn handle_change(&mut self, changed: &ModuleId) -> ReloadReport {
        if !self.is_tracked(changed) {
            debug!("Ignoring change of untracked {}", changed);
            return ReloadReport::ignored(changed.clone());
        }

        let plan = InvalidationEngine::new(&self.tracker.graph, &self.tracker.accepted)
            .with_entry(self.tracker.entry.as_ref())
            .plan(changed);

        for id in &plan.evictions {
            self.tracker.evict(id, &self.loader);
        }

        reload::run_batch(&mut self.tracker, &self.loader, plan)
    }

    /// Report a failure nothing else handled.
    ///
    /// Returns the number of accept registrations dropped.
    pub fn report_uncaught_failure(&mut self, failure: &dyn Display) -> usize {
        self.tracker.contain_failure(failure)
    }

    /// Whether a change of `id` concerns this session.
    ///
    /// Modules whose last evaluation failed stay tracked, so fixing them
    /// triggers a reload.
    pub fn is_tracked(&self, id: &ModuleId) -> bool {
        self.tracker.filter.is_eligible(id)
            && (self.tracker.loaded.contains(id)
                || self.tracker.graph.contains(id)
                || self.tracker.accepted.is_accepted(id)
                || self.tracker.entry.as_ref() == Some(id)
                || self.loader.is_cached(id))
    }

    pub fn entry(&self) -> Option<&ModuleId> {
        self.tracker.entry.as_ref()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.tracker.graph
    }

    pub fn accepted(&self) -> &AcceptRegistry {
        &self.tracker.accepted
    }

    pub fn is_accepted(&self, id: &ModuleId) -> bool {
        self.tracker.accepted.is_accepted(id)
    }

    pub fn filter(&self) -> &EligibilityFilter {
        &self.tracker.filter
    }

    pub fn safety_net(&self) -> CrashSafetyNet {
        self.tracker.safety_net
    }

    pub fn diagnostics(&self) -> &Arc<dyn DiagnosticHandler> {
        &self.tracker.diagnostics
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnosticHandler;
    use rustc_hash::{FxHashMap, FxHashSet};
    use std::cell::{Cell, RefCell};

    /// Module body: requests to require, and whether to accept.
    #[derive(Clone, Default)]
    struct Body {
        requires: Vec<&'static str>,
        accept: bool,
        fail: bool,
    }

    /// In-memory loader where ids are the requests themselves.
    #[derive(Default)]
    struct TableLoader {
        bodies: RefCell<FxHashMap<String, Body>>,
        cache: RefCell<FxHashSet<ModuleId>>,
        evaluations: RefCell<FxHashMap<String, usize>>,
        callbacks: Rc<Cell<usize>>,
    }

    impl TableLoader {
        fn with(modules: &[(&str, Body)]) -> Self {
            let loader = Self::default();
            for (name, body) in modules {
                loader.bodies.borrow_mut().insert(name.to_string(), body.clone());
            }
            loader
        }

        fn evaluations(&self, id: &str) -> usize {
            self.evaluations.borrow().get(id).copied().unwrap_or(0)
        }
    }

    impl ModuleLoader for TableLoader {
        fn resolve(&self, request: &str, parent: Option<&ModuleId>) -> Result<ModuleId> {
            if self.bodies.borrow().contains_key(request) {
                Ok(ModuleId::new(request))
            } else {
                Err(HotError::Resolution {
                    request: request.to_string(),
                    parent: parent.cloned(),
                })
            }
        }

        fn is_cached(&self, id: &ModuleId) -> bool {
            self.cache.borrow().contains(id)
        }

        fn evaluate(&self, id: &ModuleId, scope: &mut ModuleScope<'_>) -> anyhow::Result<()> {
            let body = self.bodies.borrow()[id.as_str()].clone();
            self.cache.borrow_mut().insert(id.clone());
            *self
                .evaluations
                .borrow_mut()
                .entry(id.to_string())
                .or_default() += 1;

            let result = (|| {
                for request in &body.requires {
                    scope.require(request)?;
                }
                if body.fail {
                    anyhow::bail!("failed on purpose");
                }
                if body.accept {
                    let calls = Rc::clone(&self.callbacks);
                    scope.accept_with(move |_| calls.set(calls.get() + 1));
                }
                Ok(())
            })();

            if result.is_err() {
                self.cache.borrow_mut().remove(id);
            }
            result
        }

        fn evict_from_cache(&self, id: &ModuleId) {
            self.cache.borrow_mut().remove(id);
        }
    }

    fn session(loader: TableLoader) -> Session<TableLoader> {
        Session::new(
            loader,
            Box::new(crate::watcher::NullWatcher),
            &HotOptions::default(),
            EligibilityFilter::default(),
            Arc::new(CollectingDiagnosticHandler::new()),
        )
    }

    fn body(requires: &[&'static str], accept: bool) -> Body {
        Body {
            requires: requires.to_vec(),
            accept,
            fail: false,
        }
    }

    #[test]
    fn test_require_records_reverse_edges() {
        let loader = TableLoader::with(&[
            ("/entry", body(&["/a", "/b"], false)),
            ("/a", body(&["/b"], false)),
            ("/b", body(&[], false)),
        ]);
        let mut session = session(loader);
        session.load_entry("/entry").unwrap();

        let b = ModuleId::new("/b");
        assert_eq!(
            session.graph().dependants_of(&b),
            &[ModuleId::new("/a"), ModuleId::new("/entry")]
        );
        assert_eq!(session.loader().evaluations("/b"), 1);
    }

    #[test]
    fn test_untracked_modules_stay_out_of_graph() {
        let loader = TableLoader::with(&[
            ("/entry", body(&["builtin", "/node_modules/lib"], false)),
            ("builtin", body(&[], true)),
            ("/node_modules/lib", body(&[], true)),
        ]);
        let mut session = session(loader);
        session.load_entry("/entry").unwrap();

        assert!(session.graph().is_empty());
        assert!(session.accepted().is_empty());
    }

    #[test]
    fn test_resolution_error_propagates() {
        let loader = TableLoader::with(&[("/entry", body(&["/missing"], false))]);
        let mut session = session(loader);

        let err = session.load_entry("/entry").unwrap_err();
        match err {
            HotError::Evaluation { module, source } => {
                assert_eq!(module.as_str(), "/entry");
                assert!(source.to_string().contains("Cannot resolve module '/missing'"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_accept_clears_on_reevaluation() {
        let loader = TableLoader::with(&[("/entry", body(&[], true))]);
        let mut session = session(loader);
        let entry = session.load_entry("/entry").unwrap();
        assert!(session.is_accepted(&entry));

        // Hook behaves like the start of a fresh evaluation.
        assert!(session.on_module_begin_load(&entry));
        assert!(!session.is_accepted(&entry));
    }

    #[test]
    fn test_change_of_untracked_module_is_ignored() {
        let loader = TableLoader::with(&[("/entry", body(&[], false))]);
        let mut session = session(loader);
        session.load_entry("/entry").unwrap();

        let report = session.handle_change(&ModuleId::new("/elsewhere"));
        assert!(report.is_ignored());
        assert_eq!(session.loader().evaluations("/entry"), 1);
    }

    #[test]
    fn test_require_cycle_loads_each_module_once() {
        let loader = TableLoader::with(&[
            ("/entry", body(&["/a"], false)),
            ("/a", body(&["/b"], false)),
            ("/b", body(&["/a"], false)),
        ]);
        let mut session = session(loader);
        session.load_entry("/entry").unwrap();

        assert_eq!(session.loader().evaluations("/a"), 1);
        assert_eq!(session.loader().evaluations("/b"), 1);

        let report = session.handle_change(&ModuleId::new("/b"));
        assert_eq!(report.reloaded, vec![ModuleId::new("/entry")]);
        assert_eq!(session.loader().evaluations("/a"), 2);
        assert_eq!(session.loader().evaluations("/b"), 2);
        assert_eq!(session.loader().evaluations("/entry"), 2);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let loader = TableLoader::with(&[(
            "/entry",
            Body {
                fail: true,
                ..Body::default()
            },
        )]);
        let mut session = session(loader);

        assert!(session.load_entry("/entry").is_err());
        assert!(!session.loader().is_cached(&ModuleId::new("/entry")));
        assert_eq!(session.entry(), Some(&ModuleId::new("/entry")));
    }
}
