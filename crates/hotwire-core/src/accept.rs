use rustc_hash::FxHashMap;
use std::fmt;
use std::rc::Rc;

use crate::errors::HotError;
use crate::module_id::ModuleId;

/// Callback a module registers when it accepts its own reloads.
///
/// Receives `None` after a successful reload and the failure otherwise.
pub type AcceptCallback = Rc<dyn Fn(Option<&HotError>)>;

/// Callback installed when a module accepts without providing one.
pub fn noop_callback() -> AcceptCallback {
    Rc::new(|_: Option<&HotError>| {})
}

/// Modules that declared themselves a stabilization boundary during their
/// latest evaluation.
#[derive(Default)]
pub struct AcceptRegistry {
    entries: FxHashMap<ModuleId, AcceptCallback>,
}

impl AcceptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `callback` for `id`, replacing any earlier registration.
    pub fn mark_accepted(&mut self, id: ModuleId, callback: Option<AcceptCallback>) {
        self.entries
            .insert(id, callback.unwrap_or_else(noop_callback));
    }

    pub fn clear_accepted(&mut self, id: &ModuleId) -> Option<AcceptCallback> {
        self.entries.remove(id)
    }

    pub fn is_accepted(&self, id: &ModuleId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn accepted_callback(&self, id: &ModuleId) -> Option<AcceptCallback> {
        self.entries.get(id).cloned()
    }

    /// Re-install a batch of registrations, overwriting current entries.
    pub fn restore<'a, I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (&'a ModuleId, &'a AcceptCallback)>,
    {
        for (id, callback) in pairs {
            self.entries.insert(id.clone(), Rc::clone(callback));
        }
    }

    /// Remove every registration except the one for `keep`.
    ///
    /// Returns how many entries were dropped.
    pub fn retain_only(&mut self, keep: Option<&ModuleId>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, _| Some(id) == keep);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.entries.keys()
    }
}

impl fmt::Debug for AcceptRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
