use crate::errors::Result;
use crate::module_id::ModuleId;
use crate::session::ModuleScope;

/// Capability interface a host module system implements so the session can
/// drive loading and eviction.
///
/// The session never touches the host's cache directly: it asks whether a
/// module is cached, asks the host to evaluate it, and tells the host to
/// forget it. Methods take `&self` because evaluation re-enters the loader
/// for every nested require; hosts keep their cache behind a `RefCell`.
pub trait ModuleLoader {
    /// Turn a request into a canonical module id.
    ///
    /// `parent` is the requiring module, `None` for top-level loads.
    fn resolve(&self, request: &str, parent: Option<&ModuleId>) -> Result<ModuleId>;

    /// Whether an instance of `id` is cached and a require must not re-run it.
    fn is_cached(&self, id: &ModuleId) -> bool;

    /// Run the module's code.
    ///
    /// Only called when `is_cached(id)` is false. The host must mark `id`
    /// cached before running module code so that require cycles observe the
    /// partially evaluated module, and must drop it again if evaluation fails.
    fn evaluate(&self, id: &ModuleId, scope: &mut ModuleScope<'_>) -> anyhow::Result<()>;

    /// Forget the cached instance of `id`; the next require evaluates it again.
    fn evict_from_cache(&self, id: &ModuleId);
}
