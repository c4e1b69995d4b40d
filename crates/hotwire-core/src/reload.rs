use std::fmt;
use tracing::{debug, info};

use crate::accept::AcceptCallback;
use crate::errors::HotError;
use crate::invalidation::InvalidationPlan;
use crate::loader::ModuleLoader;
use crate::module_id::ModuleId;
use crate::session::{load_module, ModuleTracker};

/// Outcome of handling one change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    /// The module whose file changed
    pub changed: Option<ModuleId>,

    /// Modules evicted before reloading, in eviction order
    pub evicted: Vec<ModuleId>,

    /// Modules re-evaluated successfully
    pub reloaded: Vec<ModuleId>,

    /// Modules whose re-evaluation failed
    pub failed: Vec<ModuleId>,

    /// The entry module was reloaded because nothing accepted the change
    pub fell_back_to_entry: bool,

    /// An accept callback failed and the rest of the batch was skipped
    pub aborted: bool,
}

impl ReloadReport {
    /// Report for a change the session does not track.
    pub fn ignored(changed: ModuleId) -> Self {
        Self {
            changed: Some(changed),
            ..Self::default()
        }
    }

    pub fn is_ignored(&self) -> bool {
        self.evicted.is_empty() && self.reloaded.is_empty() && self.failed.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.aborted
    }
}

impl fmt::Display for ReloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} evicted, {} reloaded, {} failed",
            self.evicted.len(),
            self.reloaded.len(),
            self.failed.len()
        )?;
        if self.fell_back_to_entry {
            write!(f, " (entry reload)")?;
        }
        if self.aborted {
            write!(f, " (aborted)")?;
        }
        Ok(())
    }
}

fn join_ids<'a>(ids: impl Iterator<Item = &'a ModuleId>) -> String {
    ids.map(ModuleId::as_str).collect::<Vec<_>>().join(", ")
}

/// Re-evaluate every module of `plan.reload` in order and notify callbacks.
///
/// Evictions must already have been applied. When a module fails, every
/// registration of the batch is restored, including those of modules that
/// already reloaded, before the failing module's callback receives the error.
/// When a callback panics the rest of the batch is skipped; skipped modules
/// stay tracked so a later change reloads them.
pub(crate) fn run_batch(
    tracker: &mut ModuleTracker,
    loader: &dyn ModuleLoader,
    plan: InvalidationPlan,
) -> ReloadReport {
    let mut report = ReloadReport {
        changed: Some(plan.changed.clone()),
        evicted: plan.evictions.clone(),
        fell_back_to_entry: plan.fell_back_to_entry,
        ..ReloadReport::default()
    };

    if plan.reload.is_empty() {
        tracker.diagnostics.warning(
            Some(&plan.changed),
            "no accepting module and no entry module to reload",
        );
        return report;
    }

    let message = format!(
        "reloading {} module(s): {}",
        plan.reload.len(),
        join_ids(plan.reload_ids())
    );
    tracker.diagnostics.info(Some(&plan.changed), &message);
    info!("{}", message);

    for (index, (id, callback)) in plan.reload.iter().enumerate() {
        let outcome = match load_module(tracker, loader, id) {
            Ok(()) => {
                debug!("Reloaded {}", id);
                report.reloaded.push(id.clone());
                None
            }
            Err(err) => {
                tracker.accepted.restore(plan.reload.iter());
                tracker.diagnostics.warning(
                    Some(id),
                    &format!(
                        "restored {} accept handler(s) after failed reload",
                        plan.reload.len()
                    ),
                );
                if !tracker.silent_require_error {
                    tracker
                        .diagnostics
                        .error(Some(id), &format!("error while reloading module: {}", err));
                }
                report.failed.push(id.clone());
                Some(err)
            }
        };

        if !invoke_callback(tracker, callback, outcome.as_ref()) {
            report.aborted = true;
            for skipped in plan.reload.keys().skip(index + 1) {
                debug!("Skipped {}", skipped);
                tracker.keep_tracking(skipped);
            }
            break;
        }
    }

    report
}

/// Invoke an accept callback under the crash safety net.
///
/// Returns false when the callback failed; the safety net has then already
/// dropped the stale registrations.
fn invoke_callback(
    tracker: &mut ModuleTracker,
    callback: &AcceptCallback,
    outcome: Option<&HotError>,
) -> bool {
    match tracker.safety_net.guard(|| callback(outcome)) {
        Ok(()) => true,
        Err(panic) => {
            tracker.contain_failure(&format!("accept callback panicked: {}", panic));
            false
        }
    }
}
