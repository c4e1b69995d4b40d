//! Containment of uncaught failures.
//!
//! An uncaught failure may leave program state inconsistent, so accept
//! callbacks registered before it can no longer be trusted. Only the entry
//! module keeps its registration, which lets the program recover through a
//! full reload from the entry.

use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};

use crate::accept::AcceptRegistry;
use crate::diagnostics::DiagnosticHandler;
use crate::module_id::ModuleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrashSafetyNet {
    enabled: bool,
}

impl CrashSafetyNet {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Drop every accept registration but the entry's.
    ///
    /// Returns the number of registrations removed; zero when disabled.
    pub fn contain(
        &self,
        accepted: &mut AcceptRegistry,
        entry: Option<&ModuleId>,
        failure: &dyn Display,
        diagnostics: &dyn DiagnosticHandler,
    ) -> usize {
        if !self.enabled {
            return 0;
        }

        diagnostics.error(None, &format!("uncaught failure: {}", failure));
        let removed = accepted.retain_only(entry);
        if removed > 0 {
            diagnostics.warning(
                None,
                &format!("cleared {} accept handler(s) after uncaught failure", removed),
            );
        }
        removed
    }

    /// Run `f`, catching a panic when the net is enabled.
    ///
    /// A disabled net lets the panic unwind to the caller.
    pub fn guard<R>(&self, f: impl FnOnce() -> R) -> Result<R, String> {
        if !self.enabled {
            return Ok(f());
        }
        panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(&*payload))
    }
}

impl Default for CrashSafetyNet {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
