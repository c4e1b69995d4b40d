use crate::module_id::ModuleId;

/// Directory names treated as vendored code when no configuration says otherwise.
pub const DEFAULT_VENDOR_DIRS: &[&str] = &["node_modules"];

/// Decides whether a module participates in dependency tracking.
///
/// Only path-like identifiers outside vendored directories are tracked.
/// Built-ins (no separator) and third-party code never enter the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityFilter {
    vendor_dirs: Vec<String>,
}

impl EligibilityFilter {
    pub fn new<I, S>(vendor_dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vendor_dirs: vendor_dirs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_eligible(&self, id: &ModuleId) -> bool {
        id.has_path_separator() && !self.is_vendored(id)
    }

    fn is_vendored(&self, id: &ModuleId) -> bool {
        id.segments()
            .any(|segment| self.vendor_dirs.iter().any(|dir| dir == segment))
    }

    pub fn vendor_dirs(&self) -> &[String] {
        &self.vendor_dirs
    }
}

impl Default for EligibilityFilter {
    fn default() -> Self {
        Self::new(DEFAULT_VENDOR_DIRS.iter().copied())
    }
}
