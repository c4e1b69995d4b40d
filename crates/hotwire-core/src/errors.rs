use crate::module_id::ModuleId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HotError {
    #[error("Cannot resolve module '{request}'{}", from_suffix(.parent))]
    Resolution {
        request: String,
        parent: Option<ModuleId>,
    },

    #[error("Error while evaluating {module}: {source}")]
    Evaluation {
        module: ModuleId,
        #[source]
        source: anyhow::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("File watcher disconnected")]
    WatcherDisconnected,
}

fn from_suffix(parent: &Option<ModuleId>) -> String {
    match parent {
        Some(parent) => format!(" from {}", parent),
        None => String::new(),
    }
}

impl HotError {
    /// The module whose own code failed, if this is an evaluation error.
    pub fn failed_module(&self) -> Option<&ModuleId> {
        match self {
            HotError::Evaluation { module, .. } => Some(module),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, HotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_message_names_parent() {
        let err = HotError::Resolution {
            request: "./missing.hot".to_string(),
            parent: Some(ModuleId::new("/app/entry.hot")),
        };
        assert_eq!(
            err.to_string(),
            "Cannot resolve module './missing.hot' from /app/entry.hot"
        );

        let err = HotError::Resolution {
            request: "./missing.hot".to_string(),
            parent: None,
        };
        assert_eq!(err.to_string(), "Cannot resolve module './missing.hot'");
    }

    #[test]
    fn test_evaluation_message_includes_cause() {
        let err = HotError::Evaluation {
            module: ModuleId::new("/app/a.hot"),
            source: anyhow::anyhow!("boom"),
        };
        assert_eq!(err.to_string(), "Error while evaluating /app/a.hot: boom");
        assert_eq!(err.failed_module(), Some(&ModuleId::new("/app/a.hot")));
    }
}
