//! Error types for the dispatch engine

use thiserror::Error;

/// A notification declaration that cannot become a subscription
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("function {function}: unrecognized event type '{event}'")]
    UnknownEventType { function: String, event: String },

    #[error("function {function} cannot be resolved to an invocable handler")]
    UnresolvedHandler { function: String },
}

impl ConfigurationError {
    /// Function named by the offending declaration
    pub fn function(&self) -> &str {
        match self {
            ConfigurationError::UnknownEventType { function, .. }
            | ConfigurationError::UnresolvedHandler { function } => function,
        }
    }
}

/// Misuse of the dispatch supervisor lifecycle
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("notification listener is already attached")]
    AlreadyAttached,

    #[error("dispatch supervisor has been shut down")]
    ShutDown,
}
