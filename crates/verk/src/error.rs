//! Error type shared by every scheduler operation.

use thiserror::Error;

use crate::schedule::SystemId;

/// Everything that can go wrong while registering or running systems.
#[derive(Debug, Error)]
pub enum SchedError {
    /// A system was asked to run before or after itself.
    #[error("system `{system}` cannot be linked to itself")]
    SelfDependency { system: String },

    /// Linking would make `parent` reachable from `system`, closing a cycle.
    #[error("linking `{system}` under `{parent}` would create a dependency cycle")]
    CyclicDependency { system: String, parent: String },

    /// A handle that was not issued by this scheduler.
    #[error("unknown system id {id:?}")]
    UnknownSystem { id: SystemId },

    /// A slot that must be created by a setup call was resolved before it.
    #[error("resource `{type_name}` is not registered; call its setup method first")]
    UnresolvedResource { type_name: &'static str },

    /// A single-result accessor matched zero or more than one entity.
    #[error("expected exactly one `{type_name}`, found {found}")]
    Cardinality { type_name: &'static str, found: usize },

    /// A system body reported a failure.
    #[error("system `{system}` failed: {message}")]
    System { system: String, message: String },

    /// Invalid scheduler configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl SchedError {
    /// Convenience for system bodies that want to fail with a message.
    pub fn system(system: impl Into<String>, message: impl std::fmt::Display) -> Self {
        SchedError::System {
            system: system.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedError>;
