//! Error types for the controller binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and the controller run.

/// Top-level error for the controller binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: signalgrid_core::config::ConfigError,
    },

    /// A seed light could not be registered.
    #[error("control error: {source}")]
    Control {
        /// The underlying control error.
        #[from]
        source: signalgrid_core::error::ControlError,
    },

    /// Loading persisted lights failed.
    #[error("sync error: {source}")]
    Sync {
        /// The underlying sync error.
        #[from]
        source: signalgrid_core::sync::SyncError,
    },

    /// The controller loop failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: signalgrid_core::runner::RunnerError,
    },

    /// The observer bind address is invalid.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying server error.
        #[from]
        source: signalgrid_observer::ServerError,
    },
}
