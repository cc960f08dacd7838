//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure that can end the process, so
//! `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: flatworld_core::ConfigError,
    },

    /// The scene could not be constructed.
    #[error("scene error: {source}")]
    Scene {
        /// The underlying scene error.
        #[from]
        source: flatworld_core::SceneError,
    },

    /// The manager failed to start or its loop ended abnormally.
    #[error("manager error: {source}")]
    Manager {
        /// The underlying manager error.
        #[from]
        source: flatworld_core::ManagerError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
