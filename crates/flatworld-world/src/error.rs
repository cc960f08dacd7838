//! Error types for the `flatworld-world` crate.

/// Errors that can occur while building a spatial index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The requested tree shape cannot be built.
    #[error("invalid index configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}
