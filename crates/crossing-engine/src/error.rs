//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode during startup and shutdown so
//! `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: crossing_core::config::ConfigError,
    },

    /// The intersection controller failed.
    #[error("controller error: {source}")]
    Controller {
        /// The underlying controller error.
        #[from]
        source: crossing_core::controller::ControllerError,
    },

    /// The controller shutdown task could not be joined.
    #[error("shutdown error: {message}")]
    Shutdown {
        /// Description of the shutdown failure.
        message: String,
    },

    /// An observer task could not be joined.
    #[error("observer error: {message}")]
    Observer {
        /// Description of the observer failure.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_failure_names_shutdown() {
        let err = EngineError::Shutdown {
            message: "task panicked".to_owned(),
        };
        assert_eq!(err.to_string(), "shutdown error: task panicked");
    }
}
