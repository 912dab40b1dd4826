//! Result and error types for Comprobar.
//!
//! Claim failures are not engine errors. A failing claim becomes an invalid
//! [`ClaimResult`](crate::ClaimResult) carrying a [`ClaimError`] payload and the
//! run goes on. The variants here cover what cannot be recovered at the claim
//! level: context lifecycle failures (reported as a bail-out), malformed
//! configuration, and engine invariant violations.

use crate::claim::ClaimError;
use thiserror::Error;

/// Result type for Comprobar operations
pub type ComprobarResult<T> = Result<T, ComprobarError>;

/// Errors that can occur in Comprobar
#[derive(Debug, Error)]
pub enum ComprobarError {
    /// A context failed to initialize
    #[error("Context '{context}' failed to initialize: {cause}")]
    ContextInit {
        /// Context label
        context: String,
        /// Error raised by the init callback
        cause: ClaimError,
    },

    /// A context failed to tear down
    #[error("Context '{context}' failed to tear down: {cause}")]
    ContextTeardown {
        /// Context label
        context: String,
        /// Error raised by the teardown callback
        cause: ClaimError,
    },

    /// A context value was still referenced elsewhere when its teardown ran
    #[error("Context '{context}' is still shared and cannot be torn down")]
    ContextShared {
        /// Context label
        context: String,
    },

    /// A named upstream context was requested but not composed
    #[error("No upstream context named '{name}' of the requested type")]
    MissingUpstream {
        /// Requested name
        name: String,
    },

    /// Engine invariant violated; never expected with well-formed input
    #[error("Invariant violated: {message}")]
    Invariant {
        /// Error message
        message: String,
    },

    /// Order seed could not be decoded
    #[error("Invalid order seed '{seed}': {reason}")]
    InvalidSeed {
        /// The rejected seed text
        seed: String,
        /// Why it was rejected
        reason: String,
    },

    /// Run configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ComprobarError {
    /// Create an invariant violation
    #[must_use]
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error comes from a context lifecycle callback.
    ///
    /// Context failures end the current example with a bail-out; every other
    /// variant is fatal to the run.
    #[must_use]
    pub const fn is_context_failure(&self) -> bool {
        matches!(
            self,
            Self::ContextInit { .. }
                | Self::ContextTeardown { .. }
                | Self::ContextShared { .. }
                | Self::MissingUpstream { .. }
        )
    }
}
