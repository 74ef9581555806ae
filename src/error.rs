//! Error taxonomy for the flowgraph core.
//!
//! `StuckInLoop` is deliberately absent here: it is a non-fatal runtime
//! warning (logged via `tracing::warn!`), not an error. The stream
//! terminates cleanly with its accumulated `final_outputs` rather than
//! propagating a `Result::Err`. See [`crate::scheduler`].

use thiserror::Error;

/// Result type alias for flowgraph core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while validating or running a component graph.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or unknown-key input data. Raised before any component
    /// runs; pipeline state is untouched.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A cycle in the graph cannot be broken (no edge on it feeds a
    /// socket with a default value or a non-mandatory socket). Raised
    /// before the main loop.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// A component exceeded its visit budget (`max_runs_per_component`).
    #[error("component '{component}' exceeded max_runs_per_component ({max})")]
    MaxRunsExceeded {
        /// Name of the component that tripped the limit.
        component: String,
        /// The configured budget.
        max: u32,
    },

    /// A component's returned value is not a mapping from socket name to
    /// value, or references an undeclared output socket.
    #[error("component '{component}' violated its output contract: {reason}")]
    ComponentContractViolation {
        /// Name of the offending component.
        component: String,
        /// Human-readable description of the violation.
        reason: String,
    },

    /// The component itself raised during execution. Propagated
    /// unchanged to the consumer; the scheduler makes no retry attempt.
    #[error("component '{component}' failed")]
    ComponentRuntime {
        /// Name of the component that raised.
        component: String,
        /// The underlying failure.
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    /// Shorthand for an [`Error::InvalidInput`].
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Shorthand for an [`Error::InvalidGraph`].
    pub fn invalid_graph(msg: impl Into<String>) -> Self {
        Error::InvalidGraph(msg.into())
    }
}
