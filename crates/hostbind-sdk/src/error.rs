//! Error types for the hostbind SDK

/// Errors raised while reading or converting values
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    /// Type mismatch during conversion
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// Value does not fit the requested Rust type
    #[error("Value {value} out of range for {target}")]
    OutOfRange {
        /// Offending value, rendered
        value: String,
        /// Requested type
        target: &'static str,
    },

    /// Invalid argument
    #[error("Argument error: {0}")]
    ArgumentError(String),
}

/// Errors reported by host-side connection handles
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    /// The handle is no longer attached to the wrapper
    #[error("Not attached")]
    NotAttached,

    /// Any other host failure
    #[error("{0}")]
    Other(String),
}

/// Raised from inside a method body when the caller's wait was interrupted.
///
/// The engine never converts this into an invocation failure; it surfaces
/// as a cancellation to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, thiserror::Error)]
#[error("call interrupted")]
pub struct Interrupted;

/// Error type returned by method bodies
pub type MethodError = Box<dyn std::error::Error + Send + Sync + 'static>;
