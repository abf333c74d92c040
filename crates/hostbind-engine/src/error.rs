//! Engine error types

use hostbind_sdk::{HostError, MethodError};

/// Registration-time failure for a single method.
///
/// Never fails the whole target: the offending method is skipped and
/// the rest of the adapter is kept.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindError {
    /// External method without a target parameter
    #[error("Method {method}: missing target parameter of type {expected}")]
    MissingTargetParameter {
        /// Method name
        method: String,
        /// Type the adapter binds to
        expected: String,
    },

    /// First parameter not assignable from the adapter's target type
    #[error("Method {method}: first parameter {declared} is not assignable from {target}")]
    TargetTypeMismatch {
        /// Method name
        method: String,
        /// Declared first parameter type
        declared: String,
        /// Adapter target type
        target: String,
    },

    /// Malformed declaration (empty name, arguments after a vararg tail, ...)
    #[error("Method {method}: {reason}")]
    InvalidDeclaration {
        /// Method name
        method: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Failure of the underlying method, with a user-facing message.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct InvocationFailure {
    message: String,
    #[source]
    cause: Option<MethodError>,
}

impl InvocationFailure {
    /// Failure with only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// Failure carrying the original error
    pub fn with_cause(message: impl Into<String>, cause: MethodError) -> Self {
        Self {
            message: message.into(),
            cause: Some(cause),
        }
    }

    /// User-facing message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Original error, if any
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

/// Per-call failure, reported to the host
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// Unknown or out-of-range method index
    #[error("Invalid method index: {0}")]
    InvalidIndex(usize),

    /// Unknown callback symbol or method name
    #[error("No such method: {0}")]
    UnknownMethod(String),

    /// Wrapper has no target (default-constructed)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The method itself failed
    #[error(transparent)]
    Invocation(#[from] InvocationFailure),

    /// The caller's wait was interrupted; never converted into a failure
    #[error("call interrupted")]
    Cancelled,

    /// The host handle rejected the call
    #[error(transparent)]
    Host(#[from] HostError),
}

impl CallError {
    /// Shorthand for an invocation failure with a message only
    pub fn invocation(message: impl Into<String>) -> Self {
        CallError::Invocation(InvocationFailure::new(message))
    }

    /// Check if this is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CallError::Cancelled)
    }
}

impl From<hostbind_sdk::Interrupted> for CallError {
    fn from(_: hostbind_sdk::Interrupted) -> Self {
        CallError::Cancelled
    }
}

/// Value conversion failure between semantic and host-native values
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConvertError {
    /// Host value cannot become the declared semantic type
    #[error("bad argument: expected {expected}, got {got}")]
    Mismatch {
        /// Declared semantic type
        expected: String,
        /// Host value kind
        got: String,
    },

    /// Table key the converter cannot represent
    #[error("unsupported table key: {0}")]
    UnsupportedKey(String),

    /// No converter registered for the architecture
    #[error("no type converter for architecture '{0}'")]
    UnknownArchitecture(String),
}

/// Owning-thread scheduler failure
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The owning thread could not be started
    #[error("Failed to spawn owner thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The owning thread has shut down
    #[error("Owner thread is not running")]
    Closed,
}

/// Configuration failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Malformed TOML
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Well-formed but unusable value
    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid {
        /// Option name
        key: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Umbrella error for engine setup
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Method registration
    #[error(transparent)]
    Bind(#[from] BindError),

    /// Call dispatch
    #[error(transparent)]
    Call(#[from] CallError),

    /// Value conversion
    #[error(transparent)]
    Convert(#[from] ConvertError),

    /// Scheduler
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}
