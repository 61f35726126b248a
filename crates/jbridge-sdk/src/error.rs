//! Error types for the embedding API

/// Result type for boundary calls
pub type AbiResult<T> = Result<T, AbiError>;

/// Failures reported by a boundary call itself.
///
/// A managed exception thrown by a called method is *not* an `AbiError`: it
/// stays pending on the environment and is observed through
/// [`JniEnv::exception_check`](crate::JniEnv::exception_check).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AbiError {
    /// A null reference was passed where an object is required
    #[error("Null reference passed to {0}")]
    NullReference(&'static str),

    /// The reference was deleted, collected, or belongs to another thread
    #[error("Invalid reference: {0:#x}")]
    InvalidReference(u64),

    /// No class with this name is loaded
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    /// Method lookup failed
    #[error("Method not found: {class}.{name}{descriptor}")]
    MethodNotFound {
        /// Class the lookup ran against
        class: String,
        /// Method name
        name: String,
        /// JNI method descriptor
        descriptor: String,
    },

    /// Arguments do not match the method descriptor
    #[error("Argument mismatch calling {method}: {reason}")]
    ArgumentMismatch {
        /// Method being called
        method: String,
        /// What did not match
        reason: String,
    },

    /// A JNI descriptor could not be parsed
    #[error("Invalid descriptor '{descriptor}': {reason}")]
    InvalidDescriptor {
        /// Descriptor text
        descriptor: String,
        /// Parse failure
        reason: String,
    },

    /// The object is not of the kind this operation needs
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected kind
        expected: String,
        /// Actual kind
        got: String,
    },

    /// Array index out of range
    #[error("Array index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Array length
        len: usize,
    },

    /// A boundary call was made while an exception is pending
    #[error("Boundary call made with a pending exception")]
    ExceptionPending,

    /// The calling thread has no execution context
    #[error("Current thread is not attached")]
    NotAttached,

    /// Local frame stack underflow
    #[error("No local frame to pop")]
    NoLocalFrame,

    /// Any other embedding failure
    #[error("{0}")]
    Other(String),
}

impl From<String> for AbiError {
    fn from(s: String) -> Self {
        AbiError::Other(s)
    }
}

impl From<&str> for AbiError {
    fn from(s: &str) -> Self {
        AbiError::Other(s.to_string())
    }
}
