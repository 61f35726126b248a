//! Error types for the dispatch core

use jbridge_sdk::AbiError;
use thiserror::Error;

use crate::selector::Selector;

/// Result alias for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Failure of a proxy operation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProxyError {
    /// Peer invalid, class lookup failed or a protocol method is missing
    #[error("Cannot construct proxy: {0}")]
    Construction(String),

    /// The peer has no signature for the selector
    #[error("Peer does not resolve selector {0}")]
    Resolution(Selector),

    /// The peer threw while handling a forwarded invocation
    #[error("Method invocation for selector {selector} caused exception: {message}")]
    Forwarding {
        /// Selector being forwarded
        selector: Selector,
        /// Class of the thrown exception
        exception_class: String,
        /// `getMessage()` of the thrown exception, if any
        message: String,
    },

    /// The peer answered with a malformed type encoding
    #[error("Peer returned a malformed signature: {0}")]
    Encoding(#[from] EncodingError),

    /// A value could not cross the boundary
    #[error(transparent)]
    Marshal(#[from] MarshalError),

    /// An embedding API call failed
    #[error("Boundary call failed: {0}")]
    Boundary(#[from] AbiError),

    /// The shared runtime handle is unavailable
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Failure surfaced by native message dispatch
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    /// The receiver does not understand the selector
    #[error("{class} does not recognize selector {selector}")]
    UnrecognizedSelector {
        /// Receiver class name
        class: String,
        /// Selector sent
        selector: Selector,
    },

    /// Argument count differs from the resolved signature
    #[error("Selector {selector} takes {expected} arguments, got {got}")]
    ArgumentCount {
        /// Selector sent
        selector: Selector,
        /// Arguments declared by the signature (self and _cmd excluded)
        expected: usize,
        /// Arguments supplied
        got: usize,
    },

    /// A value does not fit the slot's type encoding
    #[error("Type mismatch in {slot}: expected {expected}, got {got}")]
    TypeMismatch {
        /// Slot description (`argument 2`, `return value`)
        slot: String,
        /// Expected type encoding
        expected: String,
        /// Supplied value kind
        got: String,
    },

    /// The receiver's trap failed
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

/// Malformed type encoding
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodingError {
    /// Encoding string is empty
    #[error("Empty type encoding")]
    Empty,

    /// Unknown type character
    #[error("Unknown type code '{code}' in {encoding:?}")]
    UnknownCode {
        /// Offending character
        code: char,
        /// Full encoding text
        encoding: String,
    },

    /// Unbalanced `{}`, `[]` or `()`
    #[error("Unterminated aggregate in {0:?}")]
    Unterminated(String),

    /// A method signature needs self and _cmd after the return type
    #[error("Method signature {0:?} lacks the self and _cmd arguments")]
    MissingImplicitArguments(String),
}

/// Failure converting values across the boundary
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MarshalError {
    /// Type encoding that never crosses the boundary
    #[error("Cannot marshal values of type {0}")]
    Unsupported(String),

    /// Native value does not match the target encoding
    #[error("Cannot convert {got} to {expected}")]
    Mismatch {
        /// Target type encoding
        expected: String,
        /// Supplied value kind
        got: String,
    },

    /// Managed object where a boxed primitive was expected
    #[error("Expected {expected}, got instance of {class}")]
    NotBoxed {
        /// Expected box class
        expected: String,
        /// Actual class name
        class: String,
    },

    /// Object belongs to another runtime
    #[error("Proxy belongs to another runtime")]
    ForeignProxy,

    /// A boxing or unboxing call threw
    #[error("Managed exception while marshaling: {0}")]
    Thrown(String),

    /// Embedding API failure while converting
    #[error("Boundary call failed while marshaling: {0}")]
    Boundary(#[from] AbiError),
}

/// Process-wide runtime handle state
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    /// No runtime handle installed yet
    #[error("No managed runtime installed")]
    NotInstalled,

    /// A runtime handle was already installed
    #[error("Managed runtime already installed")]
    AlreadyInstalled,
}

/// Configuration loading failure
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to render TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Parsed but inconsistent
    #[error("Invalid config: {0}")]
    ValidationError(String),
}
