// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Error types for the tensor bridge.
//!
//! Every failure the bridge can produce is returned to the caller of
//! `encode`, `decode` or `invoke`. Nothing is retried, logged-and-ignored, or
//! replaced with a default value.
//!
//! ## Error Hierarchy
//!
//! ```text
//! BridgeError
//! ├── UnsupportedDType     - Native dtype has no cross-runtime mapping
//! ├── UnknownElementTag    - Wire tag outside the shared enumeration
//! ├── ShapeOverflow        - product(shape) not addressable
//! ├── RankMismatch         - Too few dimensions for the destination
//! ├── ByteLengthMismatch   - byte_length != product(shape) * element_size
//! ├── ElementTypeMismatch  - Typed read with the wrong element type
//! ├── Init                 - Embedded runtime failed to initialize (sticky)
//! ├── Resolve              - Callable not found / not callable
//! ├── UnknownOperation     - Operation name absent from the registry
//! ├── ArityMismatch        - Wrong number of arguments for an operation
//! ├── MalformedResult      - Embedded result violates the buffer contract
//! ├── EmbeddedExecution    - Exception raised inside the embedded runtime
//! ├── InvalidConfig        - Configuration validation failures
//! ├── Io / Json            - Loading configuration from disk
//! └── Candle               - Underlying Candle errors
//! ```

use thiserror::Error;

use crate::dtype::ElementType;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Failure to bring up the embedded runtime.
///
/// Cloneable so every caller of `ensure_ready` observes the identical value
/// once the runtime has entered its failed state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("embedded runtime initialization failed: {message}")]
pub struct InitError {
    message: String,
}

impl InitError {
    /// Create an initialization error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure reported by the embedded runtime.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure to locate an invocable export in the embedded runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The module cannot be located or does not define the export.
    #[error("{module_path}.{function_name} not found: {reason}")]
    NotFound {
        /// Module that was searched.
        module_path: String,
        /// Export that was requested.
        function_name: String,
        /// Embedded-side explanation.
        reason: String,
    },

    /// The export exists but cannot be invoked.
    #[error("{module_path}.{function_name} is not callable")]
    NotCallable {
        /// Module that holds the export.
        module_path: String,
        /// Export that was requested.
        function_name: String,
    },
}

impl ResolveError {
    /// Create a not-found error.
    pub fn not_found(
        module_path: impl Into<String>,
        function_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            module_path: module_path.into(),
            function_name: function_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-callable error.
    pub fn not_callable(module_path: impl Into<String>, function_name: impl Into<String>) -> Self {
        Self::NotCallable {
            module_path: module_path.into(),
            function_name: function_name.into(),
        }
    }
}

/// Errors produced by the tensor bridge.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BridgeError {
    /// The native element type has no cross-runtime mapping.
    #[error("unsupported dtype: {dtype}")]
    UnsupportedDType {
        /// Name of the rejected dtype.
        dtype: String,
    },

    /// A wire tag does not belong to the shared element-type enumeration.
    ///
    /// Both sides of the boundary must agree on tags; this is a
    /// configuration error.
    #[error("unknown element type tag: {0}")]
    UnknownElementTag(u8),

    /// The element count or byte length of a shape is not addressable.
    #[error("shape {shape:?} overflows the addressable size for {element_type}")]
    ShapeOverflow {
        /// Offending shape.
        shape: Vec<usize>,
        /// Element type the shape was paired with.
        element_type: ElementType,
    },

    /// The shape has fewer dimensions than the destination requires.
    #[error("rank mismatch: expected at least {expected} dimension(s), got {actual}")]
    RankMismatch {
        /// Minimum rank required.
        expected: usize,
        /// Rank received.
        actual: usize,
    },

    /// Storage length disagrees with `product(shape) * element_size`.
    #[error("byte length mismatch for shape {shape:?}: expected {expected} bytes, got {actual}")]
    ByteLengthMismatch {
        /// Declared shape.
        shape: Vec<usize>,
        /// Bytes implied by the shape.
        expected: usize,
        /// Bytes actually supplied.
        actual: usize,
    },

    /// A typed read requested an element type other than the stored one.
    #[error("element type mismatch: expected {expected}, got {actual}")]
    ElementTypeMismatch {
        /// Element type stored in the buffer.
        expected: ElementType,
        /// Element type requested.
        actual: ElementType,
    },

    /// The embedded runtime failed to initialize.
    #[error(transparent)]
    Init(#[from] InitError),

    /// The target callable could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The operation name is not registered.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// The argument list does not match the registered arity.
    #[error("operation {operation} expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        /// Operation that was invoked.
        operation: String,
        /// Registered argument count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },

    /// The embedded runtime returned data violating the buffer contract.
    #[error("malformed result: {message}")]
    MalformedResult {
        /// What was wrong with the result.
        message: String,
    },

    /// The embedded function raised an exception.
    #[error("embedded execution of {function} failed: {message}")]
    EmbeddedExecution {
        /// Qualified name of the function that failed.
        function: String,
        /// Message carried by the embedded exception.
        message: String,
    },

    /// Invalid configuration parameter.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error while loading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON configuration.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Underlying Candle error.
    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),
}

impl BridgeError {
    /// Create an unsupported dtype error.
    pub fn unsupported_dtype(dtype: impl Into<String>) -> Self {
        Self::UnsupportedDType {
            dtype: dtype.into(),
        }
    }

    /// Create a malformed result error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResult {
            message: msg.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an embedded execution error.
    pub fn embedded(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddedExecution {
            function: function.into(),
            message: message.into(),
        }
    }
}
