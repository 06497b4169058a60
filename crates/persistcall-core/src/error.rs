//! Error types shared by every persistcall layer.
//!
//! ```text
//! ConversionError   - a Dynamic value could not become the requested Rust type
//! NativeError       - a compiled thunk failed while running
//! RegistrationError - type, member or conversion registration was rejected
//! ```

use thiserror::Error;

use crate::TypeHash;

/// Errors converting between `Dynamic` values and Rust types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The slot held a different kind of value.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// An integer did not fit in the target type.
    #[error("integer {value} out of range for {target_type}")]
    IntegerOverflow {
        value: i64,
        target_type: &'static str,
    },

    /// A float did not fit in the target type.
    #[error("float {value} out of range for {target_type}")]
    FloatConversion {
        value: f64,
        target_type: &'static str,
    },

    /// A native value held a different Rust type.
    #[error("native value is not a {expected}")]
    NativeTypeMismatch { expected: &'static str },

    /// No conversion exists between the two types.
    #[error("no conversion from {from} to {to}")]
    Unconvertible { from: TypeHash, to: TypeHash },
}

/// Errors raised while a compiled thunk runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NativeError {
    /// An argument could not be unpacked into its typed local.
    #[error("argument {index}: {source}")]
    Argument {
        index: usize,
        #[source]
        source: ConversionError,
    },

    /// The thunk was handed the wrong number of arguments.
    #[error("expected {expected} arguments, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },

    /// An instance member was called without a receiver.
    #[error("instance member called without a target")]
    MissingReceiver,

    /// The receiver is not of the declaring type.
    #[error("invalid target: {message}")]
    InvalidThis { message: String },

    /// A stored callable did not have the signature its factory expected.
    #[error("callable does not match signature {signature}")]
    SignatureMismatch { signature: TypeHash },

    /// Free-form failure reported by host code.
    #[error("{0}")]
    Host(String),
}

impl NativeError {
    /// Create an invalid-this error.
    pub fn invalid_this(message: impl Into<String>) -> Self {
        NativeError::InvalidThis {
            message: message.into(),
        }
    }
}

/// Errors rejecting a registration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    /// A referenced type was not registered.
    #[error("type not found: {0}")]
    TypeNotFound(String),

    /// A type with this name already exists.
    #[error("duplicate type: {0}")]
    DuplicateType(String),

    /// A member with the same owner, name, kind and parameters already exists.
    #[error("duplicate member: {owner}::{name}")]
    DuplicateMember { owner: String, name: String },

    /// A conversion already exists for this pair.
    ///
    /// Raised when an adapter collides with a built-in conversion or with a
    /// previously registered adapter.
    #[error("duplicate conversion: {from} -> {to} already {existing}")]
    DuplicateConversion {
        from: String,
        to: String,
        existing: &'static str,
    },
}
