//! Runtime error types.
//!
//! Every per-listener failure is an [`InvokeError`]. The runtime reports it
//! through the warning sink and carries on; only `try_invoke` hands it back.

use persistcall_core::{ConversionError, MemberKind, NativeError, TypeHash};
use thiserror::Error;

/// Failure to turn a member description into an invoker.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionError {
    /// The declaring type is not registered.
    #[error("type not found: {0}")]
    TypeNotFound(String),

    /// No member matches the name, kind and exact parameter types.
    #[error("{kind} not found: {declaring_type}.{name}({signature})")]
    MemberNotFound {
        declaring_type: String,
        name: String,
        kind: MemberKind,
        signature: String,
    },

    /// A static member was bound to an object target.
    #[error("{0} is static but the listener has a target")]
    StaticMemberWithTarget(String),

    /// An instance member was bound to a static listener.
    #[error("{0} is an instance member but the listener is static")]
    InstanceMemberWithoutTarget(String),

    /// A restricted target lacks a pre-registered instantiation.
    #[error("missing instantiation: {0}")]
    MissingInstantiation(String),

    /// The thunk factory rejected the member.
    #[error("failed to compile {member}: {source}")]
    Compile {
        member: String,
        #[source]
        source: NativeError,
    },
}

/// Failure encoding or decoding a fixed argument payload.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// The payload was empty.
    #[error("empty payload")]
    Empty,

    /// The leading tag byte does not name a primitive.
    #[error("unknown type tag {0}")]
    UnknownTag(u8),

    /// The service cannot store values of this type.
    #[error("unsupported type {0}")]
    UnsupportedType(TypeHash),

    /// The payload or value is of a different type than requested.
    #[error("expected {expected}, found {actual}")]
    TypeMismatch {
        expected: TypeHash,
        actual: &'static str,
    },

    /// The codec failed.
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Failure of one listener invocation.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// A dynamic argument points past the caller's parameters.
    #[error("argument {argument} is bound to parameter {index}, but only {available} are available")]
    ArgumentBindingOutOfRange {
        argument: usize,
        index: usize,
        available: usize,
    },

    /// A dynamic argument's declared type cannot be produced from the bound
    /// parameter's type.
    #[error("argument {argument} is declared {declared}, but parameter {index} is {actual}")]
    ArgumentTypeMismatch {
        argument: usize,
        index: usize,
        declared: String,
        actual: String,
    },

    /// More than one implicit operator converts the bound parameter's type to
    /// the declared type, so none is used.
    #[error("argument {argument}: {candidates} operators convert {from} to {to}, none will be used")]
    AmbiguousConversion {
        argument: usize,
        index: usize,
        from: String,
        to: String,
        candidates: usize,
    },

    /// The listener's target object no longer exists.
    #[error("target object is missing")]
    TargetMissing,

    /// Member resolution failed.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A fixed argument payload could not be decoded.
    #[error("argument {argument}: {source}")]
    FixedArgument {
        argument: usize,
        #[source]
        source: SerializationError,
    },

    /// A decoded or bound value could not become its declared type.
    #[error("argument {argument}: {source}")]
    Conversion {
        argument: usize,
        #[source]
        source: ConversionError,
    },

    /// The member body failed.
    #[error(transparent)]
    Native(#[from] NativeError),
}
