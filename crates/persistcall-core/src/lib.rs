//! Core types for persistcall.
//!
//! Everything the registry, the listener runtime and the ahead-of-time
//! pipeline share lives here.
//!
//! ## Modules
//!
//! - [`type_hash`]: Deterministic identities for types, members and instantiations
//! - [`member`]: Member kinds, member flags and type kinds
//! - [`primitive_kind`]: The built-in primitive table
//! - [`dynamic`]: The untyped value slot passed through thunks
//! - [`convert`]: Traits moving Rust values in and out of slots
//! - [`object_heap`]: Generational storage for reference-type targets
//! - [`call_context`]: The context a compiled thunk runs against
//! - [`native_fn`]: Type-erased compiled thunks
//! - [`instantiation`]: Holder, factory and adapter generics
//! - [`error`]: Shared error types

pub mod call_context;
pub mod convert;
pub mod dynamic;
pub mod error;
pub mod instantiation;
pub mod member;
pub mod native_fn;
pub mod object_heap;
pub mod primitive_kind;
pub mod type_hash;

pub use call_context::CallContext;
pub use convert::{ArgType, FromDynamic, HostType, IntoDynamic, Ref, ReturnValue};
pub use dynamic::Dynamic;
pub use error::{ConversionError, NativeError, RegistrationError};
pub use instantiation::{
    AdapterFn, ArgList, ArgumentHolder, ConversionAdapter, ErasedCall, HeldArgument,
    HolderFactory, InvocationFactory, MemberCallable, SignatureKey, ThunkFactory,
};
pub use member::{MemberFlags, MemberKind, TypeKind};
pub use native_fn::{NativeCallable, NativeFn};
pub use object_heap::{ObjectHandle, ObjectHeap};
pub use primitive_kind::PrimitiveKind;
pub use type_hash::{TypeHash, hash_constants, primitives};
