//! Persistent listener invocation with ahead-of-time instantiation planning.
//!
//! Hosts persist "call this member on this target with these arguments" as
//! [`Listener`]s grouped into [`PersistentEvent`]s. At run time a
//! [`ListenerRuntime`] resolves each listener against a [`TypeRegistry`],
//! binds its fixed and dynamic arguments and calls the member through a
//! cached invoker.
//!
//! Restricted targets cannot build generic instantiations on demand. For
//! them the [`aot`] pipeline scans a project's listeners at build time and
//! emits a companion module whose `register` function pre-registers every
//! adapter, argument holder and invocation factory the listeners need.
//!
//! # Example
//!
//! ```
//! use persistcall::prelude::*;
//!
//! struct Calculator;
//! persistcall::impl_reference_type!(Calculator, "Calculator", "my_game::Calculator");
//!
//! let mut types = TypeRegistry::with_primitives();
//! types
//!     .register_reference_type::<Calculator>()?
//!     .static_method("Add", |(a, b): (i32, i32)| a + b)?;
//!
//! let mut runtime = ListenerRuntime::new(types, ExecutionMode::Dynamic);
//! let mut heap = ObjectHeap::new();
//! let mut listener = Listener::new_static(
//!     Calculator::type_hash(),
//!     "Add",
//!     MemberKind::Method,
//!     vec![Argument::dynamic(0, primitives::INT32), Argument::dynamic(1, primitives::INT32)],
//! );
//!
//! let signature = [primitives::INT32, primitives::INT32];
//! let params = [Dynamic::Int(2), Dynamic::Int(3)];
//! let sum = runtime.invoke(&mut listener, &mut heap, &signature, &params);
//! assert_eq!(sum, Some(Dynamic::Int(5)));
//! # Ok::<(), persistcall::RegistrationError>(())
//! ```

pub use persistcall_core::{
    ArgType, ConversionError, Dynamic, FromDynamic, HostType, IntoDynamic, MemberFlags, MemberKind,
    NativeError, ObjectHandle, ObjectHeap, PrimitiveKind, Ref, RegistrationError, TypeHash,
    TypeKind, impl_reference_type, impl_value_type, primitives,
};
pub use persistcall_registry::{
    ConversionEntry, ConversionKind, ConversionRegistry, ConversionStatus, InstantiationTable,
    TypeBuilder, TypeRegistry,
};
pub use persistcall_runtime::{
    Argument, BincodeSerializer, Binding, CollectedWarnings, ExecutionMode, InvokeError, Invoker,
    InvokerCache, Listener, ListenerPhase, ListenerRuntime, ListenerTarget, PersistentEvent,
    ResolutionError, SerializationError, SerializationService, TracingWarnings, WarningSink,
};

/// Build-time scan, plan and emit.
pub mod aot {
    pub use persistcall_aot::*;
}

/// Items generated companion modules refer to.
///
/// Generated code imports this module as `aot`; keep every name it emits
/// available here.
pub mod aot_support {
    pub use persistcall_core::{
        ArgumentHolder, ConversionAdapter, InvocationFactory, Ref, RegistrationError,
    };
    pub use persistcall_registry::{ConversionRegistry, InstantiationTable, TypeRegistry};
}

pub mod prelude {
    pub use crate::{
        Argument, Dynamic, ExecutionMode, HostType, Listener, ListenerRuntime, MemberKind,
        ObjectHeap, PersistentEvent, TypeHash, TypeRegistry, primitives,
    };
}
