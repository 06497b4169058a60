//! Persistent listener invocation.
//!
//! A [`PersistentEvent`] owns an ordered list of [`Listener`]s, each a
//! serialized description of one call. [`ListenerRuntime`] resolves listeners
//! lazily against a [`TypeRegistry`](persistcall_registry::TypeRegistry),
//! caches compiled [`Invoker`]s by member identity, binds fixed and dynamic
//! arguments, and calls the member.
//!
//! Failures never propagate out of `invoke`: each becomes exactly one warning
//! on the runtime's [`WarningSink`].

mod error;
mod invoker;
mod listener;
mod runtime;
mod serialization;
mod warnings;

pub use error::{InvokeError, ResolutionError, SerializationError};
pub use invoker::{ExecutionMode, Invoker, InvokerCache};
pub use listener::{Argument, Binding, Listener, ListenerPhase, ListenerTarget, PersistentEvent};
pub use runtime::ListenerRuntime;
pub use serialization::{BincodeSerializer, SerializationService, StoredValue};
pub use warnings::{CollectedWarnings, TracingWarnings, WarningSink};
