//! The persisted listener model.
//!
//! A [`Listener`] describes one call: a target (an object or the static
//! marker), a member identity, and one [`Argument`] per parameter. Arguments
//! are either fixed, carrying an opaque payload decoded on demand, or dynamic,
//! naming an index into the parameters the owning [`PersistentEvent`] is
//! invoked with.
//!
//! Listeners carry their own resolution state so that resolving is lazy and
//! happens at most once per generation.

use std::fmt;

use persistcall_core::{Dynamic, HeldArgument, MemberKind, ObjectHandle, TypeHash};

use crate::{Invoker, SerializationError, SerializationService};

/// What a listener is invoked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerTarget {
    /// Static call against the stored declaring type.
    Static,
    /// Instance call on a host object.
    Object(ObjectHandle),
}

/// Where an argument's value comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// A serialized value, decoded through the serialization service.
    Fixed {
        /// Opaque payload.
        payload: Vec<u8>,
    },
    /// A parameter of the event invocation.
    Dynamic {
        /// Index into the caller's parameters.
        index: usize,
    },
}

/// One call argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    /// Where the value comes from.
    pub binding: Binding,
    /// The type the value is declared as; the member is resolved against it.
    pub declared_type: TypeHash,
}

impl Argument {
    /// A fixed argument from an already encoded payload.
    pub fn fixed(payload: Vec<u8>, declared_type: TypeHash) -> Self {
        Self {
            binding: Binding::Fixed { payload },
            declared_type,
        }
    }

    /// A fixed argument encoded from a value.
    pub fn fixed_value(
        service: &dyn SerializationService,
        value: &Dynamic,
        declared_type: TypeHash,
    ) -> Result<Self, SerializationError> {
        Ok(Self::fixed(service.encode(value, declared_type)?, declared_type))
    }

    /// An argument bound to the caller's parameter at `index`.
    pub fn dynamic(index: usize, declared_type: TypeHash) -> Self {
        Self {
            binding: Binding::Dynamic { index },
            declared_type,
        }
    }

    /// The bound parameter index of a dynamic argument.
    pub fn dynamic_index(&self) -> Option<usize> {
        match self.binding {
            Binding::Dynamic { index } => Some(index),
            Binding::Fixed { .. } => None,
        }
    }
}

/// Resolution progress of a listener within the current generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerPhase {
    /// Not resolved since creation or since the last generation ended.
    Unresolved,
    /// Resolved, not yet invoked.
    Resolved,
    /// Invoked at least once with the current resolution.
    Invoked,
}

pub(crate) struct Resolution {
    pub(crate) invoker: Invoker,
    pub(crate) generation: u64,
    pub(crate) declaring_type: TypeHash,
    /// Decoded fixed arguments, `None` at dynamic positions.
    pub(crate) fixed: Vec<Option<Box<dyn HeldArgument>>>,
}

/// One persisted call.
pub struct Listener {
    /// Target object, or the static marker.
    pub target: ListenerTarget,
    /// Type the member is resolved against. For object targets the target's
    /// run-time type takes over at invocation time.
    pub declaring_type: TypeHash,
    /// Member name.
    pub member_name: String,
    /// Member kind. Rewritten when a field became a property or the reverse.
    pub member_kind: MemberKind,
    /// Arguments in parameter order.
    pub arguments: Vec<Argument>,
    pub(crate) phase: ListenerPhase,
    pub(crate) resolution: Option<Resolution>,
}

impl Listener {
    /// A static call.
    pub fn new_static(
        declaring_type: TypeHash,
        member_name: impl Into<String>,
        member_kind: MemberKind,
        arguments: Vec<Argument>,
    ) -> Self {
        Self {
            target: ListenerTarget::Static,
            declaring_type,
            member_name: member_name.into(),
            member_kind,
            arguments,
            phase: ListenerPhase::Unresolved,
            resolution: None,
        }
    }

    /// An instance call on `target`.
    pub fn new_instance(
        target: ObjectHandle,
        declaring_type: TypeHash,
        member_name: impl Into<String>,
        member_kind: MemberKind,
        arguments: Vec<Argument>,
    ) -> Self {
        Self {
            target: ListenerTarget::Object(target),
            ..Self::new_static(declaring_type, member_name, member_kind, arguments)
        }
    }

    /// Check if the listener calls a static member.
    pub fn is_static(&self) -> bool {
        self.target == ListenerTarget::Static
    }

    /// Declared argument types, the exact parameter list the member must take.
    pub fn param_types(&self) -> Vec<TypeHash> {
        self.arguments.iter().map(|a| a.declared_type).collect()
    }

    /// Current resolution phase.
    pub fn phase(&self) -> ListenerPhase {
        self.phase
    }

    /// Identity of the resolved member, if resolved.
    pub fn resolved_member(&self) -> Option<TypeHash> {
        self.resolution.as_ref().map(|r| r.invoker.member())
    }

    /// Drop the resolution so the next invocation resolves again.
    pub fn invalidate(&mut self) {
        self.phase = ListenerPhase::Unresolved;
        self.resolution = None;
    }
}

impl Clone for Listener {
    /// Clones the persisted description; the copy starts unresolved.
    fn clone(&self) -> Self {
        Self {
            target: self.target,
            declaring_type: self.declaring_type,
            member_name: self.member_name.clone(),
            member_kind: self.member_kind,
            arguments: self.arguments.clone(),
            phase: ListenerPhase::Unresolved,
            resolution: None,
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("target", &self.target)
            .field("declaring_type", &self.declaring_type)
            .field("member_name", &self.member_name)
            .field("member_kind", &self.member_kind)
            .field("arguments", &self.arguments)
            .field("phase", &self.phase)
            .finish()
    }
}

/// An event: its parameter signature and the listeners it calls, in order.
#[derive(Debug, Clone, Default)]
pub struct PersistentEvent {
    /// Types of the parameters the event is invoked with.
    pub signature: Vec<TypeHash>,
    /// Listeners in declaration order.
    pub listeners: Vec<Listener>,
}

impl PersistentEvent {
    /// An event with no listeners.
    pub fn new(signature: Vec<TypeHash>) -> Self {
        Self {
            signature,
            listeners: Vec::new(),
        }
    }

    /// Append a listener.
    pub fn add_listener(&mut self, listener: Listener) -> &mut Self {
        self.listeners.push(listener);
        self
    }

    /// Number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Check if the event has no listeners.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
