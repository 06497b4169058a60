//! Runtime value type passed through erased invocation thunks.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::ObjectHandle;

/// A dynamic value: one argument, parameter or return slot.
///
/// Integers of every width share `Int` and both float widths share `Float`;
/// the declared type travels next to the value, never inside it. Value types
/// registered by the host are stored inline as `Native`, reference types as an
/// `Object` handle into the host's `ObjectHeap`.
///
/// `Native` is reference counted so that a caller's parameter vector can be
/// cloned into several listeners without requiring `Clone` on the payload.
#[derive(Clone)]
pub enum Dynamic {
    /// Void/empty
    Void,
    /// Boolean value
    Bool(bool),
    /// Integer value (every integer width is stored as i64)
    Int(i64),
    /// Floating point value (f32 and f64 are stored as f64)
    Float(f64),
    /// String value (owned)
    String(String),
    /// Handle to a host-managed object
    Object(ObjectHandle),
    /// Inline host value type
    Native(Arc<dyn Any + Send + Sync>),
    /// Null handle
    NullHandle,
}

impl Dynamic {
    /// Wrap a host value type.
    pub fn native<T: Any + Send + Sync>(value: T) -> Self {
        Dynamic::Native(Arc::new(value))
    }

    /// Get a human-readable name for this slot's kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Void => "void",
            Dynamic::Bool(_) => "bool",
            Dynamic::Int(_) => "int",
            Dynamic::Float(_) => "float",
            Dynamic::String(_) => "string",
            Dynamic::Object(_) => "object",
            Dynamic::Native(_) => "native",
            Dynamic::NullHandle => "null",
        }
    }

    /// Check if this slot is void.
    pub fn is_void(&self) -> bool {
        matches!(self, Dynamic::Void)
    }

    /// Check if this slot is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::NullHandle)
    }

    /// Borrow the inline native value as `T`.
    pub fn downcast_native<T: Any>(&self) -> Option<&T> {
        match self {
            Dynamic::Native(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dynamic::Void => write!(f, "Void"),
            Dynamic::Bool(v) => write!(f, "Bool({})", v),
            Dynamic::Int(v) => write!(f, "Int({})", v),
            Dynamic::Float(v) => write!(f, "Float({})", v),
            Dynamic::String(s) => write!(f, "String({:?})", s),
            Dynamic::Object(h) => write!(f, "Object({:?})", h),
            Dynamic::Native(_) => write!(f, "Native(...)"),
            Dynamic::NullHandle => write!(f, "NullHandle"),
        }
    }
}

impl PartialEq for Dynamic {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Dynamic::Void, Dynamic::Void) => true,
            (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
            (Dynamic::Int(a), Dynamic::Int(b)) => a == b,
            (Dynamic::Float(a), Dynamic::Float(b)) => a == b,
            (Dynamic::String(a), Dynamic::String(b)) => a == b,
            (Dynamic::Object(a), Dynamic::Object(b)) => a == b,
            (Dynamic::NullHandle, Dynamic::NullHandle) => true,
            // Natives compare by identity only
            (Dynamic::Native(a), Dynamic::Native(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
