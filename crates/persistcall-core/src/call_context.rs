//! Call context bridging the invoker and a compiled member thunk.

use std::any::Any;
use std::fmt;

use crate::{Dynamic, NativeError, ObjectHandle, ObjectHeap};

/// Context for one thunk invocation.
///
/// Carries the receiver handle (if any), the already-converted argument
/// slots, the host object heap and the return slot.
pub struct CallContext<'a> {
    /// Receiver of an instance member, `None` for static members
    this: Option<ObjectHandle>,
    /// Argument slots in declaration order
    args: &'a [Dynamic],
    /// Object heap for receiver access
    heap: &'a mut ObjectHeap,
    /// Return value slot
    return_slot: Dynamic,
}

impl<'a> CallContext<'a> {
    /// Create a new call context.
    pub fn new(this: Option<ObjectHandle>, args: &'a [Dynamic], heap: &'a mut ObjectHeap) -> Self {
        Self {
            this,
            args,
            heap,
            return_slot: Dynamic::Void,
        }
    }

    /// Get the number of arguments.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Get every argument slot.
    pub fn args(&self) -> &[Dynamic] {
        self.args
    }

    /// Get a raw reference to an argument slot.
    pub fn arg_slot(&self, index: usize) -> Result<&Dynamic, NativeError> {
        self.args.get(index).ok_or(NativeError::ArgumentCount {
            expected: index + 1,
            actual: self.args.len(),
        })
    }

    /// Get the receiver handle.
    pub fn this_handle(&self) -> Option<ObjectHandle> {
        self.this
    }

    /// Get a type-erased mutable reference to the receiver.
    ///
    /// Returns `Ok(None)` for static calls and an error when the handle is stale.
    pub fn this_any_mut(&mut self) -> Result<Option<&mut dyn Any>, NativeError> {
        match self.this {
            None => Ok(None),
            Some(handle) => self
                .heap
                .get_any_mut(handle)
                .map(Some)
                .ok_or_else(|| NativeError::invalid_this("stale object handle")),
        }
    }

    /// Set the return value.
    pub fn set_return_slot(&mut self, slot: Dynamic) {
        self.return_slot = slot;
    }

    /// Take the return value, leaving `Void` behind.
    pub fn take_return(&mut self) -> Dynamic {
        std::mem::replace(&mut self.return_slot, Dynamic::Void)
    }

    /// Get access to the object heap.
    pub fn heap(&self) -> &ObjectHeap {
        self.heap
    }
}

impl fmt::Debug for CallContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("this", &self.this)
            .field("arg_count", &self.arg_count())
            .finish()
    }
}
