//! Generational arena for host-managed objects.
//!
//! Listeners never own their targets. They hold an [`ObjectHandle`], and the
//! host decides when the object behind it goes away. A freed slot bumps its
//! generation, so a listener still holding the old handle sees a missing target
//! instead of some unrelated object that reused the slot.

use std::any::Any;
use std::fmt;

use crate::{HostType, TypeHash};

/// Handle to a heap-allocated host object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    /// Index into ObjectHeap.slots
    pub index: u32,
    /// Generation for use-after-free detection
    pub generation: u32,
}

impl ObjectHandle {
    /// Create a new object handle.
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Heap storage for host objects with generational indices.
pub struct ObjectHeap {
    slots: Vec<HeapSlot>,
    free_list: Vec<u32>,
}

struct HeapSlot {
    generation: u32,
    value: Option<Box<dyn Any + Send + Sync>>,
    type_hash: TypeHash,
}

impl ObjectHeap {
    /// Create a new empty object heap.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Allocate a new object, recording its run-time type.
    pub fn allocate<T: HostType>(&mut self, value: T) -> ObjectHandle {
        let boxed: Box<dyn Any + Send + Sync> = Box::new(value);
        let type_hash = T::type_hash();

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(boxed);
            slot.type_hash = type_hash;
            ObjectHandle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(HeapSlot {
                generation: 0,
                value: Some(boxed),
                type_hash,
            });
            ObjectHandle::new(index, 0)
        }
    }

    fn live_slot(&self, handle: ObjectHandle) -> Option<&HeapSlot> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.value.is_some())
    }

    /// Check if the handle still refers to a live object.
    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.live_slot(handle).is_some()
    }

    /// Get the run-time type of a live object.
    pub fn type_of(&self, handle: ObjectHandle) -> Option<TypeHash> {
        self.live_slot(handle).map(|slot| slot.type_hash)
    }

    /// Get immutable reference to an object.
    ///
    /// Returns None if the handle is stale or the type doesn't match.
    pub fn get<T: Any>(&self, handle: ObjectHandle) -> Option<&T> {
        self.live_slot(handle)?.value.as_ref()?.downcast_ref::<T>()
    }

    /// Get mutable reference to an object.
    ///
    /// Returns None if the handle is stale or the type doesn't match.
    pub fn get_mut<T: Any>(&mut self, handle: ObjectHandle) -> Option<&mut T> {
        self.get_any_mut(handle)?.downcast_mut::<T>()
    }

    /// Get a type-erased mutable reference to an object.
    pub fn get_any_mut(&mut self, handle: ObjectHandle) -> Option<&mut dyn Any> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.as_mut()?;
        Some(&mut **value as &mut dyn Any)
    }

    /// Free an object. Outstanding handles become stale.
    ///
    /// Returns true if a live object was freed.
    pub fn free(&mut self, handle: ObjectHandle) -> bool {
        if let Some(slot) = self.slots.get_mut(handle.index as usize)
            && slot.generation == handle.generation
            && slot.value.is_some()
        {
            slot.value = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free_list.push(handle.index);
            return true;
        }
        false
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Check if the heap holds no live objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeap")
            .field("slot_count", &self.slots.len())
            .field("free_count", &self.free_list.len())
            .finish()
    }
}
