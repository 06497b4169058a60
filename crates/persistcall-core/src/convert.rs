//! Conversion traits between Rust types and `Dynamic` slots.
//!
//! - [`FromDynamic`]: extract a Rust value from a slot
//! - [`IntoDynamic`]: store a Rust value into a slot
//! - [`HostType`]: the registered identity of a Rust type
//! - [`ArgType`]: anything that can be a parameter of an invocable member
//! - [`ReturnValue`]: anything a member may return, including `()`
//!
//! Host value and reference types are declared with [`impl_value_type!`] and
//! [`impl_reference_type!`](crate::impl_reference_type).

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use crate::{ConversionError, Dynamic, ObjectHandle, PrimitiveKind, TypeHash, TypeKind};

/// Extract a value from a Dynamic slot.
pub trait FromDynamic: Sized {
    /// Extract a value from the given slot.
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError>;
}

/// Convert a value into a Dynamic slot.
pub trait IntoDynamic {
    /// Convert this value into a Dynamic slot.
    fn into_dynamic(self) -> Dynamic;
}

/// The registered identity of a Rust type.
pub trait HostType: Any + Send + Sync {
    /// Name listeners and plans refer to the type by.
    const NAME: &'static str;
    /// Path generated code uses to name the type.
    const RUST_PATH: &'static str;
    /// How values of the type are stored and passed.
    const KIND: TypeKind;

    /// Hash of [`HostType::NAME`].
    fn type_hash() -> TypeHash {
        TypeHash::from_name(Self::NAME)
    }
}

/// A type that can be passed as an argument to an invocable member.
pub trait ArgType: HostType + FromDynamic + IntoDynamic + Clone {}

impl<T: HostType + FromDynamic + IntoDynamic + Clone> ArgType for T {}

/// A member return type.
pub trait ReturnValue {
    /// Whether the member is void.
    const IS_VOID: bool;

    /// Hash of the returned type, `void` for `()`.
    fn return_type() -> TypeHash;

    /// Store the returned value.
    fn into_return(self) -> Dynamic;
}

impl ReturnValue for () {
    const IS_VOID: bool = true;

    fn return_type() -> TypeHash {
        crate::primitives::VOID
    }

    fn into_return(self) -> Dynamic {
        Dynamic::Void
    }
}

impl<T: HostType + IntoDynamic> ReturnValue for T {
    const IS_VOID: bool = false;

    fn return_type() -> TypeHash {
        T::type_hash()
    }

    fn into_return(self) -> Dynamic {
        self.into_dynamic()
    }
}

// ============================================================================
// Primitive implementations
// ============================================================================

macro_rules! impl_primitive_host_type {
    ($($ty:ty => $kind:expr),* $(,)?) => {
        $(
            impl HostType for $ty {
                const NAME: &'static str = $kind.name();
                const RUST_PATH: &'static str = $kind.rust_path();
                const KIND: TypeKind = TypeKind::Primitive;
            }
        )*
    };
}

impl_primitive_host_type!(
    bool => PrimitiveKind::Bool,
    i8 => PrimitiveKind::Int8,
    i16 => PrimitiveKind::Int16,
    i32 => PrimitiveKind::Int32,
    i64 => PrimitiveKind::Int64,
    u8 => PrimitiveKind::Uint8,
    u16 => PrimitiveKind::Uint16,
    u32 => PrimitiveKind::Uint32,
    u64 => PrimitiveKind::Uint64,
    f32 => PrimitiveKind::Float,
    f64 => PrimitiveKind::Double,
    String => PrimitiveKind::String,
);

macro_rules! impl_dynamic_int {
    ($($ty:ty),*) => {
        $(
            impl FromDynamic for $ty {
                fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
                    match slot {
                        Dynamic::Int(v) => <$ty>::try_from(*v).map_err(|_| {
                            ConversionError::IntegerOverflow {
                                value: *v,
                                target_type: stringify!($ty),
                            }
                        }),
                        _ => Err(ConversionError::TypeMismatch {
                            expected: "int",
                            actual: slot.type_name(),
                        }),
                    }
                }
            }

            impl IntoDynamic for $ty {
                fn into_dynamic(self) -> Dynamic {
                    Dynamic::Int(self as i64)
                }
            }
        )*
    };
}

impl_dynamic_int!(i8, i16, i32, i64, u8, u16, u32);

// u64 reinterprets the bits so the full range survives the i64 slot
impl FromDynamic for u64 {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Int(v) => Ok(*v as u64),
            _ => Err(ConversionError::TypeMismatch {
                expected: "int",
                actual: slot.type_name(),
            }),
        }
    }
}

impl IntoDynamic for u64 {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Int(self as i64)
    }
}

impl FromDynamic for f32 {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Float(v) => {
                if !v.is_finite() || (*v <= f32::MAX as f64 && *v >= f32::MIN as f64) {
                    Ok(*v as f32)
                } else {
                    Err(ConversionError::FloatConversion {
                        value: *v,
                        target_type: "f32",
                    })
                }
            }
            _ => Err(ConversionError::TypeMismatch {
                expected: "float",
                actual: slot.type_name(),
            }),
        }
    }
}

impl IntoDynamic for f32 {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Float(self as f64)
    }
}

impl FromDynamic for f64 {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Float(v) => Ok(*v),
            _ => Err(ConversionError::TypeMismatch {
                expected: "float",
                actual: slot.type_name(),
            }),
        }
    }
}

impl IntoDynamic for f64 {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Float(self)
    }
}

impl FromDynamic for bool {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Bool(v) => Ok(*v),
            _ => Err(ConversionError::TypeMismatch {
                expected: "bool",
                actual: slot.type_name(),
            }),
        }
    }
}

impl IntoDynamic for bool {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Bool(self)
    }
}

impl FromDynamic for String {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::String(v) => Ok(v.clone()),
            _ => Err(ConversionError::TypeMismatch {
                expected: "string",
                actual: slot.type_name(),
            }),
        }
    }
}

impl IntoDynamic for String {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::String(self)
    }
}

// ============================================================================
// Reference handles
// ============================================================================

/// A typed handle to a host object of reference type `T`.
///
/// This is how reference types appear as parameters: the argument carries the
/// handle, the declared type carries `T`'s identity.
pub struct Ref<T> {
    /// Handle into the host's object heap.
    pub handle: ObjectHandle,
    marker: PhantomData<fn() -> T>,
}

impl<T> Ref<T> {
    /// Wrap a handle.
    pub fn new(handle: ObjectHandle) -> Self {
        Self {
            handle,
            marker: PhantomData,
        }
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Ref<T> {}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl<T> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ref").field(&self.handle).finish()
    }
}

impl<T: HostType> HostType for Ref<T> {
    const NAME: &'static str = T::NAME;
    const RUST_PATH: &'static str = T::RUST_PATH;
    const KIND: TypeKind = TypeKind::Reference;
}

impl<T> FromDynamic for Ref<T> {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Object(handle) => Ok(Ref::new(*handle)),
            _ => Err(ConversionError::TypeMismatch {
                expected: "object",
                actual: slot.type_name(),
            }),
        }
    }
}

impl<T> IntoDynamic for Ref<T> {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Object(self.handle)
    }
}

// ============================================================================
// Host type declaration macros
// ============================================================================

/// Declare a host value type: copied by value, stored inline as `Dynamic::Native`.
///
/// The type must be `Clone + Send + Sync + 'static`.
///
/// ```
/// #[derive(Clone, Debug, PartialEq)]
/// pub struct Vector2 { pub x: f32, pub y: f32 }
///
/// persistcall_core::impl_value_type!(Vector2, "Vector2", "crate::Vector2");
/// ```
#[macro_export]
macro_rules! impl_value_type {
    ($ty:ty, $name:expr, $path:expr) => {
        impl $crate::HostType for $ty {
            const NAME: &'static str = $name;
            const RUST_PATH: &'static str = $path;
            const KIND: $crate::TypeKind = $crate::TypeKind::Value;
        }

        impl $crate::FromDynamic for $ty {
            fn from_dynamic(
                slot: &$crate::Dynamic,
            ) -> ::core::result::Result<Self, $crate::ConversionError> {
                slot.downcast_native::<$ty>().cloned().ok_or(
                    $crate::ConversionError::NativeTypeMismatch { expected: $name },
                )
            }
        }

        impl $crate::IntoDynamic for $ty {
            fn into_dynamic(self) -> $crate::Dynamic {
                $crate::Dynamic::native(self)
            }
        }
    };
}

/// Declare a host reference type: lives in the `ObjectHeap`, passed as `Ref<T>`.
#[macro_export]
macro_rules! impl_reference_type {
    ($ty:ty, $name:expr, $path:expr) => {
        impl $crate::HostType for $ty {
            const NAME: &'static str = $name;
            const RUST_PATH: &'static str = $path;
            const KIND: $crate::TypeKind = $crate::TypeKind::Reference;
        }
    };
}
