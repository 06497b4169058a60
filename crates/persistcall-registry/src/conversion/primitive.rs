//! Built-in primitive conversions.
//!
//! Only the standard implicit widenings are built in: integer widening,
//! integer to floating point, and `float` to `double`. Narrowing and sign
//! changes need an explicit adapter.

use persistcall_core::{ConversionError, Dynamic, TypeHash, primitives};

/// Check if `from -> to` is a built-in primitive widening.
pub fn is_primitive_widening(from: TypeHash, to: TypeHash) -> bool {
    is_integer_widening(from, to)
        || is_int_to_float(from, to)
        || (from == primitives::FLOAT && to == primitives::DOUBLE)
}

/// Apply a primitive widening to a slot holding a `from` value.
pub fn widen(from: TypeHash, to: TypeHash, value: &Dynamic) -> Result<Dynamic, ConversionError> {
    match value {
        Dynamic::Int(v) if is_integer_widening(from, to) => Ok(Dynamic::Int(*v)),
        // uint64 shares the i64 slot bit-for-bit
        Dynamic::Int(v) if is_int_to_float(from, to) && from == primitives::UINT64 => {
            Ok(Dynamic::Float(*v as u64 as f64))
        }
        Dynamic::Int(v) if is_int_to_float(from, to) => Ok(Dynamic::Float(*v as f64)),
        Dynamic::Float(v) if from == primitives::FLOAT && to == primitives::DOUBLE => {
            Ok(Dynamic::Float(*v))
        }
        _ => Err(ConversionError::Unconvertible { from, to }),
    }
}

fn is_integer_widening(from: TypeHash, to: TypeHash) -> bool {
    matches!(
        (from, to),
        // Signed widening
        (primitives::INT8, primitives::INT16)
            | (primitives::INT8, primitives::INT32)
            | (primitives::INT8, primitives::INT64)
            | (primitives::INT16, primitives::INT32)
            | (primitives::INT16, primitives::INT64)
            | (primitives::INT32, primitives::INT64)
            // Unsigned widening
            | (primitives::UINT8, primitives::UINT16)
            | (primitives::UINT8, primitives::UINT32)
            | (primitives::UINT8, primitives::UINT64)
            | (primitives::UINT16, primitives::UINT32)
            | (primitives::UINT16, primitives::UINT64)
            | (primitives::UINT32, primitives::UINT64)
            // Unsigned to larger signed
            | (primitives::UINT8, primitives::INT16)
            | (primitives::UINT8, primitives::INT32)
            | (primitives::UINT8, primitives::INT64)
            | (primitives::UINT16, primitives::INT32)
            | (primitives::UINT16, primitives::INT64)
            | (primitives::UINT32, primitives::INT64)
    )
}

fn is_int_to_float(from: TypeHash, to: TypeHash) -> bool {
    let is_int = matches!(
        from,
        primitives::INT8
            | primitives::INT16
            | primitives::INT32
            | primitives::INT64
            | primitives::UINT8
            | primitives::UINT16
            | primitives::UINT32
            | primitives::UINT64
    );
    let is_float = matches!(to, primitives::FLOAT | primitives::DOUBLE);
    is_int && is_float
}
