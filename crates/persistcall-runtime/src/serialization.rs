//! Fixed-argument payload encoding.
//!
//! The runtime treats payloads as opaque and asks a [`SerializationService`]
//! to decode them against the argument's declared type. [`BincodeSerializer`]
//! is the default service. Its payload is one tag byte (the
//! [`PrimitiveKind`] discriminant) followed by a bincode-encoded
//! [`StoredValue`].

use serde::{Deserialize, Serialize};

use persistcall_core::{Dynamic, PrimitiveKind, TypeHash};

use crate::SerializationError;

/// Decodes and encodes fixed argument payloads.
pub trait SerializationService {
    /// Decode a payload holding a value of type `ty`.
    fn decode(&self, payload: &[u8], ty: TypeHash) -> Result<Dynamic, SerializationError>;

    /// Encode a value of type `ty`.
    fn encode(&self, value: &Dynamic, ty: TypeHash) -> Result<Vec<u8>, SerializationError>;
}

/// The on-disk form of a primitive value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Stores primitives and strings with bincode.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeSerializer;

impl BincodeSerializer {
    fn kind_of(ty: TypeHash) -> Result<PrimitiveKind, SerializationError> {
        match PrimitiveKind::from_hash(ty) {
            Some(PrimitiveKind::Void) | None => Err(SerializationError::UnsupportedType(ty)),
            Some(kind) => Ok(kind),
        }
    }
}

impl SerializationService for BincodeSerializer {
    fn decode(&self, payload: &[u8], ty: TypeHash) -> Result<Dynamic, SerializationError> {
        let expected = Self::kind_of(ty)?;
        let (&tag, body) = payload.split_first().ok_or(SerializationError::Empty)?;
        let kind =
            PrimitiveKind::try_from(tag).map_err(|_| SerializationError::UnknownTag(tag))?;
        if kind != expected {
            return Err(SerializationError::TypeMismatch {
                expected: ty,
                actual: kind.name(),
            });
        }

        let stored: StoredValue = bincode::deserialize(body)?;
        match (kind, stored) {
            (PrimitiveKind::Bool, StoredValue::Bool(v)) => Ok(Dynamic::Bool(v)),
            (k, StoredValue::Int(v)) if k.is_integer() => Ok(Dynamic::Int(v)),
            (k, StoredValue::Float(v)) if k.is_float() => Ok(Dynamic::Float(v)),
            (PrimitiveKind::String, StoredValue::String(v)) => Ok(Dynamic::String(v)),
            (_, stored) => Err(SerializationError::TypeMismatch {
                expected: ty,
                actual: match stored {
                    StoredValue::Bool(_) => "bool",
                    StoredValue::Int(_) => "int",
                    StoredValue::Float(_) => "float",
                    StoredValue::String(_) => "string",
                },
            }),
        }
    }

    fn encode(&self, value: &Dynamic, ty: TypeHash) -> Result<Vec<u8>, SerializationError> {
        let kind = Self::kind_of(ty)?;
        let stored = match (kind, value) {
            (PrimitiveKind::Bool, Dynamic::Bool(v)) => StoredValue::Bool(*v),
            (k, Dynamic::Int(v)) if k.is_integer() => StoredValue::Int(*v),
            (k, Dynamic::Float(v)) if k.is_float() => StoredValue::Float(*v),
            (PrimitiveKind::String, Dynamic::String(v)) => StoredValue::String(v.clone()),
            _ => {
                return Err(SerializationError::TypeMismatch {
                    expected: ty,
                    actual: value.type_name(),
                });
            }
        };

        let mut payload = vec![u8::from(kind)];
        payload.extend(bincode::serialize(&stored)?);
        Ok(payload)
    }
}
