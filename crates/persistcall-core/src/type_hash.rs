//! Deterministic hash-based identity for types, members and instantiations.
//!
//! [`TypeHash`] is a 64-bit hash computed from names and signatures. Because it
//! is derived rather than allocated, a listener persisted in one process names
//! the same member in every later process, and a build-time plan can refer to
//! instantiations before anything is registered.
//!
//! # Hash Computation
//!
//! Uses XXHash64 with domain-specific mixing constants so that a type, a member
//! and an instantiation sharing a name never collide.
//!
//! # Examples
//!
//! ```
//! use persistcall_core::{MemberKind, TypeHash, primitives};
//!
//! let calc = TypeHash::from_name("Calculator");
//! assert_eq!(calc, TypeHash::from_name("Calculator"));
//!
//! let add_ints = TypeHash::from_member(calc, "Add", MemberKind::Method, &[primitives::INT32]);
//! let add_floats = TypeHash::from_member(calc, "Add", MemberKind::Method, &[primitives::FLOAT]);
//! assert_ne!(add_ints, add_floats);
//! ```

use std::fmt;

use xxhash_rust::const_xxh64;
use xxhash_rust::xxh64::xxh64;

use crate::MemberKind;

/// Domain-specific mixing constants for hash computation.
pub mod hash_constants {
    /// Separator constant for ordered components.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for type hashes.
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for field members.
    pub const FIELD: u64 = 0x5ea77ffbcdf5f302;

    /// Domain marker for property members.
    pub const PROPERTY: u64 = 0x3e9f5d2a8c7b1403;

    /// Domain marker for method members.
    pub const METHOD: u64 = 0x7d3c8b4a92e15f6d;

    /// Domain marker for invocation signatures.
    pub const SIGNATURE: u64 = 0x9a7f3d5e2b8c4601;

    /// Domain marker for conversion pairs.
    pub const CONVERSION: u64 = 0x6c8e9cf570932bd5;

    /// Parameter position mixing constants.
    /// Each position gets a unique constant so that parameter order matters.
    pub const PARAM_MARKERS: [u64; 16] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
        0x7c3e9f2a5b8d1403,
        0x5d8c7b4a3e9f2106,
        0x3f1e9d8c7b5a4203,
        0x1a2b3c4d5e6f7089,
        0x9f8e7d6c5b4a3210,
        0x2468ace013579bdf,
        0xfdb97531eca86420,
        0x123456789abcdef0,
    ];
}

/// A deterministic 64-bit hash identifying a type, member or instantiation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Create a type hash from a type name.
    ///
    /// This is a `const fn` so primitive identities can be declared as constants.
    #[inline]
    pub const fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ const_xxh64::xxh64(name.as_bytes(), 0))
    }

    /// Create a member hash from its owner, name, kind and ordered parameter types.
    ///
    /// This is the stable identity the invoker cache is keyed by. Field and
    /// property members with the same name hash differently, which is what lets
    /// a listener notice that a member changed kind.
    #[inline]
    pub fn from_member(owner: TypeHash, name: &str, kind: MemberKind, params: &[TypeHash]) -> Self {
        let domain = match kind {
            MemberKind::Field => hash_constants::FIELD,
            MemberKind::Property => hash_constants::PROPERTY,
            MemberKind::Method => hash_constants::METHOD,
        };
        let seed = domain ^ owner.0 ^ xxh64(name.as_bytes(), 0);
        TypeHash(mix_ordered(seed, params))
    }

    /// Create a hash for an invocation signature: `(is_void, ordered parameters)`.
    #[inline]
    pub fn from_signature(is_void: bool, params: &[TypeHash]) -> Self {
        let seed = hash_constants::SIGNATURE ^ u64::from(is_void);
        TypeHash(mix_ordered(seed, params))
    }

    /// Create a hash identifying a directed conversion pair.
    #[inline]
    pub fn from_conversion(from: TypeHash, to: TypeHash) -> Self {
        TypeHash(mix_ordered(hash_constants::CONVERSION, &[from, to]))
    }
}

/// Fold an ordered list of hashes into `seed`.
///
/// Uses wrapping multiplication so the fold is not commutative:
/// `(int, float)` and `(float, int)` produce different results.
fn mix_ordered(seed: u64, items: &[TypeHash]) -> u64 {
    let mut hash = seed;
    for (i, item) in items.iter().enumerate() {
        let marker = hash_constants::PARAM_MARKERS
            .get(i)
            .copied()
            .unwrap_or_else(|| hash_constants::PARAM_MARKERS[0].wrapping_add(i as u64));
        hash = hash.wrapping_mul(hash_constants::SEP).wrapping_add(marker ^ item.0);
    }
    hash
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Hashes of the built-in primitive types.
pub mod primitives {
    use super::TypeHash;

    /// Hash for `void`
    pub const VOID: TypeHash = TypeHash::from_name("void");
    /// Hash for `bool`
    pub const BOOL: TypeHash = TypeHash::from_name("bool");
    /// Hash for `int8`
    pub const INT8: TypeHash = TypeHash::from_name("int8");
    /// Hash for `int16`
    pub const INT16: TypeHash = TypeHash::from_name("int16");
    /// Hash for `int` (32-bit signed integer)
    pub const INT32: TypeHash = TypeHash::from_name("int");
    /// Hash for `int64`
    pub const INT64: TypeHash = TypeHash::from_name("int64");
    /// Hash for `uint8`
    pub const UINT8: TypeHash = TypeHash::from_name("uint8");
    /// Hash for `uint16`
    pub const UINT16: TypeHash = TypeHash::from_name("uint16");
    /// Hash for `uint` (32-bit unsigned integer)
    pub const UINT32: TypeHash = TypeHash::from_name("uint");
    /// Hash for `uint64`
    pub const UINT64: TypeHash = TypeHash::from_name("uint64");
    /// Hash for `float` (32-bit)
    pub const FLOAT: TypeHash = TypeHash::from_name("float");
    /// Hash for `double` (64-bit)
    pub const DOUBLE: TypeHash = TypeHash::from_name("double");
    /// Hash for `string`
    pub const STRING: TypeHash = TypeHash::from_name("string");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_is_deterministic() {
        assert_eq!(TypeHash::from_name("Vector2"), TypeHash::from_name("Vector2"));
        assert_ne!(TypeHash::from_name("Vector2"), TypeHash::from_name("Vector3"));
    }

    #[test]
    fn const_and_runtime_name_hashes_agree() {
        let name = String::from("int");
        assert_eq!(TypeHash::from_name(&name), primitives::INT32);
    }

    #[test]
    fn member_kind_changes_identity() {
        let owner = TypeHash::from_name("Light");
        let params = [primitives::FLOAT];
        let field = TypeHash::from_member(owner, "intensity", MemberKind::Field, &params);
        let prop = TypeHash::from_member(owner, "intensity", MemberKind::Property, &params);
        assert_ne!(field, prop);
    }

    #[test]
    fn parameter_order_matters() {
        let owner = TypeHash::from_name("Math");
        let a = TypeHash::from_member(
            owner,
            "Mix",
            MemberKind::Method,
            &[primitives::INT32, primitives::FLOAT],
        );
        let b = TypeHash::from_member(
            owner,
            "Mix",
            MemberKind::Method,
            &[primitives::FLOAT, primitives::INT32],
        );
        assert_ne!(a, b);
    }

    #[test]
    fn signature_void_flag_matters() {
        let params = [primitives::INT32, primitives::INT32];
        assert_ne!(
            TypeHash::from_signature(true, &params),
            TypeHash::from_signature(false, &params)
        );
    }

    #[test]
    fn conversion_pairs_are_directed() {
        assert_ne!(
            TypeHash::from_conversion(primitives::INT32, primitives::FLOAT),
            TypeHash::from_conversion(primitives::FLOAT, primitives::INT32)
        );
    }

    #[test]
    fn many_params_fall_back_to_derived_markers() {
        let params = vec![primitives::INT32; 20];
        let mut shifted = params.clone();
        shifted[19] = primitives::FLOAT;
        assert_ne!(
            TypeHash::from_signature(false, &params),
            TypeHash::from_signature(false, &shifted)
        );
    }
}
