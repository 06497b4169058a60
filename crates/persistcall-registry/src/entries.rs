//! Registry entries for types and members.

use std::fmt;

use persistcall_core::{
    AdapterFn, HolderFactory, MemberCallable, MemberFlags, MemberKind, SignatureKey, ThunkFactory,
    TypeHash, TypeKind, primitives,
};

/// Registration entry for one host type.
#[derive(Clone)]
pub struct TypeEntry {
    /// Name listeners and plans refer to the type by.
    pub name: String,
    /// Identity, `TypeHash::from_name(name)`.
    pub hash: TypeHash,
    /// Path generated code uses to name the type.
    pub rust_path: String,
    /// How values of the type are passed.
    pub kind: TypeKind,
    /// Base type for reference types that declared one.
    pub base: Option<TypeHash>,
    /// Decodes a fixed argument of this type. `None` for `void`.
    pub holder: Option<HolderFactory>,
    /// Registered member identities, in registration order.
    pub members: Vec<TypeHash>,
}

impl TypeEntry {
    /// Create an entry with no base and no members.
    pub fn new(
        name: impl Into<String>,
        rust_path: impl Into<String>,
        kind: TypeKind,
        holder: Option<HolderFactory>,
    ) -> Self {
        let name = name.into();
        Self {
            hash: TypeHash::from_name(&name),
            name,
            rust_path: rust_path.into(),
            kind,
            base: None,
            holder,
            members: Vec::new(),
        }
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("name", &self.name)
            .field("hash", &self.hash)
            .field("rust_path", &self.rust_path)
            .field("kind", &self.kind)
            .field("base", &self.base)
            .field("members", &self.members.len())
            .finish()
    }
}

/// Registration entry for one invocable member.
///
/// Fields and properties are stored in their invocable form: one parameter
/// of the member's type and a `void` return.
#[derive(Clone)]
pub struct MemberEntry {
    /// Stable identity, `TypeHash::from_member(owner, name, kind, params)`.
    pub hash: TypeHash,
    /// Declaring type.
    pub owner: TypeHash,
    /// Member name.
    pub name: String,
    /// Field, property or method.
    pub kind: MemberKind,
    /// Static and conversion-operator flags.
    pub flags: MemberFlags,
    /// Ordered parameter types.
    pub params: Vec<TypeHash>,
    /// Return type, `void` when nothing is returned.
    pub return_type: TypeHash,
    pub(crate) callable: MemberCallable,
    pub(crate) factory: ThunkFactory,
    pub(crate) converter: Option<AdapterFn>,
}

impl MemberEntry {
    /// Check if the member is invoked without a target.
    pub fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }

    /// Check if the member is an implicit conversion operator.
    pub fn is_implicit_conversion(&self) -> bool {
        self.flags.contains(MemberFlags::IMPLICIT_CONVERSION)
    }

    /// Check if the member returns nothing.
    pub fn is_void(&self) -> bool {
        self.return_type == primitives::VOID
    }

    /// The invocation-factory signature this member needs.
    pub fn signature(&self) -> SignatureKey {
        SignatureKey::new(self.is_void(), self.params.clone())
    }

    /// The erased member body.
    pub fn callable(&self) -> &MemberCallable {
        &self.callable
    }

    /// The thunk factory captured when the member was registered.
    pub fn factory(&self) -> ThunkFactory {
        self.factory
    }

    /// The value-level converter of an implicit conversion operator.
    pub fn converter(&self) -> Option<&AdapterFn> {
        self.converter.as_ref()
    }
}

impl fmt::Debug for MemberEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberEntry")
            .field("hash", &self.hash)
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .field("params", &self.params)
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}
