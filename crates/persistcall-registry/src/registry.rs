//! TypeRegistry - static type metadata for member resolution.
//!
//! [`TypeRegistry`] is the lookup table member resolution runs against. It
//! stores every host type by [`TypeHash`] and every invocable member by its
//! member identity, so resolving `(declaring type, name, kind, parameter
//! types)` is a single hash lookup plus a verification of the stored entry.
//!
//! # Storage Model
//!
//! - **Types**: `TypeEntry` by type hash
//! - **Members**: `MemberEntry` by member hash; each type lists its own
//! - **Conversion operators**: per owner, the members flagged
//!   `IMPLICIT_CONVERSION`, searched by conversion discovery
//!
//! # Thread Safety
//!
//! `TypeRegistry` is **not thread-safe** by design. Types are registered
//! single-threaded during host setup; afterwards the registry is read-only.
//! Hosts that share it across threads wrap it themselves.
//!
//! # Example
//!
//! ```
//! use persistcall_core::primitives;
//! use persistcall_registry::TypeRegistry;
//!
//! let registry = TypeRegistry::with_primitives();
//! assert!(registry.get_type(primitives::INT32).is_some());
//! ```

use rustc_hash::FxHashMap;

use persistcall_core::{
    ArgType, ArgumentHolder, HolderFactory, HostType, MemberKind, PrimitiveKind, Ref,
    RegistrationError, TypeHash, TypeKind,
};

use crate::TypeBuilder;
use crate::entries::{MemberEntry, TypeEntry};

/// Static metadata for every registered host type and member.
#[derive(Default)]
pub struct TypeRegistry {
    types: FxHashMap<TypeHash, TypeEntry>,
    members: FxHashMap<TypeHash, MemberEntry>,
    conversion_operators: FxHashMap<TypeHash, Vec<TypeHash>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every primitive type registered.
    pub fn with_primitives() -> Self {
        let mut registry = Self::new();
        registry.register_primitives();
        registry
    }

    /// Register every primitive type. Already registered primitives are kept.
    pub fn register_primitives(&mut self) {
        for kind in PrimitiveKind::ALL {
            let entry = TypeEntry::new(
                kind.name(),
                kind.rust_path(),
                TypeKind::Primitive,
                primitive_holder(kind),
            );
            self.types.entry(entry.hash).or_insert(entry);
        }
    }

    /// Register a value type and start adding its members.
    pub fn register_value_type<T: ArgType>(
        &mut self,
    ) -> Result<TypeBuilder<'_, T>, RegistrationError> {
        self.insert_type::<T>(ArgumentHolder::<T>::hold)
    }

    /// Register a reference type and start adding its members.
    ///
    /// Fixed arguments of a reference type hold the object handle.
    pub fn register_reference_type<T: HostType>(
        &mut self,
    ) -> Result<TypeBuilder<'_, T>, RegistrationError> {
        self.insert_type::<T>(ArgumentHolder::<Ref<T>>::hold)
    }

    /// Continue adding members to an already registered type.
    pub fn extend_type<T: HostType>(&mut self) -> Result<TypeBuilder<'_, T>, RegistrationError> {
        if !self.types.contains_key(&T::type_hash()) {
            return Err(RegistrationError::TypeNotFound(T::NAME.to_string()));
        }
        Ok(TypeBuilder::new(self))
    }

    fn insert_type<T: HostType>(
        &mut self,
        holder: HolderFactory,
    ) -> Result<TypeBuilder<'_, T>, RegistrationError> {
        let entry = TypeEntry::new(T::NAME, T::RUST_PATH, T::KIND, Some(holder));
        if self.types.contains_key(&entry.hash) {
            return Err(RegistrationError::DuplicateType(T::NAME.to_string()));
        }
        tracing::debug!(ty = T::NAME, kind = ?T::KIND, "registered type");
        self.types.insert(entry.hash, entry);
        Ok(TypeBuilder::new(self))
    }

    pub(crate) fn set_base(
        &mut self,
        ty: TypeHash,
        base: TypeHash,
    ) -> Result<(), RegistrationError> {
        if !self.types.contains_key(&base) {
            return Err(RegistrationError::TypeNotFound(format!("{base}")));
        }
        let entry = self
            .types
            .get_mut(&ty)
            .ok_or_else(|| RegistrationError::TypeNotFound(format!("{ty}")))?;
        entry.base = Some(base);
        Ok(())
    }

    pub(crate) fn insert_member(&mut self, member: MemberEntry) -> Result<(), RegistrationError> {
        let owner_name = match self.types.get(&member.owner) {
            Some(owner) => owner.name.clone(),
            None => return Err(RegistrationError::TypeNotFound(format!("{}", member.owner))),
        };
        if self.members.contains_key(&member.hash) {
            return Err(RegistrationError::DuplicateMember {
                owner: owner_name,
                name: member.name,
            });
        }

        if member.is_implicit_conversion() {
            self.conversion_operators
                .entry(member.owner)
                .or_default()
                .push(member.hash);
        }
        if let Some(owner) = self.types.get_mut(&member.owner) {
            owner.members.push(member.hash);
        }
        tracing::debug!(
            owner = %owner_name,
            member = %member.name,
            kind = %member.kind,
            "registered member"
        );
        self.members.insert(member.hash, member);
        Ok(())
    }

    /// Get a type by hash.
    pub fn get_type(&self, hash: TypeHash) -> Option<&TypeEntry> {
        self.types.get(&hash)
    }

    /// Get a type by name.
    pub fn type_by_name(&self, name: &str) -> Option<&TypeEntry> {
        self.get_type(TypeHash::from_name(name))
    }

    /// Display name of a type, falling back to its hash when unregistered.
    pub fn type_name(&self, hash: TypeHash) -> String {
        match self.types.get(&hash) {
            Some(entry) => entry.name.clone(),
            None => format!("{hash}"),
        }
    }

    /// Get a member by identity.
    pub fn get_member(&self, hash: TypeHash) -> Option<&MemberEntry> {
        self.members.get(&hash)
    }

    /// Find the member `owner.name` of `kind` taking exactly `params`.
    ///
    /// Members declared on a base type are found through derived types.
    /// Parameter types must match exactly; no conversion is considered here.
    pub fn find_member(
        &self,
        owner: TypeHash,
        name: &str,
        kind: MemberKind,
        params: &[TypeHash],
    ) -> Option<&MemberEntry> {
        self.base_chain(owner).find_map(|ty| {
            let hash = TypeHash::from_member(ty, name, kind, params);
            self.members.get(&hash).filter(|m| {
                m.owner == ty && m.name == name && m.kind == kind && m.params == params
            })
        })
    }

    /// Check if `owner` (or a base) declares any member called `name` of `kind`.
    pub fn has_member_named(&self, owner: TypeHash, name: &str, kind: MemberKind) -> bool {
        self.base_chain(owner).any(|ty| {
            self.types.get(&ty).is_some_and(|entry| {
                entry.members.iter().any(|hash| {
                    self.members
                        .get(hash)
                        .is_some_and(|m| m.name == name && m.kind == kind)
                })
            })
        })
    }

    /// Implicit conversion operators declared by `owner`, in registration order.
    pub fn conversion_operators(&self, owner: TypeHash) -> impl Iterator<Item = &MemberEntry> {
        self.conversion_operators
            .get(&owner)
            .into_iter()
            .flatten()
            .filter_map(|hash| self.members.get(hash))
    }

    /// Iterate `ty` followed by its base types.
    pub fn base_chain(&self, ty: TypeHash) -> BaseChain<'_> {
        BaseChain {
            registry: self,
            next: Some(ty),
            steps: 0,
        }
    }

    /// Check if `derived` is `base` or inherits from it.
    pub fn is_subtype(&self, derived: TypeHash, base: TypeHash) -> bool {
        self.base_chain(derived).any(|ty| ty == base)
    }

    /// Number of registered types.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Number of registered members.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.types.len())
            .field("members", &self.members.len())
            .finish()
    }
}

/// Iterator over a type and its base types.
pub struct BaseChain<'a> {
    registry: &'a TypeRegistry,
    next: Option<TypeHash>,
    steps: usize,
}

impl Iterator for BaseChain<'_> {
    type Item = TypeHash;

    fn next(&mut self) -> Option<TypeHash> {
        let current = self.next.take()?;
        // A cycle can only come from hand-built entries; stop rather than spin.
        self.steps += 1;
        if self.steps <= self.registry.types.len().max(1) {
            self.next = self.registry.types.get(&current).and_then(|e| e.base);
        }
        Some(current)
    }
}

fn primitive_holder(kind: PrimitiveKind) -> Option<HolderFactory> {
    let holder: HolderFactory = match kind {
        PrimitiveKind::Void => return None,
        PrimitiveKind::Bool => ArgumentHolder::<bool>::hold,
        PrimitiveKind::Int8 => ArgumentHolder::<i8>::hold,
        PrimitiveKind::Int16 => ArgumentHolder::<i16>::hold,
        PrimitiveKind::Int32 => ArgumentHolder::<i32>::hold,
        PrimitiveKind::Int64 => ArgumentHolder::<i64>::hold,
        PrimitiveKind::Uint8 => ArgumentHolder::<u8>::hold,
        PrimitiveKind::Uint16 => ArgumentHolder::<u16>::hold,
        PrimitiveKind::Uint32 => ArgumentHolder::<u32>::hold,
        PrimitiveKind::Uint64 => ArgumentHolder::<u64>::hold,
        PrimitiveKind::Float => ArgumentHolder::<f32>::hold,
        PrimitiveKind::Double => ArgumentHolder::<f64>::hold,
        PrimitiveKind::String => ArgumentHolder::<String>::hold,
    };
    Some(holder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistcall_core::{Dynamic, primitives};

    struct Node;
    struct Leaf;

    persistcall_core::impl_reference_type!(Node, "Node", "crate::Node");
    persistcall_core::impl_reference_type!(Leaf, "Leaf", "crate::Leaf");

    #[test]
    fn primitives_have_holders_except_void() {
        let registry = TypeRegistry::with_primitives();
        assert_eq!(registry.type_count(), PrimitiveKind::ALL.len());
        assert!(registry.get_type(primitives::VOID).unwrap().holder.is_none());

        let hold = registry.get_type(primitives::INT32).unwrap().holder.unwrap();
        assert_eq!(hold(&Dynamic::Int(4)).unwrap().value(), Dynamic::Int(4));
        assert_eq!(registry.type_by_name("double").unwrap().rust_path, "f64");
    }

    #[test]
    fn duplicate_type_is_rejected() {
        let mut registry = TypeRegistry::new();
        assert!(registry.register_reference_type::<Node>().is_ok());
        assert!(matches!(
            registry.register_reference_type::<Node>(),
            Err(RegistrationError::DuplicateType(name)) if name == "Node"
        ));
    }

    #[test]
    fn base_chain_walks_to_root() {
        let mut registry = TypeRegistry::new();
        registry.register_reference_type::<Node>().unwrap();
        registry
            .register_reference_type::<Leaf>()
            .unwrap()
            .extends::<Node>()
            .unwrap();

        let chain: Vec<_> = registry.base_chain(Leaf::type_hash()).collect();
        assert_eq!(chain, vec![Leaf::type_hash(), Node::type_hash()]);
        assert!(registry.is_subtype(Leaf::type_hash(), Node::type_hash()));
        assert!(!registry.is_subtype(Node::type_hash(), Leaf::type_hash()));
    }

    #[test]
    fn extend_requires_registered_type() {
        let mut registry = TypeRegistry::new();
        assert!(registry.extend_type::<Node>().is_err());
        registry.register_reference_type::<Node>().unwrap();
        assert!(registry.extend_type::<Node>().is_ok());
    }

    #[test]
    fn unknown_type_name_falls_back_to_hash() {
        let registry = TypeRegistry::new();
        let hash = TypeHash::from_name("Ghost");
        assert_eq!(registry.type_name(hash), format!("{hash}"));
    }
}
