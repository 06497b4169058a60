//! Pre-registered generic instantiations for restricted targets.
//!
//! A restricted target cannot build a holder or a thunk factory it has never
//! seen compiled. The generated companion module fills this table with every
//! instantiation the scanned project needs, and the runtime consults nothing
//! else in restricted mode.

use rustc_hash::FxHashMap;

use persistcall_core::{
    ArgList, ArgType, ArgumentHolder, HolderFactory, HostType, InvocationFactory, SignatureKey,
    ThunkFactory, TypeHash,
};

/// Holder and thunk-factory instantiations keyed by held type and signature.
#[derive(Default)]
pub struct InstantiationTable {
    holders: FxHashMap<TypeHash, HolderFactory>,
    factories: FxHashMap<SignatureKey, ThunkFactory>,
}

impl InstantiationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `ArgumentHolder<T>`. Re-registering is a no-op.
    pub fn register_holder<T: ArgType>(&mut self) {
        self.holders
            .entry(<T as HostType>::type_hash())
            .or_insert(ArgumentHolder::<T>::hold);
    }

    /// Register `InvocationFactory<A, VOID>`. Re-registering is a no-op.
    pub fn register_factory<A: ArgList, const VOID: bool>(&mut self) {
        self.factories
            .entry(InvocationFactory::<A, VOID>::key())
            .or_insert(InvocationFactory::<A, VOID>::build);
    }

    /// Holder factory for a declared type.
    pub fn holder(&self, ty: TypeHash) -> Option<HolderFactory> {
        self.holders.get(&ty).copied()
    }

    /// Thunk factory for a signature.
    pub fn factory(&self, key: &SignatureKey) -> Option<ThunkFactory> {
        self.factories.get(key).copied()
    }

    /// Number of registered holders.
    pub fn holder_count(&self) -> usize {
        self.holders.len()
    }

    /// Number of registered factories.
    pub fn factory_count(&self) -> usize {
        self.factories.len()
    }
}

impl std::fmt::Debug for InstantiationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstantiationTable")
            .field("holders", &self.holders.len())
            .field("factories", &self.factories.len())
            .finish()
    }
}
