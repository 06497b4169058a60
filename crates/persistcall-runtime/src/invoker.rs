//! Member resolution and the invoker cache.
//!
//! [`InvokerCache::resolve`] turns `(declaring type, name, kind, parameter
//! types)` into an [`Invoker`]: a compiled, type-erased thunk for one member.
//! Thunks are cached by member identity, so a member is compiled once no
//! matter how many listeners or objects reach it.
//!
//! Compilation depends on the [`ExecutionMode`]:
//!
//! - `Dynamic`: the thunk factory captured when the member was registered
//! - `Restricted`: only factories pre-registered in the
//!   [`InstantiationTable`]; anything else is a `MissingInstantiation`

use rustc_hash::FxHashMap;

use persistcall_core::{
    CallContext, Dynamic, MemberKind, NativeError, NativeFn, ObjectHandle, ObjectHeap, TypeHash,
};
use persistcall_registry::{InstantiationTable, MemberEntry, TypeRegistry};

use crate::ResolutionError;

/// Whether code can be generated on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Any instantiation can be built when first needed.
    #[default]
    Dynamic,
    /// Only pre-registered instantiations exist.
    Restricted,
}

/// A compiled, cached thunk for one resolved member.
#[derive(Debug, Clone)]
pub struct Invoker {
    member: TypeHash,
    name: String,
    is_static: bool,
    is_void: bool,
    thunk: NativeFn,
}

impl Invoker {
    /// Identity of the member this invoker calls.
    pub fn member(&self) -> TypeHash {
        self.member
    }

    /// Name of the member.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if the member is called without a target.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Check if the member returns nothing.
    pub fn is_void(&self) -> bool {
        self.is_void
    }

    /// Call the member. `Void` is returned for void members.
    pub fn invoke(
        &self,
        this: Option<ObjectHandle>,
        args: &[Dynamic],
        heap: &mut ObjectHeap,
    ) -> Result<Dynamic, NativeError> {
        let mut ctx = CallContext::new(this, args, heap);
        self.thunk.call(&mut ctx)?;
        Ok(ctx.take_return())
    }
}

/// Process-wide cache of compiled invokers, keyed by member identity.
#[derive(Debug, Default)]
pub struct InvokerCache {
    invokers: FxHashMap<TypeHash, Invoker>,
    compiled: usize,
}

impl InvokerCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a member and return its invoker, compiling it on first use.
    ///
    /// Parameter types must match the member exactly.
    #[cfg_attr(feature = "profiling", profiling::function)]
    #[allow(clippy::too_many_arguments)]
    pub fn resolve(
        &mut self,
        types: &TypeRegistry,
        instantiations: &InstantiationTable,
        mode: ExecutionMode,
        declaring_type: TypeHash,
        name: &str,
        kind: MemberKind,
        params: &[TypeHash],
    ) -> Result<Invoker, ResolutionError> {
        if types.get_type(declaring_type).is_none() {
            return Err(ResolutionError::TypeNotFound(types.type_name(declaring_type)));
        }
        let member = types
            .find_member(declaring_type, name, kind, params)
            .ok_or_else(|| ResolutionError::MemberNotFound {
                declaring_type: types.type_name(declaring_type),
                name: name.to_string(),
                kind,
                signature: signature_text(types, params),
            })?;

        if let Some(invoker) = self.invokers.get(&member.hash) {
            tracing::trace!(member = %member.name, "invoker cache hit");
            return Ok(invoker.clone());
        }

        let invoker = self.compile(types, instantiations, mode, member)?;
        self.invokers.insert(member.hash, invoker.clone());
        Ok(invoker)
    }

    fn compile(
        &mut self,
        types: &TypeRegistry,
        instantiations: &InstantiationTable,
        mode: ExecutionMode,
        member: &MemberEntry,
    ) -> Result<Invoker, ResolutionError> {
        let factory = match mode {
            ExecutionMode::Dynamic => member.factory(),
            ExecutionMode::Restricted => {
                let signature = member.signature();
                instantiations.factory(&signature).ok_or_else(|| {
                    ResolutionError::MissingInstantiation(format!(
                        "InvocationFactory<({}), {}>",
                        signature_text(types, &signature.params),
                        signature.is_void
                    ))
                })?
            }
        };

        let thunk = factory(member.hash, member.callable()).map_err(|source| {
            ResolutionError::Compile {
                member: member.name.clone(),
                source,
            }
        })?;
        self.compiled += 1;
        tracing::debug!(
            owner = %types.type_name(member.owner),
            member = %member.name,
            kind = %member.kind,
            ?mode,
            "compiled invoker"
        );

        Ok(Invoker {
            member: member.hash,
            name: member.name.clone(),
            is_static: member.is_static(),
            is_void: member.is_void(),
            thunk,
        })
    }

    /// Cached invoker for a member, if it was compiled.
    pub fn get(&self, member: TypeHash) -> Option<&Invoker> {
        self.invokers.get(&member)
    }

    /// Number of cached invokers.
    pub fn len(&self) -> usize {
        self.invokers.len()
    }

    /// Check if nothing was compiled yet.
    pub fn is_empty(&self) -> bool {
        self.invokers.is_empty()
    }

    /// Number of compilations performed.
    pub fn compile_count(&self) -> usize {
        self.compiled
    }
}

/// Render parameter types as `int, float`.
pub(crate) fn signature_text(types: &TypeRegistry, params: &[TypeHash]) -> String {
    params
        .iter()
        .map(|&ty| types.type_name(ty))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistcall_core::{HostType, primitives};

    #[derive(Default)]
    struct Tally {
        hits: i32,
    }

    persistcall_core::impl_reference_type!(Tally, "Tally", "crate::Tally");

    fn types() -> TypeRegistry {
        let mut types = TypeRegistry::with_primitives();
        types
            .register_reference_type::<Tally>()
            .unwrap()
            .method("Hit", |t: &mut Tally, (n,): (i32,)| t.hits += n)
            .unwrap()
            .static_method("Add", |(a, b): (i32, i32)| a + b)
            .unwrap();
        types
    }

    fn resolve(
        cache: &mut InvokerCache,
        types: &TypeRegistry,
        table: &InstantiationTable,
        mode: ExecutionMode,
        name: &str,
        params: &[TypeHash],
    ) -> Result<Invoker, ResolutionError> {
        cache.resolve(types, table, mode, Tally::type_hash(), name, MemberKind::Method, params)
    }

    #[test]
    fn same_member_is_compiled_once() {
        let types = types();
        let table = InstantiationTable::new();
        let mut cache = InvokerCache::new();
        let params = [primitives::INT32, primitives::INT32];

        let mode = ExecutionMode::Dynamic;
        let first = resolve(&mut cache, &types, &table, mode, "Add", &params).unwrap();
        let second = resolve(&mut cache, &types, &table, mode, "Add", &params).unwrap();
        assert_eq!(first.member(), second.member());
        assert_eq!(cache.compile_count(), 1);
        assert!(first.is_static());
        assert!(!first.is_void());

        let mut heap = ObjectHeap::new();
        let sum = first.invoke(None, &[Dynamic::Int(2), Dynamic::Int(3)], &mut heap);
        assert_eq!(sum, Ok(Dynamic::Int(5)));
    }

    #[test]
    fn resolution_requires_exact_parameters() {
        let types = types();
        let table = InstantiationTable::new();
        let mut cache = InvokerCache::new();

        let params = [primitives::INT64, primitives::INT32];
        let err = resolve(&mut cache, &types, &table, ExecutionMode::Dynamic, "Add", &params);
        assert_eq!(
            err.map(|i| i.member()),
            Err(ResolutionError::MemberNotFound {
                declaring_type: "Tally".into(),
                name: "Add".into(),
                kind: MemberKind::Method,
                signature: "int64, int".into(),
            })
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn unknown_declaring_type_is_reported() {
        let types = types();
        let table = InstantiationTable::new();
        let mut cache = InvokerCache::new();
        let err = cache.resolve(
            &types,
            &table,
            ExecutionMode::Dynamic,
            TypeHash::from_name("Ghost"),
            "Add",
            MemberKind::Method,
            &[],
        );
        assert!(matches!(err, Err(ResolutionError::TypeNotFound(_))));
    }

    #[test]
    fn restricted_mode_uses_only_the_table() {
        let types = types();
        let mut table = InstantiationTable::new();
        let mut cache = InvokerCache::new();
        let params = [primitives::INT32];

        let mode = ExecutionMode::Restricted;
        let missing = resolve(&mut cache, &types, &table, mode, "Hit", &params);
        assert!(matches!(missing, Err(ResolutionError::MissingInstantiation(_))));

        table.register_factory::<(i32,), true>();
        let invoker = resolve(&mut cache, &types, &table, mode, "Hit", &params).unwrap();

        let mut heap = ObjectHeap::new();
        let tally = heap.allocate(Tally::default());
        assert_eq!(invoker.invoke(Some(tally), &[Dynamic::Int(4)], &mut heap), Ok(Dynamic::Void));
        assert_eq!(heap.get::<Tally>(tally).map(|t| t.hits), Some(4));
    }
}
