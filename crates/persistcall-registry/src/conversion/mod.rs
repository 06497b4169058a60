//! Conversion registry.
//!
//! Answers "can a value of type X be used where type Y is required, and how".
//! Lookups consult, in order:
//!
//! 1. Built-ins: identity, primitive widening ([`primitive`]), reference upcast
//! 2. Adapters registered by the host or by a generated companion module
//! 3. Discovery: exactly one implicit conversion operator on the source type
//!    whose parameter is the source and whose return is the target
//!
//! Built-ins take precedence, so registering an adapter for a built-in pair
//! is rejected. Discovery results, including failures, are cached per pair.
//! Discovery is switched off on restricted targets, where only built-ins and
//! registered adapters exist.

pub mod primitive;

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use persistcall_core::{
    AdapterFn, ConversionAdapter, ConversionError, Dynamic, HostType, RegistrationError, TypeHash,
};

use crate::TypeRegistry;

pub use primitive::is_primitive_widening;

/// How a conversion is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    /// Same type, nothing to do.
    Identity,
    /// Built-in numeric widening.
    Primitive,
    /// Derived reference type to one of its bases.
    Upcast,
    /// Registered adapter.
    Adapter,
    /// Discovered implicit conversion operator.
    Operator {
        /// The operator member.
        member: TypeHash,
    },
}

/// One resolved conversion for a (from, to) pair.
#[derive(Clone)]
pub struct ConversionEntry {
    /// Source type.
    pub from: TypeHash,
    /// Target type.
    pub to: TypeHash,
    /// How the value is converted.
    pub kind: ConversionKind,
    adapter: Option<AdapterFn>,
}

impl ConversionEntry {
    fn builtin(from: TypeHash, to: TypeHash, kind: ConversionKind) -> Self {
        Self {
            from,
            to,
            kind,
            adapter: None,
        }
    }

    /// Check if this entry comes from the built-in rules.
    pub fn is_builtin(&self) -> bool {
        matches!(
            self.kind,
            ConversionKind::Identity | ConversionKind::Primitive | ConversionKind::Upcast
        )
    }

    /// Convert a slot holding a `from` value into a `to` value.
    pub fn apply(&self, value: &Dynamic) -> Result<Dynamic, ConversionError> {
        match self.kind {
            ConversionKind::Identity | ConversionKind::Upcast => Ok(value.clone()),
            ConversionKind::Primitive => primitive::widen(self.from, self.to, value),
            ConversionKind::Adapter | ConversionKind::Operator { .. } => match &self.adapter {
                Some(adapter) => adapter(value),
                None => Err(ConversionError::Unconvertible {
                    from: self.from,
                    to: self.to,
                }),
            },
        }
    }
}

impl PartialEq for ConversionEntry {
    fn eq(&self, other: &Self) -> bool {
        let same_adapter = match (&self.adapter, &other.adapter) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        self.from == other.from && self.to == other.to && self.kind == other.kind && same_adapter
    }
}

impl fmt::Debug for ConversionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionEntry")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Where a pair stands, without caching or registering anything.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionStatus {
    /// Covered by a built-in rule.
    Builtin(ConversionEntry),
    /// Covered by a registered adapter.
    Registered(ConversionEntry),
    /// Not registered, but exactly one operator can serve it.
    Discoverable {
        /// The conversion the operator provides.
        entry: ConversionEntry,
        /// Name of the operator on the source type.
        operator: String,
    },
    /// More than one operator matches; treated as unconvertible.
    Ambiguous {
        /// Number of matching operators.
        candidates: usize,
    },
    /// No conversion exists.
    Missing,
}

#[derive(Clone)]
enum Discovery {
    Found(ConversionEntry, String),
    NotFound,
    Ambiguous(usize),
}

/// Process-wide conversion table.
///
/// Append-only after setup. Like the type registry it is not thread-safe.
pub struct ConversionRegistry {
    registered: FxHashMap<(TypeHash, TypeHash), ConversionEntry>,
    discovered: FxHashMap<(TypeHash, TypeHash), Discovery>,
    discovery_enabled: bool,
}

impl Default for ConversionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionRegistry {
    /// Create a registry with operator discovery enabled.
    pub fn new() -> Self {
        Self {
            registered: FxHashMap::default(),
            discovered: FxHashMap::default(),
            discovery_enabled: true,
        }
    }

    /// Create a registry for a restricted target: built-ins and registered
    /// adapters only.
    pub fn restricted() -> Self {
        Self {
            discovery_enabled: false,
            ..Self::new()
        }
    }

    /// Check if operator discovery runs on lookup.
    pub fn discovery_enabled(&self) -> bool {
        self.discovery_enabled
    }

    /// Built-in conversion for the pair, if any.
    pub fn builtin(types: &TypeRegistry, from: TypeHash, to: TypeHash) -> Option<ConversionEntry> {
        if from == to {
            return Some(ConversionEntry::builtin(from, to, ConversionKind::Identity));
        }
        if is_primitive_widening(from, to) {
            return Some(ConversionEntry::builtin(from, to, ConversionKind::Primitive));
        }
        let is_reference = |ty| types.get_type(ty).is_some_and(|e| e.kind.is_reference());
        if is_reference(from) && is_reference(to) && types.is_subtype(from, to) {
            return Some(ConversionEntry::builtin(from, to, ConversionKind::Upcast));
        }
        None
    }

    /// Find the conversion for `from -> to`.
    ///
    /// The first lookup of an undiscovered pair searches the source type's
    /// operators; every later lookup of that pair is a cache hit.
    pub fn lookup(
        &mut self,
        types: &TypeRegistry,
        from: TypeHash,
        to: TypeHash,
    ) -> Option<ConversionEntry> {
        if let Some(entry) = Self::builtin(types, from, to) {
            return Some(entry);
        }
        if let Some(entry) = self.registered.get(&(from, to)) {
            return Some(entry.clone());
        }
        if !self.discovery_enabled {
            return None;
        }

        let discovery = match self.discovered.get(&(from, to)) {
            Some(cached) => cached.clone(),
            None => {
                let discovery = discover(types, from, to);
                match &discovery {
                    Discovery::Found(_, operator) => tracing::debug!(
                        from = %types.type_name(from),
                        to = %types.type_name(to),
                        operator = %operator,
                        "discovered conversion operator"
                    ),
                    Discovery::Ambiguous(candidates) => tracing::warn!(
                        from = %types.type_name(from),
                        to = %types.type_name(to),
                        candidates,
                        "ambiguous conversion operators, treating pair as unconvertible"
                    ),
                    Discovery::NotFound => {}
                }
                self.discovered.insert((from, to), discovery.clone());
                discovery
            }
        };

        match discovery {
            Discovery::Found(entry, _) => Some(entry),
            Discovery::NotFound | Discovery::Ambiguous(_) => None,
        }
    }

    /// Classify a pair without touching any cache.
    ///
    /// Discovery is always searched here, whatever the mode, so a build-time
    /// planner can see which operators a restricted target will need.
    pub fn classify(&self, types: &TypeRegistry, from: TypeHash, to: TypeHash) -> ConversionStatus {
        if let Some(entry) = Self::builtin(types, from, to) {
            return ConversionStatus::Builtin(entry);
        }
        if let Some(entry) = self.registered.get(&(from, to)) {
            return ConversionStatus::Registered(entry.clone());
        }
        match discover(types, from, to) {
            Discovery::Found(entry, operator) => ConversionStatus::Discoverable { entry, operator },
            Discovery::Ambiguous(candidates) => ConversionStatus::Ambiguous { candidates },
            Discovery::NotFound => ConversionStatus::Missing,
        }
    }

    /// Register an adapter for `from -> to`.
    ///
    /// Fails with `DuplicateConversion` when a built-in or another adapter
    /// already covers the pair.
    pub fn register(
        &mut self,
        types: &TypeRegistry,
        from: TypeHash,
        to: TypeHash,
        adapter: AdapterFn,
    ) -> Result<(), RegistrationError> {
        let existing = if Self::builtin(types, from, to).is_some() {
            Some("built in")
        } else if self.registered.contains_key(&(from, to)) {
            Some("registered")
        } else {
            None
        };
        if let Some(existing) = existing {
            return Err(RegistrationError::DuplicateConversion {
                from: types.type_name(from),
                to: types.type_name(to),
                existing,
            });
        }

        tracing::debug!(
            from = %types.type_name(from),
            to = %types.type_name(to),
            "registered conversion adapter"
        );
        self.discovered.remove(&(from, to));
        self.registered.insert(
            (from, to),
            ConversionEntry {
                from,
                to,
                kind: ConversionKind::Adapter,
                adapter: Some(adapter),
            },
        );
        Ok(())
    }

    /// Register a concrete adapter type.
    pub fn register_adapter<A: ConversionAdapter>(
        &mut self,
        types: &TypeRegistry,
    ) -> Result<(), RegistrationError> {
        self.register(
            types,
            <A::Source as HostType>::type_hash(),
            <A::Target as HostType>::type_hash(),
            A::adapter_fn(),
        )
    }

    /// Check if an adapter is registered for the pair.
    pub fn is_registered(&self, from: TypeHash, to: TypeHash) -> bool {
        self.registered.contains_key(&(from, to))
    }

    /// Number of registered adapters.
    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }
}

impl fmt::Debug for ConversionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRegistry")
            .field("registered", &self.registered.len())
            .field("discovered", &self.discovered.len())
            .field("discovery_enabled", &self.discovery_enabled)
            .finish()
    }
}

/// Search `from`'s implicit operators for exactly one returning `to`.
fn discover(types: &TypeRegistry, from: TypeHash, to: TypeHash) -> Discovery {
    let mut candidates = types
        .conversion_operators(from)
        .filter(|op| op.params.as_slice() == [from] && op.return_type == to);

    let Some(first) = candidates.next() else {
        return Discovery::NotFound;
    };
    let extra = candidates.count();
    if extra > 0 {
        return Discovery::Ambiguous(extra + 1);
    }
    match first.converter() {
        Some(adapter) => Discovery::Found(
            ConversionEntry {
                from,
                to,
                kind: ConversionKind::Operator { member: first.hash },
                adapter: Some(Arc::clone(adapter)),
            },
            first.name.clone(),
        ),
        None => Discovery::NotFound,
    }
}
