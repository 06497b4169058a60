//! Listener invocation.
//!
//! [`ListenerRuntime`] owns everything invocation needs: the type and
//! conversion registries, the invoker cache, the instantiation table of a
//! restricted target, the serialization service and the warning sink.
//!
//! # Invocation
//!
//! ```text
//! check dynamic bindings ──fail──▶ warn, no call, no resolution
//!        │
//! effective declaring type ──missing target──▶ warn
//!        │
//! resolve (lazy, once per generation / declaring type)
//!        │   field ⇄ property fallback rewrites member_kind
//! decode fixed arguments (once per resolution)
//!        │
//! convert dynamic arguments in declaration order
//!        │
//! call
//! ```
//!
//! Every failure is recovered: `invoke` reports exactly one warning and
//! returns `None`.

use persistcall_core::{Dynamic, ObjectHeap, RegistrationError, TypeHash};
use persistcall_registry::{
    ConversionEntry, ConversionRegistry, ConversionStatus, InstantiationTable, TypeRegistry,
};

use crate::invoker::signature_text;
use crate::listener::Resolution;
use crate::{
    BincodeSerializer, Binding, ExecutionMode, InvokeError, Invoker, InvokerCache, Listener,
    ListenerPhase, ListenerTarget, PersistentEvent, ResolutionError, SerializationService,
    TracingWarnings, WarningSink,
};

/// Owns the registries and caches listener invocation runs against.
pub struct ListenerRuntime {
    types: TypeRegistry,
    conversions: ConversionRegistry,
    instantiations: InstantiationTable,
    cache: InvokerCache,
    mode: ExecutionMode,
    serializer: Box<dyn SerializationService>,
    warnings: Box<dyn WarningSink>,
    generation: u64,
}

impl ListenerRuntime {
    /// Create a runtime over `types`.
    ///
    /// Restricted runtimes start with operator discovery disabled and an
    /// empty instantiation table.
    pub fn new(types: TypeRegistry, mode: ExecutionMode) -> Self {
        let conversions = match mode {
            ExecutionMode::Dynamic => ConversionRegistry::new(),
            ExecutionMode::Restricted => ConversionRegistry::restricted(),
        };
        Self {
            types,
            conversions,
            instantiations: InstantiationTable::new(),
            cache: InvokerCache::new(),
            mode,
            serializer: Box::new(BincodeSerializer),
            warnings: Box::new(TracingWarnings),
            generation: 0,
        }
    }

    /// Replace the serialization service.
    pub fn with_serializer(mut self, serializer: impl SerializationService + 'static) -> Self {
        self.serializer = Box::new(serializer);
        self
    }

    /// Replace the warning sink.
    pub fn with_warnings(mut self, warnings: impl WarningSink + 'static) -> Self {
        self.warnings = Box::new(warnings);
        self
    }

    /// Run a companion module's registration routine against this runtime.
    pub fn install<F>(&mut self, register: F) -> Result<(), RegistrationError>
    where
        F: FnOnce(
            &TypeRegistry,
            &mut ConversionRegistry,
            &mut InstantiationTable,
        ) -> Result<(), RegistrationError>,
    {
        register(&self.types, &mut self.conversions, &mut self.instantiations)
    }

    /// The type registry.
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// The conversion registry.
    pub fn conversions(&self) -> &ConversionRegistry {
        &self.conversions
    }

    /// The conversion registry, for registering adapters.
    pub fn conversions_mut(&mut self) -> &mut ConversionRegistry {
        &mut self.conversions
    }

    /// The instantiation table.
    pub fn instantiations(&self) -> &InstantiationTable {
        &self.instantiations
    }

    /// The invoker cache.
    pub fn cache(&self) -> &InvokerCache {
        &self.cache
    }

    /// The serialization service.
    pub fn serializer(&self) -> &dyn SerializationService {
        self.serializer.as_ref()
    }

    /// The execution mode.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// The current generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// End the current generation. Every listener resolves again on its next
    /// invocation; compiled invokers stay cached.
    pub fn begin_generation(&mut self) {
        self.generation += 1;
        tracing::debug!(generation = self.generation, "began listener generation");
    }

    /// Invoke every listener of `event` in declaration order.
    pub fn invoke_event(
        &mut self,
        event: &mut PersistentEvent,
        heap: &mut ObjectHeap,
        params: &[Dynamic],
    ) {
        for listener in &mut event.listeners {
            self.invoke(listener, heap, &event.signature, params);
        }
    }

    /// Invoke one listener.
    ///
    /// Returns the member's result, `Void` for void members, or `None` when
    /// the call did not happen. Failures are reported to the warning sink
    /// exactly once and never propagate.
    pub fn invoke(
        &mut self,
        listener: &mut Listener,
        heap: &mut ObjectHeap,
        signature: &[TypeHash],
        params: &[Dynamic],
    ) -> Option<Dynamic> {
        match self.try_invoke(listener, heap, signature, params) {
            Ok(result) => Some(result),
            Err(err) => {
                let message = format!(
                    "listener {}.{} ({}): {err}",
                    self.types.type_name(listener.declaring_type),
                    listener.member_name,
                    listener.member_kind
                );
                self.warnings.warn(&message);
                None
            }
        }
    }

    /// Invoke one listener, returning the failure instead of reporting it.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn try_invoke(
        &mut self,
        listener: &mut Listener,
        heap: &mut ObjectHeap,
        signature: &[TypeHash],
        params: &[Dynamic],
    ) -> Result<Dynamic, InvokeError> {
        let conversions = self.check_bindings(listener, signature, params)?;

        let (this, declaring_type) = match listener.target {
            ListenerTarget::Static => (None, listener.declaring_type),
            ListenerTarget::Object(handle) => {
                let ty = heap.type_of(handle).ok_or(InvokeError::TargetMissing)?;
                (Some(handle), ty)
            }
        };

        let stale = match &listener.resolution {
            Some(resolution) => {
                resolution.generation != self.generation
                    || resolution.declaring_type != declaring_type
            }
            None => true,
        };
        if stale {
            listener.invalidate();
            let resolution = self.resolve(listener, declaring_type)?;
            listener.resolution = Some(resolution);
            listener.phase = ListenerPhase::Resolved;
        }
        let Some(resolution) = listener.resolution.as_ref() else {
            return Err(InvokeError::TargetMissing);
        };

        let mut args = Vec::with_capacity(listener.arguments.len());
        for (position, argument) in listener.arguments.iter().enumerate() {
            let held = resolution.fixed.get(position).and_then(Option::as_ref);
            let value = match (&argument.binding, held) {
                (Binding::Fixed { .. }, Some(held)) => held.value(),
                (Binding::Dynamic { index }, _) => {
                    let slot = &params[*index];
                    match &conversions[position] {
                        Some(conversion) => conversion.apply(slot).map_err(|source| {
                            InvokeError::Conversion {
                                argument: position,
                                source,
                            }
                        })?,
                        None => slot.clone(),
                    }
                }
                (Binding::Fixed { .. }, None) => {
                    return Err(InvokeError::Resolution(ResolutionError::MissingInstantiation(
                        format!("decoded value for argument {position}"),
                    )));
                }
            };
            args.push(value);
        }

        let result = resolution.invoker.invoke(this, &args, heap)?;
        listener.phase = ListenerPhase::Invoked;
        Ok(result)
    }

    /// Check every dynamic binding against the caller's signature.
    ///
    /// Runs before resolution so a listener whose event signature changed
    /// fails without a wasted resolve. Returns the conversion needed at each
    /// dynamic position.
    fn check_bindings(
        &mut self,
        listener: &Listener,
        signature: &[TypeHash],
        params: &[Dynamic],
    ) -> Result<Vec<Option<ConversionEntry>>, InvokeError> {
        let available = signature.len().min(params.len());
        let mut conversions = Vec::with_capacity(listener.arguments.len());

        for (position, argument) in listener.arguments.iter().enumerate() {
            let Binding::Dynamic { index } = argument.binding else {
                conversions.push(None);
                continue;
            };
            if index >= available {
                return Err(InvokeError::ArgumentBindingOutOfRange {
                    argument: position,
                    index,
                    available,
                });
            }
            let actual = signature[index];
            let declared = argument.declared_type;
            let Some(conversion) = self.conversions.lookup(&self.types, actual, declared) else {
                return Err(self.unconvertible(position, index, actual, declared));
            };
            conversions.push((actual != declared).then_some(conversion));
        }
        Ok(conversions)
    }

    /// The error for a dynamic binding no conversion covers.
    fn unconvertible(
        &self,
        argument: usize,
        index: usize,
        actual: TypeHash,
        declared: TypeHash,
    ) -> InvokeError {
        let from = self.types.type_name(actual);
        let to = self.types.type_name(declared);
        if self.conversions.discovery_enabled() {
            let status = self.conversions.classify(&self.types, actual, declared);
            if let ConversionStatus::Ambiguous { candidates } = status {
                return InvokeError::AmbiguousConversion {
                    argument,
                    index,
                    from,
                    to,
                    candidates,
                };
            }
        }
        InvokeError::ArgumentTypeMismatch {
            argument,
            index,
            declared: to,
            actual: from,
        }
    }

    /// Resolve the listener's member and decode its fixed arguments.
    fn resolve(
        &mut self,
        listener: &mut Listener,
        declaring_type: TypeHash,
    ) -> Result<Resolution, InvokeError> {
        let params = listener.param_types();
        let name = &listener.member_name;
        let kind = listener.member_kind;
        let invoker = match self.resolve_member(declaring_type, name, kind, &params) {
            Ok(invoker) => invoker,
            Err(err @ ResolutionError::MemberNotFound { .. }) => {
                // A field that became a property (or the reverse) under the same name
                let Some(fallback) = kind.settable_fallback() else {
                    return Err(err.into());
                };
                let invoker = self
                    .resolve_member(declaring_type, name, fallback, &params)
                    .map_err(|_| err)?;
                tracing::debug!(
                    member = %listener.member_name,
                    from = %listener.member_kind,
                    to = %fallback,
                    "listener member changed kind"
                );
                listener.member_kind = fallback;
                invoker
            }
            Err(err) => return Err(err.into()),
        };

        let member = || invoker.name().to_string();
        match (invoker.is_static(), listener.is_static()) {
            (true, false) => return Err(ResolutionError::StaticMemberWithTarget(member()).into()),
            (false, true) => {
                return Err(ResolutionError::InstanceMemberWithoutTarget(member()).into());
            }
            _ => {}
        }

        let fixed = self.decode_fixed(listener)?;
        tracing::debug!(
            declaring_type = %self.types.type_name(declaring_type),
            member = %listener.member_name,
            signature = %signature_text(&self.types, &params),
            generation = self.generation,
            "resolved listener"
        );

        Ok(Resolution {
            invoker,
            generation: self.generation,
            declaring_type,
            fixed,
        })
    }

    fn resolve_member(
        &mut self,
        declaring_type: TypeHash,
        name: &str,
        kind: persistcall_core::MemberKind,
        params: &[TypeHash],
    ) -> Result<Invoker, ResolutionError> {
        self.cache.resolve(
            &self.types,
            &self.instantiations,
            self.mode,
            declaring_type,
            name,
            kind,
            params,
        )
    }

    fn decode_fixed(
        &self,
        listener: &Listener,
    ) -> Result<Vec<Option<Box<dyn persistcall_core::HeldArgument>>>, InvokeError> {
        listener
            .arguments
            .iter()
            .enumerate()
            .map(|(position, argument)| {
                let Binding::Fixed { payload } = &argument.binding else {
                    return Ok(None);
                };
                let ty = argument.declared_type;
                let holder = match self.mode {
                    ExecutionMode::Dynamic => {
                        self.types.get_type(ty).and_then(|entry| entry.holder)
                    }
                    ExecutionMode::Restricted => self.instantiations.holder(ty),
                }
                .ok_or_else(|| {
                    ResolutionError::MissingInstantiation(format!(
                        "ArgumentHolder<{}>",
                        self.types.type_name(ty)
                    ))
                })?;

                let value = self
                    .serializer
                    .decode(payload, ty)
                    .map_err(|source| InvokeError::FixedArgument {
                        argument: position,
                        source,
                    })?;
                let held = holder(&value).map_err(|source| InvokeError::Conversion {
                    argument: position,
                    source,
                })?;
                Ok(Some(held))
            })
            .collect()
    }
}

impl std::fmt::Debug for ListenerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRuntime")
            .field("mode", &self.mode)
            .field("generation", &self.generation)
            .field("types", &self.types)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
