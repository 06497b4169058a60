//! Typed member registration.
//!
//! [`TypeBuilder`] turns ordinary Rust closures into registry entries. Each
//! registration erases the receiver type, keeps the argument tuple typed, and
//! captures the [`InvocationFactory`] instantiation that can later compile a
//! thunk for the member.
//!
//! ```
//! use persistcall_core::impl_reference_type;
//! use persistcall_registry::TypeRegistry;
//!
//! #[derive(Default)]
//! pub struct Light { pub intensity: f32 }
//! impl_reference_type!(Light, "Light", "crate::Light");
//!
//! let mut registry = TypeRegistry::with_primitives();
//! registry
//!     .register_reference_type::<Light>()?
//!     .field("intensity", |light: &mut Light, value: f32| light.intensity = value)?
//!     .method("Dim", |light: &mut Light, (by,): (f32,)| light.intensity -= by)?;
//! # Ok::<(), persistcall_core::RegistrationError>(())
//! ```

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use persistcall_core::{
    AdapterFn, ArgList, ArgType, Dynamic, ErasedCall, HostType, InvocationFactory, MemberCallable,
    MemberFlags, MemberKind, NativeError, RegistrationError, ReturnValue, ThunkFactory, TypeHash,
    primitives,
};

use crate::TypeRegistry;
use crate::entries::MemberEntry;

/// Adds members to one registered type `T`.
pub struct TypeBuilder<'a, T> {
    registry: &'a mut TypeRegistry,
    owner: TypeHash,
    marker: PhantomData<fn() -> T>,
}

impl<'a, T: HostType> TypeBuilder<'a, T> {
    pub(crate) fn new(registry: &'a mut TypeRegistry) -> Self {
        Self {
            registry,
            owner: T::type_hash(),
            marker: PhantomData,
        }
    }

    /// Identity of the type being built.
    pub fn type_hash(&self) -> TypeHash {
        self.owner
    }

    /// Declare `B` as the base type. `B` must already be registered.
    pub fn extends<B: HostType>(&mut self) -> Result<&mut Self, RegistrationError> {
        self.registry.set_base(self.owner, B::type_hash())?;
        Ok(self)
    }

    /// Register an instance method.
    pub fn method<A, R, F>(&mut self, name: &str, body: F) -> Result<&mut Self, RegistrationError>
    where
        A: ArgList,
        R: ReturnValue,
        F: Fn(&mut T, A) -> R + Send + Sync + 'static,
    {
        let callable = erase::<A, _>(move |this, args| {
            let target = receiver::<T>(this)?;
            Ok(body(target, args).into_return())
        });
        self.add(
            name,
            MemberKind::Method,
            MemberFlags::empty(),
            A::param_types(),
            R::return_type(),
            callable,
            factory_for::<A>(R::IS_VOID),
            None,
        )
    }

    /// Register a static method.
    pub fn static_method<A, R, F>(
        &mut self,
        name: &str,
        body: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        A: ArgList,
        R: ReturnValue,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        let callable = erase::<A, _>(move |_, args| Ok(body(args).into_return()));
        self.add(
            name,
            MemberKind::Method,
            MemberFlags::STATIC,
            A::param_types(),
            R::return_type(),
            callable,
            factory_for::<A>(R::IS_VOID),
            None,
        )
    }

    /// Register a field by its assignment.
    pub fn field<V, F>(&mut self, name: &str, set: F) -> Result<&mut Self, RegistrationError>
    where
        V: ArgType,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.setter(name, MemberKind::Field, set)
    }

    /// Register a property by its setter.
    pub fn property<V, F>(&mut self, name: &str, set: F) -> Result<&mut Self, RegistrationError>
    where
        V: ArgType,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.setter(name, MemberKind::Property, set)
    }

    /// Register a static property by its setter.
    pub fn static_property<V, F>(
        &mut self,
        name: &str,
        set: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        V: ArgType,
        F: Fn(V) + Send + Sync + 'static,
    {
        let callable = erase::<(V,), _>(move |_, (value,)| {
            set(value);
            Ok(Dynamic::Void)
        });
        self.add(
            name,
            MemberKind::Property,
            MemberFlags::STATIC,
            vec![V::type_hash()],
            primitives::VOID,
            callable,
            InvocationFactory::<(V,), true>::build,
            None,
        )
    }

    fn setter<V, F>(
        &mut self,
        name: &str,
        kind: MemberKind,
        set: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        V: ArgType,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let callable = erase::<(V,), _>(move |this, (value,)| {
            set(receiver::<T>(this)?, value);
            Ok(Dynamic::Void)
        });
        self.add(
            name,
            kind,
            MemberFlags::empty(),
            vec![V::type_hash()],
            primitives::VOID,
            callable,
            InvocationFactory::<(V,), true>::build,
            None,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn add(
        &mut self,
        name: &str,
        kind: MemberKind,
        flags: MemberFlags,
        params: Vec<TypeHash>,
        return_type: TypeHash,
        callable: MemberCallable,
        factory: ThunkFactory,
        converter: Option<AdapterFn>,
    ) -> Result<&mut Self, RegistrationError> {
        let member = MemberEntry {
            hash: TypeHash::from_member(self.owner, name, kind, &params),
            owner: self.owner,
            name: name.to_string(),
            kind,
            flags,
            params,
            return_type,
            callable,
            factory,
            converter,
        };
        self.registry.insert_member(member)?;
        Ok(self)
    }
}

impl<T: ArgType> TypeBuilder<'_, T> {
    /// Register an implicit conversion operator from `T` to `U`.
    ///
    /// `name` must be the associated function's name on `T`; generated
    /// adapters call it as `T::name(value)`.
    pub fn implicit_operator<U: ArgType>(
        &mut self,
        name: &str,
        convert: fn(T) -> U,
    ) -> Result<&mut Self, RegistrationError> {
        let callable = erase::<(T,), _>(move |_, (value,)| Ok(convert(value).into_dynamic()));
        let converter: AdapterFn = Arc::new(move |slot: &Dynamic| {
            Ok(convert(T::from_dynamic(slot)?).into_dynamic())
        });
        self.add(
            name,
            MemberKind::Method,
            MemberFlags::STATIC | MemberFlags::IMPLICIT_CONVERSION,
            vec![T::type_hash()],
            U::type_hash(),
            callable,
            InvocationFactory::<(T,), false>::build,
            Some(converter),
        )
    }
}

fn erase<A, F>(call: F) -> MemberCallable
where
    A: ArgList,
    F: Fn(Option<&mut dyn Any>, A) -> Result<Dynamic, NativeError> + Send + Sync + 'static,
{
    let call: ErasedCall<A> = Arc::new(call);
    Arc::new(call)
}

fn factory_for<A: ArgList>(is_void: bool) -> ThunkFactory {
    if is_void {
        InvocationFactory::<A, true>::build
    } else {
        InvocationFactory::<A, false>::build
    }
}

fn receiver<T: HostType>(this: Option<&mut dyn Any>) -> Result<&mut T, NativeError> {
    let this = this.ok_or(NativeError::MissingReceiver)?;
    this.downcast_mut::<T>()
        .ok_or_else(|| NativeError::invalid_this(format!("target is not a {}", T::NAME)))
}
