//! Generic code paths that must exist as compiled instantiations.
//!
//! Three generics carry every invocation:
//!
//! - [`ArgumentHolder<T>`]: owns a decoded fixed argument of type `T`
//! - [`InvocationFactory<A, VOID>`]: turns a member's erased callable into a
//!   [`NativeFn`] thunk that unpacks the untyped argument vector into the typed
//!   tuple `A`
//! - [`ConversionAdapter`]: a concrete `Source -> Target` conversion
//!
//! On hosts that can build any instantiation on demand these are reached
//! through the factories captured at registration. On restricted targets only
//! the instantiations named in generated code exist, and they are looked up
//! through an instantiation table keyed by [`SignatureKey`] and held type.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::{
    ArgType, CallContext, ConversionError, Dynamic, FromDynamic, IntoDynamic, NativeError,
    NativeFn, TypeHash,
};

/// The erased form of a registered member body.
///
/// The receiver has already been type-erased; the arguments are still typed.
pub type ErasedCall<A> =
    Arc<dyn Fn(Option<&mut dyn Any>, A) -> Result<Dynamic, NativeError> + Send + Sync>;

/// A member body stored without its argument type. Holds an `ErasedCall<A>`.
pub type MemberCallable = Arc<dyn Any + Send + Sync>;

/// Builds a thunk for one member from its stored callable.
pub type ThunkFactory = fn(TypeHash, &MemberCallable) -> Result<NativeFn, NativeError>;

/// Decodes a fixed argument into a typed holder.
pub type HolderFactory = fn(&Dynamic) -> Result<Box<dyn HeldArgument>, ConversionError>;

/// A conversion from one dynamic value to another.
pub type AdapterFn = Arc<dyn Fn(&Dynamic) -> Result<Dynamic, ConversionError> + Send + Sync>;

/// Identity of an invocation-factory instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureKey {
    /// Whether the member returns nothing.
    pub is_void: bool,
    /// Ordered parameter types.
    pub params: Vec<TypeHash>,
}

impl SignatureKey {
    /// Create a signature key.
    pub fn new(is_void: bool, params: Vec<TypeHash>) -> Self {
        Self { is_void, params }
    }

    /// Stable hash of this signature.
    pub fn hash(&self) -> TypeHash {
        TypeHash::from_signature(self.is_void, &self.params)
    }
}

/// An ordered, typed argument list that can be unpacked from dynamic slots.
///
/// Implemented for tuples of up to six [`ArgType`]s.
pub trait ArgList: Sized + 'static {
    /// Number of parameters.
    const ARITY: usize;

    /// Ordered parameter type identities.
    fn param_types() -> Vec<TypeHash>;

    /// Unpack slots into typed locals.
    fn unpack(args: &[Dynamic]) -> Result<Self, NativeError>;
}

fn unpack_slot<T: FromDynamic>(args: &[Dynamic], index: usize) -> Result<T, NativeError> {
    T::from_dynamic(&args[index]).map_err(|source| NativeError::Argument { index, source })
}

macro_rules! impl_arg_list {
    ($arity:expr; $($name:ident : $index:tt),*) => {
        impl<$($name: ArgType),*> ArgList for ($($name,)*) {
            const ARITY: usize = $arity;

            fn param_types() -> Vec<TypeHash> {
                vec![$($name::type_hash()),*]
            }

            #[allow(unused_variables)]
            fn unpack(args: &[Dynamic]) -> Result<Self, NativeError> {
                if args.len() != Self::ARITY {
                    return Err(NativeError::ArgumentCount {
                        expected: Self::ARITY,
                        actual: args.len(),
                    });
                }
                Ok(($(unpack_slot::<$name>(args, $index)?,)*))
            }
        }
    };
}

impl_arg_list!(0;);
impl_arg_list!(1; A: 0);
impl_arg_list!(2; A: 0, B: 1);
impl_arg_list!(3; A: 0, B: 1, C: 2);
impl_arg_list!(4; A: 0, B: 1, C: 2, D: 3);
impl_arg_list!(5; A: 0, B: 1, C: 2, D: 3, E: 4);
impl_arg_list!(6; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

/// Generic invocation-thunk factory for the signature `(VOID, A)`.
///
/// `build` is the instantiation generated code references; one exists per
/// distinct `(is_void, parameter types)` combination a project needs.
pub struct InvocationFactory<A, const VOID: bool>(PhantomData<fn() -> A>);

impl<A: ArgList, const VOID: bool> InvocationFactory<A, VOID> {
    /// The signature this instantiation serves.
    pub fn key() -> SignatureKey {
        SignatureKey::new(VOID, A::param_types())
    }

    /// Compile a thunk for `member` from its stored callable.
    ///
    /// Fails with `SignatureMismatch` when the callable was registered with a
    /// different argument tuple.
    pub fn build(member: TypeHash, callable: &MemberCallable) -> Result<NativeFn, NativeError> {
        let call = callable
            .downcast_ref::<ErasedCall<A>>()
            .cloned()
            .ok_or_else(|| NativeError::SignatureMismatch {
                signature: Self::key().hash(),
            })?;

        Ok(NativeFn::new(member, move |ctx: &mut CallContext<'_>| {
            let args = A::unpack(ctx.args())?;
            let this = ctx.this_any_mut()?;
            let result = call(this, args)?;
            if !VOID {
                ctx.set_return_slot(result);
            }
            Ok(())
        }))
    }
}

/// A decoded fixed argument with its value type erased.
pub trait HeldArgument: Send + Sync {
    /// A fresh slot holding the argument.
    fn value(&self) -> Dynamic;

    /// Identity of the held type.
    fn value_type(&self) -> TypeHash;
}

/// Generic holder for a fixed argument of type `T`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentHolder<T> {
    value: T,
}

impl<T: ArgType> ArgumentHolder<T> {
    /// Hold an already typed value.
    pub fn new(value: T) -> Self {
        Self { value }
    }

    /// Decode a slot into a boxed holder. This is the [`HolderFactory`] for `T`.
    pub fn hold(slot: &Dynamic) -> Result<Box<dyn HeldArgument>, ConversionError> {
        Ok(Box::new(Self::new(T::from_dynamic(slot)?)))
    }

    /// Borrow the held value.
    pub fn get(&self) -> &T {
        &self.value
    }
}

impl<T: ArgType> HeldArgument for ArgumentHolder<T> {
    fn value(&self) -> Dynamic {
        self.value.clone().into_dynamic()
    }

    fn value_type(&self) -> TypeHash {
        T::type_hash()
    }
}

/// A concrete conversion between two host types.
///
/// Generated companion modules emit one implementor per planned pair.
pub trait ConversionAdapter: 'static {
    /// Type converted from.
    type Source: ArgType;
    /// Type converted to.
    type Target: ArgType;

    /// Convert one value.
    fn convert(value: Self::Source) -> Self::Target;

    /// The erased form stored in a conversion registry.
    fn adapter_fn() -> AdapterFn {
        Arc::new(|slot: &Dynamic| {
            let source = <Self::Source as FromDynamic>::from_dynamic(slot)?;
            Ok(Self::convert(source).into_dynamic())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HostType, ObjectHeap, primitives};

    #[derive(Clone, Debug, PartialEq)]
    struct Celsius(f64);
    #[derive(Clone, Debug, PartialEq)]
    struct Fahrenheit(f64);

    crate::impl_value_type!(Celsius, "Celsius", "crate::Celsius");
    crate::impl_value_type!(Fahrenheit, "Fahrenheit", "crate::Fahrenheit");

    struct CelsiusToFahrenheit;

    impl ConversionAdapter for CelsiusToFahrenheit {
        type Source = Celsius;
        type Target = Fahrenheit;

        fn convert(value: Celsius) -> Fahrenheit {
            Fahrenheit(value.0 * 9.0 / 5.0 + 32.0)
        }
    }

    fn erased_add() -> MemberCallable {
        let call: ErasedCall<(i32, i32)> = Arc::new(|_, (a, b)| Ok(Dynamic::Int(i64::from(a + b))));
        Arc::new(call)
    }

    #[test]
    fn arg_list_reports_types_and_unpacks() {
        assert_eq!(
            <(i32, f32)>::param_types(),
            vec![primitives::INT32, primitives::FLOAT]
        );
        let unpacked = <(i32, f32)>::unpack(&[Dynamic::Int(4), Dynamic::Float(0.5)]);
        assert_eq!(unpacked, Ok((4, 0.5)));
        assert_eq!(<()>::unpack(&[]), Ok(()));
    }

    #[test]
    fn arg_list_rejects_wrong_arity_and_types() {
        assert_eq!(
            <(i32,)>::unpack(&[]),
            Err(NativeError::ArgumentCount {
                expected: 1,
                actual: 0
            })
        );
        assert!(matches!(
            <(i32, i32)>::unpack(&[Dynamic::Int(1), Dynamic::Bool(true)]),
            Err(NativeError::Argument { index: 1, .. })
        ));
    }

    #[test]
    fn factory_forwards_result_for_non_void() {
        let add = TypeHash::from_name("add");
        let thunk = InvocationFactory::<(i32, i32), false>::build(add, &erased_add()).unwrap();

        let mut heap = ObjectHeap::new();
        let args = [Dynamic::Int(2), Dynamic::Int(3)];
        let mut ctx = CallContext::new(None, &args, &mut heap);
        thunk.call(&mut ctx).unwrap();
        assert_eq!(ctx.take_return(), Dynamic::Int(5));
    }

    #[test]
    fn factory_discards_result_for_void() {
        let add = TypeHash::from_name("add");
        let thunk = InvocationFactory::<(i32, i32), true>::build(add, &erased_add()).unwrap();

        let mut heap = ObjectHeap::new();
        let args = [Dynamic::Int(2), Dynamic::Int(3)];
        let mut ctx = CallContext::new(None, &args, &mut heap);
        thunk.call(&mut ctx).unwrap();
        assert_eq!(ctx.take_return(), Dynamic::Void);
    }

    #[test]
    fn factory_rejects_foreign_signature() {
        let add = TypeHash::from_name("add");
        let result = InvocationFactory::<(f32,), false>::build(add, &erased_add());
        assert!(matches!(result, Err(NativeError::SignatureMismatch { .. })));
    }

    #[test]
    fn holder_decodes_and_reproduces_value() {
        let held = ArgumentHolder::<i32>::hold(&Dynamic::Int(7)).unwrap();
        assert_eq!(held.value(), Dynamic::Int(7));
        assert_eq!(held.value_type(), primitives::INT32);
        assert!(ArgumentHolder::<i32>::hold(&Dynamic::String("7".into())).is_err());
    }

    #[test]
    fn adapter_fn_converts_natives() {
        let adapt = CelsiusToFahrenheit::adapter_fn();
        let out = adapt(&Dynamic::native(Celsius(100.0))).unwrap();
        assert_eq!(out.downcast_native::<Fahrenheit>(), Some(&Fahrenheit(212.0)));
        assert!(adapt(&Dynamic::Int(1)).is_err());
        assert_eq!(Fahrenheit::type_hash(), TypeHash::from_name("Fahrenheit"));
    }

    #[test]
    fn signature_key_hash_matches_type_hash() {
        let key = InvocationFactory::<(i32, i32), false>::key();
        let params = [primitives::INT32, primitives::INT32];
        assert_eq!(key.hash(), TypeHash::from_signature(false, &params));
    }
}
