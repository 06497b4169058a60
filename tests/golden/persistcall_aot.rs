// @generated by persistcall-aot. Do not edit.
//
// Conversion adapters and generic instantiations for restricted targets.

use persistcall::aot_support as aot;

/// Converts `Celsius` to `Fahrenheit` through `Celsius::to_fahrenheit`.
pub struct ConvertCelsiusToFahrenheit;

impl aot::ConversionAdapter for ConvertCelsiusToFahrenheit {
    type Source = crate::common::Celsius;
    type Target = crate::common::Fahrenheit;

    fn convert(value: Self::Source) -> Self::Target {
        <crate::common::Celsius>::to_fahrenheit(value)
    }
}

/// Install every adapter and instantiation of this module.
pub fn register(
    types: &aot::TypeRegistry,
    conversions: &mut aot::ConversionRegistry,
    instantiations: &mut aot::InstantiationTable,
) -> Result<(), aot::RegistrationError> {
    conversions.register_adapter::<ConvertCelsiusToFahrenheit>(types)?;
    instantiations.register_holder::<i32>();
    instantiations.register_holder::<crate::common::Fahrenheit>();
    instantiations.register_holder::<String>();
    instantiations.register_factory::<(i32, i32), false>();
    instantiations.register_factory::<(crate::common::Fahrenheit,), true>();
    instantiations.register_factory::<(i32, String), true>();
    Ok(())
}

/// Names every planned instantiation. Never called.
#[allow(dead_code)]
fn ensure_instantiations() {
    let _ = <ConvertCelsiusToFahrenheit as aot::ConversionAdapter>::adapter_fn;
    let _ = aot::ArgumentHolder::<i32>::hold;
    let _ = aot::ArgumentHolder::<crate::common::Fahrenheit>::hold;
    let _ = aot::ArgumentHolder::<String>::hold;
    let _ = aot::InvocationFactory::<(i32, i32), false>::build;
    let _ = aot::InvocationFactory::<(crate::common::Fahrenheit,), true>::build;
    let _ = aot::InvocationFactory::<(i32, String), true>::build;
}
