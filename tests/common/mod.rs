//! Host types shared by the integration tests.

#![allow(dead_code)]

use std::sync::Once;

use persistcall::aot::{FieldVisitor, Persistable};
use persistcall::prelude::*;
use persistcall::{RegistrationError, impl_reference_type, impl_value_type};

static TRACING_INIT: Once = Once::new();

/// Route `tracing` output to the test harness when `RUST_LOG` is set,
/// e.g. `RUST_LOG=persistcall=debug`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_test_writer().with_target(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Celsius(pub f32);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Fahrenheit(pub f32);

impl Celsius {
    pub fn to_fahrenheit(self) -> Fahrenheit {
        Fahrenheit(self.0 * 1.8 + 32.0)
    }
}

impl_value_type!(Vector2, "Vector2", "crate::common::Vector2");
impl_value_type!(Vector3, "Vector3", "crate::common::Vector3");
impl_value_type!(Celsius, "Celsius", "crate::common::Celsius");
impl_value_type!(Fahrenheit, "Fahrenheit", "crate::common::Fahrenheit");

pub struct Calculator;

impl_reference_type!(Calculator, "Calculator", "crate::common::Calculator");

#[derive(Debug, Default)]
pub struct Door {
    pub open: bool,
    pub label: String,
    pub heading: Vector2,
    pub target: Fahrenheit,
    pub log: Vec<String>,
}

impl_reference_type!(Door, "Door", "crate::common::Door");

pub fn registry() -> Result<TypeRegistry, RegistrationError> {
    init_tracing();
    let mut types = TypeRegistry::with_primitives();
    types.register_value_type::<Vector2>()?;
    types.register_value_type::<Vector3>()?;
    types.register_value_type::<Fahrenheit>()?;
    types
        .register_value_type::<Celsius>()?
        .implicit_operator("to_fahrenheit", Celsius::to_fahrenheit)?;
    types
        .register_reference_type::<Calculator>()?
        .static_method("Add", |(a, b): (i32, i32)| a + b)?;
    types
        .register_reference_type::<Door>()?
        .method("Open", |door: &mut Door, (): ()| door.open = true)?
        .method("Face", |door: &mut Door, (heading,): (Vector2,)| door.heading = heading)?
        .method("SetTarget", |door: &mut Door, (t,): (Fahrenheit,)| door.target = t)?
        .method("Record", |door: &mut Door, (n, tag): (i32, String)| {
            door.log.push(format!("{n}:{tag}"))
        })?
        .property("label", |door: &mut Door, label: String| door.label = label)?;
    Ok(types)
}

/// `Calculator.Add(int, int)` with both arguments bound to the event's parameters.
pub fn add_listener() -> Listener {
    Listener::new_static(
        Calculator::type_hash(),
        "Add",
        MemberKind::Method,
        vec![
            Argument::dynamic(0, primitives::INT32),
            Argument::dynamic(1, primitives::INT32),
        ],
    )
}

/// A persisted scene object with events at several depths.
pub struct Switch {
    pub on_toggle: PersistentEvent,
}

impl Persistable for Switch {
    fn visit(&self, visitor: &mut dyn FieldVisitor) {
        visitor.value("name");
        visitor.event("on_toggle", &self.on_toggle);
    }
}

pub struct Level {
    pub on_start: PersistentEvent,
    pub switches: Vec<Switch>,
}

impl Persistable for Level {
    fn visit(&self, visitor: &mut dyn FieldVisitor) {
        visitor.event("on_start", &self.on_start);
        for (i, switch) in self.switches.iter().enumerate() {
            visitor.element("switches", i, switch);
        }
    }
}
