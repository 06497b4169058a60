//! Integration tests for listener resolution and invocation.

mod common;

use common::*;
use persistcall::prelude::*;
use persistcall::{
    CollectedWarnings, ConversionRegistry, InvokeError, ListenerPhase, RegistrationError,
    ResolutionError,
};
use pretty_assertions::assert_eq;

fn runtime(mode: ExecutionMode) -> (ListenerRuntime, CollectedWarnings) {
    let warnings = CollectedWarnings::new();
    let types = registry().expect("registry");
    let runtime = ListenerRuntime::new(types, mode).with_warnings(warnings.clone());
    (runtime, warnings)
}

fn ints(values: &[i64]) -> Vec<Dynamic> {
    values.iter().copied().map(Dynamic::Int).collect()
}

// =============================================================================
// Resolution and invocation
// =============================================================================

#[test]
fn static_add_with_dynamic_ints() {
    let (mut runtime, warnings) = runtime(ExecutionMode::Dynamic);
    let mut heap = ObjectHeap::new();
    let mut listener = add_listener();

    let signature = [primitives::INT32, primitives::INT32];
    let result = runtime.invoke(&mut listener, &mut heap, &signature, &ints(&[2, 3]));

    assert_eq!(result, Some(Dynamic::Int(5)));
    assert_eq!(listener.phase(), ListenerPhase::Invoked);
    assert!(warnings.is_empty());
}

#[test]
fn member_is_called_once_with_arguments_in_declared_order() {
    let (mut runtime, warnings) = runtime(ExecutionMode::Dynamic);
    let mut heap = ObjectHeap::new();
    let door = heap.allocate(Door::default());

    let mut listener = Listener::new_instance(
        door,
        Door::type_hash(),
        "Record",
        MemberKind::Method,
        vec![
            Argument::dynamic(1, primitives::INT32),
            Argument::dynamic(0, primitives::STRING),
        ],
    );

    let signature = [primitives::STRING, primitives::INT32];
    let params = [Dynamic::String("north".into()), Dynamic::Int(7)];
    assert_eq!(runtime.invoke(&mut listener, &mut heap, &signature, &params), Some(Dynamic::Void));

    let log = heap.get::<Door>(door).map(|d| d.log.clone());
    assert_eq!(log, Some(vec!["7:north".to_string()]));
    assert!(warnings.is_empty());
}

#[test]
fn fixed_arguments_are_decoded_once_per_generation() {
    let (mut runtime, _) = runtime(ExecutionMode::Dynamic);
    let mut heap = ObjectHeap::new();
    let door = heap.allocate(Door::default());

    let east = Dynamic::String("east".into());
    let tag = Argument::fixed_value(runtime.serializer(), &east, primitives::STRING)
        .expect("encode");
    let mut listener = Listener::new_instance(
        door,
        Door::type_hash(),
        "Record",
        MemberKind::Method,
        vec![Argument::dynamic(0, primitives::INT32), tag],
    );

    for n in 1..=3 {
        runtime.invoke(&mut listener, &mut heap, &[primitives::INT32], &ints(&[n]));
    }
    let log = heap.get::<Door>(door).map(|d| d.log.clone());
    assert_eq!(log, Some(vec!["1:east".to_string(), "2:east".to_string(), "3:east".to_string()]));
    assert_eq!(runtime.cache().compile_count(), 1);
}

#[test]
fn event_runs_listeners_in_declaration_order() {
    let (mut runtime, warnings) = runtime(ExecutionMode::Dynamic);
    let mut heap = ObjectHeap::new();
    let door = heap.allocate(Door::default());

    let record = |tag: &str| {
        Listener::new_instance(
            door,
            Door::type_hash(),
            "Record",
            MemberKind::Method,
            vec![
                Argument::dynamic(0, primitives::INT32),
                Argument::fixed_value(
                    &persistcall::BincodeSerializer,
                    &Dynamic::String(tag.into()),
                    primitives::STRING,
                )
                .expect("encode"),
            ],
        )
    };

    let mut event = PersistentEvent::new(vec![primitives::INT32]);
    event
        .add_listener(record("first"))
        .add_listener(Listener::new_instance(
            door,
            Door::type_hash(),
            "Open",
            MemberKind::Method,
            vec![],
        ))
        .add_listener(record("second"));

    runtime.invoke_event(&mut event, &mut heap, &ints(&[9]));

    let door = heap.get::<Door>(door).expect("door");
    assert_eq!(door.log, vec!["9:first".to_string(), "9:second".to_string()]);
    assert!(door.open);
    assert!(warnings.is_empty());
}

// =============================================================================
// Recovered failures
// =============================================================================

#[test]
fn missing_member_warns_once_and_does_not_call() {
    let (mut runtime, warnings) = runtime(ExecutionMode::Dynamic);
    let mut heap = ObjectHeap::new();
    let mut listener = Listener::new_static(
        Calculator::type_hash(),
        "Multiply",
        MemberKind::Method,
        vec![Argument::dynamic(0, primitives::INT32), Argument::dynamic(1, primitives::INT32)],
    );

    let signature = [primitives::INT32, primitives::INT32];
    assert_eq!(runtime.invoke(&mut listener, &mut heap, &signature, &ints(&[2, 3])), None);
    assert_eq!(warnings.len(), 1);
    assert!(warnings.messages()[0].contains("method not found: Calculator.Multiply(int, int)"));
    assert!(runtime.cache().is_empty());
}

#[test]
fn out_of_range_binding_warns_without_resolving() {
    let (mut runtime, warnings) = runtime(ExecutionMode::Dynamic);
    let mut heap = ObjectHeap::new();
    let mut listener = add_listener();

    // The event lost its second parameter after the listener was saved.
    let result = runtime.try_invoke(&mut listener, &mut heap, &[primitives::INT32], &ints(&[2]));
    assert!(matches!(
        result,
        Err(InvokeError::ArgumentBindingOutOfRange { argument: 1, index: 1, available: 1 })
    ));

    assert_eq!(runtime.invoke(&mut listener, &mut heap, &[primitives::INT32], &ints(&[2])), None);
    assert_eq!(warnings.len(), 1);
    assert_eq!(listener.phase(), ListenerPhase::Unresolved);
    assert!(runtime.cache().is_empty());
}

#[test]
fn vector2_bound_to_vector3_is_a_mismatch() {
    let (mut runtime, warnings) = runtime(ExecutionMode::Dynamic);
    let mut heap = ObjectHeap::new();
    let door = heap.allocate(Door::default());
    let mut listener = Listener::new_instance(
        door,
        Door::type_hash(),
        "Face",
        MemberKind::Method,
        vec![Argument::dynamic(0, Vector2::type_hash())],
    );

    let params = [Dynamic::native(Vector3 { x: 1.0, y: 2.0, z: 3.0 })];
    let result = runtime.invoke(&mut listener, &mut heap, &[Vector3::type_hash()], &params);

    assert_eq!(result, None);
    assert_eq!(
        warnings.messages(),
        vec![
            "listener Door.Face (method): argument 0 is declared Vector2, but parameter 0 is Vector3"
                .to_string()
        ]
    );
    assert_eq!(heap.get::<Door>(door).map(|d| d.heading), Some(Vector2::default()));
}

#[test]
fn field_listener_heals_after_becoming_a_property() {
    let (mut runtime, warnings) = runtime(ExecutionMode::Dynamic);
    let mut heap = ObjectHeap::new();
    let door = heap.allocate(Door::default());
    let mut listener = Listener::new_instance(
        door,
        Door::type_hash(),
        "label",
        MemberKind::Field,
        vec![Argument::dynamic(0, primitives::STRING)],
    );

    let params = [Dynamic::String("cellar".into())];
    assert!(runtime.invoke(&mut listener, &mut heap, &[primitives::STRING], &params).is_some());
    assert_eq!(listener.member_kind, MemberKind::Property);
    assert_eq!(heap.get::<Door>(door).map(|d| d.label.clone()), Some("cellar".to_string()));
    assert!(warnings.is_empty());
}

// =============================================================================
// Conversions
// =============================================================================

#[test]
fn operator_converts_dynamic_argument() {
    let (mut runtime, warnings) = runtime(ExecutionMode::Dynamic);
    let mut heap = ObjectHeap::new();
    let door = heap.allocate(Door::default());
    let mut listener = Listener::new_instance(
        door,
        Door::type_hash(),
        "SetTarget",
        MemberKind::Method,
        vec![Argument::dynamic(0, Fahrenheit::type_hash())],
    );

    let params = [Dynamic::native(Celsius(100.0))];
    runtime.invoke(&mut listener, &mut heap, &[Celsius::type_hash()], &params);
    assert_eq!(heap.get::<Door>(door).map(|d| d.target), Some(Fahrenheit(212.0)));
    assert!(warnings.is_empty());
}

#[test]
fn conversion_lookup_is_idempotent() {
    let types = registry().expect("registry");
    let mut conversions = ConversionRegistry::new();
    let pairs = [
        (primitives::INT32, primitives::INT32),
        (primitives::INT8, primitives::DOUBLE),
        (Celsius::type_hash(), Fahrenheit::type_hash()),
    ];
    for (from, to) in pairs {
        let first = conversions.lookup(&types, from, to);
        assert!(first.is_some());
        assert_eq!(conversions.lookup(&types, from, to), first);
    }
    assert_eq!(conversions.lookup(&types, Vector2::type_hash(), Vector3::type_hash()), None);
}

// =============================================================================
// Restricted targets
// =============================================================================

/// Companion module emitted for `pipeline_tests::companion_source`.
mod generated {
    include!("golden/persistcall_aot.rs");
}

#[test]
fn restricted_runtime_needs_registered_instantiations() {
    let (mut runtime, warnings) = runtime(ExecutionMode::Restricted);
    let mut heap = ObjectHeap::new();
    let mut listener = add_listener();
    let signature = [primitives::INT32, primitives::INT32];

    let result = runtime.try_invoke(&mut listener, &mut heap, &signature, &ints(&[2, 3]));
    assert!(matches!(
        result,
        Err(InvokeError::Resolution(ResolutionError::MissingInstantiation(_)))
    ));

    runtime.install(generated::register).expect("install");
    let sum = runtime.invoke(&mut listener, &mut heap, &signature, &ints(&[2, 3]));
    assert_eq!(sum, Some(Dynamic::Int(5)));
    assert!(warnings.is_empty());
}

#[test]
fn restricted_runtime_uses_only_registered_adapters() {
    let (mut runtime, warnings) = runtime(ExecutionMode::Restricted);
    let mut heap = ObjectHeap::new();
    let door = heap.allocate(Door::default());
    let mut listener = Listener::new_instance(
        door,
        Door::type_hash(),
        "SetTarget",
        MemberKind::Method,
        vec![Argument::dynamic(0, Fahrenheit::type_hash())],
    );
    let params = [Dynamic::native(Celsius(0.0))];

    // No operator discovery on restricted targets.
    assert_eq!(runtime.invoke(&mut listener, &mut heap, &[Celsius::type_hash()], &params), None);
    assert_eq!(warnings.len(), 1);

    runtime.install(generated::register).expect("install");
    assert!(runtime.invoke(&mut listener, &mut heap, &[Celsius::type_hash()], &params).is_some());
    assert_eq!(heap.get::<Door>(door).map(|d| d.target), Some(Fahrenheit(32.0)));
    assert_eq!(warnings.len(), 1);
}

#[test]
fn installing_twice_reports_duplicate_conversion() {
    let (mut runtime, _) = runtime(ExecutionMode::Restricted);
    runtime.install(generated::register).expect("install");
    assert!(matches!(
        runtime.install(generated::register),
        Err(RegistrationError::DuplicateConversion { .. })
    ));
}

#[test]
fn restricted_runtime_decodes_fixed_arguments_with_generated_holders() {
    let (mut runtime, warnings) = runtime(ExecutionMode::Restricted);
    runtime.install(generated::register).expect("install");
    let mut heap = ObjectHeap::new();
    let door = heap.allocate(Door::default());

    let west = Dynamic::String("west".into());
    let tag = Argument::fixed_value(runtime.serializer(), &west, primitives::STRING)
        .expect("encode");
    let mut listener = Listener::new_instance(
        door,
        Door::type_hash(),
        "Record",
        MemberKind::Method,
        vec![Argument::dynamic(0, primitives::INT32), tag],
    );

    assert_eq!(
        runtime.invoke(&mut listener, &mut heap, &[primitives::INT32], &ints(&[4])),
        Some(Dynamic::Void)
    );
    assert_eq!(heap.get::<Door>(door).map(|d| d.log.clone()), Some(vec!["4:west".to_string()]));
    assert!(warnings.is_empty());
}
