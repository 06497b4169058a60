//! Build lifecycle hooks.

use std::fs;
use std::io;

use persistcall_registry::{ConversionRegistry, TypeRegistry};

use crate::{
    AotConfig, AotError, EmitError, EmitReport, Emitter, ObjectSource, Planner, UsagePlan, scan,
};

/// The kind of build about to be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildTarget {
    /// A target that can build instantiations at run time. Nothing to do.
    Dynamic,
    /// A target that only has pre-registered instantiations.
    Restricted,
}

/// Outcome of a pre-build hook that generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    /// The plan the module was generated from, warnings included.
    pub plan: UsagePlan,
    pub report: EmitReport,
}

/// Scan, plan and emit around a host's build.
#[derive(Debug)]
pub struct AotPipeline<'a> {
    types: &'a TypeRegistry,
    conversions: &'a ConversionRegistry,
    config: AotConfig,
}

impl<'a> AotPipeline<'a> {
    /// Create a pipeline planning against the given registries.
    pub fn new(
        types: &'a TypeRegistry,
        conversions: &'a ConversionRegistry,
        config: AotConfig,
    ) -> Self {
        Self {
            types,
            conversions,
            config,
        }
    }

    pub fn config(&self) -> &AotConfig {
        &self.config
    }

    /// Run scan, plan and emit for a restricted target.
    ///
    /// Returns `None` for dynamic targets, which need no generated code. A
    /// plan that cannot cover every listener fails with
    /// [`AotError::IncompletePlan`] and writes nothing.
    pub fn before_build<S>(
        &self,
        target: BuildTarget,
        source: &S,
    ) -> Result<Option<PipelineOutput>, AotError>
    where
        S: ObjectSource + ?Sized,
    {
        if target == BuildTarget::Dynamic {
            tracing::debug!("dynamic build target, skipping companion module");
            return Ok(None);
        }

        let mut planner = Planner::new(self.types, self.conversions);
        let mut listeners = 0usize;
        for record in scan(source) {
            planner.add(&record?);
            listeners += 1;
        }
        let plan = planner.finish();
        let incomplete: Vec<_> = plan.incomplete().cloned().collect();
        if !incomplete.is_empty() {
            return Err(AotError::IncompletePlan(incomplete));
        }
        let report = Emitter::new(&self.config).emit(&plan)?;

        tracing::info!(
            listeners,
            adapters = report.adapters,
            warnings = plan.warnings.len(),
            module = %report.module_path.display(),
            "generated companion module"
        );
        Ok(Some(PipelineOutput { plan, report }))
    }

    /// Delete the generated artifacts.
    pub fn after_build(&self) -> Result<(), AotError> {
        let dir = &self.config.output_dir;
        match fs::remove_dir_all(dir) {
            Ok(()) => {
                tracing::debug!(dir = %dir.display(), "removed companion module");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(EmitError::Io {
                path: dir.clone(),
                source,
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldVisitor, Persistable, ScanError, SourceObject};
    use persistcall_core::{HostType, MemberKind, primitives};
    use persistcall_runtime::{Argument, Listener, PersistentEvent};

    struct Counter;
    persistcall_core::impl_reference_type!(Counter, "Counter", "crate::Counter");

    #[derive(Debug, Clone, Default)]
    struct Badge;
    persistcall_core::impl_value_type!(Badge, "Badge", "crate::Badge");

    struct Trigger {
        on_enter: PersistentEvent,
    }

    impl Persistable for Trigger {
        fn visit(&self, visitor: &mut dyn FieldVisitor) {
            visitor.event("on_enter", &self.on_enter);
        }
    }

    fn types() -> TypeRegistry {
        let mut types = TypeRegistry::with_primitives();
        types
            .register_reference_type::<Counter>()
            .unwrap()
            .static_method("Add", |(a, b): (i32, i32)| a + b)
            .unwrap()
            .static_method("Award", |(_b,): (Badge,)| {})
            .unwrap();
        types
    }

    fn trigger() -> Trigger {
        let mut on_enter = PersistentEvent::new(vec![primitives::INT32, primitives::INT32]);
        on_enter.add_listener(Listener::new_static(
            Counter::type_hash(),
            "Add",
            MemberKind::Method,
            vec![Argument::dynamic(0, primitives::INT32), Argument::dynamic(1, primitives::INT32)],
        ));
        Trigger { on_enter }
    }

    #[test]
    fn restricted_build_generates_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let types = types();
        let conversions = ConversionRegistry::new();
        let config = AotConfig::default().with_output_dir(dir.path().join("aot"));
        let pipeline = AotPipeline::new(&types, &conversions, config);
        let source = vec![("entrance".to_string(), trigger())];

        assert_eq!(pipeline.before_build(BuildTarget::Dynamic, &source).unwrap(), None);
        assert!(!pipeline.config().output_dir.exists());

        let output = pipeline.before_build(BuildTarget::Restricted, &source).unwrap().unwrap();
        assert!(output.plan.conversions.is_empty());
        assert_eq!(output.report.factories, 1);
        assert!(output.report.module_path.exists());

        pipeline.after_build().unwrap();
        assert!(!pipeline.config().output_dir.exists());
        pipeline.after_build().unwrap();
    }

    struct FailingSource;

    impl ObjectSource for FailingSource {
        fn objects(&self) -> Box<dyn Iterator<Item = Result<SourceObject<'_>, ScanError>> + '_> {
            Box::new(std::iter::once(Err(ScanError::Source("asset database locked".into()))))
        }
    }

    #[test]
    fn scan_failure_stops_before_emitting() {
        let dir = tempfile::tempdir().unwrap();
        let types = types();
        let conversions = ConversionRegistry::new();
        let config = AotConfig::default().with_output_dir(dir.path().join("aot"));
        let pipeline = AotPipeline::new(&types, &conversions, config);

        let err = pipeline.before_build(BuildTarget::Restricted, &FailingSource).unwrap_err();
        assert!(matches!(err, AotError::Scan(ScanError::Source(_))));
        assert!(!pipeline.config().output_dir.exists());
    }

    #[test]
    fn unregistered_type_fails_the_build() {
        let dir = tempfile::tempdir().unwrap();
        let types = types();
        let conversions = ConversionRegistry::new();
        let config = AotConfig::default().with_output_dir(dir.path().join("aot"));
        let pipeline = AotPipeline::new(&types, &conversions, config);

        let mut trigger = trigger();
        trigger.on_enter.add_listener(Listener::new_static(
            Counter::type_hash(),
            "Award",
            MemberKind::Method,
            vec![Argument::dynamic(0, Badge::type_hash())],
        ));
        let source = vec![("hall".to_string(), trigger)];

        let err = pipeline.before_build(BuildTarget::Restricted, &source).unwrap_err();
        match err {
            AotError::IncompletePlan(warnings) => {
                assert_eq!(warnings.len(), 1);
                assert!(warnings[0].to_string().starts_with("hall:on_enter[1]: type "));
            }
            other => panic!("expected an incomplete plan, got {other:?}"),
        }
        assert!(!pipeline.config().output_dir.exists());
    }
}
