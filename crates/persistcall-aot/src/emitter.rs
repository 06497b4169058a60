//! Companion module emission.
//!
//! The emitter renders a [`UsagePlan`] into two artifacts:
//!
//! - `<module>.rs`: one adapter type per planned conversion, a `register`
//!   routine that installs adapters, holders and factories, and an
//!   `ensure_instantiations` routine naming every generic instantiation so
//!   the restricted build keeps them
//! - the preserve manifest: one `preserve <name> <rust path>` line per
//!   non-primitive type the module names
//!
//! Rendering is a pure function of the plan and the config. Writing stages
//! both files in a temporary directory next to the output directory and then
//! swaps it into place, so readers see either the old artifacts or the new
//! ones.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use persistcall_core::TypeKind;

use crate::{AotConfig, EmitError, PlannedConversion, PlannedFactory, PlannedType, UsagePlan};

const HEADER: &str = "// @generated by persistcall-aot. Do not edit.";
const SUPPORT_ALIAS: &str = "aot";

/// Summary of one emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitReport {
    /// Where the generated module was written.
    pub module_path: PathBuf,
    /// Where the preserve manifest was written.
    pub manifest_path: PathBuf,
    /// Conversion adapter types generated.
    pub adapters: usize,
    /// Argument holder instantiations registered.
    pub holders: usize,
    /// Invocation factory instantiations registered.
    pub factories: usize,
    /// Manifest lines written.
    pub preserved: usize,
}

/// Renders and writes companion modules.
#[derive(Debug, Clone, Copy)]
pub struct Emitter<'a> {
    config: &'a AotConfig,
}

impl<'a> Emitter<'a> {
    /// Create an emitter writing where `config` says.
    pub fn new(config: &'a AotConfig) -> Self {
        Self { config }
    }

    /// Render the generated module.
    pub fn render_module(&self, plan: &UsagePlan) -> String {
        let adapters = adapter_names(&plan.conversions);
        let mut out = SourceWriter::default();

        out.line(HEADER);
        out.line("//");
        out.line("// Conversion adapters and generic instantiations for restricted targets.");
        out.blank();
        out.line(format!("use {} as {SUPPORT_ALIAS};", self.config.runtime_path));

        for (conversion, name) in plan.conversions.iter().zip(&adapters) {
            out.blank();
            self.render_adapter(&mut out, conversion, name);
        }

        out.blank();
        self.render_register(&mut out, plan, &adapters);
        out.blank();
        self.render_ensure(&mut out, plan, &adapters);
        out.finish()
    }

    /// Render the preserve manifest.
    pub fn render_manifest(&self, plan: &UsagePlan) -> String {
        plan.referenced_types()
            .into_iter()
            .map(|ty| format!("preserve {} {}\n", ty.name, ty.rust_path))
            .collect()
    }

    /// Render and write both artifacts, replacing any previous ones.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn emit(&self, plan: &UsagePlan) -> Result<EmitReport, EmitError> {
        if !is_identifier(&self.config.module_name) {
            return Err(EmitError::InvalidModuleName(self.config.module_name.clone()));
        }

        let module = self.render_module(plan);
        let manifest = self.render_manifest(plan);
        let preserved = manifest.lines().count();
        self.write_atomically(&[
            (self.config.module_file_name(), module),
            (self.config.manifest_name.clone(), manifest),
        ])?;

        let report = EmitReport {
            module_path: self.config.module_path(),
            manifest_path: self.config.manifest_path(),
            adapters: plan.conversions.len(),
            holders: plan.holders.len(),
            factories: plan.factories.len(),
            preserved,
        };
        tracing::debug!(
            module = %report.module_path.display(),
            adapters = report.adapters,
            holders = report.holders,
            factories = report.factories,
            preserved = report.preserved,
            "emitted companion module"
        );
        Ok(report)
    }

    fn render_adapter(&self, out: &mut SourceWriter, conversion: &PlannedConversion, name: &str) {
        let from = type_expr(&conversion.from);
        let to = type_expr(&conversion.to);
        out.line(format!(
            "/// Converts `{}` to `{}` through `{}::{}`.",
            conversion.from.name, conversion.to.name, conversion.from.name, conversion.operator
        ));
        out.line(format!("pub struct {name};"));
        out.blank();
        out.line(format!("impl {SUPPORT_ALIAS}::ConversionAdapter for {name} {{"));
        out.line(format!("    type Source = {from};"));
        out.line(format!("    type Target = {to};"));
        out.blank();
        out.line("    fn convert(value: Self::Source) -> Self::Target {");
        out.line(format!("        <{from}>::{}(value)", conversion.operator));
        out.line("    }");
        out.line("}");
    }

    fn render_register(&self, out: &mut SourceWriter, plan: &UsagePlan, adapters: &[String]) {
        let unused = |used: bool, name: &str| {
            if used {
                name.to_string()
            } else {
                format!("_{name}")
            }
        };
        let has_adapters = !adapters.is_empty();
        let has_instantiations = !plan.holders.is_empty() || !plan.factories.is_empty();
        let types = unused(has_adapters, "types");
        let conversions = unused(has_adapters, "conversions");
        let instantiations = unused(has_instantiations, "instantiations");

        out.line("/// Install every adapter and instantiation of this module.");
        out.line("pub fn register(");
        out.line(format!("    {types}: &{SUPPORT_ALIAS}::TypeRegistry,"));
        out.line(format!("    {conversions}: &mut {SUPPORT_ALIAS}::ConversionRegistry,"));
        out.line(format!("    {instantiations}: &mut {SUPPORT_ALIAS}::InstantiationTable,"));
        out.line(format!(") -> Result<(), {SUPPORT_ALIAS}::RegistrationError> {{"));
        for name in adapters {
            out.line(format!("    {conversions}.register_adapter::<{name}>({types})?;"));
        }
        for holder in &plan.holders {
            out.line(format!("    {instantiations}.register_holder::<{}>();", type_expr(holder)));
        }
        for factory in &plan.factories {
            out.line(format!(
                "    {instantiations}.register_factory::<{}, {}>();",
                tuple_expr(factory),
                factory.is_void
            ));
        }
        out.line("    Ok(())");
        out.line("}");
    }

    fn render_ensure(&self, out: &mut SourceWriter, plan: &UsagePlan, adapters: &[String]) {
        out.line("/// Names every planned instantiation. Never called.");
        out.line("#[allow(dead_code)]");
        out.line("fn ensure_instantiations() {");
        for name in adapters {
            out.line(format!(
                "    let _ = <{name} as {SUPPORT_ALIAS}::ConversionAdapter>::adapter_fn;"
            ));
        }
        for holder in &plan.holders {
            out.line(format!(
                "    let _ = {SUPPORT_ALIAS}::ArgumentHolder::<{}>::hold;",
                type_expr(holder)
            ));
        }
        for factory in &plan.factories {
            out.line(format!(
                "    let _ = {SUPPORT_ALIAS}::InvocationFactory::<{}, {}>::build;",
                tuple_expr(factory),
                factory.is_void
            ));
        }
        out.line("}");
    }

    fn write_atomically(&self, files: &[(String, String)]) -> Result<(), EmitError> {
        let output = &self.config.output_dir;
        let parent = self.config.output_parent();
        fs::create_dir_all(parent).map_err(EmitError::io(parent))?;

        let staging = tempfile::Builder::new()
            .prefix(".persistcall-aot-")
            .tempdir_in(parent)
            .map_err(EmitError::io(parent))?;
        let next = staging.path().join("next");
        fs::create_dir(&next).map_err(EmitError::io(&next))?;
        for (name, contents) in files {
            let path = next.join(name);
            fs::write(&path, contents).map_err(EmitError::io(&path))?;
        }

        // The old directory moves into staging and is deleted with it.
        let previous = staging.path().join("previous");
        let result = swap_into_place(&next, output, &previous, |from, to| fs::rename(from, to));
        if let Err(EmitError::RestoreFailed { previous, .. }) = &result {
            tracing::warn!(previous = %previous.display(), "keeping staging directory");
            let _ = staging.keep();
        }
        result
    }
}

/// Move `next` to `output`, parking an existing `output` at `previous`.
///
/// If `next` cannot be moved the parked directory is moved back. When that
/// fails too, the error names where the previous artifacts now live.
fn swap_into_place(
    next: &Path,
    output: &Path,
    previous: &Path,
    mut rename: impl FnMut(&Path, &Path) -> io::Result<()>,
) -> Result<(), EmitError> {
    let replacing = output.exists();
    if replacing {
        rename(output, previous).map_err(EmitError::io(output))?;
    }
    let Err(source) = rename(next, output) else {
        return Ok(());
    };
    if replacing {
        if let Err(restore) = rename(previous, output) {
            return Err(EmitError::RestoreFailed {
                output: output.to_path_buf(),
                previous: previous.to_path_buf(),
                source: restore,
            });
        }
    }
    Err(EmitError::Io {
        path: output.to_path_buf(),
        source,
    })
}

/// Render and write `plan` with `config`.
pub fn emit(plan: &UsagePlan, config: &AotConfig) -> Result<EmitReport, EmitError> {
    Emitter::new(config).emit(plan)
}

#[derive(Default)]
struct SourceWriter {
    text: String,
}

impl SourceWriter {
    fn line(&mut self, line: impl AsRef<str>) {
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }

    fn blank(&mut self) {
        self.text.push('\n');
    }

    fn finish(self) -> String {
        self.text
    }
}

fn type_expr(ty: &PlannedType) -> String {
    match ty.kind {
        TypeKind::Reference => format!("{SUPPORT_ALIAS}::Ref<{}>", ty.rust_path),
        TypeKind::Primitive | TypeKind::Value => ty.rust_path.clone(),
    }
}

fn tuple_expr(factory: &PlannedFactory) -> String {
    match factory.params.as_slice() {
        [] => "()".to_string(),
        [only] => format!("({},)", type_expr(only)),
        params => {
            let items: Vec<_> = params.iter().map(type_expr).collect();
            format!("({})", items.join(", "))
        }
    }
}

/// `ConvertFromTo` names, made unique in plan order.
fn adapter_names(conversions: &[PlannedConversion]) -> Vec<String> {
    let mut taken = FxHashSet::default();
    conversions
        .iter()
        .map(|c| {
            let (from, to) = (pascal_ident(&c.from.name), pascal_ident(&c.to.name));
            let base = format!("Convert{from}To{to}");
            let mut name = base.clone();
            let mut suffix = 2;
            while !taken.insert(name.clone()) {
                name = format!("{base}{suffix}");
                suffix += 1;
            }
            name
        })
        .collect()
}

fn pascal_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if upper {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
            upper = false;
        } else {
            upper = true;
        }
    }
    out
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistcall_core::{TypeHash, primitives};
    use pretty_assertions::assert_eq;

    fn planned(name: &str, rust_path: &str, kind: TypeKind) -> PlannedType {
        PlannedType {
            hash: TypeHash::from_name(name),
            name: name.to_string(),
            rust_path: rust_path.to_string(),
            kind,
        }
    }

    fn int() -> PlannedType {
        PlannedType {
            hash: primitives::INT32,
            name: "int".into(),
            rust_path: "i32".into(),
            kind: TypeKind::Primitive,
        }
    }

    fn sample_plan() -> UsagePlan {
        let celsius = planned("Celsius", "game::Celsius", TypeKind::Value);
        let fahrenheit = planned("Fahrenheit", "game::Fahrenheit", TypeKind::Value);
        let door = planned("Door", "game::Door", TypeKind::Reference);
        UsagePlan {
            conversions: vec![PlannedConversion {
                from: celsius.clone(),
                to: fahrenheit.clone(),
                operator: "to_fahrenheit".into(),
            }],
            holders: vec![int(), door.clone()],
            factories: vec![
                PlannedFactory { is_void: false, params: vec![int(), int()] },
                PlannedFactory { is_void: true, params: vec![door] },
                PlannedFactory { is_void: true, params: vec![] },
            ],
            warnings: vec![],
        }
    }

    #[test]
    fn module_lists_every_instantiation() {
        let config = AotConfig::default();
        let module = Emitter::new(&config).render_module(&sample_plan());

        assert!(module.starts_with(HEADER));
        assert!(module.contains("use persistcall::aot_support as aot;"));
        assert!(module.contains("pub struct ConvertCelsiusToFahrenheit;"));
        assert!(module.contains("        <game::Celsius>::to_fahrenheit(value)"));
        let register = "conversions.register_adapter::<ConvertCelsiusToFahrenheit>(types)?;";
        assert!(module.contains(register));
        assert!(module.contains("    instantiations.register_holder::<aot::Ref<game::Door>>();"));
        assert!(module.contains("    instantiations.register_factory::<(i32, i32), false>();"));
        let door_factory = "aot::InvocationFactory::<(aot::Ref<game::Door>,), true>::build;";
        assert!(module.contains(door_factory));
        assert!(module.contains("    let _ = aot::InvocationFactory::<(), true>::build;"));
        assert!(module.contains("    let _ = aot::ArgumentHolder::<i32>::hold;"));
    }

    #[test]
    fn empty_plan_renders_unused_parameters() {
        let config = AotConfig::default();
        let module = Emitter::new(&config).render_module(&UsagePlan::default());
        assert!(module.contains("    _types: &aot::TypeRegistry,"));
        assert!(module.contains("    _instantiations: &mut aot::InstantiationTable,"));
        assert!(module.contains("fn ensure_instantiations() {\n}\n"));
    }

    #[test]
    fn manifest_preserves_host_types_in_first_reference_order() {
        let config = AotConfig::default();
        let manifest = Emitter::new(&config).render_manifest(&sample_plan());
        assert_eq!(
            manifest,
            "preserve Celsius game::Celsius\n\
             preserve Fahrenheit game::Fahrenheit\n\
             preserve Door game::Door\n"
        );
    }

    #[test]
    fn adapter_names_are_unique() {
        let a = planned("ui.Color", "ui::Color", TypeKind::Value);
        let b = planned("ui_color", "ui::color::Color", TypeKind::Value);
        let to = planned("string", "String", TypeKind::Primitive);
        let conversions = vec![
            PlannedConversion { from: a, to: to.clone(), operator: "to_string".into() },
            PlannedConversion { from: b, to, operator: "to_string".into() },
        ];
        assert_eq!(
            adapter_names(&conversions),
            vec!["ConvertUiColorToString", "ConvertUiColorToString2"]
        );
    }

    #[test]
    fn emit_replaces_previous_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = AotConfig::default().with_output_dir(dir.path().join("aot"));
        let emitter = Emitter::new(&config);

        let report = emitter.emit(&sample_plan()).unwrap();
        assert_eq!(report.adapters, 1);
        assert_eq!(report.factories, 3);
        assert_eq!(report.preserved, 3);
        let first = fs::read(&report.module_path).unwrap();

        fs::write(config.output_dir.join("stale.rs"), "// old").unwrap();
        let again = emitter.emit(&sample_plan()).unwrap();
        assert_eq!(fs::read(&again.module_path).unwrap(), first);
        assert!(!config.output_dir.join("stale.rs").exists());

        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn invalid_module_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = AotConfig::default()
            .with_output_dir(dir.path().join("aot"))
            .with_module_name("level-bindings");
        assert!(matches!(
            Emitter::new(&config).emit(&UsagePlan::default()),
            Err(EmitError::InvalidModuleName(_))
        ));
    }

    #[test]
    fn unwritable_parent_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();
        let config = AotConfig::default().with_output_dir(blocker.join("aot"));

        match Emitter::new(&config).emit(&UsagePlan::default()) {
            Err(EmitError::Io { path, .. }) => assert_eq!(path, blocker),
            other => panic!("expected an io error, got {other:?}"),
        }
    }

    fn swap_dirs(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
        let output = dir.join("aot");
        let next = dir.join("next");
        fs::create_dir(&output).unwrap();
        fs::write(output.join("old.rs"), "// old").unwrap();
        fs::create_dir(&next).unwrap();
        (next, output, dir.join("previous"))
    }

    #[test]
    fn failed_swap_restores_previous_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let (next, output, previous) = swap_dirs(dir.path());

        let mut calls = 0;
        let result = swap_into_place(&next, &output, &previous, |from, to| {
            calls += 1;
            if calls == 2 {
                Err(io::Error::other("device busy"))
            } else {
                fs::rename(from, to)
            }
        });
        match result {
            Err(EmitError::Io { path, .. }) => assert_eq!(path, output),
            other => panic!("expected an io error, got {other:?}"),
        }
        assert!(output.join("old.rs").exists());
        assert!(!previous.exists());
    }

    #[test]
    fn failed_restore_reports_where_previous_artifacts_are() {
        let dir = tempfile::tempdir().unwrap();
        let (next, output, previous) = swap_dirs(dir.path());

        let mut calls = 0;
        let result = swap_into_place(&next, &output, &previous, |from, to| {
            calls += 1;
            if calls == 1 {
                fs::rename(from, to)
            } else {
                Err(io::Error::other("device busy"))
            }
        });
        match result {
            Err(EmitError::RestoreFailed { previous: kept, .. }) => assert_eq!(kept, previous),
            other => panic!("expected a restore failure, got {other:?}"),
        }
        assert!(previous.join("old.rs").exists());
        assert!(!output.exists());
    }
}
