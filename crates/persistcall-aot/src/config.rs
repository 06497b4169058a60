//! Pipeline configuration.

use std::path::{Path, PathBuf};

/// Where and how the companion module is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AotConfig {
    /// Directory holding every generated artifact. Replaced wholesale on
    /// each emit.
    pub output_dir: PathBuf,
    /// Name of the generated module, without extension.
    pub module_name: String,
    /// File name of the preserve manifest.
    pub manifest_name: String,
    /// Path generated code imports the runtime support items from.
    pub runtime_path: String,
}

impl Default for AotConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("generated/persistcall"),
            module_name: "persistcall_aot".to_string(),
            manifest_name: "preserve.txt".to_string(),
            runtime_path: "persistcall::aot_support".to_string(),
        }
    }
}

impl AotConfig {
    /// Create a config with the default locations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the directory the artifacts are written to.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the generated module's name. Must be a Rust identifier.
    pub fn with_module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = name.into();
        self
    }

    /// Set the preserve manifest's file name.
    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    /// Set the path generated code imports support items from, e.g.
    /// `crate::persistcall::aot_support` when the runtime is re-exported.
    pub fn with_runtime_path(mut self, path: impl Into<String>) -> Self {
        self.runtime_path = path.into();
        self
    }

    /// `<output_dir>/<module_name>.rs`
    pub fn module_path(&self) -> PathBuf {
        self.output_dir.join(self.module_file_name())
    }

    /// `<output_dir>/<manifest_name>`
    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join(&self.manifest_name)
    }

    pub(crate) fn module_file_name(&self) -> String {
        format!("{}.rs", self.module_name)
    }

    pub(crate) fn output_parent(&self) -> &Path {
        match self.output_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_paths_follow_the_output_dir() {
        let config = AotConfig::new()
            .with_output_dir("build/aot")
            .with_module_name("level_bindings");
        assert_eq!(config.module_path(), PathBuf::from("build/aot/level_bindings.rs"));
        assert_eq!(config.manifest_path(), PathBuf::from("build/aot/preserve.txt"));
        assert_eq!(config.output_parent(), Path::new("build"));
        assert_eq!(AotConfig::new().with_output_dir("aot").output_parent(), Path::new("."));
    }
}
