//! Build pipeline error types.
//!
//! Unlike listener invocation, nothing here is recovered: scan and emit
//! failures surface to the build step that ran the pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::PlanWarning;

/// Failure while walking the object source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// The source could not produce an object.
    #[error("object source failed: {0}")]
    Source(String),

    /// The source yielded the same object twice.
    #[error("object '{0}' was yielded more than once")]
    DuplicateObject(String),
}

/// Failure writing the companion module.
#[derive(Debug, Error)]
pub enum EmitError {
    /// A filesystem operation failed.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Replacing the output failed and the previous artifacts could not be
    /// moved back. They are left at `previous`.
    #[error(
        "failed to replace {}, previous artifacts kept at {}: {source}",
        output.display(),
        previous.display()
    )]
    RestoreFailed {
        output: PathBuf,
        previous: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configured module name is not a Rust identifier.
    #[error("invalid module name '{0}'")]
    InvalidModuleName(String),
}

impl EmitError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| EmitError::Io { path, source }
    }
}

/// Failure of a pipeline build hook.
#[derive(Debug, Error)]
pub enum AotError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Emit(#[from] EmitError),

    /// Generated code would miss instantiations some listeners need.
    #[error("companion module would be incomplete: {}", join(.0))]
    IncompletePlan(Vec<PlanWarning>),
}

fn join(warnings: &[PlanWarning]) -> String {
    let rendered: Vec<_> = warnings.iter().map(ToString::to_string).collect();
    rendered.join("; ")
}
