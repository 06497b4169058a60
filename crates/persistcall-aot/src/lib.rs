//! Ahead-of-time instantiation planning for restricted targets.
//!
//! A restricted target cannot build generic instantiations at run time, so
//! everything the persisted listeners of a project will need is worked out
//! at build time:
//!
//! ```text
//! ObjectSource ──scan──▶ ScanRecord* ──plan──▶ UsagePlan ──emit──▶ <module>.rs
//!                                                              └──▶ preserve.txt
//! ```
//!
//! The generated module's `register` function is handed to
//! `ListenerRuntime::install` when the restricted build starts.
//! [`AotPipeline`] wires the three steps to the host's build hooks.

mod config;
mod emitter;
mod error;
mod pipeline;
mod planner;
mod scanner;

pub use config::AotConfig;
pub use emitter::{EmitReport, Emitter, emit};
pub use error::{AotError, EmitError, ScanError};
pub use pipeline::{AotPipeline, BuildTarget, PipelineOutput};
pub use planner::{
    PlanWarning, PlannedConversion, PlannedFactory, PlannedType, Planner, UsagePlan, plan,
};
pub use scanner::{
    BindingKind, FieldVisitor, Mismatch, ObjectSource, OutOfRange, Persistable, Scan, ScanRecord,
    ScannedArgument, SourceObject, scan,
};
