// src/lib.rs

//! Formulary build plan resolver
//!
//! Turns a formula, a set of requested options and a target platform into a
//! deterministic, ordered build plan before anything is executed.
//!
//! # Architecture
//!
//! - Options: validated build toggles with aliases and exclusions
//! - Platform: OS release, ordered architecture set and compiler
//! - Rules: `(predicate -> effect)` table evaluated in one pass
//! - Plans: immutable step lists with last-write-wins effect merging
//! - Executors: consume a plan step by step, stopping at the first failure

pub mod config;
mod error;
pub mod executor;
pub mod formula;
pub mod option;
pub mod plan;
pub mod platform;
pub mod rule;

pub use config::{Config, Layout};
pub use error::{Error, Result};
pub use executor::{
    run_plan, DryRunExecutor, ExecutionReport, PlanExecutor, ProcessExecutor, StepContext,
    StepRecord, StepResult,
};
pub use formula::{Formula, FormulaCatalog, LoadedFormula};
pub use option::{OptionRequest, OptionSet, OptionTable, Toggle};
pub use plan::{resolve_plan, BuildPlan, PlanResolver, PlanStep, ResolverState, StepKind, StepPayload};
pub use platform::{Arch, CompilerId, OsVersion, PlatformDescriptor};
pub use rule::{Effect, Predicate, Rule};
