// src/executor/mod.rs

//! Plan execution
//!
//! Executors consume a resolved [`BuildPlan`] one step at a time. The run
//! stops at the first failed step and nothing is retried.

mod process;

pub use process::ProcessExecutor;

use crate::error::{Error, Result};
use crate::plan::{BuildPlan, PlanStep, StepKind};
use tracing::{info, warn};

/// Outcome of a single step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    Succeeded,
    /// Nothing to do for this step, with the reason
    Skipped(String),
    Failed(String),
}

impl StepResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Where a step sits in the plan being run
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub formula: &'a str,
    pub version: &'a str,
    /// Zero-based position in the plan
    pub index: usize,
    pub total: usize,
}

/// Something that can carry out plan steps
pub trait PlanExecutor {
    fn execute(&mut self, step: &PlanStep, ctx: &StepContext<'_>) -> StepResult;
}

/// What happened to one step of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub id: String,
    pub kind: StepKind,
    pub result: StepResult,
}

/// Summary of a plan run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub formula: String,
    pub records: Vec<StepRecord>,
    /// Steps never attempted because an earlier one failed
    pub not_run: usize,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        !self.records.iter().any(|r| r.result.is_failure())
    }

    /// The failed step, if any
    pub fn failure(&self) -> Option<&StepRecord> {
        self.records.iter().find(|r| r.result.is_failure())
    }

    pub fn count(&self, pred: impl Fn(&StepResult) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.result)).count()
    }

    /// Turn a failed run into [`Error::StepFailed`]
    pub fn into_result(self) -> Result<()> {
        match self.failure() {
            Some(StepRecord {
                id,
                result: StepResult::Failed(reason),
                ..
            }) => Err(Error::StepFailed {
                step: id.clone(),
                reason: reason.clone(),
            }),
            _ => Ok(()),
        }
    }
}

/// Run every step of a plan in order, stopping at the first failure
pub fn run_plan(plan: BuildPlan, executor: &mut dyn PlanExecutor) -> ExecutionReport {
    let formula = plan.formula().to_string();
    let version = plan.version().to_string();
    let steps = plan.into_steps();
    let total = steps.len();

    info!("Running {} steps for {} {}", total, formula, version);

    let mut records = Vec::with_capacity(total);
    for (index, step) in steps.iter().enumerate() {
        let ctx = StepContext {
            formula: &formula,
            version: &version,
            index,
            total,
        };
        let result = executor.execute(step, &ctx);
        let failed = result.is_failure();
        if let StepResult::Failed(reason) = &result {
            warn!("Step {} failed: {}", step.id, reason);
        }
        records.push(StepRecord {
            id: step.id.clone(),
            kind: step.kind(),
            result,
        });
        if failed {
            break;
        }
    }

    let not_run = total - records.len();
    ExecutionReport {
        formula,
        records,
        not_run,
    }
}

/// Logs each step without touching the system
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    lines: Vec<String>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// One line per executed step, in order
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl PlanExecutor for DryRunExecutor {
    fn execute(&mut self, step: &PlanStep, ctx: &StepContext<'_>) -> StepResult {
        let line = format!("[{}/{}] {}", ctx.index + 1, ctx.total, step);
        info!("{}", line);
        self.lines.push(line);
        StepResult::Succeeded
    }
}
