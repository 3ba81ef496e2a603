// src/commands/run.rs

//! Run command - resolve a plan and hand it to an executor

use super::Session;
use crate::cli::ResolveArgs;
use anyhow::{Context, Result};
use formulary::{run_plan, DryRunExecutor, ExecutionReport, ProcessExecutor, StepResult};
use std::path::PathBuf;
use tracing::info;

pub fn cmd_run(session: &Session, args: &ResolveArgs, dry_run: bool, workdir: Option<PathBuf>) -> Result<()> {
    let loaded = session.load(&args.formula)?;
    let plan = session.resolve(&loaded, &args.options, args.platform.as_deref())?;
    let name = format!("{} {}", plan.formula(), plan.version());

    if dry_run {
        println!("Dry run for {}", name);
        let mut executor = DryRunExecutor::new();
        let report = run_plan(plan, &mut executor);
        for line in executor.lines() {
            println!("  {}", line);
        }
        return finish(report, &name);
    }

    let workdir = match workdir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine the current directory")?,
    };
    info!("Building {} in {}", name, workdir.display());

    let scratch = tempfile::tempdir().context("Failed to create a patch directory")?;
    let patch_dir = loaded.patch_dir(scratch.path())?;

    let mut executor = ProcessExecutor::new(workdir, patch_dir);
    let report = run_plan(plan, &mut executor);

    for record in &report.records {
        match &record.result {
            StepResult::Succeeded => println!("  [ok]   {}", record.id),
            StepResult::Skipped(reason) => println!("  [skip] {} ({})", record.id, reason),
            StepResult::Failed(reason) => println!("  [FAIL] {}: {}", record.id, reason),
        }
    }

    finish(report, &name)
}

fn finish(report: ExecutionReport, name: &str) -> Result<()> {
    if report.not_run > 0 {
        println!("{} step(s) not run", report.not_run);
    }

    report
        .into_result()
        .with_context(|| format!("Build of {} failed", name))?;

    println!("[COMPLETE] {}", name);
    Ok(())
}
