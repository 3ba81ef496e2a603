// src/executor/process.rs

//! Executor that runs plan steps on the host

use crate::executor::{PlanExecutor, StepContext, StepResult};
use crate::formula::{PatchSource, Replacement};
use crate::plan::{PlanStep, StepPayload};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Runs invocations with `std::process::Command` inside a source tree
///
/// Staged resources are expected in a directory of the same name below the
/// source tree. Bundled and downloaded diffs are looked up in `patch_dir`.
#[derive(Debug)]
pub struct ProcessExecutor {
    workdir: PathBuf,
    patch_dir: PathBuf,
    env: BTreeMap<String, String>,
}

impl ProcessExecutor {
    pub fn new(workdir: impl Into<PathBuf>, patch_dir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            patch_dir: patch_dir.into(),
            env: BTreeMap::new(),
        }
    }

    /// Environment overrides applied so far
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workdir.join(path)
        }
    }

    fn check_dependency(&self, name: &str) -> StepResult {
        match which::which(name) {
            Ok(path) => {
                debug!("Dependency {} found at {}", name, path.display());
                StepResult::Succeeded
            }
            Err(_) => StepResult::Skipped(format!(
                "{} not on PATH, assumed provided by the caller",
                name
            )),
        }
    }

    /// Rewrite every target, or none of them
    fn substitute(&self, targets: &[String], replacements: &[Replacement]) -> StepResult {
        let mut rewritten = Vec::with_capacity(targets.len());
        for target in targets {
            let path = self.resolve(target);
            match Self::rewrite(&path, replacements) {
                Ok(updated) => rewritten.push((path, updated)),
                Err(reason) => return StepResult::Failed(reason),
            }
        }

        for (path, updated) in rewritten {
            if let Err(e) = std::fs::write(&path, updated) {
                return StepResult::Failed(format!("Failed to write {}: {}", path.display(), e));
            }
        }
        StepResult::Succeeded
    }

    fn rewrite(path: &Path, replacements: &[Replacement]) -> Result<String, String> {
        let mut updated = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

        for r in replacements {
            let (found, next) = if r.regex {
                let re = Regex::new(&r.from).map_err(|e| format!("Invalid pattern {}: {}", r.from, e))?;
                (
                    re.is_match(&updated),
                    re.replace_all(&updated, regex::NoExpand(&r.to)).into_owned(),
                )
            } else {
                (updated.contains(&r.from), updated.replace(&r.from, &r.to))
            };
            if !found {
                return Err(format!("'{}' not found in {}", r.from, path.display()));
            }
            updated = next;
        }
        Ok(updated)
    }

    fn apply_diff(&self, diff: &Path, strip: u32) -> StepResult {
        if !diff.is_file() {
            return StepResult::Failed(format!("Patch file {} not found", diff.display()));
        }

        let output = Command::new("patch")
            .arg(format!("-p{}", strip))
            .arg("-i")
            .arg(diff)
            .current_dir(&self.workdir)
            .output();

        match output {
            Ok(out) if out.status.success() => StepResult::Succeeded,
            Ok(out) => StepResult::Failed(format!(
                "Failed to apply patch: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            )),
            Err(e) => StepResult::Failed(format!("patch failed: {}", e)),
        }
    }

    fn run(
        &self,
        program: &str,
        argv: &[String],
        resource: Option<&str>,
        workdir: Option<&str>,
    ) -> StepResult {
        let mut dir = self.workdir.clone();
        if let Some(resource) = resource {
            dir.push(resource);
        }
        if let Some(sub) = workdir {
            dir.push(sub);
        }

        debug!("Command: {} {} (in {})", program, argv.join(" "), dir.display());
        let output = Command::new(program)
            .args(argv)
            .current_dir(&dir)
            .envs(&self.env)
            .output();

        match output {
            Ok(out) if out.status.success() => StepResult::Succeeded,
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
                let tail: Vec<&str> = tail.into_iter().rev().collect();
                StepResult::Failed(format!("{} exited with {}: {}", program, out.status, tail.join("\n")))
            }
            Err(e) => StepResult::Failed(format!("Failed to run {}: {}", program, e)),
        }
    }
}

impl PlanExecutor for ProcessExecutor {
    fn execute(&mut self, step: &PlanStep, ctx: &StepContext<'_>) -> StepResult {
        info!("[{}/{}] {}", ctx.index + 1, ctx.total, step);

        match &step.payload {
            StepPayload::Dependency { name, .. } => self.check_dependency(name),
            StepPayload::ConfigureFlag { .. } => StepResult::Skipped("passed to configure".to_string()),
            StepPayload::EnvSet { key, value } => {
                self.env.insert(key.clone(), value.clone());
                StepResult::Succeeded
            }
            StepPayload::Patch { targets, source, .. } => match source {
                PatchSource::Substitute { replacements } => self.substitute(targets, replacements),
                PatchSource::Bundled { file, strip } => self.apply_diff(&self.patch_dir.join(file), *strip),
                PatchSource::Remote { url, strip, .. } => {
                    let name = url.rsplit('/').next().unwrap_or(url);
                    let local = self.patch_dir.join(name);
                    if local.is_file() {
                        self.apply_diff(&local, *strip)
                    } else {
                        StepResult::Failed(format!("Remote patch {} has not been downloaded", url))
                    }
                }
            },
            StepPayload::Invoke {
                program,
                argv,
                resource,
                workdir,
                ..
            } => self.run(program, argv, resource.as_deref(), workdir.as_deref()),
        }
    }
}
