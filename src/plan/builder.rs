// src/plan/builder.rs

//! Accumulates rule effects into plan steps
//!
//! Each effect kind has its own ordered slot table. A later effect with the
//! same key replaces the earlier one in place, so the step keeps the
//! position where its key first appeared.

use crate::error::{Error, Result};
use crate::formula::{Formula, PatchSource, Replacement};
use crate::plan::vars::Variables;
use crate::plan::{PlanStep, StepPayload};
use crate::platform::Arch;
use crate::rule::{flag_key, Effect, InvokeStep, Rule};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, trace};

/// Insertion-ordered table with last-write-wins replacement
#[derive(Debug)]
struct Slots<T> {
    entries: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> Slots<T> {
    /// Returns true when an earlier entry was replaced
    fn put(&mut self, key: String, value: T) -> bool {
        match self.index.get(&key) {
            Some(&i) => {
                self.entries[i] = value;
                true
            }
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(value);
                false
            }
        }
    }
}

/// Builds the step list for one resolution
#[derive(Debug)]
pub struct PlanBuilder<'a> {
    formula: &'a Formula,
    vars: Variables,
    build_archs: Vec<Arch>,
    dependencies: Slots<PlanStep>,
    patches: Slots<PlanStep>,
    env: Slots<PlanStep>,
    flags: Slots<PlanStep>,
    invokes: Slots<(String, InvokeStep)>,
    skipped: BTreeSet<String>,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(formula: &'a Formula, vars: Variables, build_archs: Vec<Arch>) -> Self {
        Self {
            formula,
            vars,
            build_archs,
            dependencies: Slots::default(),
            patches: Slots::default(),
            env: Slots::default(),
            flags: Slots::default(),
            invokes: Slots::default(),
            skipped: BTreeSet::new(),
        }
    }

    /// Apply the effect of a matched rule
    pub fn apply(&mut self, rule: &Rule) -> Result<()> {
        trace!("Applying rule {}", rule.id);
        let rule_id = rule.id.as_str();

        let replaced = match &rule.effect {
            Effect::AddDependency {
                name,
                constraint,
                tag,
            } => {
                let payload = StepPayload::Dependency {
                    name: name.clone(),
                    constraint: constraint.clone(),
                    tag: *tag,
                };
                let id = format!("dependency:{}", name);
                self.dependencies
                    .put(id.clone(), PlanStep::new(id, rule_id, payload))
            }
            Effect::AddConfigureFlag { flag } => {
                let flag = self.vars.expand(rule_id, flag)?;
                let id = format!("configure-flag:{}", flag_key(&flag));
                let payload = StepPayload::ConfigureFlag { flag };
                self.flags.put(id.clone(), PlanStep::new(id, rule_id, payload))
            }
            Effect::SelectPatch { id } => {
                let payload = self.patch_payload(rule_id, id)?;
                let step_id = format!("patch:{}", id);
                self.patches
                    .put(step_id.clone(), PlanStep::new(step_id, rule_id, payload))
            }
            Effect::SetEnv { key, value } => {
                let payload = StepPayload::EnvSet {
                    key: key.clone(),
                    value: self.vars.expand(rule_id, value)?,
                };
                let id = format!("env:{}", key);
                self.env.put(id.clone(), PlanStep::new(id, rule_id, payload))
            }
            Effect::SkipStep { step } => !self.skipped.insert(step.clone()),
            Effect::Invoke(step) => self
                .invokes
                .put(step.id.clone(), (rule_id.to_string(), step.clone())),
        };

        if replaced {
            debug!("Rule {} overrides an earlier {:?}", rule.id, rule.effect.key());
        }
        Ok(())
    }

    fn patch_payload(&self, rule: &str, id: &str) -> Result<StepPayload> {
        let info = self
            .formula
            .patch(id)
            .ok_or_else(|| Error::rule(rule, format!("unknown patch '{}'", id)))?;
        let source = info
            .source()
            .map_err(|e| Error::rule(rule, format!("patch '{}': {}", id, e)))?;

        let source = match source {
            PatchSource::Remote {
                url,
                checksum,
                strip,
            } => PatchSource::Remote {
                url: self.vars.expand(rule, &url)?,
                checksum,
                strip,
            },
            PatchSource::Bundled { file, strip } => PatchSource::Bundled {
                file: self.vars.expand(rule, &file)?,
                strip,
            },
            PatchSource::Substitute { replacements } => PatchSource::Substitute {
                replacements: replacements
                    .into_iter()
                    .map(|r| -> Result<Replacement> {
                        // Patterns are taken verbatim so values never need escaping
                        let from = if r.regex {
                            r.from
                        } else {
                            self.vars.expand(rule, &r.from)?
                        };
                        Ok(Replacement {
                            from,
                            to: self.vars.expand(rule, &r.to)?,
                            regex: r.regex,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
            },
        };

        Ok(StepPayload::Patch {
            id: id.to_string(),
            targets: self.vars.expand_all(rule, &info.targets)?,
            source,
        })
    }

    fn is_skipped(&self, id: &str) -> bool {
        self.skipped.contains(id)
            || id
                .split_once('@')
                .is_some_and(|(base, _)| self.skipped.contains(base))
    }

    /// Assemble the final step list
    ///
    /// Order: dependencies, patches, environment, configure flags, then
    /// invocations by phase. Runs of consecutive per-architecture steps in
    /// one phase are repeated for each built architecture in turn.
    pub fn finish(mut self) -> Result<Vec<PlanStep>> {
        let primary = self.build_archs.first().copied().ok_or_else(|| {
            Error::UnsupportedPlatform("no architecture to build for".to_string())
        })?;

        let mut steps: Vec<PlanStep> = Vec::new();
        for table in [
            std::mem::take(&mut self.dependencies),
            std::mem::take(&mut self.patches),
            std::mem::take(&mut self.env),
            std::mem::take(&mut self.flags),
        ] {
            steps.extend(table.entries.into_iter().filter(|s| !self.is_skipped(&s.id)));
        }

        let flags: Vec<String> = steps
            .iter()
            .filter_map(|s| match &s.payload {
                StepPayload::ConfigureFlag { flag } => Some(flag.clone()),
                _ => None,
            })
            .collect();

        let mut invokes = std::mem::take(&mut self.invokes).entries;
        invokes.sort_by_key(|(_, step)| step.phase);

        let mut i = 0;
        while i < invokes.len() {
            let (rule, step) = &invokes[i];
            if !step.per_arch {
                let arch = step.primary_arch_only.then_some(primary);
                if !self.is_skipped(&step.id) {
                    steps.push(self.invoke(rule, step, step.id.clone(), arch, primary, &flags)?);
                }
                i += 1;
                continue;
            }

            let end = invokes[i..]
                .iter()
                .position(|(_, s)| !s.per_arch || s.phase != step.phase)
                .map_or(invokes.len(), |n| i + n);

            for &arch in &self.build_archs {
                for (rule, step) in &invokes[i..end] {
                    if step.primary_arch_only && arch != primary {
                        continue;
                    }
                    let id = format!("{}@{}", step.id, arch);
                    if self.is_skipped(&id) {
                        continue;
                    }
                    let mut planned = self.invoke(rule, step, id, Some(arch), primary, &flags)?;
                    planned.parallelizable = self.build_archs.len() > 1;
                    steps.push(planned);
                }
            }
            i = end;
        }

        Ok(steps)
    }

    fn invoke(
        &self,
        rule: &str,
        step: &InvokeStep,
        id: String,
        arch: Option<Arch>,
        primary: Arch,
        flags: &[String],
    ) -> Result<PlanStep> {
        let target = arch.unwrap_or(primary);
        let vars = self.vars.for_arch(target);

        let mut argv = vars.expand_all(rule, &step.args)?;
        if step.configure {
            argv.extend(flags.iter().cloned());
        }

        let uses_arch_args = !step.arch_args.is_empty();
        if uses_arch_args {
            let extra = step.arch_args.get(&target.to_string()).ok_or_else(|| {
                Error::UnsupportedPlatform(format!(
                    "step '{}' has no arguments for architecture {}",
                    step.id, target
                ))
            })?;
            argv.extend(vars.expand_all(rule, extra)?);
        }

        let workdir = step
            .workdir
            .as_deref()
            .map(|w| vars.expand(rule, w))
            .transpose()?;

        Ok(PlanStep::new(
            id,
            rule,
            StepPayload::Invoke {
                program: vars.expand(rule, &step.program)?,
                argv,
                phase: step.phase,
                arch: arch.or(uses_arch_args.then_some(target)),
                resource: step.resource.clone(),
                workdir,
            },
        ))
    }
}
