// src/plan/mod.rs

//! Build plans
//!
//! A [`BuildPlan`] is the ordered, immutable output of resolving a formula
//! for one option set and platform. Executors receive it by value and walk
//! its steps in order.

mod builder;
mod resolver;
mod vars;

pub use builder::PlanBuilder;
pub use resolver::{resolve_plan, PlanResolver, ResolverState};
pub use vars::{arch_flags, archdir, Variables};

use crate::error::{Error, Result};
use crate::formula::PatchSource;
use crate::option::OptionSet;
use crate::platform::{Arch, CompilerId, PlatformDescriptor};
use crate::rule::{DependencyTag, Phase};
use serde::Serialize;
use std::fmt;
use strum_macros::{Display, EnumString};

/// Kind of a plan step, as written in plan output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    Dependency,
    ConfigureFlag,
    Patch,
    EnvSet,
    Invoke,
}

/// What a step does
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum StepPayload {
    Dependency {
        name: String,
        constraint: Option<String>,
        tag: DependencyTag,
    },
    ConfigureFlag {
        flag: String,
    },
    Patch {
        id: String,
        targets: Vec<String>,
        source: PatchSource,
    },
    EnvSet {
        key: String,
        value: String,
    },
    Invoke {
        program: String,
        argv: Vec<String>,
        phase: Phase,
        arch: Option<Arch>,
        resource: Option<String>,
        workdir: Option<String>,
    },
}

impl StepPayload {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::Dependency { .. } => StepKind::Dependency,
            Self::ConfigureFlag { .. } => StepKind::ConfigureFlag,
            Self::Patch { .. } => StepKind::Patch,
            Self::EnvSet { .. } => StepKind::EnvSet,
            Self::Invoke { .. } => StepKind::Invoke,
        }
    }
}

/// One resolved step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub id: String,
    /// Rule that produced the step
    pub rule: String,
    #[serde(flatten)]
    pub payload: StepPayload,
    pub parallelizable: bool,
}

impl PlanStep {
    pub fn new(id: impl Into<String>, rule: impl Into<String>, payload: StepPayload) -> Self {
        Self {
            id: id.into(),
            rule: rule.into(),
            payload,
            parallelizable: false,
        }
    }

    pub fn kind(&self) -> StepKind {
        self.payload.kind()
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            StepPayload::Dependency { name, constraint, tag } => {
                write!(f, "depends on {} ({})", name, tag)?;
                if let Some(c) = constraint {
                    write!(f, " [{}]", c)?;
                }
                Ok(())
            }
            StepPayload::ConfigureFlag { flag } => write!(f, "configure flag {}", flag),
            StepPayload::Patch { id, source, .. } => match source {
                PatchSource::Remote { url, strip, .. } => write!(f, "patch {} -p{} from {}", id, strip, url),
                PatchSource::Bundled { file, strip } => write!(f, "patch {} -p{} from {}", id, strip, file),
                PatchSource::Substitute { replacements } => {
                    write!(f, "patch {} ({} substitutions)", id, replacements.len())
                }
            },
            StepPayload::EnvSet { key, value } => write!(f, "set {}={}", key, value),
            StepPayload::Invoke {
                program,
                argv,
                phase,
                resource,
                ..
            } => {
                write!(f, "[{}] ", phase)?;
                if let Some(r) = resource {
                    write!(f, "(in {}) ", r)?;
                }
                write!(f, "{}", program)?;
                for arg in argv {
                    write!(f, " {}", arg)?;
                }
                Ok(())
            }
        }
    }
}

/// An immutable, ordered build plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    formula: String,
    version: String,
    platform: PlatformDescriptor,
    compiler: CompilerId,
    architectures: Vec<Arch>,
    options: OptionSet,
    steps: Vec<PlanStep>,
}

impl BuildPlan {
    pub(crate) fn new(
        formula: String,
        version: String,
        platform: PlatformDescriptor,
        compiler: CompilerId,
        architectures: Vec<Arch>,
        options: OptionSet,
        steps: Vec<PlanStep>,
    ) -> Self {
        Self {
            formula,
            version,
            platform,
            compiler,
            architectures,
            options,
            steps,
        }
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn platform(&self) -> &PlatformDescriptor {
        &self.platform
    }

    /// Compiler after `fails_with` fallback
    pub fn compiler(&self) -> CompilerId {
        self.compiler
    }

    /// Architectures being built, primary first
    pub fn architectures(&self) -> &[Arch] {
        &self.architectures
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Dependency step by dependency name
    pub fn dependency(&self, name: &str) -> Option<&PlanStep> {
        self.steps.iter().find(
            |s| matches!(&s.payload, StepPayload::Dependency { name: n, .. } if n == name),
        )
    }

    pub fn has_dependency(&self, name: &str) -> bool {
        self.dependency(name).is_some()
    }

    /// Configure flags in plan order
    pub fn configure_flags(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|s| match &s.payload {
                StepPayload::ConfigureFlag { flag } => Some(flag.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Selected patch ids in plan order
    pub fn patches(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|s| match &s.payload {
                StepPayload::Patch { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn into_steps(self) -> Vec<PlanStep> {
        self.steps
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::ParseError(format!("Failed to serialize plan: {}", e)))
    }
}

impl fmt::Display for BuildPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {} for {}", self.formula, self.version, self.platform)?;
        let archs: Vec<String> = self.architectures.iter().map(|a| a.to_string()).collect();
        writeln!(f, "compiler: {}  architectures: {}", self.compiler, archs.join(" "))?;
        let enabled = self.options.enabled();
        if !enabled.is_empty() {
            writeln!(f, "options: {}", enabled.join(" "))?;
        }
        for (i, step) in self.steps.iter().enumerate() {
            write!(f, "{:>3}. {}", i + 1, step)?;
            if step.parallelizable {
                write!(f, "  (parallel)")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
