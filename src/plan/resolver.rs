// src/plan/resolver.rs

//! Plan resolution
//!
//! A [`PlanResolver`] turns one option request and one platform into a
//! [`BuildPlan`]. It is single use:
//!
//! ```text
//! Idle -> Resolving -> Resolved
//!                   -> Failed
//! ```
//!
//! Both end states are terminal; calling `resolve` again reports
//! [`Error::ResolverReused`].

use crate::config::Layout;
use crate::error::{Error, Result};
use crate::formula::Formula;
use crate::option::OptionSet;
use crate::plan::builder::PlanBuilder;
use crate::plan::vars::Variables;
use crate::plan::BuildPlan;
use crate::platform::{Arch, CompilerId, PlatformDescriptor};
use crate::rule::{self, EvalContext};
use tracing::{debug, info, warn};

/// Lifecycle of a resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverState {
    /// Created, nothing evaluated yet
    Idle,
    /// Evaluation in progress
    Resolving,
    /// A plan was produced
    Resolved,
    /// Resolution stopped at this error
    Failed(Error),
}

impl ResolverState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Failed(_))
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Resolved => "resolved",
            Self::Failed(_) => "failed",
        }
    }
}

/// Resolves one formula into one plan
#[derive(Debug)]
pub struct PlanResolver<'a> {
    formula: &'a Formula,
    layout: Layout,
    state: ResolverState,
}

impl<'a> PlanResolver<'a> {
    pub fn new(formula: &'a Formula, layout: Layout) -> Self {
        Self {
            formula,
            layout,
            state: ResolverState::Idle,
        }
    }

    pub fn state(&self) -> &ResolverState {
        &self.state
    }

    /// Resolve the plan for an option request on a platform
    pub fn resolve<S: AsRef<str>>(&mut self, requested: &[S], platform: PlatformDescriptor) -> Result<BuildPlan> {
        if self.state != ResolverState::Idle {
            return Err(Error::ResolverReused(self.state.name().to_string()));
        }

        self.state = ResolverState::Resolving;
        debug!("Resolving {} for {}", self.formula.name(), platform);

        match self.run(requested, platform) {
            Ok(plan) => {
                info!(
                    "Resolved {} {}: {} steps",
                    plan.formula(),
                    plan.version(),
                    plan.len()
                );
                self.state = ResolverState::Resolved;
                Ok(plan)
            }
            Err(e) => {
                warn!("Resolution of {} failed: {}", self.formula.name(), e);
                self.state = ResolverState::Failed(e.clone());
                Err(e)
            }
        }
    }

    fn run<S: AsRef<str>>(&self, requested: &[S], platform: PlatformDescriptor) -> Result<BuildPlan> {
        let formula = self.formula;

        let options = OptionSet::resolve(requested, &formula.options)?;
        options.check_platform(&formula.options, &platform)?;
        self.check_requirements(&platform)?;

        let compiler = CompilerId::select(platform.compiler(), &formula.requirements.fails_with)?;
        let build_archs = self.build_archs(&options, &platform)?;
        debug!(
            "Building with {} for {:?}",
            compiler, build_archs
        );

        let ctx = EvalContext {
            options: &options,
            platform: &platform,
            build_archs: &build_archs,
            compiler,
        };
        let matched = rule::evaluate(&formula.rules, &ctx)?;

        let vars = Variables::new(formula, &self.layout, compiler, &build_archs)?;
        let mut builder = PlanBuilder::new(formula, vars, build_archs.clone());
        for r in matched {
            builder.apply(r)?;
        }
        let steps = builder.finish()?;

        Ok(BuildPlan::new(
            formula.name().to_string(),
            formula.pkg_version(),
            platform,
            compiler,
            build_archs,
            options,
            steps,
        ))
    }

    fn check_requirements(&self, platform: &PlatformDescriptor) -> Result<()> {
        let req = &self.formula.requirements;

        if let Some(min) = req.min_os {
            if platform.os_version() < min {
                return Err(Error::UnsupportedPlatform(format!(
                    "{} requires {} or newer, platform is {}",
                    self.formula.name(),
                    min,
                    platform.os_version()
                )));
            }
        }

        if !req.archs.is_empty() && !req.archs.contains(&platform.primary()) {
            return Err(Error::UnsupportedPlatform(format!(
                "{} does not support {}",
                self.formula.name(),
                platform.primary()
            )));
        }

        Ok(())
    }

    /// Every supported platform architecture for multi-architecture options,
    /// else the primary one
    ///
    /// A multi-architecture option still needs two architectures after the
    /// formula's architecture filter.
    fn build_archs(&self, options: &OptionSet, platform: &PlatformDescriptor) -> Result<Vec<Arch>> {
        let multi = self
            .formula
            .options
            .declare
            .iter()
            .find(|d| d.requires_multi_arch && options.is_enabled(&d.name));

        let Some(decl) = multi else {
            return Ok(vec![platform.primary()]);
        };

        let supported = &self.formula.requirements.archs;
        let archs: Vec<Arch> = platform
            .architectures()
            .iter()
            .copied()
            .filter(|a| supported.is_empty() || supported.contains(a))
            .collect();

        if archs.len() < 2 {
            let names: Vec<String> = archs.iter().map(|a| a.to_string()).collect();
            return Err(Error::ConflictingOptions {
                first: decl.name.clone(),
                second: format!("arch={}", names.join(",")),
                reason: "option requires more than one supported architecture".to_string(),
            });
        }

        Ok(archs)
    }
}

/// Resolve in one call with a fresh resolver
pub fn resolve_plan<S: AsRef<str>>(
    formula: &Formula,
    layout: Layout,
    requested: &[S],
    platform: PlatformDescriptor,
) -> Result<BuildPlan> {
    PlanResolver::new(formula, layout).resolve(requested, platform)
}
