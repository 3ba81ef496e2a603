// src/commands/mod.rs
//! Command handlers for the formulary CLI

mod info;
mod list;
mod resolve;
mod run;
mod validate;

pub use info::{cmd_info, cmd_options};
pub use list::cmd_list;
pub use resolve::cmd_resolve;
pub use run::cmd_run;
pub use validate::cmd_validate;

use anyhow::{Context, Result};
use formulary::{BuildPlan, Config, FormulaCatalog, LoadedFormula, PlanResolver, PlatformDescriptor};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration and formula lookup shared by all commands
pub struct Session {
    pub config: Config,
    pub catalog: FormulaCatalog,
}

impl Session {
    pub fn open(config_path: Option<&Path>, root: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::discover(config_path).context("Failed to load configuration")?;
        if let Some(root) = root {
            debug!("Root overridden to {}", root.display());
            config.root = root;
        }
        let catalog = FormulaCatalog::new(config.formula_dirs.clone());
        Ok(Self { config, catalog })
    }

    pub fn load(&self, name: &str) -> Result<LoadedFormula> {
        self.catalog
            .load(name)
            .with_context(|| format!("Failed to load formula {}", name))
    }

    /// Resolve a plan for a loaded formula
    pub fn resolve(&self, loaded: &LoadedFormula, options: &[String], platform: Option<&str>) -> Result<BuildPlan> {
        let platform = target_platform(platform)?;
        let layout = self.config.layout(&loaded.formula);
        let plan = PlanResolver::new(&loaded.formula, layout)
            .resolve(options, platform)
            .with_context(|| format!("Failed to resolve {}", loaded.formula.name()))?;
        Ok(plan)
    }
}

/// Platform from an override string, or the host when none is given
fn target_platform(spec: Option<&str>) -> Result<PlatformDescriptor> {
    match spec {
        Some(spec) => PlatformDescriptor::from_override(spec)
            .with_context(|| format!("Invalid platform '{}'", spec)),
        None => PlatformDescriptor::detect()
            .context("Failed to detect the host platform; pass --platform"),
    }
}
