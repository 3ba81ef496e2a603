// tests/common/mod.rs

//! Shared helpers for integration tests.

#![allow(dead_code)]

use formulary::{
    resolve_plan, BuildPlan, Formula, FormulaCatalog, Layout, PlatformDescriptor, Result,
};

/// Load one of the formulas shipped with the crate.
pub fn builtin(name: &str) -> Formula {
    FormulaCatalog::default().load(name).unwrap().formula
}

/// Standard layout rooted at /usr/local for the given formula.
pub fn layout(formula: &Formula) -> Layout {
    Layout::new(
        "/usr/local",
        format!("/usr/local/Cellar/{}/{}", formula.name(), formula.pkg_version()),
    )
}

pub fn platform(spec: &str) -> PlatformDescriptor {
    PlatformDescriptor::from_override(spec).unwrap()
}

/// Resolve a builtin formula against a platform override.
pub fn resolve(name: &str, options: &[&str], spec: &str) -> Result<BuildPlan> {
    let formula = builtin(name);
    resolve_plan(&formula, layout(&formula), options, platform(spec))
}

/// Step ids in plan order.
pub fn ids(plan: &BuildPlan) -> Vec<&str> {
    plan.steps().iter().map(|s| s.id.as_str()).collect()
}
