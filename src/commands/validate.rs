// src/commands/validate.rs

//! Validate command - check a formula file

use anyhow::{Context, Result};
use formulary::formula::{parse_formula_file, validate_formula};
use std::path::Path;

pub fn cmd_validate(path: &Path) -> Result<()> {
    println!("Reading formula: {}", path.display());
    let formula = parse_formula_file(path)
        .with_context(|| format!("Failed to parse formula: {}", path.display()))?;

    println!("Formula: {} version {}", formula.name(), formula.pkg_version());

    let warnings = validate_formula(&formula).with_context(|| "Formula validation failed")?;
    for warning in &warnings {
        println!("Warning: {}", warning);
    }

    if warnings.is_empty() {
        println!("[OK] No issues found");
    } else {
        println!("[OK] {} warning(s)", warnings.len());
    }

    Ok(())
}
