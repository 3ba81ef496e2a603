// src/formula/parser.rs

//! Formula file parsing and validation

use crate::error::{Error, Result};
use crate::formula::format::{Formula, PatchSource};
use crate::platform::Arch;
use crate::rule::{Effect, OptionRef};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

/// Parse a formula from a TOML string
pub fn parse_formula(content: &str) -> Result<Formula> {
    toml::from_str(content).map_err(|e| Error::ParseError(format!("Invalid formula: {}", e)))
}

/// Parse a formula from a file
pub fn parse_formula_file(path: &Path) -> Result<Formula> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::IoError(format!("Failed to read formula file: {}", e)))?;

    parse_formula(&content)
}

/// Validate a formula for completeness and internal consistency
///
/// Errors are problems that would make resolution fail for some option set;
/// warnings are returned for things that only look suspicious.
pub fn validate_formula(formula: &Formula) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    if formula.package.name.is_empty() {
        return Err(Error::ParseError("Formula name cannot be empty".to_string()));
    }
    if formula.package.version.is_empty() {
        return Err(Error::ParseError("Formula version cannot be empty".to_string()));
    }

    if !formula.source.checksum.starts_with("sha1:") && !formula.source.checksum.starts_with("sha256:") {
        return Err(Error::ParseError(format!(
            "Invalid checksum format: {}. Expected sha1:... or sha256:...",
            formula.source.checksum
        )));
    }

    formula.options.validate()?;

    for (id, patch) in &formula.patches {
        let source = patch
            .source()
            .map_err(|e| Error::ParseError(format!("Patch '{}': {}", id, e)))?;
        if let PatchSource::Remote { url, checksum, .. } = &source {
            if checksum.is_none() {
                warnings.push(format!("Remote patch {} has no checksum", id));
            }
            if url.starts_with("http://") {
                warnings.push(format!("Remote patch {} is fetched over plain http", id));
            }
        }
        if let PatchSource::Substitute { replacements } = &source {
            for r in replacements.iter().filter(|r| r.regex) {
                regex::Regex::new(&r.from).map_err(|e| {
                    Error::ParseError(format!("Patch '{}' has an invalid pattern: {}", id, e))
                })?;
            }
        }
    }

    let mut seen = HashSet::new();
    for rule in &formula.rules {
        if rule.id.is_empty() {
            return Err(Error::ParseError("Rule id cannot be empty".to_string()));
        }
        if !seen.insert(rule.id.as_str()) {
            return Err(Error::ParseError(format!("Duplicate rule id '{}'", rule.id)));
        }

        for reference in rule.when.option_refs() {
            let known = match reference {
                OptionRef::Option(name) => formula.options.is_declared(name),
                OptionRef::Feature(feature) => {
                    formula.options.is_declared(&format!("with-{}", feature))
                        || formula.options.is_declared(&format!("without-{}", feature))
                }
            };
            if !known {
                return Err(Error::ParseError(format!(
                    "Rule '{}' refers to an undeclared option: {}",
                    rule.id, rule.when
                )));
            }
        }

        match &rule.effect {
            Effect::SelectPatch { id } if !formula.patches.contains_key(id) => {
                return Err(Error::ParseError(format!(
                    "Rule '{}' selects unknown patch '{}'",
                    rule.id, id
                )));
            }
            Effect::Invoke(step) => {
                if step.id.is_empty() || step.id.contains('@') {
                    return Err(Error::ParseError(format!(
                        "Rule '{}' has an invalid step id '{}'",
                        rule.id, step.id
                    )));
                }
                for arch in step.arch_args.keys() {
                    Arch::from_str(arch).map_err(|_| {
                        Error::ParseError(format!(
                            "Rule '{}' has arguments for unknown architecture '{}'",
                            rule.id, arch
                        ))
                    })?;
                }
                if let Some(resource) = &step.resource {
                    if !formula.resources.contains_key(resource) {
                        return Err(Error::ParseError(format!(
                            "Rule '{}' uses unknown resource '{}'",
                            rule.id, resource
                        )));
                    }
                }
                if step.per_arch && step.primary_arch_only {
                    warnings.push(format!(
                        "Step {} is both per_arch and primary_arch_only; it runs once",
                        step.id
                    ));
                }
            }
            _ => {}
        }
    }

    if formula.package.homepage.is_none() {
        warnings.push("Missing package homepage".to_string());
    }
    if formula.source.url.starts_with("http://") && formula.source.mirrors.is_empty() {
        warnings.push("Source is fetched over plain http with no mirror".to_string());
    }
    if !formula
        .rules
        .iter()
        .any(|r| matches!(r.effect, Effect::Invoke(_)))
    {
        warnings.push("Formula declares no build steps".to_string());
    }

    Ok(warnings)
}
