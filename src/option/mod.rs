// src/option/mod.rs
//! Build option declarations and resolved option sets
//!
//! A formula declares the toggles a user may request (`with-graphviz`,
//! `universal`, `without-check`), retired aliases for some of them, and pairs
//! that cannot be enabled together. A request is a list of names, each
//! optionally prefixed:
//!
//! - `name` or `+name` enables the option
//! - `-name` or `!name` disables it
//! - a leading `--` (as typed on a command line) is ignored
//!
//! Requests are validated up front: unknown names and conflicting
//! combinations fail before any rule runs.

use crate::error::{Error, Result};
use crate::platform::PlatformDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Whether a request turns an option on or off
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Toggle {
    Enable,
    Disable,
}

impl Toggle {
    pub fn as_prefix(&self) -> &'static str {
        match self {
            Self::Enable => "",
            Self::Disable => "-",
        }
    }
}

/// A single parsed option request
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OptionRequest {
    pub name: String,
    pub toggle: Toggle,
}

impl OptionRequest {
    /// Parse a request like "with-graphviz", "--universal", "-with-check"
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("--").unwrap_or(s);

        let (toggle, name) = if let Some(rest) = s.strip_prefix('+') {
            (Toggle::Enable, rest)
        } else if let Some(rest) = s.strip_prefix('-').or_else(|| s.strip_prefix('!')) {
            (Toggle::Disable, rest)
        } else {
            (Toggle::Enable, s)
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(Error::ParseError(format!("Empty option name in '{}'", s)));
        }

        Ok(Self {
            name: name.to_string(),
            toggle,
        })
    }
}

impl fmt::Display for OptionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.toggle.as_prefix(), self.name)
    }
}

/// One declared option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDecl {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// State when the option is not requested
    #[serde(default)]
    pub default: bool,

    /// Option only makes sense when building for several architectures
    #[serde(default)]
    pub requires_multi_arch: bool,
}

/// The `[options]` section of a formula
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OptionTable {
    /// Declared options
    #[serde(default)]
    pub declare: Vec<OptionDecl>,

    /// Retired option name -> current option name
    #[serde(default)]
    pub deprecated: BTreeMap<String, String>,

    /// Pairs of options that may not both be enabled
    #[serde(default)]
    pub conflicts: Vec<(String, String)>,
}

impl OptionTable {
    pub fn decl(&self, name: &str) -> Option<&OptionDecl> {
        self.declare.iter().find(|d| d.name == name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.decl(name).is_some()
    }

    /// Rewrite a retired name to its replacement (single hop)
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.deprecated.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Check the table itself for declaration mistakes
    pub fn validate(&self) -> Result<()> {
        for (i, decl) in self.declare.iter().enumerate() {
            if decl.name.is_empty() || decl.name.starts_with(['-', '+', '!']) {
                return Err(Error::ParseError(format!(
                    "Invalid option name '{}'",
                    decl.name
                )));
            }
            if self.declare[..i].iter().any(|d| d.name == decl.name) {
                return Err(Error::ParseError(format!(
                    "Option '{}' declared twice",
                    decl.name
                )));
            }
        }

        for (old, new) in &self.deprecated {
            if self.is_declared(old) {
                return Err(Error::ParseError(format!(
                    "Deprecated option '{}' is still declared",
                    old
                )));
            }
            if !self.is_declared(new) {
                return Err(Error::ParseError(format!(
                    "Deprecated option '{}' points at undeclared '{}'",
                    old, new
                )));
            }
        }

        for (a, b) in &self.conflicts {
            for name in [a, b] {
                if !self.is_declared(name) {
                    return Err(Error::ParseError(format!(
                        "Conflict refers to undeclared option '{}'",
                        name
                    )));
                }
            }
            if a == b {
                return Err(Error::ParseError(format!(
                    "Option '{}' cannot conflict with itself",
                    a
                )));
            }
        }

        Ok(())
    }
}

/// The validated options for one resolution
///
/// Holds every declared option with its final state. Iteration order is by
/// name, so two sets built from the same requests in any order are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionSet {
    states: BTreeMap<String, bool>,
}

impl OptionSet {
    /// Validate a request list against a formula's option table
    pub fn resolve<S: AsRef<str>>(requested: &[S], table: &OptionTable) -> Result<Self> {
        let mut parsed = Vec::with_capacity(requested.len());
        for raw in requested {
            let request = OptionRequest::parse(raw.as_ref())?;
            let canonical = table.canonical_name(&request.name).to_string();
            parsed.push((canonical, request));
        }
        // Sorting makes the first reported error independent of request order
        parsed.sort();

        let mut chosen: BTreeMap<String, Toggle> = BTreeMap::new();
        for (canonical, request) in &parsed {
            if !table.is_declared(canonical) {
                return Err(Error::UnknownOption(request.name.clone()));
            }

            match chosen.get(canonical) {
                Some(existing) if *existing != request.toggle => {
                    return Err(Error::ConflictingOptions {
                        first: canonical.clone(),
                        second: format!("-{}", canonical),
                        reason: "option requested both enabled and disabled".to_string(),
                    });
                }
                _ => {
                    chosen.insert(canonical.clone(), request.toggle);
                }
            }
        }

        let states: BTreeMap<String, bool> = table
            .declare
            .iter()
            .map(|d| {
                let enabled = match chosen.get(&d.name) {
                    Some(toggle) => *toggle == Toggle::Enable,
                    None => d.default,
                };
                (d.name.clone(), enabled)
            })
            .collect();

        let set = Self { states };

        let mut pairs: Vec<(&str, &str)> = table
            .conflicts
            .iter()
            .map(|(a, b)| {
                if a <= b {
                    (a.as_str(), b.as_str())
                } else {
                    (b.as_str(), a.as_str())
                }
            })
            .collect();
        pairs.sort();

        for (a, b) in pairs {
            if set.is_enabled(a) && set.is_enabled(b) {
                return Err(Error::ConflictingOptions {
                    first: a.to_string(),
                    second: b.to_string(),
                    reason: "options are mutually exclusive".to_string(),
                });
            }
        }

        Ok(set)
    }

    /// Reject enabled options the platform cannot satisfy
    pub fn check_platform(&self, table: &OptionTable, platform: &PlatformDescriptor) -> Result<()> {
        for decl in &table.declare {
            if decl.requires_multi_arch && self.is_enabled(&decl.name) && !platform.is_multi_arch() {
                let archs: Vec<String> = platform
                    .architectures()
                    .iter()
                    .map(|a| a.to_string())
                    .collect();
                return Err(Error::ConflictingOptions {
                    first: decl.name.clone(),
                    second: format!("arch={}", archs.join(",")),
                    reason: "option requires more than one architecture".to_string(),
                });
            }
        }
        Ok(())
    }

    /// State of a declared option, `None` if the option is not declared
    pub fn get(&self, name: &str) -> Option<bool> {
        self.states.get(name).copied()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name).unwrap_or(false)
    }

    /// Whether a feature is built
    ///
    /// `with-<feature>` options are off unless requested; `without-<feature>`
    /// options build the feature unless requested. `None` if the formula
    /// declares neither form.
    pub fn with(&self, feature: &str) -> Option<bool> {
        if let Some(enabled) = self.get(&format!("with-{}", feature)) {
            return Some(enabled);
        }
        self.get(&format!("without-{}", feature)).map(|enabled| !enabled)
    }

    /// Names of all enabled options, sorted
    pub fn enabled(&self) -> Vec<String> {
        self.states
            .iter()
            .filter(|(_, on)| **on)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformDescriptor;

    fn decl(name: &str) -> OptionDecl {
        OptionDecl {
            name: name.to_string(),
            description: None,
            default: false,
            requires_multi_arch: false,
        }
    }

    fn table() -> OptionTable {
        let mut universal = decl("universal");
        universal.requires_multi_arch = true;

        OptionTable {
            declare: vec![
                decl("with-graphviz"),
                decl("with-libclang"),
                decl("without-check"),
                decl("with-static"),
                decl("with-shared"),
                universal,
            ],
            deprecated: BTreeMap::from([("with-dot".to_string(), "with-graphviz".to_string())]),
            conflicts: vec![("with-static".to_string(), "with-shared".to_string())],
        }
    }

    #[test]
    fn test_request_parse_prefixes() {
        let r = OptionRequest::parse("with-graphviz").unwrap();
        assert_eq!((r.name.as_str(), r.toggle), ("with-graphviz", Toggle::Enable));

        let r = OptionRequest::parse("+universal").unwrap();
        assert_eq!(r.toggle, Toggle::Enable);

        let r = OptionRequest::parse("-with-graphviz").unwrap();
        assert_eq!((r.name.as_str(), r.toggle), ("with-graphviz", Toggle::Disable));

        let r = OptionRequest::parse("!universal").unwrap();
        assert_eq!(r.toggle, Toggle::Disable);

        let r = OptionRequest::parse("--with-libclang").unwrap();
        assert_eq!((r.name.as_str(), r.toggle), ("with-libclang", Toggle::Enable));
    }

    #[test]
    fn test_request_parse_empty() {
        assert!(OptionRequest::parse("").is_err());
        assert!(OptionRequest::parse("-").is_err());
        assert!(OptionRequest::parse("--").is_err());
    }

    #[test]
    fn test_request_display() {
        let r = OptionRequest::parse("!universal").unwrap();
        assert_eq!(r.to_string(), "-universal");
    }

    #[test]
    fn test_resolve_defaults_to_disabled() {
        let set = OptionSet::resolve::<&str>(&[], &table()).unwrap();
        assert!(set.enabled().is_empty());
        assert_eq!(set.get("with-graphviz"), Some(false));
        assert_eq!(set.get("with-nothing"), None);
    }

    #[test]
    fn test_resolve_unknown_option() {
        let err = OptionSet::resolve(&["with-bogus"], &table()).unwrap_err();
        assert_eq!(err, Error::UnknownOption("with-bogus".to_string()));
    }

    #[test]
    fn test_deprecated_alias_matches_replacement() {
        let via_alias = OptionSet::resolve(&["with-dot"], &table()).unwrap();
        let direct = OptionSet::resolve(&["with-graphviz"], &table()).unwrap();
        assert_eq!(via_alias, direct);
    }

    #[test]
    fn test_deprecation_is_single_hop() {
        let mut t = table();
        t.deprecated
            .insert("with-dotty".to_string(), "with-dot".to_string());
        // with-dot is not declared, so the chain is not followed
        let err = OptionSet::resolve(&["with-dotty"], &t).unwrap_err();
        assert_eq!(err, Error::UnknownOption("with-dotty".to_string()));
    }

    #[test]
    fn test_request_order_is_irrelevant() {
        let a = OptionSet::resolve(&["universal", "with-libclang", "with-dot"], &table()).unwrap();
        let b = OptionSet::resolve(&["with-dot", "universal", "with-libclang"], &table()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.enabled(), vec!["universal", "with-graphviz", "with-libclang"]);
    }

    #[test]
    fn test_mutually_exclusive_in_any_order() {
        for request in [["with-static", "with-shared"], ["with-shared", "with-static"]] {
            let err = OptionSet::resolve(&request, &table()).unwrap_err();
            match err {
                Error::ConflictingOptions { first, second, .. } => {
                    assert_eq!(first, "with-shared");
                    assert_eq!(second, "with-static");
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_enable_and_disable_same_option() {
        let err = OptionSet::resolve(&["with-graphviz", "-with-dot"], &table()).unwrap_err();
        assert_eq!(err.category(), "conflicting-options");
    }

    #[test]
    fn test_explicit_disable_is_allowed() {
        let set = OptionSet::resolve(&["-with-graphviz"], &table()).unwrap();
        assert!(!set.is_enabled("with-graphviz"));
    }

    #[test]
    fn test_with_feature_semantics() {
        let set = OptionSet::resolve(&["with-graphviz"], &table()).unwrap();
        assert_eq!(set.with("graphviz"), Some(true));
        assert_eq!(set.with("libclang"), Some(false));
        assert_eq!(set.with("check"), Some(true));
        assert_eq!(set.with("unknown"), None);

        let set = OptionSet::resolve(&["without-check"], &table()).unwrap();
        assert_eq!(set.with("check"), Some(false));
    }

    #[test]
    fn test_universal_needs_multiple_archs() {
        let set = OptionSet::resolve(&["universal"], &table()).unwrap();
        let single = PlatformDescriptor::from_override("leopard is: ppc").unwrap();
        let err = set.check_platform(&table(), &single).unwrap_err();
        match err {
            Error::ConflictingOptions { first, second, .. } => {
                assert_eq!(first, "universal");
                assert_eq!(second, "arch=ppc");
            }
            other => panic!("unexpected error: {other}"),
        }

        let multi = PlatformDescriptor::from_override("leopard is: ppc ppc64").unwrap();
        assert!(set.check_platform(&table(), &multi).is_ok());
    }

    #[test]
    fn test_table_validation() {
        assert!(table().validate().is_ok());

        let mut t = table();
        t.declare.push(decl("with-graphviz"));
        assert!(t.validate().is_err());

        let mut t = table();
        t.deprecated
            .insert("with-x".to_string(), "with-missing".to_string());
        assert!(t.validate().is_err());

        let mut t = table();
        t.conflicts
            .push(("universal".to_string(), "with-missing".to_string()));
        assert!(t.validate().is_err());

        let mut t = table();
        t.deprecated
            .insert("universal".to_string(), "with-graphviz".to_string());
        assert!(t.validate().is_err());
    }
}
