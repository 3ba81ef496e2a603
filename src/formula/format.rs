// src/formula/format.rs

//! Formula file format definitions
//!
//! A formula is a TOML document describing one upstream package: where its
//! source comes from, which options it offers, which patches and resources it
//! may need, and the rule table that turns options and platform into a plan.

use crate::error::{Error, Result};
use crate::option::OptionTable;
use crate::platform::{Arch, CompilerId, OsVersion};
use crate::rule::Rule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A complete formula
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    /// Package metadata
    pub package: PackageSection,

    /// Upstream source archive
    pub source: SourceSection,

    /// Platform requirements (optional)
    #[serde(default)]
    pub requirements: Requirements,

    /// Option declarations, deprecations and conflicts
    #[serde(default)]
    pub options: OptionTable,

    /// Patch catalog, keyed by patch id
    #[serde(default)]
    pub patches: BTreeMap<String, PatchInfo>,

    /// Extra archives staged during the build
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceInfo>,

    /// Variables for substitution (optional)
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    /// Rule table, evaluated in order
    #[serde(default, rename = "rule")]
    pub rules: Vec<Rule>,
}

impl Formula {
    pub fn name(&self) -> &str {
        &self.package.name
    }

    /// Version including the formula revision, e.g. `5.2.3_2`
    pub fn pkg_version(&self) -> String {
        if self.package.revision > 0 {
            format!("{}_{}", self.package.version, self.package.revision)
        } else {
            self.package.version.clone()
        }
    }

    pub fn patch(&self, id: &str) -> Option<&PatchInfo> {
        self.patches.get(id)
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }
}

/// Package metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSection {
    pub name: String,
    pub version: String,

    /// Bumped when the formula changes without a new upstream version
    #[serde(default)]
    pub revision: u32,

    #[serde(default)]
    pub homepage: Option<String>,

    /// Development repository
    #[serde(default)]
    pub head: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Why the package is not linked into the prefix, if it isn't
    #[serde(default)]
    pub keg_only: Option<String>,

    #[serde(default)]
    pub caveats: Option<String>,
}

/// Source archive section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    pub url: String,

    #[serde(default)]
    pub mirrors: Vec<String>,

    /// `sha1:<hex>` or `sha256:<hex>`
    pub checksum: String,
}

/// Platforms a formula can be built for
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Requirements {
    /// Oldest supported release
    #[serde(default)]
    pub min_os: Option<OsVersion>,

    /// Supported architectures, all when empty
    #[serde(default)]
    pub archs: Vec<Arch>,

    /// Compilers known to miscompile the package
    #[serde(default)]
    pub fails_with: Vec<CompilerId>,
}

/// One entry of the patch catalog
///
/// Exactly one of `url`, `file` or `replace` must be given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchInfo {
    /// Files touched by the patch, informational for diffs
    #[serde(default)]
    pub targets: Vec<String>,

    /// Remote diff location
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub checksum: Option<String>,

    /// Diff shipped next to the formula
    #[serde(default)]
    pub file: Option<String>,

    /// Strip level for `patch -p`
    #[serde(default = "default_strip")]
    pub strip: u32,

    /// In-place substitutions over `targets`
    #[serde(default)]
    pub replace: Vec<Replacement>,

    #[serde(default)]
    pub description: Option<String>,
}

fn default_strip() -> u32 {
    1
}

impl PatchInfo {
    /// Resolve the catalog entry into a concrete patch source
    pub fn source(&self) -> Result<PatchSource> {
        match (&self.url, &self.file, self.replace.is_empty()) {
            (Some(url), None, true) => Ok(PatchSource::Remote {
                url: url.clone(),
                checksum: self.checksum.clone(),
                strip: self.strip,
            }),
            (None, Some(file), true) => Ok(PatchSource::Bundled {
                file: file.clone(),
                strip: self.strip,
            }),
            (None, None, false) => {
                if self.targets.is_empty() {
                    return Err(Error::ParseError(
                        "Substitution patch has no target files".to_string(),
                    ));
                }
                Ok(PatchSource::Substitute {
                    replacements: self.replace.clone(),
                })
            }
            (None, None, true) => Err(Error::ParseError(
                "Patch needs one of url, file or replace".to_string(),
            )),
            _ => Err(Error::ParseError(
                "Patch may only use one of url, file or replace".to_string(),
            )),
        }
    }
}

/// One `from` -> `to` substitution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub from: String,
    pub to: String,

    /// Treat `from` as a regular expression
    #[serde(default)]
    pub regex: bool,
}

/// Where a selected patch comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PatchSource {
    Remote {
        url: String,
        checksum: Option<String>,
        strip: u32,
    },
    Bundled {
        file: String,
        strip: u32,
    },
    Substitute {
        replacements: Vec<Replacement>,
    },
}

/// An extra archive staged during the build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub url: String,
    pub checksum: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch() -> PatchInfo {
        PatchInfo {
            targets: vec![],
            url: None,
            checksum: None,
            file: None,
            strip: 1,
            replace: vec![],
            description: None,
        }
    }

    #[test]
    fn test_patch_source_kinds() {
        let mut remote = patch();
        remote.url = Some("https://example.com/fix.diff".to_string());
        assert!(matches!(remote.source(), Ok(PatchSource::Remote { strip: 1, .. })));

        let mut bundled = patch();
        bundled.file = Some("patches/fix.diff".to_string());
        bundled.strip = 0;
        assert!(matches!(bundled.source(), Ok(PatchSource::Bundled { strip: 0, .. })));

        let mut subst = patch();
        subst.targets = vec!["src/Makefile".to_string()];
        subst.replace = vec![Replacement {
            from: "CC=".to_string(),
            to: "".to_string(),
            regex: false,
        }];
        assert!(matches!(subst.source(), Ok(PatchSource::Substitute { .. })));
    }

    #[test]
    fn test_patch_source_rejects_ambiguous() {
        assert!(patch().source().is_err());

        let mut both = patch();
        both.url = Some("https://example.com/fix.diff".to_string());
        both.file = Some("fix.diff".to_string());
        assert!(both.source().is_err());

        let mut untargeted = patch();
        untargeted.replace = vec![Replacement {
            from: "a".to_string(),
            to: "b".to_string(),
            regex: false,
        }];
        assert!(untargeted.source().is_err());
    }
}
