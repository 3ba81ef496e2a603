// src/rule/effect.rs

//! Effects a matching rule applies to the plan under construction

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};

/// How a dependency is needed
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DependencyTag {
    #[default]
    Runtime,
    Build,
    Optional,
    Recommended,
}

/// When an invocation runs relative to the others
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Default,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    #[default]
    Build,
    Install,
    PostInstall,
    Test,
}

/// A tool invocation declared by a formula's install procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeStep {
    pub id: String,
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub phase: Phase,

    /// Run once for every architecture being built
    #[serde(default)]
    pub per_arch: bool,

    /// Run only for the first architecture being built
    #[serde(default)]
    pub primary_arch_only: bool,

    /// Append the accumulated configure flags
    #[serde(default)]
    pub configure: bool,

    /// Extra arguments keyed by architecture name
    #[serde(default)]
    pub arch_args: BTreeMap<String, Vec<String>>,

    /// Run inside a staged resource instead of the main source tree
    #[serde(default)]
    pub resource: Option<String>,

    /// Directory relative to the source tree
    #[serde(default)]
    pub workdir: Option<String>,
}

/// What a rule does when its predicate holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Effect {
    AddDependency {
        name: String,
        #[serde(default)]
        constraint: Option<String>,
        #[serde(default)]
        tag: DependencyTag,
    },
    AddConfigureFlag {
        flag: String,
    },
    SelectPatch {
        id: String,
    },
    SetEnv {
        key: String,
        value: String,
    },
    SkipStep {
        step: String,
    },
    Invoke(InvokeStep),
}

/// Identity of an effect for last-write-wins
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectKey {
    Dependency(String),
    ConfigureFlag(String),
    Patch(String),
    Env(String),
    Skip(String),
    Invoke(String),
}

impl Effect {
    pub fn key(&self) -> EffectKey {
        match self {
            Self::AddDependency { name, .. } => EffectKey::Dependency(name.clone()),
            Self::AddConfigureFlag { flag } => EffectKey::ConfigureFlag(flag_key(flag).to_string()),
            Self::SelectPatch { id } => EffectKey::Patch(id.clone()),
            Self::SetEnv { key, .. } => EffectKey::Env(key.clone()),
            Self::SkipStep { step } => EffectKey::Skip(step.clone()),
            Self::Invoke(step) => EffectKey::Invoke(step.id.clone()),
        }
    }
}

/// The part of a configure flag that identifies it: `--prefix=/usr` -> `--prefix`
pub fn flag_key(flag: &str) -> &str {
    flag.split_once('=').map(|(key, _)| key).unwrap_or(flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_key() {
        assert_eq!(flag_key("--prefix=/usr/local"), "--prefix");
        assert_eq!(flag_key("--with-libclang-static"), "--with-libclang-static");
        assert_eq!(flag_key("CFLAGS=-O2 -g"), "CFLAGS");
    }

    #[test]
    fn test_effect_keys() {
        let a = Effect::AddConfigureFlag {
            flag: "--openssldir=/a".to_string(),
        };
        let b = Effect::AddConfigureFlag {
            flag: "--openssldir=/b".to_string(),
        };
        assert_eq!(a.key(), b.key());

        let dep = Effect::AddDependency {
            name: "llvm".to_string(),
            constraint: None,
            tag: DependencyTag::Build,
        };
        assert_eq!(dep.key(), EffectKey::Dependency("llvm".to_string()));
    }

    #[test]
    fn test_effect_from_toml() {
        let effect: Effect = toml::from_str(
            r#"
kind = "add-dependency"
name = "llvm"
constraint = "with-clang"
"#,
        )
        .unwrap();
        assert_eq!(
            effect,
            Effect::AddDependency {
                name: "llvm".to_string(),
                constraint: Some("with-clang".to_string()),
                tag: DependencyTag::Runtime,
            }
        );

        let effect: Effect = toml::from_str(
            r#"
kind = "invoke"
id = "configure"
program = "./configure"
args = ["--prefix=%(prefix)s"]
configure = true
per_arch = true
arch_args = { x86_64 = ["darwin64-x86_64-cc"], i386 = ["darwin-i386-cc"] }
"#,
        )
        .unwrap();
        match effect {
            Effect::Invoke(step) => {
                assert_eq!(step.id, "configure");
                assert_eq!(step.phase, Phase::Build);
                assert!(step.per_arch && step.configure);
                assert_eq!(step.arch_args["i386"], vec!["darwin-i386-cc"]);
            }
            other => panic!("expected invoke, got {:?}", other),
        }
    }

    #[test]
    fn test_phase_order() {
        assert!(Phase::Build < Phase::Install);
        assert!(Phase::Install < Phase::PostInstall);
        assert!(Phase::PostInstall < Phase::Test);
        assert_eq!(Phase::PostInstall.to_string(), "post-install");
    }
}
