// src/plan/vars.rs

//! `%(name)s` variable substitution for plan payloads

use crate::config::Layout;
use crate::error::{Error, Result};
use crate::formula::Formula;
use crate::platform::{Arch, CompilerId};
use std::collections::BTreeMap;

/// Values available to `%(name)s` placeholders
#[derive(Debug, Clone)]
pub struct Variables {
    values: BTreeMap<String, String>,
}

/// Staging directory used by per-architecture builds
pub fn archdir(arch: Arch) -> String {
    format!("build-{}", arch)
}

/// `-arch a -arch b` for the architectures being built
pub fn arch_flags(archs: &[Arch]) -> String {
    archs
        .iter()
        .map(|a| format!("-arch {}", a))
        .collect::<Vec<_>>()
        .join(" ")
}

impl Variables {
    /// Built-in variables plus the formula's `[variables]`
    ///
    /// Formula variables may refer to built-ins but not to each other.
    pub fn new(formula: &Formula, layout: &Layout, compiler: CompilerId, build_archs: &[Arch]) -> Result<Self> {
        let mut values = BTreeMap::new();
        let mut set = |k: &str, v: String| {
            values.insert(k.to_string(), v);
        };

        set("name", formula.package.name.clone());
        set("version", formula.package.version.clone());
        for (name, dir) in layout.dirs() {
            set(name, dir.to_string_lossy().into_owned());
        }
        set("cc", compiler.cc().to_string());
        set("cxx", compiler.cxx().to_string());
        set("arch_flags", arch_flags(build_archs));

        if let (Some(first), Some(last)) = (build_archs.first(), build_archs.last()) {
            set("arch", first.to_string());
            set("archdir", archdir(*first));
            set("first_archdir", archdir(*first));
            set("last_archdir", archdir(*last));
        }

        let builtins = Self { values };
        let mut values = builtins.values.clone();
        for (key, template) in &formula.variables {
            let value = builtins
                .substitute(template)
                .map_err(|var| Error::rule(format!("variables.{}", key), unknown(&var)))?;
            values.insert(key.clone(), value);
        }

        Ok(Self { values })
    }

    /// Copy with `arch` and `archdir` pointing at one architecture
    pub fn for_arch(&self, arch: Arch) -> Self {
        let mut values = self.values.clone();
        values.insert("arch".to_string(), arch.to_string());
        values.insert("archdir".to_string(), archdir(arch));
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Replace every `%(name)s` in `template`
    ///
    /// Returns the name of the first unknown variable on failure. Names are
    /// made of ASCII letters, digits and `_`; anything else after `%(` is
    /// kept as is.
    pub fn substitute(&self, template: &str) -> std::result::Result<String, String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("%(") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            let (name, tail) = after.split_at(len);

            match tail.strip_prefix(")s") {
                Some(tail) if !name.is_empty() => {
                    match self.values.get(name) {
                        Some(value) => out.push_str(value),
                        None => return Err(name.to_string()),
                    }
                    rest = tail;
                }
                _ => {
                    out.push_str("%(");
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        Ok(out)
    }

    /// Substitute on behalf of a rule, turning unknown names into rule errors
    pub fn expand(&self, rule: &str, template: &str) -> Result<String> {
        self.substitute(template)
            .map_err(|var| Error::rule(rule, unknown(&var)))
    }

    pub fn expand_all(&self, rule: &str, templates: &[String]) -> Result<Vec<String>> {
        templates.iter().map(|t| self.expand(rule, t)).collect()
    }
}

fn unknown(var: &str) -> String {
    format!("unknown variable %({})s", var)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::parse_formula;

    fn vars(extra: &str, archs: &[Arch]) -> Result<Variables> {
        let formula = parse_formula(&format!(
            r#"
[package]
name = "openssl"
version = "1.0.2a-1"

[source]
url = "https://www.openssl.org/source/openssl-1.0.2a.tar.gz"
checksum = "sha256:15b6393c20030aab02c8e2fe0243cb1d1d18062f6c095d67bca91871dc7f324a"

[variables]
{}
"#,
            extra
        ))
        .unwrap();
        let layout = Layout::new("/usr/local", "/usr/local/Cellar/openssl/1.0.2a-1");
        Variables::new(&formula, &layout, CompilerId::Clang, archs)
    }

    #[test]
    fn test_builtins() {
        let v = vars("", &[Arch::X86_64, Arch::I386]).unwrap();
        assert_eq!(v.get("prefix"), Some("/usr/local/Cellar/openssl/1.0.2a-1"));
        assert_eq!(v.get("man"), Some("/usr/local/Cellar/openssl/1.0.2a-1/share/man"));
        assert_eq!(v.get("cc"), Some("clang"));
        assert_eq!(v.get("arch"), Some("x86_64"));
        assert_eq!(v.get("first_archdir"), Some("build-x86_64"));
        assert_eq!(v.get("last_archdir"), Some("build-i386"));
        assert_eq!(v.get("arch_flags"), Some("-arch x86_64 -arch i386"));
    }

    #[test]
    fn test_formula_variables_use_builtins() {
        let v = vars(r#"openssldir = "%(etc)s/openssl""#, &[Arch::X86_64]).unwrap();
        assert_eq!(v.get("openssldir"), Some("/usr/local/etc/openssl"));
        assert_eq!(
            v.substitute("--openssldir=%(openssldir)s").unwrap(),
            "--openssldir=/usr/local/etc/openssl"
        );
    }

    #[test]
    fn test_formula_variable_unknown_reference() {
        let err = vars(r#"broken = "%(nowhere)s""#, &[Arch::X86_64]).unwrap_err();
        match err {
            Error::RuleEvaluation { rule, reason } => {
                assert_eq!(rule, "variables.broken");
                assert!(reason.contains("nowhere"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_substitute_edge_cases() {
        let v = vars("", &[Arch::Ppc]).unwrap();
        assert_eq!(v.substitute("100% done").unwrap(), "100% done");
        assert_eq!(v.substitute("%(name)s-%(version)s").unwrap(), "openssl-1.0.2a-1");
        assert_eq!(v.substitute("dangling %(name").unwrap(), "dangling %(name");
        assert_eq!(v.substitute("%(bogus)s"), Err("bogus".to_string()));
    }

    #[test]
    fn test_substitute_names_stop_at_non_identifier() {
        let v = vars("", &[Arch::X86_64]).unwrap();
        assert_eq!(v.substitute("%(a)b %(name)s").unwrap(), "%(a)b openssl");
        assert_eq!(v.substitute("%(a)b %(c)s"), Err("c".to_string()));
        assert_eq!(v.substitute("%() %(x y)s").unwrap(), "%() %(x y)s");
        assert_eq!(v.substitute("%(%(arch)s)s").unwrap(), "%(x86_64)s");
    }

    #[test]
    fn test_for_arch() {
        let v = vars("", &[Arch::X86_64, Arch::I386]).unwrap().for_arch(Arch::I386);
        assert_eq!(v.get("arch"), Some("i386"));
        assert_eq!(v.get("archdir"), Some("build-i386"));
        assert_eq!(v.get("first_archdir"), Some("build-x86_64"));
        assert_eq!(
            v.expand("copy", "%(archdir)s/engines").unwrap(),
            "build-i386/engines"
        );
    }
}
