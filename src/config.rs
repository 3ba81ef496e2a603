// src/config.rs
//! Configuration file parsing
//!
//! The configuration is a small TOML file:
//!
//! ```toml
//! root = "/usr/local"
//! cellar = "/usr/local/Cellar"
//! formula_dirs = ["/usr/local/share/formulary/formulas"]
//! ```
//!
//! Every key is optional. The file is taken from `--config`, then
//! `$FORMULARY_CONFIG`, then `<config dir>/formulary/config.toml`.

use crate::error::{Error, Result};
use crate::formula::Formula;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a configuration file
pub const CONFIG_ENV: &str = "FORMULARY_CONFIG";

/// TOML configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Installation root that linked packages appear under
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Where versioned package prefixes live, `<root>/Cellar` when unset
    #[serde(default)]
    pub cellar: Option<PathBuf>,

    /// Extra directories searched for `<name>.toml` formulas
    #[serde(default)]
    pub formula_dirs: Vec<PathBuf>,
}

fn default_root() -> PathBuf {
    PathBuf::from("/usr/local")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            cellar: None,
            formula_dirs: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::IoError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            Error::ParseError(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Find and load the configuration, falling back to defaults
    ///
    /// An explicitly named file (argument or environment) must exist; the
    /// per-user file is only read when present.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let user_file = dirs::config_dir().map(|d| d.join("formulary").join("config.toml"));

        match locate(explicit, from_env.as_deref(), user_file.as_deref()) {
            Some(path) => {
                debug!("Using config file {}", path.display());
                Self::load(&path)
            }
            None => {
                debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn cellar(&self) -> PathBuf {
        self.cellar
            .clone()
            .unwrap_or_else(|| self.root.join("Cellar"))
    }

    /// Directory layout for one formula
    pub fn layout(&self, formula: &Formula) -> Layout {
        Layout {
            root: self.root.clone(),
            prefix: self.cellar().join(formula.name()).join(formula.pkg_version()),
        }
    }
}

fn locate(explicit: Option<&Path>, from_env: Option<&Path>, user_file: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit.or(from_env) {
        return Some(path.to_path_buf());
    }
    user_file.filter(|p| p.is_file()).map(Path::to_path_buf)
}

/// Install locations a plan refers to through `%(var)s` variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
    prefix: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Named directories, in the order they are exposed as variables
    pub fn dirs(&self) -> Vec<(&'static str, PathBuf)> {
        let man = self.prefix.join("share/man");
        vec![
            ("root", self.root.clone()),
            ("prefix", self.prefix.clone()),
            ("bin", self.prefix.join("bin")),
            ("lib", self.prefix.join("lib")),
            ("include", self.prefix.join("include")),
            ("share", self.prefix.join("share")),
            ("libexec", self.prefix.join("libexec")),
            ("man1", man.join("man1")),
            ("man", man),
            ("etc", self.root.join("etc")),
            ("opt", self.root.join("opt")),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::parse_formula;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cellar(), PathBuf::from("/usr/local/Cellar"));
    }

    #[test]
    fn test_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "root = \"/opt/homebrew\"\nformula_dirs = [\"/srv/formulas\"]\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.root, PathBuf::from("/opt/homebrew"));
        assert_eq!(config.cellar(), PathBuf::from("/opt/homebrew/Cellar"));
        assert_eq!(config.formula_dirs, vec![PathBuf::from("/srv/formulas")]);
    }

    #[test]
    fn test_load_rejects_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "prefx = \"/usr\"\n").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::ParseError(_))));
    }

    #[test]
    fn test_locate_order() {
        let dir = TempDir::new().unwrap();
        let user = dir.path().join("config.toml");
        let explicit = Path::new("/etc/formulary.toml");
        let env = Path::new("/tmp/env.toml");

        assert_eq!(locate(Some(explicit), Some(env), Some(&user)), Some(explicit.to_path_buf()));
        assert_eq!(locate(None, Some(env), Some(&user)), Some(env.to_path_buf()));
        assert_eq!(locate(None, None, Some(&user)), None);

        std::fs::write(&user, "").unwrap();
        assert_eq!(locate(None, None, Some(&user)), Some(user.clone()));
    }

    #[test]
    fn test_layout() {
        let formula = parse_formula(
            r#"
[package]
name = "lua"
version = "5.2.3"
revision = 2

[source]
url = "https://www.lua.org/ftp/lua-5.2.3.tar.gz"
checksum = "sha256:13c2fb97961381f7d06d5b5cea55b743c163800896fd5c5e2356201d3619002d"
"#,
        )
        .unwrap();

        let layout = Config::default().layout(&formula);
        assert_eq!(layout.prefix(), Path::new("/usr/local/Cellar/lua/5.2.3_2"));

        let dirs = layout.dirs();
        let man1 = dirs.iter().find(|(n, _)| *n == "man1").unwrap();
        assert_eq!(man1.1, PathBuf::from("/usr/local/Cellar/lua/5.2.3_2/share/man/man1"));
        let etc = dirs.iter().find(|(n, _)| *n == "etc").unwrap();
        assert_eq!(etc.1, PathBuf::from("/usr/local/etc"));
    }
}
