// src/formula/catalog.rs

//! Formula lookup
//!
//! Formulas are looked up in the configured formula directories first, then
//! among the formulas compiled into the binary, and finally as a path.

use crate::error::{Error, Result};
use crate::formula::format::Formula;
use crate::formula::parser::{parse_formula, parse_formula_file};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Formulas shipped with the crate: (name, TOML source)
const BUILTIN: &[(&str, &str)] = &[
    ("doxygen", include_str!("../../formulas/doxygen.toml")),
    ("lua", include_str!("../../formulas/lua.toml")),
    ("openssl", include_str!("../../formulas/openssl.toml")),
];

/// Patch files the builtin formulas refer to: (relative path, contents)
const BUILTIN_PATCHES: &[(&str, &str)] = &[
    (
        "patches/doxygen-doxywizard-install.diff",
        include_str!("../../formulas/patches/doxygen-doxywizard-install.diff"),
    ),
    (
        "patches/doxygen-libclang-static.diff",
        include_str!("../../formulas/patches/doxygen-libclang-static.diff"),
    ),
    ("patches/lua-dylib.diff", include_str!("../../formulas/patches/lua-dylib.diff")),
];

/// Write the patch files of the builtin formulas below `dir`
pub fn write_builtin_patches(dir: &Path) -> Result<()> {
    for (file, contents) in BUILTIN_PATCHES {
        let path = dir.join(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::IoError(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        std::fs::write(&path, contents)
            .map_err(|e| Error::IoError(format!("Failed to write {}: {}", path.display(), e)))?;
    }
    debug!("Wrote {} builtin patch files to {}", BUILTIN_PATCHES.len(), dir.display());
    Ok(())
}

/// A formula plus where it came from
#[derive(Debug, Clone)]
pub struct LoadedFormula {
    pub formula: Formula,
    /// Directory bundled patch files are relative to, `None` for builtins
    pub base_dir: Option<PathBuf>,
    pub builtin: bool,
}

impl LoadedFormula {
    /// Directory the executor should look up bundled patch files in
    ///
    /// Builtin formulas carry their patch files in the binary and write them
    /// into `scratch` first.
    pub fn patch_dir(&self, scratch: &Path) -> Result<PathBuf> {
        match &self.base_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                write_builtin_patches(scratch)?;
                Ok(scratch.to_path_buf())
            }
        }
    }
}

/// Finds formulas by name
#[derive(Debug, Clone, Default)]
pub struct FormulaCatalog {
    dirs: Vec<PathBuf>,
}

impl FormulaCatalog {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// Load a formula by name or path
    pub fn load(&self, name: &str) -> Result<LoadedFormula> {
        for dir in &self.dirs {
            let path = dir.join(format!("{}.toml", name));
            if path.is_file() {
                debug!("Loading formula {} from {}", name, path.display());
                return Self::load_file(&path);
            }
        }

        if let Some((_, source)) = BUILTIN.iter().find(|(n, _)| *n == name) {
            debug!("Loading builtin formula {}", name);
            return Ok(LoadedFormula {
                formula: parse_formula(source)?,
                base_dir: None,
                builtin: true,
            });
        }

        let path = Path::new(name);
        if path.is_file() {
            return Self::load_file(path);
        }

        Err(Error::NotFound(format!("No formula named '{}'", name)))
    }

    fn load_file(path: &Path) -> Result<LoadedFormula> {
        let formula = parse_formula_file(path)?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(LoadedFormula {
            formula,
            base_dir: Some(base_dir),
            builtin: false,
        })
    }

    /// All formula names, sorted and without duplicates
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = BUILTIN.iter().map(|(n, _)| n.to_string()).collect();

        for dir in &self.dirs {
            if !dir.is_dir() {
                continue;
            }
            let entries = std::fs::read_dir(dir).map_err(|e| {
                Error::IoError(format!("Failed to read {}: {}", dir.display(), e))
            })?;
            for entry in entries {
                let path = entry?.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        names.push(stem.to_string());
                    }
                }
            }
        }

        names.sort();
        names.dedup();
        Ok(names)
    }
}
