// src/formula/mod.rs

//! Formulas: TOML descriptions of how to build an upstream package

mod catalog;
mod format;
mod parser;

pub use catalog::{write_builtin_patches, FormulaCatalog, LoadedFormula};
pub use format::{
    Formula, PackageSection, PatchInfo, PatchSource, Replacement, Requirements, ResourceInfo,
    SourceSection,
};
pub use parser::{parse_formula, parse_formula_file, validate_formula};
