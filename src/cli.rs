// src/cli.rs
//! CLI definitions for formulary
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "formulary")]
#[command(author = "Formulary Contributors")]
#[command(version)]
#[command(about = "Resolve package formulas into deterministic build plans", long_about = None)]
pub struct Cli {
    /// Show debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: $FORMULARY_CONFIG or the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Installation root, overrides the configuration file
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options and platform shared by commands that resolve a plan
#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    /// Formula name or path to a formula file
    pub formula: String,

    /// Requested option: NAME, +NAME, -NAME, !NAME or --NAME (repeatable)
    #[arg(short = 'o', long = "option", value_name = "OPTION", allow_hyphen_values = true)]
    pub options: Vec<String>,

    /// Target platform, e.g. "mountain_lion is: x86_64 i386 cc: clang"
    /// (default: detect the host)
    #[arg(short, long, value_name = "SPEC")]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List available formulas
    List,

    /// Show formula metadata
    Info {
        /// Formula name or path to a formula file
        formula: String,
    },

    /// Show the options a formula accepts
    Options {
        /// Formula name or path to a formula file
        formula: String,
    },

    /// Resolve a build plan without running it
    Resolve {
        #[command(flatten)]
        args: ResolveArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Check a formula file for mistakes
    Validate {
        /// Path to the formula file
        file: PathBuf,
    },

    /// Resolve a build plan and execute it
    Run {
        #[command(flatten)]
        args: ResolveArgs,

        /// Print each step instead of running it
        #[arg(long)]
        dry_run: bool,

        /// Unpacked source tree to build in (default: current directory)
        #[arg(short, long, value_name = "DIR")]
        workdir: Option<PathBuf>,
    },
}
