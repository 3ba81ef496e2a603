// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: formula name or path
fn formula_arg() -> Arg {
    Arg::new("formula")
        .required(true)
        .help("Formula name or path to a formula file")
}

/// Common arguments: option requests and target platform
fn resolve_args(cmd: Command) -> Command {
    cmd.arg(formula_arg())
        .arg(
            Arg::new("option")
                .short('o')
                .long("option")
                .value_name("OPTION")
                .action(ArgAction::Append)
                .allow_hyphen_values(true)
                .help("Requested option: NAME, +NAME, -NAME, !NAME or --NAME"),
        )
        .arg(
            Arg::new("platform")
                .short('p')
                .long("platform")
                .value_name("SPEC")
                .help("Target platform, e.g. \"mountain_lion is: x86_64 i386 cc: clang\""),
        )
}

fn build_cli() -> Command {
    Command::new("formulary")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Formulary Contributors")
        .about("Resolve package formulas into deterministic build plans")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Show debug logging on stderr"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_name("PATH")
                .help("Configuration file (default: $FORMULARY_CONFIG or the user config dir)"),
        )
        .arg(
            Arg::new("root")
                .long("root")
                .global(true)
                .value_name("DIR")
                .help("Installation root, overrides the configuration file"),
        )
        .subcommand_required(true)
        .subcommand(Command::new("list").about("List available formulas"))
        .subcommand(
            Command::new("info")
                .about("Show formula metadata")
                .arg(formula_arg()),
        )
        .subcommand(
            Command::new("options")
                .about("Show the options a formula accepts")
                .arg(formula_arg()),
        )
        .subcommand(
            resolve_args(Command::new("resolve").about("Resolve a build plan without running it")).arg(
                Arg::new("format")
                    .short('f')
                    .long("format")
                    .value_parser(["json", "text"])
                    .default_value("json")
                    .help("Output format"),
            ),
        )
        .subcommand(
            Command::new("validate")
                .about("Check a formula file for mistakes")
                .arg(Arg::new("file").required(true).help("Path to the formula file")),
        )
        .subcommand(
            resolve_args(Command::new("run").about("Resolve a build plan and execute it"))
                .arg(
                    Arg::new("dry_run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Print each step instead of running it"),
                )
                .arg(
                    Arg::new("workdir")
                        .short('w')
                        .long("workdir")
                        .value_name("DIR")
                        .help("Unpacked source tree to build in (default: current directory)"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=formulas");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("formulary.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
