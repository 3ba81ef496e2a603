// src/commands/info.rs

//! Info and options commands - describe a formula

use super::Session;
use anyhow::Result;
use formulary::formula::PatchSource;

/// Print formula metadata
pub fn cmd_info(session: &Session, name: &str) -> Result<()> {
    let loaded = session.load(name)?;
    let formula = &loaded.formula;
    let pkg = &formula.package;

    println!("{} {}", pkg.name, formula.pkg_version());
    if let Some(desc) = &pkg.description {
        println!("{}", desc);
    }
    if let Some(homepage) = &pkg.homepage {
        println!("Homepage: {}", homepage);
    }
    println!("Source:   {}", formula.source.url);
    for mirror in &formula.source.mirrors {
        println!("Mirror:   {}", mirror);
    }
    println!("Checksum: {}", formula.source.checksum);
    if let Some(head) = &pkg.head {
        println!("Head:     {}", head);
    }
    match &loaded.base_dir {
        Some(dir) => println!("From:     {}", dir.display()),
        None if loaded.builtin => println!("From:     builtin"),
        None => {}
    }

    let prefix = session.config.layout(formula).prefix().to_path_buf();
    println!("Prefix:   {}", prefix.display());

    if let Some(reason) = &pkg.keg_only {
        println!("\nKeg-only: {}", reason);
    }

    let req = &formula.requirements;
    if let Some(min) = req.min_os {
        println!("Requires: {} or newer", min);
    }
    if !req.fails_with.is_empty() {
        let names: Vec<String> = req.fails_with.iter().map(|c| c.to_string()).collect();
        println!("Fails with: {}", names.join(", "));
    }

    if !formula.patches.is_empty() {
        println!("\nPatches:");
        for (id, patch) in &formula.patches {
            let kind = match patch.source() {
                Ok(PatchSource::Remote { .. }) => "remote",
                Ok(PatchSource::Bundled { .. }) => "bundled",
                Ok(PatchSource::Substitute { .. }) => "inreplace",
                Err(_) => "invalid",
            };
            match &patch.description {
                Some(desc) => println!("  {:<28} {:<10} {}", id, kind, desc),
                None => println!("  {:<28} {}", id, kind),
            }
        }
    }

    if !formula.resources.is_empty() {
        println!("\nResources:");
        for (id, resource) in &formula.resources {
            println!("  {:<28} {}", id, resource.url);
        }
    }

    if let Some(caveats) = &pkg.caveats {
        println!("\nCaveats:\n{}", caveats.trim_end());
    }

    Ok(())
}

/// Print the options a formula declares
pub fn cmd_options(session: &Session, name: &str) -> Result<()> {
    let loaded = session.load(name)?;
    let table = &loaded.formula.options;

    if table.declare.is_empty() {
        println!("{} has no options", loaded.formula.name());
        return Ok(());
    }

    for decl in &table.declare {
        println!("--{}", decl.name);
        if let Some(desc) = &decl.description {
            println!("\t{}", desc);
        }
        if decl.default {
            println!("\t(enabled by default)");
        }
        if decl.requires_multi_arch {
            println!("\t(needs more than one architecture)");
        }
    }

    if !table.deprecated.is_empty() {
        println!();
        for (old, new) in &table.deprecated {
            println!("--{} is deprecated, use --{}", old, new);
        }
    }

    for (a, b) in &table.conflicts {
        println!("--{} and --{} are mutually exclusive", a, b);
    }

    Ok(())
}
