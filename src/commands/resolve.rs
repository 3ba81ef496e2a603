// src/commands/resolve.rs

//! Resolve command - print the build plan for a formula

use super::Session;
use crate::cli::{OutputFormat, ResolveArgs};
use anyhow::Result;

pub fn cmd_resolve(session: &Session, args: &ResolveArgs, format: OutputFormat) -> Result<()> {
    let loaded = session.load(&args.formula)?;
    let plan = session.resolve(&loaded, &args.options, args.platform.as_deref())?;

    match format {
        OutputFormat::Json => println!("{}", plan.to_json()?),
        OutputFormat::Text => {
            print!("{}", plan);
            if let Some(caveats) = &loaded.formula.package.caveats {
                println!("\n==> Caveats\n{}", caveats.trim_end());
            }
        }
    }

    Ok(())
}
