// src/commands/list.rs

//! List command - show the formulas that can be resolved

use super::Session;
use anyhow::Result;

pub fn cmd_list(session: &Session) -> Result<()> {
    let names = session.catalog.names()?;
    for name in &names {
        match session.catalog.load(name) {
            Ok(loaded) => {
                let summary = loaded.formula.package.description.as_deref().unwrap_or("");
                println!("{:<12} {:<12} {}", name, loaded.formula.pkg_version(), summary);
            }
            Err(e) => println!("{:<12} (unreadable: {})", name, e),
        }
    }
    Ok(())
}
