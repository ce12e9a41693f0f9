//! Institutions subcommand - list the configured repositories

use anyhow::Result;

use super::table;
use crate::config::Config;

pub fn run(config: &Config) -> Result<()> {
    let registry = config.registry()?;

    let mut table = table(&["Institution", "Country", "OAI base URL", "Fallback"]);
    for inst in registry.iter() {
        table.add_row(vec![
            inst.name.as_str(),
            inst.country.as_str(),
            inst.primary.as_str(),
            inst.fallback.as_deref().unwrap_or("-"),
        ]);
    }
    println!("{table}");
    eprintln!("{} repositories", registry.len());
    Ok(())
}
