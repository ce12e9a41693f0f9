//! Identify subcommand - probe repositories for reachability

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color};

use thesisnet_core::{SHARED_RUNTIME, SharedProgress};
use thesisnet_oai::Reachability;

use super::{build_session, resolve_names, table};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct IdentifyArgs {
    /// Institutions to probe (name or unique part of it); all when omitted
    pub names: Vec<String>,
}

pub fn run(args: IdentifyArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let session = build_session(config)?;
    let names = resolve_names(&session, &args.names)?;

    log::info!(
        "Probing {} repositories",
        if names.is_empty() { session.names().len() } else { names.len() }
    );
    let spinner = progress.institution_line("Identify");
    spinner.set_message("waiting for repositories…");
    SHARED_RUNTIME.block_on(session.probe_all(&names));
    spinner.finish_and_clear();

    let wanted = |name: &str| names.is_empty() || names.iter().any(|n| n == name);
    let mut table = table(&["Institution", "Status", "Repository", "Admin email", "Base URL / message"]);
    let mut offline = 0;
    for status in session.status().into_iter().filter(|s| wanted(s.name.as_str())) {
        let color = match status.reachability {
            Reachability::Online => Color::Green,
            Reachability::Offline => {
                offline += 1;
                Color::Red
            }
            Reachability::Unknown => Color::Yellow,
        };
        let detail = match status.reachability {
            Reachability::Online => status.base_url.clone(),
            _ => status.message.clone().unwrap_or_default(),
        };
        table.add_row(vec![
            Cell::new(&status.name),
            Cell::new(status.reachability).fg(color),
            Cell::new(status.repository_name.as_deref().unwrap_or("-")),
            Cell::new(status.admin_email.as_deref().unwrap_or("-")),
            Cell::new(detail),
        ]);
    }
    println!("{table}");

    if offline > 0 {
        eprintln!("{offline} repositories appear unreachable right now");
    }
    Ok(())
}
