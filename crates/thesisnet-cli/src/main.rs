//! thesisnet - search theses and dissertations across DSpace repositories
//!
//! Harvests OAI-PMH Dublin Core records on demand and filters the merged
//! results in the terminal.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "thesisnet")]
#[command(about = "Search theses and dissertations across OAI-PMH repositories")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./thesisnet.toml or ~/.config/thesisnet/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Proxy prefix the encoded repository URL is appended to
    #[arg(long, global = true)]
    proxy: Option<String>,

    /// Fetch repositories directly even if a proxy is configured
    #[arg(long, global = true, conflicts_with = "proxy")]
    no_proxy: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List configured repositories
    Institutions,
    /// Probe repositories with OAI Identify
    Identify(cmd::identify::IdentifyArgs),
    /// Harvest one repository and summarize what was cached
    Harvest(cmd::harvest::HarvestArgs),
    /// Harvest the selected repositories and search the merged results
    Search(cmd::search::SearchArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(thesisnet_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug  - spinners show activity
    //   non-TTY: info unless --debug          - logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    thesisnet_core::init_logging(quiet, cli.debug, multi);

    let mut config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // CLI overrides
    if let Some(secs) = cli.timeout {
        config.http.timeout_secs = secs;
    }
    if cli.no_proxy {
        config.proxy.url = None;
    } else if let Some(proxy) = cli.proxy {
        config.proxy.url = Some(proxy);
    }

    match cli.command {
        Command::Institutions => cmd::institutions::run(&config),
        Command::Identify(args) => cmd::identify::run(args, &config, &progress),
        Command::Harvest(args) => cmd::harvest::run(args, &config, &progress),
        Command::Search(args) => cmd::search::run(args, &config, &progress),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec![
                "Proxy",
                config.proxy.url.as_deref().unwrap_or("none (direct)"),
            ]);
            table.add_row(vec!["Timeout", &format!("{}s", config.http.timeout_secs)]);
            table.add_row(vec!["Page delay", &format!("{}ms", config.http.page_delay_ms)]);
            table.add_row(vec!["Max pages", &config.harvest.max_pages.to_string()]);
            table.add_row(vec!["Page size", &config.harvest.page_size.to_string()]);
            table.add_row(vec!["Type filter", &config.harvest.type_filter]);
            table.add_row(vec![
                "Filter while harvesting",
                if config.harvest.harvest_time_type_filter {
                    "yes"
                } else {
                    "no"
                },
            ]);
            table.add_row(vec![
                "Institutions",
                &if config.institutions.is_empty() {
                    "built-in list".to_string()
                } else {
                    format!("{} configured", config.institutions.len())
                },
            ]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}
