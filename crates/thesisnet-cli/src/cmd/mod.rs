//! Subcommands and the helpers they share

pub mod harvest;
pub mod identify;
pub mod institutions;
pub mod search;

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use futures_util::future::join_all;

use thesisnet_core::{ProxyTransport, SharedProgress, fmt_num};
use thesisnet_harvest::{HarvestOutcome, HarvestReport, Session};
use thesisnet_oai::{Classification, OaiClient};

use crate::config::Config;

/// Type filter as given on the command line
#[derive(Clone, Copy, ValueEnum, Debug, PartialEq, Eq)]
pub enum TypeArg {
    All,
    Thesis,
    Dissertation,
}

impl From<TypeArg> for Option<Classification> {
    fn from(t: TypeArg) -> Self {
        match t {
            TypeArg::All => None,
            TypeArg::Thesis => Some(Classification::Thesis),
            TypeArg::Dissertation => Some(Classification::Dissertation),
        }
    }
}

/// Session over the configured registry and transport.
pub fn build_session(config: &Config) -> Result<Session<ProxyTransport>> {
    let http = config.http_config();
    let transport =
        ProxyTransport::new(config.proxy.url.clone(), &http).context("Failed to build HTTP client")?;
    let registry = config.registry()?;
    Ok(Session::new(OaiClient::new(transport, http.timeout), registry, http.page_delay)
        .with_harvest_time_filter(config.harvest.harvest_time_type_filter))
}

/// Map user-supplied names to registry names; empty input selects nothing.
pub fn resolve_names<T: thesisnet_core::Transport>(
    session: &Session<T>,
    queries: &[String],
) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(queries.len());
    for query in queries {
        let Some(name) = session.resolve(query) else {
            bail!("Unknown or ambiguous institution: {query:?} (see `thesisnet institutions`)");
        };
        if !names.contains(&name) {
            names.push(name);
        }
    }
    Ok(names)
}

/// Probe, then harvest each institution with its own spinner line.
///
/// Institutions failing `Identify` are left out of the harvest.
pub async fn harvest_with_progress<T: thesisnet_core::Transport>(
    session: &Session<T>,
    names: &[String],
    max_pages: usize,
    type_filter: Option<Classification>,
    progress: &SharedProgress,
) -> Vec<HarvestReport> {
    let tasks = names.iter().map(|name| async move {
        let pb = progress.institution_line(name);
        pb.set_message("identify…");
        let online = session.probe(name).await.is_some_and(|r| r.online);
        if online {
            pb.set_message(format!("harvesting up to {max_pages} pages…"));
        }
        let report = session.ensure_harvested(name, max_pages, type_filter).await;
        pb.finish_with_message(describe(&report));
        report
    });
    join_all(tasks).await
}

/// One-line summary of a harvest report.
pub fn describe(report: &HarvestReport) -> String {
    match &report.outcome {
        HarvestOutcome::Skipped(reason) => reason.to_string(),
        HarvestOutcome::Fetched { complete } => format!(
            "{} pages, {} kept, {} dropped{}",
            report.pages,
            fmt_num(report.accepted),
            fmt_num(report.dropped),
            if *complete { ", complete" } else { "" }
        ),
        HarvestOutcome::Failed(e) => format!("failed after {} pages: {e}", report.pages),
    }
}

/// Table with the workspace's look: rounded UTF-8 borders, cyan headers.
pub fn table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

/// Print a two-column summary table to stderr.
pub fn print_summary(title: &str, rows: &[(&str, String)]) {
    let mut table = table(&[title, "Value"]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use thesisnet_harvest::SkipReason;
    use thesisnet_oai::OaiError;

    fn report(outcome: HarvestOutcome) -> HarvestReport {
        HarvestReport {
            institution: "UCT".into(),
            outcome,
            pages: 2,
            accepted: 1500,
            dropped: 3,
        }
    }

    #[test]
    fn type_arg_maps_to_filter() {
        assert_eq!(Option::<Classification>::from(TypeArg::All), None);
        assert_eq!(
            Option::<Classification>::from(TypeArg::Dissertation),
            Some(Classification::Dissertation)
        );
    }

    #[test]
    fn describe_outcomes() {
        assert_eq!(
            describe(&report(HarvestOutcome::Fetched { complete: true })),
            "2 pages, 1,500 kept, 3 dropped, complete"
        );
        assert_eq!(
            describe(&report(HarvestOutcome::Skipped(SkipReason::Offline))),
            "offline"
        );
        let failed = describe(&report(HarvestOutcome::Failed(OaiError::Malformed("eof".into()))));
        assert!(failed.starts_with("failed after 2 pages"));
    }

    #[test]
    fn resolve_rejects_unknown() {
        let session = build_session(&Config::default()).unwrap();
        let names = resolve_names(&session, &["uct".to_string(), "UCT".to_string()]).unwrap();
        assert_eq!(names, vec!["University of Cape Town (UCT)"]);
        assert!(resolve_names(&session, &["Atlantis".to_string()]).is_err());
    }
}
