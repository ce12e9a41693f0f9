//! Harvest subcommand - fetch one repository and summarize its cache

use anyhow::{Result, bail};
use clap::Args;

use thesisnet_core::{SHARED_RUNTIME, SharedProgress, fmt_num};
use thesisnet_harvest::HarvestOutcome;
use thesisnet_oai::Classification;

use super::{TypeArg, build_session, describe, harvest_with_progress, print_summary, resolve_names};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct HarvestArgs {
    /// Institution (name or unique part of it)
    pub name: String,

    /// ListRecords pages to fetch
    #[arg(short = 'p', long)]
    pub max_pages: Option<usize>,

    /// Type filter; only dropped at harvest time with `harvest_time_type_filter`
    #[arg(short = 't', long = "type", value_enum)]
    pub type_filter: Option<TypeArg>,
}

pub fn run(args: HarvestArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let session = build_session(config)?;
    let names = resolve_names(&session, std::slice::from_ref(&args.name))?;
    let max_pages = args.max_pages.unwrap_or(config.harvest.max_pages);
    let type_filter = args
        .type_filter
        .map_or_else(|| config.harvest.classification(), Into::into);

    let reports = SHARED_RUNTIME.block_on(harvest_with_progress(
        &session,
        &names,
        max_pages,
        type_filter,
        progress,
    ));
    let Some(report) = reports.into_iter().next() else {
        bail!("Nothing harvested for {:?}", args.name);
    };

    let status = session
        .status()
        .into_iter()
        .find(|s| s.name == report.institution);
    let pool = session.pool(std::slice::from_ref(&report.institution));
    let count = |class: Classification| pool.iter().filter(|r| r.classification == class).count();
    let years: Vec<&str> = pool
        .iter()
        .map(|r| r.year.as_str())
        .filter(|y| !y.is_empty())
        .collect();
    let span = match (years.iter().min(), years.iter().max()) {
        (Some(lo), Some(hi)) if lo != hi => format!("{lo}-{hi}"),
        (Some(lo), _) => lo.to_string(),
        _ => "-".to_string(),
    };

    let mut rows = vec![
        ("Outcome", describe(&report)),
        ("Records", fmt_num(pool.len())),
        ("Theses", fmt_num(count(Classification::Thesis))),
        ("Dissertations", fmt_num(count(Classification::Dissertation))),
        ("Years", span),
    ];
    if let Some(status) = &status {
        rows.insert(0, ("Base URL", status.base_url.clone()));
        if let Some(repo) = &status.repository_name {
            rows.insert(0, ("Repository", repo.clone()));
        }
        rows.push((
            "More pages",
            if status.complete { "no" } else { "yes" }.to_string(),
        ));
    }
    print_summary(&report.institution, &rows);

    match report.outcome {
        HarvestOutcome::Skipped(reason) if pool.is_empty() => {
            bail!("{} was not harvested: {reason}", report.institution)
        }
        HarvestOutcome::Failed(e) if pool.is_empty() => {
            Err(anyhow::Error::new(e).context(format!("Harvest of {} failed", report.institution)))
        }
        _ => Ok(()),
    }
}
