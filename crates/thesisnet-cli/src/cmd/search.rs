//! Search subcommand - harvest the selection, then filter and page the pool

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement};
use serde::Serialize;

use thesisnet_core::{SHARED_RUNTIME, SharedProgress, Transport, fmt_num, truncate_name};
use thesisnet_harvest::{
    HarvestOutcome, REDIRECT_MIN_QUERY_LEN, Session, SkipReason, View, ViewQuery, view,
};
use thesisnet_oai::{Classification, HarvestRecord};

use super::{TypeArg, build_session, harvest_with_progress, resolve_names, table};
use crate::config::Config;

const TITLE_WIDTH: usize = 70;

/// Pages fetched from each institution outside the selection when looking
/// for a better match
const REDIRECT_PAGES: usize = 1;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Free text; a year like 2019 inside it becomes the year filter
    pub text: Option<String>,

    /// Restrict to these institutions (repeatable); all when omitted
    #[arg(short = 'i', long = "institution")]
    pub institutions: Vec<String>,

    /// Type filter
    #[arg(short = 't', long = "type", value_enum)]
    pub type_filter: Option<TypeArg>,

    /// Exact year (overrides a year inside the text)
    #[arg(short, long)]
    pub year: Option<String>,

    /// Result page to show
    #[arg(long, default_value_t = 1)]
    pub page: usize,

    /// Results per page
    #[arg(long)]
    pub page_size: Option<usize>,

    /// ListRecords pages to fetch per institution
    #[arg(short = 'p', long)]
    pub max_pages: Option<usize>,

    /// Print results as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    #[serde(flatten)]
    view: View<'a>,
    unreachable: Vec<String>,
    suggestion: Option<String>,
}

pub fn run(args: SearchArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let session = build_session(config)?;
    let selected = resolve_names(&session, &args.institutions)?;
    let targets = if selected.is_empty() {
        session.names()
    } else {
        selected.clone()
    };
    let max_pages = args.max_pages.unwrap_or(config.harvest.max_pages);
    let type_filter = args
        .type_filter
        .map_or_else(|| config.harvest.classification(), Into::into);

    let reports = SHARED_RUNTIME.block_on(harvest_with_progress(
        &session,
        &targets,
        max_pages,
        type_filter,
        progress,
    ));
    let unreachable: Vec<String> = reports
        .iter()
        .filter(|r| match &r.outcome {
            HarvestOutcome::Skipped(SkipReason::Offline) => true,
            HarvestOutcome::Failed(e) => e.is_transport(),
            _ => false,
        })
        .map(|r| r.institution.clone())
        .collect();

    let text = args.text.unwrap_or_default();
    let query = ViewQuery::from_search(&text, args.year.as_deref(), type_filter)
        .with_page(args.page)
        .with_page_size(args.page_size.unwrap_or(config.harvest.page_size));
    log::debug!("view query: {query:?}");

    let pool = session.pool(&selected);
    let result = view(&pool, &query);
    let suggestion = if result.is_empty() {
        SHARED_RUNTIME.block_on(find_redirect(
            &session,
            &query.text,
            &selected,
            type_filter,
            progress,
        ))
    } else {
        None
    };

    if args.json {
        let output = SearchOutput {
            view: result,
            unreachable,
            suggestion,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if result.is_empty() {
        eprintln!("\nNo results found.");
        eprintln!("Try a different keyword, year or type, or harvest more pages with --max-pages.");
    } else {
        println!("{}", results_table(&result.items));
        eprintln!(
            "Page {} of {} · {} records from {} harvested",
            result.page,
            result.total_pages,
            fmt_num(result.total),
            fmt_num(pool.len())
        );
    }
    if let Some(name) = suggestion {
        eprintln!("Matching titles were found in {name}; search again with -i {name:?}");
    }
    if !unreachable.is_empty() {
        eprintln!(
            "Unreachable right now: {} (try again later or contact the repository owner)",
            unreachable.join(", ")
        );
    }
    Ok(())
}

/// Institution outside `selected` with a title matching `text`.
///
/// Harvests the first page of every other institution first, so there is
/// something to compare against.
async fn find_redirect<T: Transport>(
    session: &Session<T>,
    text: &str,
    selected: &[String],
    type_filter: Option<Classification>,
    progress: &SharedProgress,
) -> Option<String> {
    if selected.is_empty() || text.trim().chars().count() < REDIRECT_MIN_QUERY_LEN {
        return None;
    }
    let others: Vec<String> = session
        .names()
        .into_iter()
        .filter(|name| !selected.contains(name))
        .collect();
    log::info!("No matches in the selection; checking {} other institutions", others.len());
    harvest_with_progress(session, &others, REDIRECT_PAGES, type_filter, progress).await;
    session.suggest_redirect(text, selected)
}

fn results_table(items: &[&HarvestRecord]) -> comfy_table::Table {
    let mut table = table(&["Title", "Authors", "Year", "Type", "Institution", "Link"]);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    for record in items {
        table.add_row(vec![
            Cell::new(truncate_name(&record.title, TITLE_WIDTH)),
            Cell::new(record.creators.join("; ")),
            Cell::new(&record.year),
            Cell::new(record.classification).fg(Color::Yellow),
            Cell::new(&record.institution),
            Cell::new(&record.link),
        ]);
    }
    table
}
