//! Per-institution harvest cache and the cross-institution result pool
//!
//! A [`Session`] owns the registry and one [`HarvestState`] per institution
//! it has touched. All async work happens without holding the state lock;
//! overlapping harvests of one institution are kept apart by the `in_flight`
//! flag instead.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use rustc_hash::FxHashMap;
use serde::Serialize;
use thesisnet_core::Transport;
use thesisnet_oai::{
    Classification, HarvestRecord, Institution, OaiClient, OaiError, Reachability,
    ReachabilityResult, Registry, normalize,
};

/// Pages fetched per `ensure_harvested` call unless the caller says otherwise
pub const DEFAULT_MAX_PAGES: usize = 2;

/// Shortest query that is checked against other institutions' titles
pub const REDIRECT_MIN_QUERY_LEN: usize = 6;

/// Position in an institution's `ListRecords` sequence.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Cursor {
    /// Nothing fetched yet: next request asks for `metadataPrefix=oai_dc`
    #[default]
    Start,
    /// Next request carries this resumption token
    Resume(String),
    /// Token exhausted, or the repository answered with a protocol error
    Done,
}

impl Cursor {
    fn token(&self) -> Option<&str> {
        match self {
            Self::Resume(token) => Some(token),
            Self::Start | Self::Done => None,
        }
    }

    fn after_page(next_token: Option<String>) -> Self {
        next_token.map_or(Self::Done, Self::Resume)
    }
}

/// Cached harvest of one institution.
#[derive(Debug, Default)]
pub struct HarvestState {
    items: Vec<HarvestRecord>,
    /// `pool_key` → position in `items`
    index: FxHashMap<String, usize>,
    cursor: Cursor,
    in_flight: bool,
    pages_fetched: usize,
    dropped: usize,
    last_error: Option<String>,
    harvest_filter: Option<Classification>,
}

impl HarvestState {
    pub fn items(&self) -> &[HarvestRecord] {
        &self.items
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn is_complete(&self) -> bool {
        self.cursor == Cursor::Done
    }

    /// Append `records`, replacing in place any item with the same pool key.
    fn merge(&mut self, records: Vec<HarvestRecord>) {
        for record in records {
            let key = record.pool_key();
            match self.index.get(&key) {
                Some(&pos) => self.items[pos] = record,
                None => {
                    self.index.insert(key, self.items.len());
                    self.items.push(record);
                }
            }
        }
    }

    /// Forget items and position; an in-flight harvest keeps its guard.
    fn reset(&mut self) {
        self.items.clear();
        self.index.clear();
        self.cursor = Cursor::Start;
        self.pages_fetched = 0;
        self.dropped = 0;
        self.last_error = None;
    }
}

/// Why `ensure_harvested` did nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    UnknownInstitution,
    Offline,
    InFlight,
    Complete,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::UnknownInstitution => "unknown institution",
            Self::Offline => "offline",
            Self::InFlight => "harvest already running",
            Self::Complete => "complete",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HarvestOutcome {
    Skipped(SkipReason),
    /// Pages were fetched; `complete` when the token sequence ended
    Fetched { complete: bool },
    /// Attempt aborted; already cached items are kept
    Failed(OaiError),
}

/// What one `ensure_harvested` call did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HarvestReport {
    pub institution: String,
    pub outcome: HarvestOutcome,
    pub pages: usize,
    pub accepted: usize,
    pub dropped: usize,
}

impl HarvestReport {
    fn skipped(institution: &str, reason: SkipReason) -> Self {
        Self {
            institution: institution.to_string(),
            outcome: HarvestOutcome::Skipped(reason),
            pages: 0,
            accepted: 0,
            dropped: 0,
        }
    }
}

/// Snapshot of one institution for the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InstitutionStatus {
    pub name: String,
    pub country: String,
    pub reachability: Reachability,
    pub base_url: String,
    pub repository_name: Option<String>,
    pub admin_email: Option<String>,
    pub items: usize,
    pub pages_fetched: usize,
    pub dropped: usize,
    pub complete: bool,
    pub in_flight: bool,
    /// Last harvest error, else the last probe diagnostic
    pub message: Option<String>,
}

struct SessionState {
    registry: Registry,
    harvests: FxHashMap<String, HarvestState>,
}

pub struct Session<T> {
    client: OaiClient<T>,
    page_delay: Duration,
    harvest_time_filter: bool,
    state: Mutex<SessionState>,
}

/// Clears `in_flight` on every exit path of a harvest.
struct InFlightGuard<'a> {
    state: &'a Mutex<SessionState>,
    name: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(harvest) = state.harvests.get_mut(&self.name) {
            harvest.in_flight = false;
        }
    }
}

impl<T: Transport> Session<T> {
    pub fn new(client: OaiClient<T>, registry: Registry, page_delay: Duration) -> Self {
        Self {
            client,
            page_delay,
            harvest_time_filter: false,
            state: Mutex::new(SessionState {
                registry,
                harvests: FxHashMap::default(),
            }),
        }
    }

    /// Apply type filters while harvesting instead of only when viewing.
    ///
    /// Dropped records are never fetched again, so a changed filter starts the
    /// institution's harvest over.
    pub fn with_harvest_time_filter(mut self, enabled: bool) -> Self {
        self.harvest_time_filter = enabled;
        self
    }

    pub fn client(&self) -> &OaiClient<T> {
        &self.client
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registry name for user input (see [`Registry::resolve`]).
    pub fn resolve(&self, query: &str) -> Option<String> {
        self.lock().registry.resolve(query).map(|i| i.name.clone())
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().registry.names()
    }

    pub fn institution(&self, name: &str) -> Option<Institution> {
        self.lock().registry.get(name).cloned()
    }

    /// Identify one institution and record its reachability.
    pub async fn probe(&self, name: &str) -> Option<ReachabilityResult> {
        let institution = self.institution(name)?;
        let result = self.client.identify(&institution).await;
        if let Some(inst) = self.lock().registry.get_mut(name) {
            inst.apply_reachability(&result);
        }
        if result.online {
            log::info!("{name}: online");
        } else {
            log::warn!("{name}: offline ({})", result.message.as_deref().unwrap_or("no answer"));
        }
        Some(result)
    }

    /// Identify several institutions concurrently (all when `names` is empty).
    /// Unknown names are skipped.
    pub async fn probe_all(&self, names: &[String]) -> Vec<(String, ReachabilityResult)> {
        let names = if names.is_empty() { self.names() } else { names.to_vec() };
        let probes = names.iter().map(|name| async move {
            self.probe(name).await.map(|result| (name.clone(), result))
        });
        join_all(probes).await.into_iter().flatten().collect()
    }

    /// Fetch up to `max_pages` further pages for `name`, appending thesis-like
    /// records to its cache.
    ///
    /// No-op while another call is harvesting the same institution, when the
    /// institution is offline, or when its token sequence is exhausted.
    pub async fn ensure_harvested(
        &self,
        name: &str,
        max_pages: usize,
        type_filter: Option<Classification>,
    ) -> HarvestReport {
        let strict = if self.harvest_time_filter { type_filter } else { None };

        let (institution, mut cursor) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let Some(institution) = state.registry.get(name).cloned() else {
                return HarvestReport::skipped(name, SkipReason::UnknownInstitution);
            };
            if institution.is_offline() {
                return HarvestReport::skipped(name, SkipReason::Offline);
            }
            let harvest = state.harvests.entry(name.to_string()).or_default();
            if harvest.in_flight {
                return HarvestReport::skipped(name, SkipReason::InFlight);
            }
            if self.harvest_time_filter && harvest.harvest_filter != strict {
                if harvest.pages_fetched > 0 {
                    log::info!("{name}: type filter changed, harvesting again");
                }
                harvest.reset();
                harvest.harvest_filter = strict;
            }
            if harvest.is_complete() {
                return HarvestReport::skipped(name, SkipReason::Complete);
            }
            harvest.in_flight = true;
            (institution, harvest.cursor.clone())
        };
        let _in_flight = InFlightGuard {
            state: &self.state,
            name: name.to_string(),
        };

        let mut report = HarvestReport {
            institution: name.to_string(),
            outcome: HarvestOutcome::Fetched { complete: false },
            pages: 0,
            accepted: 0,
            dropped: 0,
        };

        while report.pages < max_pages && cursor != Cursor::Done {
            if report.pages > 0 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
            let result = self.client.fetch_page(&institution, cursor.token()).await;

            let mut guard = self.lock();
            let state = &mut *guard;
            let harvest = state.harvests.entry(name.to_string()).or_default();
            match result {
                Ok(page) => {
                    let total = page.records.len();
                    let records: Vec<HarvestRecord> = page
                        .records
                        .iter()
                        .filter_map(|raw| normalize(raw, name, strict))
                        .collect();
                    let dropped = total - records.len();

                    report.pages += 1;
                    report.accepted += records.len();
                    report.dropped += dropped;
                    harvest.pages_fetched += 1;
                    harvest.dropped += dropped;
                    harvest.merge(records);
                    harvest.last_error = None;

                    cursor = Cursor::after_page(page.next_token);
                    harvest.cursor = cursor.clone();
                    log::debug!(
                        "{name}: page {} kept {}/{total}, cursor {:?}",
                        harvest.pages_fetched,
                        total - dropped,
                        harvest.cursor
                    );
                }
                Err(e) if e.is_no_records_match() => {
                    log::info!("{name}: no records");
                    cursor = Cursor::Done;
                    harvest.cursor = Cursor::Done;
                }
                Err(e) => {
                    harvest.last_error = Some(e.to_string());
                    if e.is_transport() {
                        log::warn!("{name}: {e}; marking offline");
                        if let Some(inst) = state.registry.get_mut(name) {
                            inst.mark_offline(e.to_string());
                        }
                    } else {
                        log::warn!("{name}: {e}; harvest stopped");
                        harvest.cursor = Cursor::Done;
                    }
                    report.outcome = HarvestOutcome::Failed(e);
                    return report;
                }
            }
        }

        report.outcome = HarvestOutcome::Fetched {
            complete: cursor == Cursor::Done,
        };
        report
    }

    /// `ensure_harvested` for several institutions concurrently.
    pub async fn ensure_all_harvested(
        &self,
        names: &[String],
        max_pages: usize,
        type_filter: Option<Classification>,
    ) -> Vec<HarvestReport> {
        join_all(
            names
                .iter()
                .map(|name| self.ensure_harvested(name, max_pages, type_filter)),
        )
        .await
    }

    /// Drop cached items and start the institution's harvest over.
    pub fn invalidate(&self, name: &str) {
        if let Some(harvest) = self.lock().harvests.get_mut(name) {
            harvest.reset();
        }
    }

    /// Restart the resumption sequence but keep cached items.
    ///
    /// Records fetched again replace their cached copies by key, so a refresh
    /// never grows the cache. Page and drop counters start over.
    pub fn rewind(&self, name: &str) {
        if let Some(harvest) = self.lock().harvests.get_mut(name) {
            harvest.cursor = Cursor::Start;
            harvest.pages_fetched = 0;
            harvest.dropped = 0;
            harvest.last_error = None;
        }
    }

    /// Union of cached items for `selected` (all institutions when empty),
    /// deduplicated by [`HarvestRecord::pool_key`]. Later entries replace
    /// earlier ones in place.
    pub fn pool(&self, selected: &[String]) -> Vec<HarvestRecord> {
        let state = self.lock();
        let wanted: HashSet<&str> = selected.iter().map(String::as_str).collect();

        let mut pool: Vec<HarvestRecord> = Vec::new();
        let mut index: FxHashMap<String, usize> = FxHashMap::default();
        for inst in state.registry.iter() {
            if !wanted.is_empty() && !wanted.contains(inst.name.as_str()) {
                continue;
            }
            let Some(harvest) = state.harvests.get(&inst.name) else {
                continue;
            };
            for record in &harvest.items {
                match index.get(&record.pool_key()) {
                    Some(&pos) => pool[pos] = record.clone(),
                    None => {
                        index.insert(record.pool_key(), pool.len());
                        pool.push(record.clone());
                    }
                }
            }
        }
        pool
    }

    /// Institution outside `selected` whose cached titles match `query`, when
    /// nothing inside the selection does.
    ///
    /// Only a suggestion: the selection is never changed.
    pub fn suggest_redirect(&self, query: &str, selected: &[String]) -> Option<String> {
        let query = query.trim().to_lowercase();
        if query.chars().count() < REDIRECT_MIN_QUERY_LEN || selected.is_empty() {
            return None;
        }
        let state = self.lock();
        let matches = |name: &str| {
            state.harvests.get(name).is_some_and(|h| {
                h.items.iter().any(|r| {
                    let title = r.title.to_lowercase();
                    title == query || title.contains(&query)
                })
            })
        };

        if selected.iter().any(|name| matches(name.as_str())) {
            return None;
        }
        let found = state
            .registry
            .iter()
            .filter(|inst| !selected.contains(&inst.name))
            .find(|inst| matches(inst.name.as_str()))
            .map(|inst| inst.name.clone());
        found
    }

    /// Per-institution reachability and harvest progress, registry order.
    pub fn status(&self) -> Vec<InstitutionStatus> {
        let state = self.lock();
        state
            .registry
            .iter()
            .map(|inst| {
                let harvest = state.harvests.get(&inst.name);
                let last_error = harvest.and_then(|h| h.last_error.clone());
                InstitutionStatus {
                    name: inst.name.clone(),
                    country: inst.country.clone(),
                    reachability: inst.reachability(),
                    base_url: inst.base_url().to_string(),
                    repository_name: inst.repository_name().map(String::from),
                    admin_email: inst.admin_email().map(String::from),
                    items: harvest.map_or(0, |h| h.items.len()),
                    pages_fetched: harvest.map_or(0, |h| h.pages_fetched),
                    dropped: harvest.map_or(0, |h| h.dropped),
                    complete: harvest.is_some_and(HarvestState::is_complete),
                    in_flight: harvest.is_some_and(|h| h.in_flight),
                    message: last_error.or_else(|| inst.last_message().map(String::from)),
                }
            })
            .collect()
    }

    /// Read access to one institution's cache.
    pub fn with_harvest<R>(&self, name: &str, f: impl FnOnce(Option<&HarvestState>) -> R) -> R {
        f(self.lock().harvests.get(name))
    }
}
