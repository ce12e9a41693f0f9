//! thesisnet Harvest - harvest cache, result pool and browsing view
//!
//! A [`Session`] harvests institutions on demand and keeps what it fetched for
//! the rest of the session. [`view`] filters and paginates the pooled records.
//!
//! # Example
//!
//! ```ignore
//! use thesisnet_harvest::{Session, ViewQuery, view, DEFAULT_MAX_PAGES};
//!
//! let session = Session::new(client, Registry::builtin(), config.page_delay);
//! session.ensure_harvested("Wits (WIReDSpace)", DEFAULT_MAX_PAGES, None).await;
//! let pool = session.pool(&[]);
//! let page = view(&pool, &ViewQuery::from_search("mining 2019", None, None));
//! ```

pub mod session;
pub mod view;

// Re-exports
pub use session::{
    Cursor, DEFAULT_MAX_PAGES, HarvestOutcome, HarvestReport, HarvestState, InstitutionStatus,
    REDIRECT_MIN_QUERY_LEN, Session, SkipReason,
};
pub use view::{DEFAULT_PAGE_SIZE, View, ViewQuery, ViewState, view};
