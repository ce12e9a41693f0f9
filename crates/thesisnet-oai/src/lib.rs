//! thesisnet OAI - OAI-PMH access to DSpace repositories
//!
//! Talks `Identify` and `ListRecords` (oai_dc) through the proxy transport
//! and turns Dublin Core records into [`HarvestRecord`]s.
//!
//! # Example
//!
//! ```ignore
//! use thesisnet_oai::{OaiClient, Registry, normalize};
//!
//! let registry = Registry::builtin();
//! let uct = registry.resolve("uct").unwrap();
//! let page = client.fetch_page(uct, None).await?;
//! let records: Vec<_> = page
//!     .records
//!     .iter()
//!     .filter_map(|raw| normalize(raw, &uct.name, None))
//!     .collect();
//! ```

pub mod client;
pub mod error;
pub mod normalize;
pub mod record;
pub mod registry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod xml;

// Re-exports
pub use client::{OaiClient, Page, RawRecord, ReachabilityResult, parse_page};
pub use error::OaiError;
pub use normalize::{normalize, year_span, year_token};
pub use record::{Classification, HarvestRecord, UNTITLED};
pub use registry::{Institution, InstitutionSpec, Reachability, Registry};
