//! thesisnet Core - shared infrastructure for the OAI-PMH harvester
//!
//! Transport to the proxy collaborator, its error type, logging setup and
//! terminal progress lines. Nothing in here knows about OAI-PMH.

pub mod error;
pub mod http;
pub mod logging;
pub mod progress;

// Re-exports for convenience
pub use error::TransportError;
pub use http::{HttpConfig, ProxyResponse, ProxyTransport, SHARED_RUNTIME, Transport, with_timeout};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num, truncate_name};
