//! seasonscan engine - discovery and full-history fetch over a grower portal
//!
//! The portal has no listing: the only way to learn whether an identifier
//! exists is to look it up. This crate probes a range of identifiers season
//! by season, records the first season each grower appears in, then fetches
//! the remaining seasons. Transport, parsing and storage are traits so the
//! engine runs the same against the live portal and against fixtures.

pub mod backend;
pub mod discovery;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod parser;
pub mod report;
pub mod retry;
pub mod store;
pub mod transport;

pub use backend::{Backend, Scheduler};
pub use discovery::{DiscoveryEngine, DiscoveryResult, ProbeState};
pub use error::{LookupFailure, ParseError, RunAborted, RunError, TransportError};
pub use model::{Batch, Identifier, IdentifierRange, LookupRequest, Period, PeriodRange, RawResponse};
pub use orchestrator::{BatchOrchestrator, BatchReport, RunState, RunSummary, ScanConfig};
pub use parser::{Parsed, ReportParser};
pub use report::{
    CreditorRecovery, GradeEntry, Grower, GrowerIdentity, SalesSummary, SeasonalReport,
    StructuredReport,
};
pub use retry::{FetchOutcome, RetryPolicy};
pub use store::{MemoryStore, Store, Upsert};
pub use transport::{DispatchError, Dispatcher, Transport};
