//! seasonscan core - shared infrastructure for portal scanning
//!
//! Dispatch pacing, the thread-pool work queue, retry budgets, the abort
//! signal, lookup counters, and logging/progress plumbing. Nothing here
//! knows about growers or reports.

pub mod abort;
pub mod gate;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod stats;
pub mod work_queue;

// Re-exports for convenience
pub use abort::AbortSignal;
pub use gate::{DispatchGate, DispatchPermit};
pub use logging::{IndicatifLogger, Verbosity, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_elapsed, fmt_num};
pub use retry::{RetryConfig, backoff_duration};
pub use stats::{Stats, StatsSnapshot};
pub use work_queue::WorkQueue;
