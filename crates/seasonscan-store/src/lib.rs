//! seasonscan-store: on-disk store for discovered growers
//!
//! One directory per grower holding its identity and one JSON file per
//! season. Files are written once via tmp-then-rename, so re-running a scan
//! over the same range never duplicates or rewrites data.

pub mod record;
pub mod store;

pub use record::{CURRENT_FORMAT_VERSION, Record};
pub use store::{DirStore, GrowerEntry};
