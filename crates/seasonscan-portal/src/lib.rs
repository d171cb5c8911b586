//! Live portal implementations of the engine's `Transport` and `ReportParser`

pub mod client;
pub mod parse;

pub use client::{Credentials, DEFAULT_BASE_URL, PortalClient, PortalConfig};
pub use parse::{HtmlReportParser, parse_report};
