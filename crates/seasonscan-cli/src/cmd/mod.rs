pub mod discover;
pub mod growers;
pub mod show;

use anyhow::{Result, bail};
use seasonscan_engine::Identifier;

/// `V100081` as written, or a bare `100081` under `default_prefix`.
pub fn parse_identifier(s: &str, default_prefix: &str) -> Result<Identifier> {
    let Some(id) = Identifier::parse(s) else {
        bail!("invalid grower number {s:?} (expected e.g. {default_prefix}100081)");
    };
    if id.prefix().is_empty() {
        return Ok(Identifier::new(default_prefix, id.number()));
    }
    Ok(id)
}

/// "12.50", or "-" when the portal left the cell empty.
pub fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}
