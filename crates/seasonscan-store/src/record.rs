//! On-disk record envelope: the payload plus when it was saved

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Bumped when the record layout changes incompatibly.
pub const CURRENT_FORMAT_VERSION: u32 = 1;

/// JSON file written for every grower and every season.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record<T> {
    pub format_version: u32,
    pub saved_at: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Record<T> {
    pub fn new(data: T) -> Self {
        Self {
            format_version: CURRENT_FORMAT_VERSION,
            saved_at: chrono::Utc::now(),
            data,
        }
    }

    /// "2025-03-14 09:26"
    pub fn saved_at_display(&self) -> String {
        self.saved_at.format("%Y-%m-%d %H:%M").to_string()
    }
}

impl<T: Serialize> Record<T> {
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }
}

impl<T: DeserializeOwned> Record<T> {
    pub fn read_from(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let record: Self = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        anyhow::ensure!(
            record.format_version == CURRENT_FORMAT_VERSION,
            "{}: format_version {} != current {}",
            path.display(),
            record.format_version,
            CURRENT_FORMAT_VERSION
        );
        Ok(record)
    }
}
