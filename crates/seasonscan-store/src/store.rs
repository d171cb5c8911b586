//! Directory store for growers and their seasons
//!
//! Directory layout:
//! ```text
//! {base}/
//! └── growers/
//!     └── {identifier}/      # e.g. V100081
//!         ├── grower.json    # identity
//!         ├── 2019.json      # one file per season
//!         └── 2020.json
//! ```
//!
//! Every file is written to `{name}.tmp` first and renamed into place, so a
//! season is either fully present or absent. An existing file is never
//! overwritten.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use seasonscan_engine::{Grower, GrowerIdentity, Identifier, Period, SeasonalReport, Store, Upsert};
use serde::Serialize;

use crate::record::Record;

const GROWER_FILE: &str = "grower.json";

/// Stored grower with a few facts for listing.
#[derive(Debug, Clone)]
pub struct GrowerEntry {
    pub grower: Grower,
    pub seasons: usize,
    pub saved_at: String,
}

/// Grower/season store rooted at a data directory.
pub struct DirStore {
    base: PathBuf,
}

impl DirStore {
    /// Open (creating if needed) a store rooted at `base`.
    pub fn new(base: &Path) -> Result<Self> {
        let growers_dir = base.join("growers");
        fs::create_dir_all(&growers_dir)
            .with_context(|| format!("failed to create store dir: {}", growers_dir.display()))?;
        Ok(Self {
            base: base.to_path_buf(),
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn growers_dir(&self) -> PathBuf {
        self.base.join("growers")
    }

    pub fn grower_dir(&self, id: &Identifier) -> PathBuf {
        self.growers_dir().join(id.to_string())
    }

    fn season_path(&self, id: &Identifier, period: Period) -> PathBuf {
        self.grower_dir(id).join(format!("{period}.json"))
    }

    /// Write `data` to `path` via a `.tmp` sibling. An existing `path` is
    /// left untouched.
    fn write_new<T: Serialize>(path: &Path, data: T) -> Result<Upsert> {
        if path.exists() {
            return Ok(Upsert::AlreadyPresent);
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        Record::new(data).write_to(&tmp)?;

        if path.exists() {
            // Written by someone else in the meantime
            log::debug!("store: {} already exists, removing tmp", path.display());
            fs::remove_file(&tmp)
                .with_context(|| format!("failed to remove tmp {}", tmp.display()))?;
            return Ok(Upsert::AlreadyPresent);
        }
        fs::rename(&tmp, path).with_context(|| {
            format!("failed to rename {} → {}", tmp.display(), path.display())
        })?;
        Ok(Upsert::Inserted)
    }

    /// Stored grower, if any.
    pub fn grower(&self, id: &Identifier) -> Result<Option<Grower>> {
        let path = self.grower_dir(id).join(GROWER_FILE);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Record::<Grower>::read_from(&path)?.data))
    }

    /// Every stored season of one grower, ascending.
    pub fn seasons(&self, id: &Identifier) -> Result<Vec<SeasonalReport>> {
        self.periods_persisted(id)?
            .into_iter()
            .map(|period| {
                Record::<SeasonalReport>::read_from(&self.season_path(id, period))
                    .map(|r| r.data)
            })
            .collect()
    }

    /// All stored growers ordered by identifier. Unreadable entries are
    /// skipped with a warning.
    pub fn list(&self) -> Result<Vec<GrowerEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.growers_dir())? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(id) = Identifier::parse(&name) else {
                log::warn!("skipping {name}: not a grower identifier");
                continue;
            };
            let path = entry.path().join(GROWER_FILE);
            if !path.exists() {
                continue;
            }
            match Record::<Grower>::read_from(&path) {
                Ok(record) => entries.push(GrowerEntry {
                    seasons: self.periods_persisted(&id)?.len(),
                    saved_at: record.saved_at_display(),
                    grower: record.data,
                }),
                Err(e) => log::warn!("skipping {name}: {e:#}"),
            }
        }
        entries.sort_by(|a, b| a.grower.id().cmp(b.grower.id()));
        Ok(entries)
    }

    /// Case-insensitive substring search over identifier, portal number,
    /// name, surname, province and farm name.
    pub fn search(&self, query: &str) -> Result<Vec<GrowerEntry>> {
        let needle = query.trim().to_lowercase();
        Ok(self
            .list()?
            .into_iter()
            .filter(|e| needle.is_empty() || matches_query(&e.grower.identity, &needle))
            .collect())
    }

    /// Remove `.tmp` files left behind by an interrupted run.
    pub fn cleanup_tmp(&self) -> Result<usize> {
        let mut count = 0;
        for entry in fs::read_dir(self.growers_dir())? {
            let dir = entry?.path();
            if !dir.is_dir() {
                continue;
            }
            for file in fs::read_dir(&dir)? {
                let path = file?.path();
                if path.extension().is_some_and(|ext| ext == "tmp") {
                    log::info!("cleaning stale tmp: {}", path.display());
                    fs::remove_file(&path)?;
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}

fn matches_query(identity: &GrowerIdentity, needle: &str) -> bool {
    let id = identity.id.to_string();
    let hit = [
        Some(id.as_str()),
        identity.portal_number.as_deref(),
        Some(identity.name.as_str()),
        Some(identity.surname.as_str()),
        Some(identity.farming_province.as_str()),
        Some(identity.farm_name.as_str()),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(needle));
    hit
}

impl Store for DirStore {
    fn grower_exists(&self, id: &Identifier) -> Result<bool> {
        Ok(self.grower_dir(id).join(GROWER_FILE).exists())
    }

    fn periods_persisted(&self, id: &Identifier) -> Result<BTreeSet<Period>> {
        let dir = self.grower_dir(id);
        if !dir.exists() {
            return Ok(BTreeSet::new());
        }
        let mut periods = BTreeSet::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("failed to read {}", dir.display()))? {
            let name = entry?.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if let Ok(period) = stem.parse::<Period>() {
                periods.insert(period);
            }
        }
        Ok(periods)
    }

    fn upsert_grower(&self, identity: &GrowerIdentity) -> Result<(Grower, Upsert)> {
        if let Some(existing) = self.grower(&identity.id)? {
            return Ok((existing, Upsert::AlreadyPresent));
        }
        let dir = self.grower_dir(&identity.id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let grower = Grower {
            identity: identity.clone(),
        };
        let upsert = Self::write_new(&dir.join(GROWER_FILE), &grower)?;
        if upsert == Upsert::AlreadyPresent {
            // Lost a race; report what is on disk
            if let Some(existing) = self.grower(&identity.id)? {
                return Ok((existing, upsert));
            }
        }
        Ok((grower, upsert))
    }

    fn upsert_seasonal_report(&self, grower: &Grower, report: &SeasonalReport) -> Result<Upsert> {
        anyhow::ensure!(
            self.grower_exists(grower.id())?,
            "unknown grower {}",
            grower.id()
        );
        Self::write_new(&self.season_path(grower.id(), report.period), report)
    }
}
