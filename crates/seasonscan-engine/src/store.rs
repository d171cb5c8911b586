//! Persistence contract consulted for resume and idempotency

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use anyhow::Result;

use crate::model::{Identifier, Period};
use crate::report::{Grower, GrowerIdentity, SeasonalReport};

/// What an idempotent write did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    /// The record already existed; nothing was written.
    AlreadyPresent,
}

impl Upsert {
    pub fn inserted(self) -> bool {
        self == Self::Inserted
    }
}

/// Grower and season persistence.
///
/// `upsert_seasonal_report` must be all-or-nothing (summary, grades and
/// creditors land together or not at all) and idempotent on
/// (grower, period): a second write for the same pair is `AlreadyPresent`.
pub trait Store: Sync {
    fn grower_exists(&self, id: &Identifier) -> Result<bool>;

    fn periods_persisted(&self, id: &Identifier) -> Result<BTreeSet<Period>>;

    /// Insert the grower if new; an existing grower is returned unchanged.
    fn upsert_grower(&self, identity: &GrowerIdentity) -> Result<(Grower, Upsert)>;

    fn upsert_seasonal_report(&self, grower: &Grower, report: &SeasonalReport) -> Result<Upsert>;
}

impl<S: Store> Store for &S {
    fn grower_exists(&self, id: &Identifier) -> Result<bool> {
        (**self).grower_exists(id)
    }

    fn periods_persisted(&self, id: &Identifier) -> Result<BTreeSet<Period>> {
        (**self).periods_persisted(id)
    }

    fn upsert_grower(&self, identity: &GrowerIdentity) -> Result<(Grower, Upsert)> {
        (**self).upsert_grower(identity)
    }

    fn upsert_seasonal_report(&self, grower: &Grower, report: &SeasonalReport) -> Result<Upsert> {
        (**self).upsert_seasonal_report(grower, report)
    }
}

/// In-process store; used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    growers: BTreeMap<Identifier, Grower>,
    reports: BTreeMap<(Identifier, Period), SeasonalReport>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grower_count(&self) -> usize {
        self.inner.lock().expect("store lock poisoned").growers.len()
    }

    pub fn report_count(&self) -> usize {
        self.inner.lock().expect("store lock poisoned").reports.len()
    }

    pub fn report(&self, id: &Identifier, period: Period) -> Option<SeasonalReport> {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .reports
            .get(&(id.clone(), period))
            .cloned()
    }

    pub fn grower(&self, id: &Identifier) -> Option<Grower> {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .growers
            .get(id)
            .cloned()
    }
}

impl Store for MemoryStore {
    fn grower_exists(&self, id: &Identifier) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .expect("store lock poisoned")
            .growers
            .contains_key(id))
    }

    fn periods_persisted(&self, id: &Identifier) -> Result<BTreeSet<Period>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .reports
            .range((id.clone(), Period::MIN)..=(id.clone(), Period::MAX))
            .map(|((_, period), _)| *period)
            .collect())
    }

    fn upsert_grower(&self, identity: &GrowerIdentity) -> Result<(Grower, Upsert)> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if let Some(existing) = inner.growers.get(&identity.id) {
            return Ok((existing.clone(), Upsert::AlreadyPresent));
        }
        let grower = Grower {
            identity: identity.clone(),
        };
        inner.growers.insert(identity.id.clone(), grower.clone());
        Ok((grower, Upsert::Inserted))
    }

    fn upsert_seasonal_report(&self, grower: &Grower, report: &SeasonalReport) -> Result<Upsert> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        anyhow::ensure!(
            inner.growers.contains_key(grower.id()),
            "unknown grower {}",
            grower.id()
        );
        let key = (grower.id().clone(), report.period);
        if inner.reports.contains_key(&key) {
            return Ok(Upsert::AlreadyPresent);
        }
        inner.reports.insert(key, report.clone());
        Ok(Upsert::Inserted)
    }
}
