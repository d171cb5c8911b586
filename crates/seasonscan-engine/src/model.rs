//! Identifiers, periods, and the request/response units of a lookup

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reporting year.
pub type Period = u32;

/// Candidate grower key: alphabetic prefix + numeric suffix (`V100081`).
///
/// Ordered by the numeric suffix, then by prefix.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier {
    prefix: String,
    number: u64,
}

impl Identifier {
    pub fn new(prefix: impl Into<String>, number: u64) -> Self {
        Self {
            prefix: prefix.into(),
            number,
        }
    }

    /// Split `V100081` into prefix `V` and number `100081`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let split = s.find(|c: char| c.is_ascii_digit())?;
        let (prefix, digits) = s.split_at(split);
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(Self::new(prefix, digits.parse().ok()?))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn number(&self) -> u64 {
        self.number
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.number
            .cmp(&other.number)
            .then_with(|| self.prefix.cmp(&other.prefix))
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.number)
    }
}

impl TryFrom<String> for Identifier {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| format!("invalid identifier: {s:?}"))
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.to_string()
    }
}

/// Closed range of candidate identifiers sharing one prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentifierRange {
    pub prefix: String,
    pub start: u64,
    pub end: u64,
}

/// One slice of the identifier range, processed as a unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    pub index: usize,
    pub identifiers: Vec<Identifier>,
}

impl Batch {
    pub fn first(&self) -> Option<&Identifier> {
        self.identifiers.first()
    }

    pub fn last(&self) -> Option<&Identifier> {
        self.identifiers.last()
    }
}

impl IdentifierRange {
    pub fn new(prefix: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            prefix: prefix.into(),
            start,
            end,
        }
    }

    /// Number of identifiers in the range (0 when `end < start`), saturating
    /// at `u64::MAX` for the full range.
    pub fn len(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start).saturating_add(1)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consecutive batches of at most `size` identifiers, ascending.
    pub fn batches(&self, size: usize) -> impl Iterator<Item = Batch> + '_ {
        let size = size.max(1) as u64;
        let mut next = (self.start <= self.end).then_some(self.start);
        let mut index = 0;
        std::iter::from_fn(move || {
            let lo = next?;
            let hi = lo.saturating_add(size - 1).min(self.end);
            next = hi.checked_add(1).filter(|n| *n <= self.end);
            let batch = Batch {
                index,
                identifiers: (lo..=hi)
                    .map(|n| Identifier::new(self.prefix.clone(), n))
                    .collect(),
            };
            index += 1;
            Some(batch)
        })
    }

    pub fn batch_count(&self, size: usize) -> usize {
        self.len().div_ceil(size.max(1) as u64) as usize
    }
}

/// Closed interval of reporting years `[start, current]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeriodRange {
    start: Period,
    current: Period,
}

impl PeriodRange {
    /// `None` when `current < start`.
    pub fn new(start: Period, current: Period) -> Option<Self> {
        (start <= current).then_some(Self { start, current })
    }

    pub fn start(&self) -> Period {
        self.start
    }

    pub fn current(&self) -> Period {
        self.current
    }

    /// Periods strictly after `first`, up to and including `current`.
    pub fn after(&self, first: Period) -> impl Iterator<Item = Period> {
        first.saturating_add(1).max(self.start)..=self.current
    }
}

/// One (identifier, period) lookup.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LookupRequest {
    pub identifier: Identifier,
    pub period: Period,
}

impl LookupRequest {
    pub fn new(identifier: Identifier, period: Period) -> Self {
        Self { identifier, period }
    }
}

impl fmt::Display for LookupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} season {}", self.identifier, self.period)
    }
}

/// Response body as returned by the portal. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    pub body: String,
}

impl RawResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_parse_and_display() {
        let id = Identifier::parse("V100081").unwrap();
        assert_eq!(id.prefix(), "V");
        assert_eq!(id.number(), 100081);
        assert_eq!(id.to_string(), "V100081");
    }

    #[test]
    fn identifier_parse_rejects_garbage() {
        assert_eq!(Identifier::parse(""), None);
        assert_eq!(Identifier::parse("V"), None);
        assert_eq!(Identifier::parse("V12A"), None);
    }

    #[test]
    fn identifier_orders_by_number() {
        let a = Identifier::new("V", 9);
        let b = Identifier::new("V", 10);
        assert!(a < b);
        // "V9" > "V10" as strings, but not as identifiers
        assert!(a.to_string() > b.to_string());
    }

    #[test]
    fn identifier_serde_as_string() {
        let id = Identifier::new("V", 42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"V42\"");
        let back: Identifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn batches_cover_range() {
        let range = IdentifierRange::new("V", 100, 104);
        let batches: Vec<_> = range.batches(2).collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(range.batch_count(2), 3);
        assert_eq!(batches[0].identifiers.len(), 2);
        assert_eq!(batches[2].identifiers, vec![Identifier::new("V", 104)]);
        assert_eq!(batches[1].first().unwrap().number(), 102);
        assert_eq!(batches[2].index, 2);
    }

    #[test]
    fn empty_range_has_no_batches() {
        let range = IdentifierRange::new("V", 10, 9);
        assert!(range.is_empty());
        assert_eq!(range.batches(5).count(), 0);
    }

    #[test]
    fn range_edges_do_not_overflow() {
        let top = IdentifierRange::new("V", u64::MAX - 2, u64::MAX);
        assert_eq!(top.len(), 3);
        let batches: Vec<Batch> = top.batches(2).collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].index, 1);
        assert_eq!(batches[1].identifiers, vec![Identifier::new("V", u64::MAX)]);

        let full = IdentifierRange::new("V", 0, u64::MAX);
        assert_eq!(full.len(), u64::MAX);
        let first = full.batches(100).next().unwrap();
        assert_eq!(first.first(), Some(&Identifier::new("V", 0)));
        assert_eq!(first.identifiers.len(), 100);
    }

    #[test]
    fn period_range_bounds() {
        assert!(PeriodRange::new(2020, 2019).is_none());
        let periods = PeriodRange::new(2018, 2020).unwrap();
        assert_eq!((periods.start(), periods.current()), (2018, 2020));
        assert_eq!(periods.after(2017).collect::<Vec<_>>(), vec![2018, 2019, 2020]);
    }

    #[test]
    fn periods_after_first_exclude_first() {
        let periods = PeriodRange::new(2018, 2021).unwrap();
        assert_eq!(periods.after(2019).collect::<Vec<_>>(), vec![2020, 2021]);
        assert_eq!(periods.after(2021).count(), 0);
    }
}
