//! Dedup & cap accumulator shared by every enumeration engine.
//!
//! The accumulator is the only shared mutable resource inside a run. All
//! mutation goes through [`Accumulator::insert`]; the hard cap surfaced by
//! [`Accumulator::is_full`] is the primary cancellation signal and is checked
//! after every insertion attempt.

use std::collections::HashSet;

use crate::models::Record;

/// Ordered row store keyed by canonical identity.
#[derive(Debug, Default)]
pub struct Accumulator {
    rows: Vec<Record>,
    seen: HashSet<String>,
    cap: usize,
}

impl Accumulator {
    /// Create an accumulator with the given hard cap (0 = unlimited).
    pub fn new(cap: usize) -> Self {
        Self {
            rows: Vec::new(),
            seen: HashSet::new(),
            cap,
        }
    }

    /// Insert a record; returns whether it was accepted.
    ///
    /// Rejected when the canonical identity is empty, already seen
    /// (first-seen wins, never overwritten), or the cap is reached.
    pub fn insert(&mut self, record: Record) -> bool {
        if self.is_full() {
            return false;
        }
        let identity = record.identity();
        if identity.is_empty() || self.seen.contains(&identity) {
            return false;
        }
        self.seen.insert(identity);
        self.rows.push(record);
        true
    }

    /// True once the configured cap is reached.
    pub fn is_full(&self) -> bool {
        self.cap > 0 && self.rows.len() >= self.cap
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether a canonical identity has already been accumulated.
    pub fn contains(&self, identity: &str) -> bool {
        self.seen.contains(identity)
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// Immutable snapshot copy for checkpointing.
    pub fn snapshot(&self) -> Vec<Record> {
        self.rows.clone()
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IDENTITY_FIELD;

    fn record(number: &str) -> Record {
        Record::from_pairs([(IDENTITY_FIELD, number)])
    }

    #[test]
    fn test_insert_dedups_by_canonical_identity() {
        let mut acc = Accumulator::new(0);
        assert!(acc.insert(record("00123456")));
        // Same canonical identity, different raw formatting.
        assert!(!acc.insert(record("00123-456")));
        assert_eq!(acc.len(), 1);
    }

    #[test]
    fn test_insert_idempotent() {
        let mut acc = Accumulator::new(0);
        acc.insert(record("001"));
        let before = acc.len();
        acc.insert(record("001"));
        assert_eq!(acc.len(), before);
    }

    #[test]
    fn test_first_seen_wins() {
        let mut acc = Accumulator::new(0);
        let mut first = record("001");
        first.set("Status", "MARKETED");
        let mut second = record("001");
        second.set("Status", "DISCONTINUED");

        acc.insert(first);
        acc.insert(second);
        assert_eq!(acc.rows()[0].get("Status"), "MARKETED");
    }

    #[test]
    fn test_empty_identity_rejected() {
        let mut acc = Accumulator::new(0);
        assert!(!acc.insert(record("")));
        assert!(!acc.insert(record("no digits")));
        assert!(acc.is_empty());
    }

    #[test]
    fn test_cap_enforced() {
        let mut acc = Accumulator::new(3);
        for i in 0..10 {
            acc.insert(record(&format!("{i:03}")));
        }
        assert_eq!(acc.len(), 3);
        assert!(acc.is_full());
        assert!(!acc.insert(record("999")));
        assert_eq!(acc.len(), 3);
    }

    #[test]
    fn test_zero_cap_is_unlimited() {
        let mut acc = Accumulator::new(0);
        for i in 0..100 {
            acc.insert(record(&format!("{i:04}")));
        }
        assert_eq!(acc.len(), 100);
        assert!(!acc.is_full());
    }
}
