use std::collections::HashSet;

/// Set of review ids accepted so far, across this run and all earlier ones.
///
/// Ids are only ever inserted. Persistence lives in `db`; this type does no I/O.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupLedger {
    seen: HashSet<String>,
}

impl DedupLedger {
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Returns true if the id was not present before.
    pub fn add(&mut self, id: impl Into<String>) -> bool {
        self.seen.insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Full membership, sorted so persisted output is stable.
    pub fn snapshot(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.seen.iter().cloned().collect();
        ids.sort();
        ids
    }
}

impl FromIterator<String> for DedupLedger {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            seen: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent() {
        let mut ledger = DedupLedger::default();
        assert!(ledger.add("r1"));
        assert!(!ledger.add("r1"));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains("r1"));
        assert!(!ledger.contains("r2"));
    }

    #[test]
    fn snapshot_restores_to_equal_ledger() {
        let mut ledger = DedupLedger::default();
        for id in ["b", "a", "c", "a"] {
            ledger.add(id);
        }
        let snapshot = ledger.snapshot();
        assert_eq!(snapshot, vec!["a", "b", "c"]);

        let restored: DedupLedger = snapshot.into_iter().collect();
        assert_eq!(restored, ledger);
    }

    #[test]
    fn restoring_with_duplicates_collapses_them() {
        let restored: DedupLedger = ["x", "x", "y"].into_iter().map(String::from).collect();
        assert_eq!(restored.len(), 2);
    }
}
