//! Identifier issuance for director state.

use std::collections::BTreeMap;

/// Issues `prefix-N` identifiers, counting each prefix separately.
///
/// One counter lives inside each [`Director`](super::Director), so two
/// conversations never share a sequence.
#[derive(Debug, Clone, Default)]
pub struct IdCounter {
    counts: BTreeMap<String, u64>,
}

impl IdCounter {
    /// Create an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next identifier for `prefix`, starting at 1.
    pub fn next(&mut self, prefix: &str) -> String {
        let count = self.counts.entry(prefix.to_string()).or_insert(0);
        *count += 1;
        format!("{prefix}-{count}")
    }
}
