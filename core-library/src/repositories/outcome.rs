//! Result of a per-record bulk write

use serde::{Deserialize, Serialize};

/// One record that could not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFailure {
    /// Natural key of the record (may be empty when the key itself was invalid)
    pub key: String,
    pub message: String,
}

/// Outcome of `upsert_many`.
///
/// Every input record ends up either counted in `written` or listed in
/// `failures`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkWriteOutcome {
    pub written: usize,
    pub failures: Vec<WriteFailure>,
}

impl BulkWriteOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_written(&mut self) {
        self.written += 1;
    }

    pub fn record_failure(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.failures.push(WriteFailure {
            key: key.into(),
            message: message.into(),
        });
    }

    /// True when no record failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accounting() {
        let mut outcome = BulkWriteOutcome::new();
        assert!(outcome.is_complete());

        outcome.record_written();
        outcome.record_written();
        outcome.record_failure("mem_3", "constraint failed");

        assert_eq!(outcome.written, 2);
        assert_eq!(outcome.failed(), 1);
        assert!(!outcome.is_complete());
        assert_eq!(outcome.failures[0].key, "mem_3");
    }
}
