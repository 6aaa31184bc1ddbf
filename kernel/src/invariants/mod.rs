// Ledger Invariants
//
// Pure per-entry rules checked before a ledger is persisted.
// A violating ledger is never written back.

use crate::log::{CommitEntry, CommitHash, Ledger, MAX_APPLIED_POLICIES};

/// A rule every stored `CommitEntry` has to satisfy.
///
/// `check` looks at one entry in isolation and returns the problem, if any.
pub trait Invariant: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, entry: &CommitEntry) -> Option<String>;
}

/// Every entry carries a non-blank commit hash.
pub struct NonEmptyHash;

impl Invariant for NonEmptyHash {
    fn name(&self) -> &'static str {
        "non-empty-hash"
    }

    fn check(&self, entry: &CommitEntry) -> Option<String> {
        entry
            .commit_hash
            .as_str()
            .trim()
            .is_empty()
            .then(|| "commit hash is empty".to_owned())
    }
}

/// At most `MAX_APPLIED_POLICIES` change descriptions per entry.
pub struct BoundedChanges;

impl Invariant for BoundedChanges {
    fn name(&self) -> &'static str {
        "bounded-changes"
    }

    fn check(&self, entry: &CommitEntry) -> Option<String> {
        let count = entry.applied_policies.len();
        (count > MAX_APPLIED_POLICIES).then(|| format!("{count} changes listed, limit is {MAX_APPLIED_POLICIES}"))
    }
}

/// Rules checked by `Guardian` before a ledger is saved.
#[derive(Default)]
pub struct InvariantEngine {
    rules: Vec<Box<dyn Invariant>>,
}

impl InvariantEngine {
    /// No rules; every ledger passes.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        Self::new().with(NonEmptyHash).with(BoundedChanges)
    }

    pub fn with<I: Invariant + 'static>(mut self, rule: I) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Walks the ledger newest first and reports the first offending entry.
    pub fn evaluate(&self, ledger: &Ledger) -> Result<(), InvariantViolation> {
        for (position, entry) in ledger.entries().enumerate() {
            for rule in &self.rules {
                if let Some(reason) = rule.check(entry) {
                    return Err(InvariantViolation {
                        invariant: rule.name(),
                        position,
                        hash: entry.commit_hash.clone(),
                        reason,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Ledger entry that would be saved in a broken state.
#[derive(Debug, thiserror::Error)]
#[error("ledger entry #{} ({hash}) breaks `{invariant}`: {reason}", .position + 1)]
pub struct InvariantViolation {
    pub invariant: &'static str,
    /// Zero-based, newest first.
    pub position: usize,
    pub hash: CommitHash,
    pub reason: String,
}
