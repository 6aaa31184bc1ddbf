// Policy Commit Ledger
//
// Ordered history of policy applications, newest first.
// Entries sharing a commit hash form one logical commit.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use crate::catalog::PolicyRecord;

pub mod store;

pub use store::{FileLedgerStore, InMemoryLedgerStore, LedgerStore, StoreError, StoreLock};

/// Maximum number of change descriptions persisted per entry.
pub const MAX_APPLIED_POLICIES: usize = 5;

/// Number of alternative hashes offered when a lookup misses.
pub const SUGGESTED_HASHES: usize = 5;

/// Opaque identifier of a logical commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitHash(pub String);

impl CommitHash {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommitHash {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// What an entry was recorded against.
///
/// Stored untagged: a flat string or a structured policy record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolicyName {
    Label(String),
    Policy(PolicyRecord),
}

impl PolicyName {
    /// Human-readable label used in summaries.
    pub fn label(&self) -> &str {
        match self {
            PolicyName::Label(label) => label,
            PolicyName::Policy(record) if record.rule.is_empty() => "Unknown Policy",
            PolicyName::Policy(record) => &record.rule,
        }
    }
}

impl From<PolicyRecord> for PolicyName {
    fn from(record: PolicyRecord) -> Self {
        PolicyName::Policy(record)
    }
}

impl From<&str> for PolicyName {
    fn from(label: &str) -> Self {
        PolicyName::Label(label.to_owned())
    }
}

/// One application event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    pub commit_hash: CommitHash,
    pub policy_name: PolicyName,
    #[serde(default)]
    pub applied_policies: Vec<String>,
}

/// Summary of one logical commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommitSummary {
    Individual { label: String },
    Group { size: usize },
}

impl fmt::Display for CommitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitSummary::Individual { label } => write!(f, "Policy: {label}"),
            CommitSummary::Group { size } => write!(f, "Baseline Group ({size} policies)"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("commit '{hash}' not found in history")]
    HashNotFound {
        hash: CommitHash,
        available: Vec<CommitHash>,
    },

    #[error("could not generate an unused commit hash after {attempts} attempts")]
    HashCollision { attempts: usize },
}

/// Full ordered history. Index 0 is the most recent entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: VecDeque<CommitEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entry at the head, keeping at most
    /// [`MAX_APPLIED_POLICIES`] change descriptions.
    pub fn record(
        &mut self,
        policy: impl Into<PolicyName>,
        commit_hash: CommitHash,
        mut changes: Vec<String>,
    ) -> &CommitEntry {
        changes.truncate(MAX_APPLIED_POLICIES);
        self.entries.push_front(CommitEntry {
            commit_hash,
            policy_name: policy.into(),
            applied_policies: changes,
        });
        &self.entries[0]
    }

    pub fn entries(&self) -> impl Iterator<Item = &CommitEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn head(&self) -> Option<&CommitEntry> {
        self.entries.front()
    }

    pub fn contains(&self, hash: &CommitHash) -> bool {
        self.entries.iter().any(|e| &e.commit_hash == hash)
    }

    /// Position of the most recent entry carrying `hash`.
    pub fn find_index(&self, hash: &CommitHash) -> Option<usize> {
        self.entries.iter().position(|e| &e.commit_hash == hash)
    }

    /// Distinct hashes in order of first (most recent) occurrence.
    pub fn unique_hashes(&self, limit: Option<usize>) -> Vec<CommitHash> {
        let mut seen = HashSet::new();
        let mut hashes = Vec::new();

        for entry in &self.entries {
            if limit.is_some_and(|max| hashes.len() >= max) {
                break;
            }
            if seen.insert(&entry.commit_hash) {
                hashes.push(entry.commit_hash.clone());
            }
        }

        hashes
    }

    /// Number of entries per hash.
    pub fn hash_counts(&self) -> HashMap<&CommitHash, usize> {
        let mut counts = HashMap::new();
        for entry in &self.entries {
            *counts.entry(&entry.commit_hash).or_insert(0) += 1;
        }
        counts
    }

    pub fn entries_with<'a>(
        &'a self,
        hash: &'a CommitHash,
    ) -> impl Iterator<Item = &'a CommitEntry> + 'a {
        self.entries.iter().filter(move |e| &e.commit_hash == hash)
    }

    pub fn summarize(&self, hash: &CommitHash) -> Result<CommitSummary, LedgerError> {
        let mut matches = self.entries_with(hash);
        let first = matches.next().ok_or_else(|| self.not_found(hash))?;

        match matches.count() {
            0 => Ok(CommitSummary::Individual {
                label: first.policy_name.label().to_owned(),
            }),
            rest => Ok(CommitSummary::Group { size: rest + 1 }),
        }
    }

    /// Every distinct commit with its summary, newest first.
    pub fn commit_summaries(&self) -> Vec<(CommitHash, CommitSummary)> {
        let counts = self.hash_counts();
        let mut seen = HashSet::new();

        self.entries
            .iter()
            .filter(|e| seen.insert(&e.commit_hash))
            .map(|e| {
                let summary = match counts.get(&e.commit_hash).copied().unwrap_or(1) {
                    1 => CommitSummary::Individual {
                        label: e.policy_name.label().to_owned(),
                    },
                    size => CommitSummary::Group { size },
                };
                (e.commit_hash.clone(), summary)
            })
            .collect()
    }

    /// Build a `HashNotFound` error listing valid alternatives.
    pub fn not_found(&self, hash: &CommitHash) -> LedgerError {
        LedgerError::HashNotFound {
            hash: hash.clone(),
            available: self.unique_hashes(Some(SUGGESTED_HASHES)),
        }
    }

    /// Drop every entry matching `hash`, returning them in ledger order.
    pub(crate) fn remove_hash(&mut self, hash: &CommitHash) -> Vec<CommitEntry> {
        let (removed, kept): (VecDeque<_>, VecDeque<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| &e.commit_hash == hash);
        self.entries = kept;
        removed.into()
    }

    /// Keep `[index, end)`, returning the discarded newer entries.
    pub(crate) fn truncate_front(&mut self, index: usize) -> Vec<CommitEntry> {
        let kept = self.entries.split_off(index.min(self.entries.len()));
        std::mem::replace(&mut self.entries, kept).into()
    }
}

impl FromIterator<CommitEntry> for Ledger {
    /// Collect entries already ordered newest first.
    fn from_iter<I: IntoIterator<Item = CommitEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("change {i}")).collect()
    }

    #[test]
    fn record_inserts_newest_first() {
        let mut ledger = Ledger::new();
        ledger.record("first", "aaaa1111".into(), change(1));
        ledger.record("second", "bbbb2222".into(), change(1));
        ledger.record("third", "cccc3333".into(), change(1));

        let labels: Vec<_> = ledger.entries().map(|e| e.policy_name.label()).collect();
        assert_eq!(labels, vec!["third", "second", "first"]);
        assert_eq!(ledger.head().unwrap().commit_hash, CommitHash::from("cccc3333"));
    }

    #[test]
    fn record_truncates_changes_to_five() {
        let mut ledger = Ledger::new();
        let entry = ledger.record("policy", "aaaa1111".into(), change(8));

        assert_eq!(entry.applied_policies, change(5));
    }

    #[test]
    fn find_index_returns_most_recent_match() {
        let mut ledger = Ledger::new();
        ledger.record("old", "aaaa1111".into(), vec![]);
        ledger.record("mid", "bbbb2222".into(), vec![]);
        ledger.record("new", "aaaa1111".into(), vec![]);

        assert_eq!(ledger.find_index(&"aaaa1111".into()), Some(0));
        assert_eq!(ledger.find_index(&"bbbb2222".into()), Some(1));
        assert_eq!(ledger.find_index(&"ffff0000".into()), None);
    }

    #[test]
    fn unique_hashes_preserve_first_occurrence_and_limit() {
        let mut ledger = Ledger::new();
        ledger.record("a", "aaaa1111".into(), vec![]);
        ledger.record("b1", "bbbb2222".into(), vec![]);
        ledger.record("b2", "bbbb2222".into(), vec![]);
        ledger.record("c", "cccc3333".into(), vec![]);

        let all = ledger.unique_hashes(None);
        assert_eq!(
            all,
            vec!["cccc3333".into(), "bbbb2222".into(), CommitHash::from("aaaa1111")]
        );

        let capped = ledger.unique_hashes(Some(2));
        assert_eq!(capped, vec![CommitHash::from("cccc3333"), "bbbb2222".into()]);
    }

    #[test]
    fn summarize_detects_groups_and_individuals() {
        let mut ledger = Ledger::new();
        for rule in ["r1", "r2", "r3"] {
            ledger.record(rule, "gggg0000".into(), vec![]);
        }
        ledger.record("Disable telnet", "iiii0000".into(), vec![]);

        assert_eq!(
            ledger.summarize(&"gggg0000".into()).unwrap(),
            CommitSummary::Group { size: 3 }
        );
        let individual = ledger.summarize(&"iiii0000".into()).unwrap();
        assert_eq!(individual.to_string(), "Policy: Disable telnet");
    }

    #[test]
    fn summarize_missing_hash_lists_alternatives() {
        let mut ledger = Ledger::new();
        ledger.record("a", "aaaa1111".into(), vec![]);

        let err = ledger.summarize(&"ffff0000".into()).unwrap_err();
        assert_eq!(
            err,
            LedgerError::HashNotFound {
                hash: "ffff0000".into(),
                available: vec!["aaaa1111".into()],
            }
        );
    }

    #[test]
    fn policy_name_accepts_label_or_record() {
        let json = r#"[
            {"commit_hash": "aaaa1111", "policy_name": "Manual label", "applied_policies": []},
            {"commit_hash": "bbbb2222", "policy_name": {"Feature ID": "F-LNX-101", "Parameter/Rule": "Ensure /tmp is a separate partition"}, "applied_policies": ["x"]}
        ]"#;

        let ledger: Ledger = serde_json::from_str(json).unwrap();
        let labels: Vec<_> = ledger.entries().map(|e| e.policy_name.label()).collect();
        assert_eq!(labels, vec!["Manual label", "Ensure /tmp is a separate partition"]);
        assert!(matches!(
            ledger.entries().nth(1).unwrap().policy_name,
            PolicyName::Policy(_)
        ));
    }
}
