// Derived Ledger Views
//
// Views computed from the raw ledger on every query. Nothing here is
// persisted, so a view can change retroactively as entries come and go.

use serde::Serialize;

use crate::log::{CommitEntry, CommitHash, CommitSummary, Ledger};

/// A commit whose hash is shared by more than one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCommit {
    pub hash: CommitHash,
    pub size: usize,
    /// Label of the most recent entry in the group.
    pub sample: String,
    pub entries: Vec<CommitEntry>,
}

/// Partition of the ledger into group and individual commits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppliedGroups {
    /// In order of first (most recent) occurrence.
    pub groups: Vec<GroupCommit>,
    /// In ledger order.
    pub individuals: Vec<CommitEntry>,
    pub total_entries: usize,
}

impl AppliedGroups {
    pub fn classify(ledger: &Ledger) -> Self {
        let counts = ledger.hash_counts();
        let mut groups: Vec<GroupCommit> = Vec::new();
        let mut individuals = Vec::new();

        for entry in ledger.entries() {
            let size = counts.get(&entry.commit_hash).copied().unwrap_or(0);
            if size <= 1 {
                individuals.push(entry.clone());
                continue;
            }

            match groups.iter_mut().find(|g| g.hash == entry.commit_hash) {
                Some(group) => group.entries.push(entry.clone()),
                None => groups.push(GroupCommit {
                    hash: entry.commit_hash.clone(),
                    size,
                    sample: entry.policy_name.label().to_owned(),
                    entries: vec![entry.clone()],
                }),
            }
        }

        Self {
            groups,
            individuals,
            total_entries: ledger.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_entries == 0
    }
}

/// One line of the recent-history listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitLine {
    pub hash: CommitHash,
    pub summary: CommitSummary,
}

/// Current state plus a bounded view of recent commits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStatus {
    pub current: Option<CommitLine>,
    pub recent: Vec<CommitLine>,
    /// True when more distinct commits exist than `recent` shows.
    pub truncated: bool,
    pub total_commits: usize,
    pub total_entries: usize,
}

impl LedgerStatus {
    pub fn from_ledger(ledger: &Ledger, limit: usize) -> Self {
        let lines: Vec<CommitLine> = ledger
            .commit_summaries()
            .into_iter()
            .map(|(hash, summary)| CommitLine { hash, summary })
            .collect();
        let total_commits = lines.len();

        Self {
            current: lines.first().cloned(),
            truncated: total_commits > limit,
            recent: lines.into_iter().take(limit).collect(),
            total_commits,
            total_entries: ledger.len(),
        }
    }
}
