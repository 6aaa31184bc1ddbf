// Revert Algorithms
//
// Two ways of undoing history:
// - revert-single drops every entry of one commit, wherever it sits
// - revert-to drops everything newer than a target commit
//
// Both leave the ledger untouched when the hash is unknown.

use serde::Serialize;

use crate::log::{CommitEntry, CommitHash, CommitSummary, Ledger, LedgerError};

/// Result of removing one commit from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevertedCommit {
    pub hash: CommitHash,
    pub summary: CommitSummary,
    pub removed: Vec<CommitEntry>,
}

/// Remove every entry whose hash equals `hash`.
pub fn revert_commit(ledger: &mut Ledger, hash: &CommitHash) -> Result<RevertedCommit, LedgerError> {
    let summary = ledger.summarize(hash)?;
    let removed = ledger.remove_hash(hash);

    Ok(RevertedCommit {
        hash: hash.clone(),
        summary,
        removed,
    })
}

/// A commit that a revert-to would discard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscardedCommit {
    pub hash: CommitHash,
    pub summary: CommitSummary,
}

/// What `revert to <hash>` would do, computed before anything changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevertPlan {
    pub target: CommitHash,
    pub target_summary: CommitSummary,
    /// Index of the target's most recent entry.
    pub target_index: usize,
    /// Distinct discarded commits, newest first.
    pub discarded: Vec<DiscardedCommit>,
}

impl RevertPlan {
    /// Number of entries that would be removed.
    pub fn entries_removed(&self) -> usize {
        self.target_index
    }

    /// The target is already the newest commit.
    pub fn is_noop(&self) -> bool {
        self.target_index == 0
    }

    /// Retain the target and everything older. Returns the removed count.
    pub fn apply(&self, ledger: &mut Ledger) -> usize {
        ledger.truncate_front(self.target_index).len()
    }
}

pub fn plan_revert_to(ledger: &Ledger, hash: &CommitHash) -> Result<RevertPlan, LedgerError> {
    let target_index = ledger.find_index(hash).ok_or_else(|| ledger.not_found(hash))?;
    let target_summary = ledger.summarize(hash)?;

    // Group sizes are taken over the discarded slice only.
    let newer: Ledger = ledger.entries().take(target_index).cloned().collect();
    let discarded = newer
        .commit_summaries()
        .into_iter()
        .map(|(hash, summary)| DiscardedCommit { hash, summary })
        .collect();

    Ok(RevertPlan {
        target: hash.clone(),
        target_summary,
        target_index,
        discarded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hashes recorded oldest to newest, so the last one ends up at index 0.
    fn ledger_of(hashes: &[(&str, &str)]) -> Ledger {
        let mut ledger = Ledger::new();
        for (hash, label) in hashes {
            ledger.record(*label, CommitHash::from(*hash), vec![format!("set {label}")]);
        }
        ledger
    }

    fn hashes(ledger: &Ledger) -> Vec<&str> {
        ledger.entries().map(|e| e.commit_hash.as_str()).collect()
    }

    #[test]
    fn revert_commit_removes_scattered_entries_only() {
        let mut ledger = ledger_of(&[
            ("cccc3333", "c"),
            ("gggg0000", "g1"),
            ("bbbb2222", "b"),
            ("gggg0000", "g2"),
            ("aaaa1111", "a"),
        ]);
        let before: Vec<_> = ledger
            .entries()
            .filter(|e| e.commit_hash.as_str() != "gggg0000")
            .cloned()
            .collect();

        let reverted = revert_commit(&mut ledger, &"gggg0000".into()).unwrap();

        assert_eq!(reverted.removed.len(), 2);
        assert_eq!(reverted.summary, CommitSummary::Group { size: 2 });
        assert!(!ledger.contains(&"gggg0000".into()));
        assert_eq!(ledger.entries().cloned().collect::<Vec<_>>(), before);
    }

    #[test]
    fn revert_commit_unknown_hash_leaves_ledger_unchanged() {
        let mut ledger = ledger_of(&[("aaaa1111", "a"), ("bbbb2222", "b")]);
        let before = ledger.clone();

        let err = revert_commit(&mut ledger, &"ffff0000".into()).unwrap_err();

        assert!(matches!(err, LedgerError::HashNotFound { .. }));
        assert_eq!(ledger, before);
    }

    #[test]
    fn revert_to_keeps_target_and_older() {
        // applied A, then B, then C; C is newest
        let mut ledger = ledger_of(&[("aaaa1111", "a"), ("bbbb2222", "b"), ("cccc3333", "c")]);

        let plan = plan_revert_to(&ledger, &"bbbb2222".into()).unwrap();
        assert_eq!(plan.entries_removed(), 1);
        assert_eq!(plan.discarded.len(), 1);
        assert_eq!(plan.discarded[0].hash, CommitHash::from("cccc3333"));

        assert_eq!(plan.apply(&mut ledger), 1);
        assert_eq!(hashes(&ledger), vec!["bbbb2222", "aaaa1111"]);
    }

    #[test]
    fn revert_to_newest_is_noop() {
        let mut ledger = ledger_of(&[("aaaa1111", "a"), ("bbbb2222", "b")]);
        let before = ledger.clone();

        let plan = plan_revert_to(&ledger, &"bbbb2222".into()).unwrap();
        assert!(plan.is_noop());
        assert!(plan.discarded.is_empty());
        assert_eq!(plan.apply(&mut ledger), 0);
        assert_eq!(ledger, before);
    }

    #[test]
    fn revert_to_unknown_hash_is_not_found() {
        let ledger = ledger_of(&[("aaaa1111", "a")]);

        let err = plan_revert_to(&ledger, &"ffff0000".into()).unwrap_err();
        assert_eq!(
            err,
            LedgerError::HashNotFound {
                hash: "ffff0000".into(),
                available: vec!["aaaa1111".into()],
            }
        );
    }

    #[test]
    fn revert_to_groups_discarded_commits() {
        let ledger = ledger_of(&[
            ("aaaa1111", "a"),
            ("bbbb2222", "n1"),
            ("bbbb2222", "n2"),
            ("bbbb2222", "n3"),
            ("cccc3333", "c"),
        ]);

        let plan = plan_revert_to(&ledger, &"aaaa1111".into()).unwrap();

        assert_eq!(plan.entries_removed(), 4);
        assert_eq!(
            plan.discarded,
            vec![
                DiscardedCommit {
                    hash: "cccc3333".into(),
                    summary: CommitSummary::Individual { label: "c".into() },
                },
                DiscardedCommit {
                    hash: "bbbb2222".into(),
                    summary: CommitSummary::Group { size: 3 },
                },
            ]
        );
        assert_eq!(plan.target_summary.to_string(), "Policy: a");
    }

    #[test]
    fn revert_to_anchors_on_newest_target_entry() {
        // the target's hash also appears further down; only the newest match anchors
        let mut ledger = ledger_of(&[("aaaa1111", "a1"), ("bbbb2222", "b"), ("aaaa1111", "a2"), ("cccc3333", "c")]);

        let plan = plan_revert_to(&ledger, &"aaaa1111".into()).unwrap();
        assert_eq!(plan.target_summary, CommitSummary::Group { size: 2 });
        plan.apply(&mut ledger);

        assert_eq!(hashes(&ledger), vec!["aaaa1111", "bbbb2222", "aaaa1111"]);
    }
}
