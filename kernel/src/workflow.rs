// Ledger Workflow
//
// Every mutating command runs as one locked transaction:
// lock → load → mutate → check invariants → save

use std::collections::VecDeque;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::{CatalogError, OsType, PolicyCatalog, PolicyRecord};
use crate::invariants::{InvariantEngine, InvariantViolation};
use crate::log::{CommitEntry, CommitHash, Ledger, LedgerError, LedgerStore, PolicyName, StoreError};
use crate::revert::{plan_revert_to, revert_commit, RevertPlan, RevertedCommit};
use crate::state::{AppliedGroups, LedgerStatus};

/// Attempts at drawing a hash not already present in the ledger.
const HASH_ATTEMPTS: usize = 16;

/// Length of a generated commit hash.
const HASH_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum GuardianError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Supplies candidate commit hashes.
pub trait HashSource {
    fn next_hash(&mut self) -> CommitHash;
}

/// Random 8-character lowercase hex hashes.
pub struct RandomHashes<R>(pub R);

impl<R: Rng> HashSource for RandomHashes<R> {
    fn next_hash(&mut self) -> CommitHash {
        const HEX: &[u8] = b"0123456789abcdef";
        let token: String = (0..HASH_LEN)
            .map(|_| HEX[self.0.gen_range(0..HEX.len())] as char)
            .collect();
        CommitHash(token)
    }
}

/// Predetermined hashes, handed out in order.
///
/// Falls back to `"00000000"` once exhausted.
#[derive(Debug, Clone, Default)]
pub struct FixedHashes(VecDeque<CommitHash>);

impl FixedHashes {
    pub fn new<I, H>(hashes: I) -> Self
    where
        I: IntoIterator<Item = H>,
        H: Into<CommitHash>,
    {
        Self(hashes.into_iter().map(Into::into).collect())
    }
}

impl HashSource for FixedHashes {
    fn next_hash(&mut self) -> CommitHash {
        self.0
            .pop_front()
            .unwrap_or_else(|| CommitHash::from("00000000"))
    }
}

/// Draw a hash that no entry in `ledger` uses yet.
pub fn fresh_hash(ledger: &Ledger, source: &mut dyn HashSource) -> Result<CommitHash, LedgerError> {
    for _ in 0..HASH_ATTEMPTS {
        let hash = source.next_hash();
        if !ledger.contains(&hash) {
            return Ok(hash);
        }
        debug!(%hash, "generated hash already in use, drawing again");
    }
    Err(LedgerError::HashCollision {
        attempts: HASH_ATTEMPTS,
    })
}

pub fn change_description(policy: &PolicyRecord) -> String {
    format!("Changed setting for {}", policy.rule)
}

/// A successful apply: one hash, one or more policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedCommit {
    pub hash: CommitHash,
    /// Category name for baseline applications.
    pub category: Option<String>,
    pub policies: Vec<PolicyRecord>,
}

/// Outcome of `revert to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RevertOutcome {
    /// Target is already the newest commit.
    AlreadyCurrent { plan: RevertPlan },
    /// Confirmation refused; nothing persisted.
    Declined { plan: RevertPlan },
    Reverted { plan: RevertPlan, removed: usize },
}

/// Ledger operations over a store.
pub struct Guardian<S: LedgerStore> {
    store: S,
    invariants: InvariantEngine,
}

impl<S: LedgerStore> Guardian<S> {
    pub fn new(store: S) -> Self {
        Self::with_invariants(store, InvariantEngine::with_defaults())
    }

    pub fn with_invariants(store: S, invariants: InvariantEngine) -> Self {
        Self { store, invariants }
    }

    /// Current ledger, newest first.
    pub fn history(&self) -> Ledger {
        self.store.load()
    }

    pub fn status(&self, limit: usize) -> LedgerStatus {
        LedgerStatus::from_ledger(&self.store.load(), limit)
    }

    pub fn applied_groups(&self) -> AppliedGroups {
        AppliedGroups::classify(&self.store.load())
    }

    /// Run `f` against the ledger under the store lock.
    ///
    /// The ledger is saved only if `f` succeeds and changed it.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Ledger) -> Result<T, GuardianError>,
    ) -> Result<T, GuardianError> {
        let _lock = self.store.lock()?;
        let original = self.store.load();
        let mut ledger = original.clone();

        let value = f(&mut ledger)?;

        if ledger != original {
            self.invariants.evaluate(&ledger)?;
            self.store.save(&ledger)?;
            debug!(before = original.len(), after = ledger.len(), "ledger committed");
        }
        Ok(value)
    }

    /// Record one entry at the head of history.
    pub fn record(
        &self,
        policy: impl Into<PolicyName>,
        commit_hash: CommitHash,
        changes: Vec<String>,
    ) -> Result<CommitEntry, GuardianError> {
        let policy = policy.into();
        self.transaction(|ledger| Ok(ledger.record(policy, commit_hash, changes).clone()))
    }

    pub fn apply_policy(
        &self,
        catalog: &PolicyCatalog,
        policy_id: &str,
        os: OsType,
        hashes: &mut dyn HashSource,
    ) -> Result<AppliedCommit, GuardianError> {
        let policy = catalog.policy(policy_id, os)?.clone();

        let hash = self.transaction(|ledger| {
            let hash = fresh_hash(ledger, hashes)?;
            ledger.record(policy.clone(), hash.clone(), vec![change_description(&policy)]);
            Ok(hash)
        })?;

        info!(%hash, policy = %policy.feature_id, "policy applied");
        Ok(AppliedCommit {
            hash,
            category: None,
            policies: vec![policy],
        })
    }

    /// Apply every policy of a category under one shared hash.
    pub fn apply_baseline(
        &self,
        catalog: &PolicyCatalog,
        category: &str,
        os: OsType,
        hashes: &mut dyn HashSource,
    ) -> Result<AppliedCommit, GuardianError> {
        let found = catalog.category(category, os)?;
        let name = found.name.to_owned();
        let policies: Vec<PolicyRecord> = found.policies.into_iter().cloned().collect();

        let hash = self.transaction(|ledger| {
            let hash = fresh_hash(ledger, hashes)?;
            for policy in &policies {
                ledger.record(policy.clone(), hash.clone(), vec![change_description(policy)]);
            }
            Ok(hash)
        })?;

        info!(%hash, category = %name, policies = policies.len(), "baseline applied");
        Ok(AppliedCommit {
            hash,
            category: Some(name),
            policies,
        })
    }

    /// Remove every entry of one commit.
    pub fn revert_commit(&self, hash: &CommitHash) -> Result<RevertedCommit, GuardianError> {
        let reverted = self.transaction(|ledger| Ok(revert_commit(ledger, hash)?))?;
        info!(%hash, removed = reverted.removed.len(), "commit removed from history");
        Ok(reverted)
    }

    /// Truncate history to `hash`, asking `confirm` first.
    pub fn revert_to(
        &self,
        hash: &CommitHash,
        confirm: impl FnOnce(&RevertPlan) -> bool,
    ) -> Result<RevertOutcome, GuardianError> {
        let outcome = self.transaction(|ledger| {
            let plan = plan_revert_to(ledger, hash)?;
            if plan.is_noop() {
                return Ok(RevertOutcome::AlreadyCurrent { plan });
            }
            if !confirm(&plan) {
                return Ok(RevertOutcome::Declined { plan });
            }
            let removed = plan.apply(ledger);
            Ok(RevertOutcome::Reverted { plan, removed })
        })?;

        match &outcome {
            RevertOutcome::Reverted { removed, .. } => {
                info!(%hash, removed, "history reverted")
            }
            RevertOutcome::Declined { .. } => info!(%hash, "revert declined"),
            RevertOutcome::AlreadyCurrent { .. } => debug!(%hash, "revert target already current"),
        }
        Ok(outcome)
    }
}
