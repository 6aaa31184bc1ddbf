// Guardian Kernel
//
// Policy commit ledger, revert semantics and the policy catalog
// behind the guardian hardening CLI.

pub mod adapters;
pub mod catalog;
pub mod invariants;
pub mod log;
pub mod revert;
pub mod state;
pub mod workflow;
