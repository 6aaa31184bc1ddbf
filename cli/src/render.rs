use colored::Colorize;
use serde::Serialize;

use guardian_kernel::catalog::{CatalogError, CategoryCount, CategoryMatch, OsType};
use guardian_kernel::log::{Ledger, LedgerError};
use guardian_kernel::revert::{RevertPlan, RevertedCommit};
use guardian_kernel::state::{AppliedGroups, LedgerStatus};
use guardian_kernel::workflow::{AppliedCommit, GuardianError, RevertOutcome};

use crate::cli::OutputFormat;

/// Individual policies listed by `applied-groups` before eliding.
const INDIVIDUALS_SHOWN: usize = 10;

/// Group members listed by `revert commit` before eliding.
const MEMBERS_SHOWN: usize = 10;

pub struct Presenter {
    format: OutputFormat,
}

impl Presenter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub fn applied(&self, commit: &AppliedCommit) -> anyhow::Result<()> {
        if self.is_json() {
            return self.json(commit);
        }

        match &commit.category {
            Some(category) => {
                println!("{} Policy baseline '{}' applied.", "Success!".green().bold(), category.cyan());
                let last = commit.policies.len().saturating_sub(1);
                for (i, policy) in commit.policies.iter().enumerate() {
                    let prefix = if i == last { "└─" } else { "├─" };
                    println!("{} {}: {}", prefix, policy.feature_id.bold(), policy.rule);
                }
            }
            None => {
                for policy in &commit.policies {
                    println!("{} Policy '{}' applied.", "Success!".green().bold(), policy.rule);
                }
            }
        }
        println!("Commit Hash: {}", commit.hash.to_string().yellow().bold());
        Ok(())
    }

    pub fn history(&self, ledger: &Ledger) -> anyhow::Result<()> {
        if self.is_json() {
            return self.json(ledger);
        }
        if ledger.is_empty() {
            println!("{}", "No commit history found.".red().bold());
            return Ok(());
        }

        println!("{}", "Policy Commit History (Newest to Oldest)".bold());
        for (i, entry) in ledger.entries().enumerate() {
            let marker = if i == 0 { "CURRENT".to_string() } else { format!("#{}", i + 1) };
            println!(
                "{:<10} {}  {}",
                entry.commit_hash.to_string().cyan(),
                marker.yellow(),
                entry.policy_name.label().magenta()
            );
            for change in &entry.applied_policies {
                println!("           - {}", change.green());
            }
        }
        println!(
            "\n{}",
            format!(
                "Summary: {} unique commits, {} total policy entries",
                ledger.unique_hashes(None).len(),
                ledger.len()
            )
            .dimmed()
        );
        Ok(())
    }

    pub fn reverted(&self, reverted: &RevertedCommit) -> anyhow::Result<()> {
        if self.is_json() {
            return self.json(reverted);
        }

        println!("{} {}", "Removed:".cyan().bold(), reverted.summary);
        if reverted.removed.len() > 1 {
            for (i, entry) in reverted.removed.iter().take(MEMBERS_SHOWN).enumerate() {
                println!("  {}. {}", i + 1, entry.policy_name.label());
            }
            if reverted.removed.len() > MEMBERS_SHOWN {
                println!("  ... and {} more", reverted.removed.len() - MEMBERS_SHOWN);
            }
        }
        println!(
            "\n{} Commit '{}' has been removed from history.",
            "Success!".green().bold(),
            reverted.hash
        );
        println!("Removed {} policy entries.", reverted.removed.len());
        Ok(())
    }

    /// Shown before asking for confirmation.
    pub fn revert_plan(&self, plan: &RevertPlan) {
        if self.is_json() {
            return;
        }

        println!(
            "{} This will revert system state to commit {}",
            "WARNING:".yellow().bold(),
            plan.target.to_string().cyan()
        );
        println!(
            "{}\n",
            format!("This will remove {} newer commit(s) from history!", plan.entries_removed())
                .red()
                .bold()
        );
        println!("{}", "Commits that will be removed:".cyan().bold());
        for (i, commit) in plan.discarded.iter().enumerate() {
            println!("  {}. {} - {}", i + 1, commit.hash, commit.summary);
        }
        println!(
            "\n{} {} - {}",
            "Target state:".green().bold(),
            plan.target,
            plan.target_summary
        );
    }

    pub fn revert_outcome(&self, outcome: &RevertOutcome) -> anyhow::Result<()> {
        if self.is_json() {
            return self.json(outcome);
        }

        match outcome {
            RevertOutcome::AlreadyCurrent { plan } => println!(
                "{} Commit '{}' is already the newest state. Nothing to revert.",
                "Info:".yellow().bold(),
                plan.target
            ),
            RevertOutcome::Declined { .. } => println!("{}", "Operation cancelled.".blue().bold()),
            RevertOutcome::Reverted { plan, removed } => {
                println!(
                    "\n{} System state reverted to commit '{}'.",
                    "Success!".green().bold(),
                    plan.target
                );
                println!("Removed {removed} newer commit(s) from history.");
            }
        }
        Ok(())
    }

    pub fn status(&self, status: &LedgerStatus) -> anyhow::Result<()> {
        if self.is_json() {
            return self.json(status);
        }

        let Some(current) = &status.current else {
            println!("{}", "No commit history found. System is in initial state.".yellow().bold());
            return Ok(());
        };

        println!("{}", "Current System State".green().bold());
        println!("Latest Commit: {}", current.hash.to_string().cyan().bold());
        println!("State: {}\n", current.summary);

        println!("{}", "Recent Commit History (newest to oldest):".yellow().bold());
        for (i, line) in status.recent.iter().enumerate() {
            let marker = if i == 0 { "← CURRENT" } else { "" };
            println!(
                "  {}. {} - {} {}",
                i + 1,
                line.hash.to_string().cyan(),
                line.summary,
                marker.green().bold()
            );
        }
        if status.truncated {
            println!("     ... (use 'guardian history' to see full history)");
        }
        println!(
            "\n{}",
            format!(
                "Total: {} commits, {} policy entries",
                status.total_commits, status.total_entries
            )
            .dimmed()
        );
        Ok(())
    }

    pub fn applied_groups(&self, view: &AppliedGroups) -> anyhow::Result<()> {
        if self.is_json() {
            return self.json(view);
        }
        if view.is_empty() {
            println!("{}", "No policy groups have been applied yet.".yellow().bold());
            return Ok(());
        }

        if !view.groups.is_empty() {
            println!("{}", "Applied Policy Groups:".green().bold());
            for group in &view.groups {
                println!(
                    "  {:<10} {:>4}  Baseline Group  {}",
                    group.hash.to_string().cyan(),
                    group.size,
                    elide(&group.sample, 50).dimmed()
                );
            }
        }

        if !view.individuals.is_empty() {
            println!("\n{}", "Individual Applied Policies:".blue().bold());
            for entry in view.individuals.iter().take(INDIVIDUALS_SHOWN) {
                println!(
                    "  {:<10} {}",
                    entry.commit_hash.to_string().cyan(),
                    elide(entry.policy_name.label(), 60).green()
                );
            }
            if view.individuals.len() > INDIVIDUALS_SHOWN {
                println!(
                    "  ... and {} more individual policies",
                    view.individuals.len() - INDIVIDUALS_SHOWN
                );
            }
        }

        println!("\n{}", "Summary:".dimmed().bold());
        println!("  Policy Groups Applied: {}", view.groups.len());
        println!("  Individual Policies: {}", view.individuals.len());
        println!("  Total Policy Entries: {}", view.total_entries);
        Ok(())
    }

    pub fn categories(&self, counts: &[CategoryCount], os: OsType) -> anyhow::Result<()> {
        if self.is_json() {
            return self.json(&counts);
        }

        println!("{}", format!("Available Policy Groups - {os}").bold());
        println!("  {:<28} {:>6} {:>8}", "Category", "Linux", "Windows");
        for count in counts {
            println!(
                "  {:<28} {:>6} {:>8}",
                count.name.cyan(),
                count.linux,
                count.windows
            );
        }
        let linux: usize = counts.iter().map(|c| c.linux).sum();
        let windows: usize = counts.iter().map(|c| c.windows).sum();
        println!("  {:<28} {:>6} {:>8}", "TOTAL".bold(), linux, windows);
        Ok(())
    }

    pub fn group_details(&self, found: &CategoryMatch<'_>, limit: Option<usize>) -> anyhow::Result<()> {
        let total = found.policies.len();
        let shown = limit.unwrap_or(total).min(total);

        if self.is_json() {
            return self.json(&found.policies[..shown]);
        }

        let suffix = if shown < total {
            format!(" (showing first {shown})")
        } else {
            String::new()
        };
        println!("{}", format!("Policy Group: {} - {}{}", found.name, found.os, suffix).bold());
        for policy in &found.policies[..shown] {
            println!(
                "  {:<12} {:<8} {}",
                policy.feature_id.cyan(),
                policy.priority.yellow(),
                policy.rule.green()
            );
        }
        println!(
            "\n{}",
            format!("Total policies in {} ({}): {}", found.name, found.os, total).dimmed()
        );
        if shown < total {
            println!("{}", format!("Use --limit {total} to see all policies").dimmed());
        }
        Ok(())
    }
}

/// Print the valid alternatives carried by a lookup error.
pub fn remediation(err: &GuardianError) {
    match err {
        GuardianError::Ledger(LedgerError::HashNotFound { available, .. }) => {
            eprintln!("\n{}", "Available commits (newest to oldest):".yellow().bold());
            for hash in available {
                eprintln!("  - {hash}");
            }
        }
        GuardianError::Catalog(CatalogError::PolicyNotFound { available, .. }) => {
            eprintln!("\n{}", "Available policies:".yellow().bold());
            for id in available {
                eprintln!("  - {id}");
            }
        }
        GuardianError::Catalog(CatalogError::CategoryNotFound { available, .. }) => {
            eprintln!("\n{}", "Available categories:".yellow().bold());
            for name in available {
                eprintln!("  - {name}");
            }
        }
        _ => {}
    }
}

fn elide(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    } else {
        text.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elide_long_labels() {
        assert_eq!(elide("short", 10), "short");
        assert_eq!(elide("abcdefghij", 4), "abcd...");
    }
}
