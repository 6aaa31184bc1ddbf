use std::io::{self, BufRead, Write};
use std::path::Path;

use colored::Colorize;
use guardian_kernel::adapters::feature_map::load_feature_map;
use guardian_kernel::catalog::{OsType, PolicyCatalog};
use guardian_kernel::log::{CommitHash, FileLedgerStore};
use guardian_kernel::revert::RevertPlan;
use guardian_kernel::workflow::{Guardian, GuardianError, RandomHashes};
use tracing::debug;

use crate::cli::*;
use crate::render::{remediation, Presenter};

/// Distinct commits listed by `revert status`.
const STATUS_LIMIT: usize = 10;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        command,
        ledger,
        catalog,
        format,
        ..
    } = cli;
    debug!(ledger = %ledger.display(), catalog = %catalog.display(), "running command");
    let guardian = Guardian::new(FileLedgerStore::new(ledger));
    let out = Presenter::new(format);

    match command {
        Command::Apply(args) => cmd_apply(&guardian, &catalog, args, &out),
        Command::ApplyBaseline(args) => cmd_apply_baseline(&guardian, &catalog, args, &out),
        Command::History => out.history(&guardian.history()),
        Command::Revert(RevertCommand::Commit { hash }) => cmd_revert_commit(&guardian, hash, &out),
        Command::Revert(RevertCommand::To { hash, force }) => {
            cmd_revert_to(&guardian, hash, force, &out)
        }
        Command::Revert(RevertCommand::Status) => out.status(&guardian.status(STATUS_LIMIT)),
        Command::AppliedGroups => out.applied_groups(&guardian.applied_groups()),
        Command::Groups(args) => {
            let catalog = load_catalog(&catalog)?;
            out.categories(&catalog.categories(), args.os_type.into())
        }
        Command::GroupDetails(args) => cmd_group_details(&catalog, args, &out),
    }
}

type FileGuardian = Guardian<FileLedgerStore>;

fn load_catalog(path: &Path) -> anyhow::Result<PolicyCatalog> {
    Ok(load_feature_map(path)?)
}

/// Print remediation hints, then hand the error up for the exit code.
fn reported(err: GuardianError) -> anyhow::Error {
    remediation(&err);
    err.into()
}

fn cmd_apply(guardian: &FileGuardian, catalog: &Path, args: ApplyArgs, out: &Presenter) -> anyhow::Result<()> {
    let catalog = load_catalog(catalog)?;
    let os: OsType = args.os.os_type.into();
    if !out.is_json() {
        println!("Applying policy {} ({os})...", args.policy_id.cyan().bold());
    }

    let applied = guardian
        .apply_policy(&catalog, &args.policy_id, os, &mut RandomHashes(rand::thread_rng()))
        .map_err(reported)?;
    out.applied(&applied)
}

fn cmd_apply_baseline(
    guardian: &FileGuardian,
    catalog: &Path,
    args: ApplyBaselineArgs,
    out: &Presenter,
) -> anyhow::Result<()> {
    let catalog = load_catalog(catalog)?;
    let os: OsType = args.os.os_type.into();
    if !out.is_json() {
        println!("Applying baseline group policy for category {} ({os})...", args.category.cyan().bold());
    }

    let applied = guardian
        .apply_baseline(&catalog, &args.category, os, &mut RandomHashes(rand::thread_rng()))
        .map_err(reported)?;
    out.applied(&applied)
}

fn cmd_revert_commit(guardian: &FileGuardian, hash: String, out: &Presenter) -> anyhow::Result<()> {
    let hash = CommitHash(hash);
    if !out.is_json() {
        println!(
            "{} This will remove commit {} from history.",
            "WARNING:".yellow().bold(),
            hash.to_string().cyan().bold()
        );
    }

    let reverted = guardian.revert_commit(&hash).map_err(reported)?;
    out.reverted(&reverted)
}

fn cmd_revert_to(guardian: &FileGuardian, hash: String, force: bool, out: &Presenter) -> anyhow::Result<()> {
    // JSON output only lands after the prompt, so the plan could not be reviewed first.
    if out.is_json() && !force {
        anyhow::bail!("`revert to` with --format json requires --force");
    }
    let hash = CommitHash(hash);
    let mut prompt_failed = None;

    let outcome = guardian
        .revert_to(&hash, |plan| {
            out.revert_plan(plan);
            if force {
                return true;
            }
            match confirm(plan) {
                Ok(answer) => answer,
                Err(err) => {
                    prompt_failed = Some(err);
                    false
                }
            }
        })
        .map_err(reported)?;

    if let Some(err) = prompt_failed {
        return Err(anyhow::Error::new(err).context("failed to read confirmation"));
    }
    out.revert_outcome(&outcome)
}

/// Ask for an explicit `yes` on stdin.
fn confirm(plan: &RevertPlan) -> io::Result<bool> {
    let mut stderr = io::stderr();
    writeln!(
        stderr,
        "\n{}",
        format!(
            "Are you sure you want to discard {} entries? This action cannot be undone.",
            plan.entries_removed()
        )
        .yellow()
        .bold()
    )?;
    write!(stderr, "Type 'yes' to continue: ")?;
    stderr.flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

fn cmd_group_details(catalog: &Path, args: GroupDetailsArgs, out: &Presenter) -> anyhow::Result<()> {
    let catalog = load_catalog(catalog)?;
    let found = catalog
        .category(&args.category, args.os.os_type.into())
        .map_err(|err| reported(err.into()))?;
    out.group_details(&found, args.limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::PathBuf;

    use clap::Parser;
    use tempfile::TempDir;

    const FEATURE_MAP: &str = "\
Feature ID,OS,Category,Parameter/Rule,Priority
F-LNX-101,Linux,Filesystem,Ensure /tmp is a separate partition,High
F-LNX-401,Linux,Network,Disable IP forwarding,High
F-LNX-402,Linux,Network,Disable packet redirect sending,Medium
F-WIN-101,Windows,Access Management,Enforce password history,High
";

    struct Workspace {
        dir: TempDir,
        ledger: PathBuf,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("feature_map.csv"), FEATURE_MAP).unwrap();
            let ledger = dir.path().join("policy_stack.json");
            Self { dir, ledger }
        }

        fn catalog(&self) -> PathBuf {
            self.dir.path().join("feature_map.csv")
        }

        fn guardian(&self) -> FileGuardian {
            Guardian::new(FileLedgerStore::new(&self.ledger))
        }

        /// Seed commits oldest first.
        fn seed(&self, hashes: &[&str]) {
            let guardian = self.guardian();
            for hash in hashes {
                guardian
                    .record("seeded policy", CommitHash::from(*hash), vec![])
                    .unwrap();
            }
        }

        fn hashes(&self) -> Vec<String> {
            self.guardian()
                .history()
                .entries()
                .map(|e| e.commit_hash.to_string())
                .collect()
        }

        fn run(&self, args: &[&str]) -> anyhow::Result<()> {
            let mut argv: Vec<OsString> = vec![
                "guardian".into(),
                "--ledger".into(),
                self.ledger.clone().into(),
                "--catalog".into(),
                self.catalog().into(),
            ];
            argv.extend(args.iter().map(|arg| OsString::from(*arg)));
            run_command(Cli::try_parse_from(argv).unwrap())
        }
    }

    #[test]
    fn history_of_empty_ledger_succeeds() {
        let ws = Workspace::new();
        ws.run(&["history"]).unwrap();
        ws.run(&["revert", "status"]).unwrap();
    }

    #[test]
    fn apply_records_one_commit() {
        let ws = Workspace::new();

        ws.run(&["apply", "F-LNX-101"]).unwrap();
        ws.run(&["apply-baseline", "network", "--os-type", "LINUX"]).unwrap();

        let history = ws.guardian().history();
        assert_eq!(history.len(), 3);
        assert_eq!(history.unique_hashes(None).len(), 2);
        ws.run(&["history"]).unwrap();
        ws.run(&["applied-groups", "--format", "json"]).unwrap();
    }

    #[test]
    fn unknown_hash_fails_without_touching_ledger() {
        let ws = Workspace::new();
        ws.seed(&["aaaa1111", "bbbb2222"]);

        assert!(ws.run(&["revert", "commit", "ffff0000"]).is_err());
        assert!(ws.run(&["revert", "to", "ffff0000", "--force"]).is_err());

        assert_eq!(ws.hashes(), vec!["bbbb2222", "aaaa1111"]);
    }

    #[test]
    fn missing_catalog_fails() {
        let ws = Workspace::new();
        std::fs::remove_file(ws.catalog()).unwrap();

        let err = ws.run(&["apply", "F-LNX-101"]).unwrap_err();

        assert!(format!("{err:#}").contains("unavailable"));
        assert!(ws.run(&["groups"]).is_err());
        assert!(ws.hashes().is_empty());
    }

    #[test]
    fn unknown_policy_and_category_fail() {
        let ws = Workspace::new();

        assert!(ws.run(&["apply", "F-LNX-999"]).is_err());
        assert!(ws.run(&["apply", "F-WIN-101", "--os-type", "linux"]).is_err());
        assert!(ws.run(&["apply-baseline", "Kernel"]).is_err());
        assert!(ws.run(&["group-details", "Access Management"]).is_err());
        assert!(ws.hashes().is_empty());
    }

    #[test]
    fn store_write_failure_fails() {
        let mut ws = Workspace::new();
        ws.ledger = ws.dir.path().join("missing").join("policy_stack.json");

        assert!(ws.run(&["apply", "F-LNX-101"]).is_err());
    }

    #[test]
    fn forced_revert_to_discards_newer_commits() {
        let ws = Workspace::new();
        ws.seed(&["aaaa1111", "bbbb2222", "cccc3333"]);

        ws.run(&["revert", "to", "aaaa1111", "--force"]).unwrap();

        assert_eq!(ws.hashes(), vec!["aaaa1111"]);
    }

    #[test]
    fn revert_to_newest_needs_no_prompt() {
        let ws = Workspace::new();
        ws.seed(&["aaaa1111", "bbbb2222"]);

        ws.run(&["revert", "to", "bbbb2222"]).unwrap();

        assert_eq!(ws.hashes(), vec!["bbbb2222", "aaaa1111"]);
    }

    #[test]
    fn json_revert_to_requires_force() {
        let ws = Workspace::new();
        ws.seed(&["aaaa1111", "bbbb2222"]);

        let err = ws.run(&["revert", "to", "aaaa1111", "--format", "json"]).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert_eq!(ws.hashes(), vec!["bbbb2222", "aaaa1111"]);

        ws.run(&["revert", "to", "aaaa1111", "--format", "json", "--force"]).unwrap();
        assert_eq!(ws.hashes(), vec!["aaaa1111"]);
    }

    #[test]
    fn group_details_renders_limited_json() {
        let ws = Workspace::new();

        ws.run(&["group-details", "network", "--format", "json", "--limit", "1"]).unwrap();
        ws.run(&["group-details", "Network", "--limit", "1"]).unwrap();
        ws.run(&["groups", "--os-type", "windows", "--format", "json"]).unwrap();
    }
}
