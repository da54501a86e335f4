//! Subcommand implementations.
//!
//! Every command loads a JSON fixture repository (see
//! [`vtmerge_store::fixture`]), runs one library operation against it, and
//! prints the outcome in the requested [`OutputFormat`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Serialize;
use tracing::debug;
use vtmerge::config::{CONFIG_FILE, VtmergeConfig};
use vtmerge::constraints::{VerifyMode, verify_constraints};
use vtmerge::merge::{MergeContext, MergeOptions, merge, merge_base, merge_would_stomp_changes};
use vtmerge::model::report::{MergeReport, MergeStatus};
use vtmerge_store::{CommitGraph, MemoryGraph, TableName, load_fixture};

use crate::format::OutputFormat;

// ---------------------------------------------------------------------------
// Shared arguments
// ---------------------------------------------------------------------------

/// Arguments shared by every command.
#[derive(Args, Debug)]
pub struct RepoArgs {
    /// JSON fixture repository to operate on.
    #[arg(long, short = 'r', env = "VTMERGE_REPO")]
    pub repo: PathBuf,

    /// Output format: text or json.
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// Shorthand for --format json.
    #[arg(long)]
    pub json: bool,
}

impl RepoArgs {
    fn load(&self) -> Result<MemoryGraph> {
        load_fixture(&self.repo)
            .with_context(|| format!("loading fixture {}", self.repo.display()))
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::resolve(self.format, self.json)
    }
}

// ---------------------------------------------------------------------------
// merge-base
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct MergeBaseOutput {
    left: String,
    right: String,
    base: String,
    height: u64,
}

/// Print the merge base of two refs.
pub fn merge_base_cmd(repo: &RepoArgs, left: &str, right: &str) -> Result<()> {
    let graph = repo.load()?;
    let l = graph.resolve(left).with_context(|| format!("resolving '{left}'"))?;
    let r = graph.resolve(right).with_context(|| format!("resolving '{right}'"))?;
    let base = merge_base(&graph, &l, &r)?;
    match repo.format() {
        OutputFormat::Json => {
            let out = MergeBaseOutput {
                left: l.hash().to_string(),
                right: r.hash().to_string(),
                base: base.hash().to_string(),
                height: base.height(),
            };
            println!("{}", OutputFormat::to_json(&out)?);
        }
        OutputFormat::Text => println!("{}", base.hash()),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

/// Flags for `vtmerge merge`. Each one overrides the config file.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Our side (the branch being merged into).
    pub left: String,

    /// Their side (the branch being merged in).
    pub right: String,

    /// Configuration file [default: ./vtmerge.toml].
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Record the merge with only our side as parent.
    #[arg(long)]
    pub squash: bool,

    /// Always run a full merge, even when a fast-forward is possible.
    #[arg(long)]
    pub no_ff: bool,

    /// Record schema conflicts and skip those tables instead of aborting.
    #[arg(long)]
    pub keep_schema_conflicts: bool,

    /// Abort on primary-key changes instead of skipping the table.
    #[arg(long)]
    pub strict_primary_keys: bool,

    /// Re-check every row against every constraint after the merge.
    #[arg(long)]
    pub reverify_all: bool,

    /// Upper bound on tables merged in parallel.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Ref holding uncommitted work on our side. The merge is refused if it
    /// would overwrite any table changed there.
    #[arg(long)]
    pub working: Option<String>,
}

impl MergeArgs {
    fn options(&self) -> Result<MergeOptions> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
        let config = VtmergeConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display()))?;
        let mut opts = MergeOptions::from(&config.merge);
        opts.squash = self.squash;
        opts.no_ff = self.no_ff;
        opts.keep_schema_conflicts |= self.keep_schema_conflicts;
        opts.strict_primary_keys |= self.strict_primary_keys;
        opts.reverify_all_constraints |= self.reverify_all;
        if let Some(n) = self.concurrency {
            opts.concurrency = n;
        }
        debug!(?opts, "merge options");
        Ok(opts)
    }
}

/// Merge `right` into `left` and print a [`MergeReport`].
pub fn merge_cmd(repo: &RepoArgs, args: &MergeArgs) -> Result<()> {
    let opts = args.options()?;
    let graph = repo.load()?;
    let left = graph
        .resolve(&args.left)
        .with_context(|| format!("resolving '{}'", args.left))?;
    let right = graph
        .resolve(&args.right)
        .with_context(|| format!("resolving '{}'", args.right))?;

    let result = merge(&graph, &left, &right, &opts, &MergeContext::new());

    if let (Some(working), Ok(merged)) = (&args.working, &result) {
        let working = graph
            .resolve(working)
            .with_context(|| format!("resolving working ref '{working}'"))?;
        let stomped = merge_would_stomp_changes(left.root(), working.root(), &merged.root);
        if !stomped.is_empty() {
            bail!(
                "merge would overwrite uncommitted changes in: {}\n  \
                 To fix: commit or discard the working changes, then retry.",
                join_names(&stomped)
            );
        }
    }

    let report = MergeReport::from_result(&result);
    match repo.format() {
        OutputFormat::Json => println!("{}", OutputFormat::to_json(&report)?),
        OutputFormat::Text => print!("{report}"),
    }
    if report.status == MergeStatus::Aborted {
        bail!("merge of '{}' into '{}' aborted", args.right, args.left);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// verify
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct VerifyOutput {
    commit: String,
    violations: BTreeMap<TableName, u64>,
}

/// Check every constraint of `tables` (default: all) at `target`.
pub fn verify_cmd(repo: &RepoArgs, target: &str, tables: &[String]) -> Result<()> {
    let graph = repo.load()?;
    let commit = graph
        .resolve(target)
        .with_context(|| format!("resolving '{target}'"))?;
    let names = if tables.is_empty() {
        commit.root().table_names()
    } else {
        tables
            .iter()
            .map(|t| TableName::new(t).with_context(|| format!("invalid table name '{t}'")))
            .collect::<Result<Vec<_>>>()?
    };
    let outcome = verify_constraints(commit.root(), commit.root(), &names, VerifyMode::Full)?;
    match repo.format() {
        OutputFormat::Json => {
            let out = VerifyOutput {
                commit: commit.hash().to_string(),
                violations: outcome.counts,
            };
            println!("{}", OutputFormat::to_json(&out)?);
        }
        OutputFormat::Text => {
            for (name, count) in &outcome.counts {
                println!("  {name}: {count} violation(s)");
            }
            if outcome.violating_tables.is_empty() {
                println!("All constraints hold.");
            }
        }
    }
    Ok(())
}

fn join_names(names: &[TableName]) -> String {
    names
        .iter()
        .map(TableName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

