use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

mod commands;
mod format;

use commands::{MergeArgs, RepoArgs};

/// Three-way merge for versioned tables
///
/// Runs the vtmerge core against a JSON fixture repository: a small commit
/// history whose commits carry full table contents.
///
/// QUICK START:
///
///   vtmerge merge-base -r repo.json main feature
///   vtmerge merge -r repo.json main feature
///   vtmerge merge -r repo.json main feature --json
///   vtmerge verify -r repo.json main
///
/// Logging is off unless VTMERGE_LOG is set (VTMERGE_LOG=json for JSON
/// lines on stderr); RUST_LOG picks the level.
#[derive(Parser)]
#[command(name = "vtmerge")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'vtmerge <command> --help' for more information on a specific command.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the merge base of two refs
    #[command(name = "merge-base")]
    MergeBase {
        #[command(flatten)]
        repo: RepoArgs,
        /// First ref or commit hash.
        left: String,
        /// Second ref or commit hash.
        right: String,
    },

    /// Merge one ref into another and report the result
    ///
    /// Settings come from vtmerge.toml when present; flags override them.
    /// Row conflicts and constraint violations do not fail the command;
    /// they are listed in the report. The command fails only when the
    /// merge aborts.
    Merge {
        #[command(flatten)]
        repo: RepoArgs,
        #[command(flatten)]
        args: MergeArgs,
    },

    /// Check unique and foreign-key constraints at a ref
    Verify {
        #[command(flatten)]
        repo: RepoArgs,
        /// Ref or commit hash to check.
        target: String,
        /// Restrict the check to these tables.
        #[arg(long = "table", short = 't')]
        tables: Vec<String>,
    },

    /// Generate shell completions
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn main() -> Result<()> {
    vtmerge::telemetry::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::MergeBase { repo, left, right } => commands::merge_base_cmd(&repo, &left, &right),
        Commands::Merge { repo, args } => commands::merge_cmd(&repo, &args),
        Commands::Verify {
            repo,
            target,
            tables,
        } => commands::verify_cmd(&repo, &target, &tables),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "vtmerge", &mut std::io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn merge_flags_parse() {
        let cli = Cli::try_parse_from([
            "vtmerge",
            "merge",
            "-r",
            "repo.json",
            "main",
            "feature",
            "--no-ff",
            "--concurrency",
            "2",
            "--format",
            "json",
        ])
        .unwrap();
        let Commands::Merge { repo, args } = cli.command else {
            panic!("expected merge");
        };
        assert_eq!(repo.format, Some(format::OutputFormat::Json));
        assert!(args.no_ff);
        assert_eq!(args.concurrency, Some(2));
        assert_eq!(args.left, "main");
    }
}
