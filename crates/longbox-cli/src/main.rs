#![forbid(unsafe_code)]

mod cmd;
mod comicvine;
mod output;

use std::env;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "lbx: keep a flat-file comic issue database in sync with ComicVine",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    const fn output_mode(&self) -> OutputMode {
        OutputMode::from_json_flag(self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Sync a snapshot with issues updated on ComicVine",
        long_about = "Merge every issue ComicVine updated between START and END into \
                      <DIR>/<START>_latest.mcl, write <DIR>/<END>_latest.mcl and \
                      <DIR>/<END>_deleted.txt, then rename the input to <START>_missing.mcl.",
        after_help = "EXAMPLES:\n    # Weekly sync in the current directory\n    lbx sync 2017-09-11 2017-09-17\n\n    # Sync a database kept elsewhere, with an explicit key\n    lbx sync 2017-09-11 2017-09-17 --dir ~/comics --api-key $KEY\n\n    # Drop issues ComicVine no longer returns\n    lbx sync 2017-09-11 2017-09-17 --prune\n\n    # Emit machine-readable output\n    lbx sync 2017-09-11 2017-09-17 --json"
    )]
    Sync(cmd::sync::SyncArgs),

    #[command(
        about = "Check a snapshot file",
        long_about = "Parse a snapshot and report its size, duplicate ids, and whether it is in canonical form.",
        after_help = "EXAMPLES:\n    # Check the current snapshot\n    lbx verify 2017-09-17_latest.mcl\n\n    # Emit machine-readable output\n    lbx verify 2017-09-17_latest.mcl --json"
    )]
    Verify(cmd::verify::VerifyArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("LONGBOX_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "longbox=debug,lbx=debug,info"
        } else {
            "longbox=info,lbx=info,warn"
        })
    });

    let format = env::var("LONGBOX_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = cli.output_mode();
    debug!(?output, "starting");

    let command_result = match &cli.command {
        Commands::Sync(args) => cmd::sync::run_sync(args, output),
        Commands::Verify(args) => cmd::verify::run_verify(args, output),
    };

    if let Err(err) = command_result {
        render_error(output, &CliError::from(&err))?;
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn sync_parses_dates_and_flags() {
        let cli = Cli::parse_from([
            "lbx",
            "sync",
            "2017-09-11",
            "2017-09-17",
            "--dir",
            "/db",
            "--page-size",
            "50",
            "--prune",
        ]);
        let Commands::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.start, "2017-09-11");
        assert_eq!(args.end, "2017-09-17");
        assert_eq!(args.dir, PathBuf::from("/db"));
        assert_eq!(args.page_size, Some(50));
        assert_eq!(args.max_retries, None);
        assert!(args.prune);
    }

    #[test]
    fn sync_dir_defaults_to_current() {
        let cli = Cli::parse_from(["lbx", "sync", "2017-09-11", "2017-09-17"]);
        let Commands::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.dir, PathBuf::from("."));
        assert!(!args.prune);
    }

    #[test]
    fn json_flag_after_subcommand() {
        let cli = Cli::parse_from(["lbx", "verify", "a.mcl", "--json"]);
        assert!(cli.output_mode().is_json());
    }

    #[test]
    fn verbose_flag_is_global() {
        let cli = Cli::parse_from(["lbx", "-v", "verify", "a.mcl"]);
        assert!(cli.verbose);
        let cli = Cli::parse_from(["lbx", "verify", "a.mcl", "--verbose"]);
        assert!(cli.verbose);
    }

    #[test]
    fn sync_requires_both_dates() {
        assert!(Cli::try_parse_from(["lbx", "sync", "2017-09-11"]).is_err());
    }
}
