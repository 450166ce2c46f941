//! dotsync: Keep dotfiles in sync with a tag-organized note store.
//!
//! Each invocation is a single pass against the store; nothing runs in the
//! background.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use dotsync::config::absolute_path;
use dotsync::output;
use dotsync::{Config, JsonFileStore, NativeFs};

#[derive(Parser, Debug)]
#[command(name = "dotsync")]
#[command(about = "Sync dotfiles with a tag-organized note store")]
struct Args {
    /// Home directory mirrored by the root tag
    #[arg(long, env = "DOTSYNC_HOME")]
    home: Option<String>,

    /// Item store file
    #[arg(long, env = "DOTSYNC_STORE")]
    store: Option<String>,

    /// Suppress the per-file report
    #[arg(short, long)]
    quiet: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Push newer local files and pull newer remote notes
    Sync {
        /// Restrict to these files or directories
        paths: Vec<String>,
    },
    /// Show how tracked files differ from the store
    Status { paths: Vec<String> },
    /// Start tracking files (directories add every file below them)
    Add {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Stop tracking files
    Remove {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Delete every tracked note and tag from the store
    Wipe {
        /// Required confirmation
        #[arg(long)]
        force: bool,
    },
}

fn resolve_paths(paths: &[String], cwd: &Path) -> Vec<PathBuf> {
    paths.iter().map(|p| absolute_path(p, cwd)).collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,dotsync=debug,dotsync_core=debug"
    } else {
        "warn,dotsync=info,dotsync_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let config = Config::resolve(args.home.as_deref(), args.store.as_deref(), &cwd)?;
    debug!("Home: {:?}", config.home);
    debug!("Store: {:?}", config.store_path);

    let fs = NativeFs::new(config.home.clone());
    let store = JsonFileStore::new(config.store_path.clone());
    let home = config.home.as_path();

    let report = match args.command {
        Command::Sync { paths } => {
            let paths = resolve_paths(&paths, &cwd);
            let outcome = dotsync_core::sync(&store, &fs, home, &paths)
                .await
                .context("Sync failed")?;
            output::sync_report(&outcome)
        }
        Command::Status { paths } => {
            let paths = resolve_paths(&paths, &cwd);
            let diffs = dotsync_core::status(&store, &fs, home, &paths)
                .await
                .context("Status failed")?;
            output::status_report(&diffs)
        }
        Command::Add { paths } => {
            let paths = resolve_paths(&paths, &cwd);
            let outcome = dotsync_core::add(&store, &fs, home, &paths)
                .await
                .context("Add failed")?;
            output::add_report(&outcome)
        }
        Command::Remove { paths } => {
            let paths = resolve_paths(&paths, &cwd);
            let outcome = dotsync_core::remove(&store, &fs, home, &paths)
                .await
                .context("Remove failed")?;
            info!(
                "{} notes removed, {} tags removed, {} not tracked",
                outcome.notes_removed, outcome.tags_removed, outcome.not_tracked
            );
            output::remove_report(&outcome)
        }
        Command::Wipe { force } => {
            if !force {
                bail!("wipe deletes every tracked note; pass --force to confirm");
            }
            let outcome = dotsync_core::wipe(&store).await.context("Wipe failed")?;
            output::wipe_report(&outcome)
        }
    };

    if !args.quiet {
        print!("{}", report);
    }
    Ok(())
}
