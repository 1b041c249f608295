//! CLI argument parsing for sharelock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Sharelock: exclusive access lock for datastores on shared folders.
///
/// Operates on the lock file of one shared folder:
/// - `status` shows who holds it
/// - `probe` checks that the folder honors exclusive file locks
/// - `hold` acquires it, as a second client would
/// - `break` replaces a lock whose holder stopped heartbeating long ago
#[derive(Parser, Debug)]
#[command(name = "sharelock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// YAML config file. Defaults to `<dir>/.sharelock.yaml` when present.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for sharelock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the current lock holder.
    ///
    /// Prints the recorded holder, heartbeat age, and generation without
    /// touching the lock.
    Status(DirArgs),

    /// Check whether the folder supports exclusive file locks.
    ///
    /// Exits with code 3 when locks on this filesystem are not enforced.
    Probe(DirArgs),

    /// Acquire the lock and hold it.
    ///
    /// Holds for `--seconds`, or until the lock is lost or the process is
    /// killed, then releases it.
    Hold(HoldArgs),

    /// Force-break a lock whose holder stopped heartbeating.
    ///
    /// Only succeeds when the recorded heartbeat is older than the stale
    /// timeout times the safety factor. A holder that is merely slow would
    /// end up sharing the datastore.
    Break(BreakArgs),
}

/// Arguments naming the shared folder.
#[derive(Args, Debug)]
pub struct DirArgs {
    /// Shared folder containing the datastore.
    #[arg(long, value_name = "DIR")]
    pub dir: PathBuf,
}

/// Arguments for the `hold` command.
#[derive(Args, Debug)]
pub struct HoldArgs {
    /// Shared folder containing the datastore.
    #[arg(long, value_name = "DIR")]
    pub dir: PathBuf,

    /// Give up after this many milliseconds (0 = a single attempt).
    #[arg(long, conflicts_with = "wait")]
    pub timeout_ms: Option<u64>,

    /// Wait for the lock without a time limit.
    #[arg(long)]
    pub wait: bool,

    /// Release after this many seconds. Holds until killed when omitted.
    #[arg(long)]
    pub seconds: Option<u64>,
}

/// Arguments for the `break` command.
#[derive(Args, Debug)]
pub struct BreakArgs {
    /// Shared folder containing the datastore.
    #[arg(long, value_name = "DIR")]
    pub dir: PathBuf,

    /// Skip the confirmation prompt.
    #[arg(long)]
    pub yes: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        // Verifies the CLI arguments configuration is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_status() {
        let cli = Cli::try_parse_from(["sharelock", "status", "--dir", "/mnt/share"]).unwrap();
        if let Command::Status(args) = cli.command {
            assert_eq!(args.dir, PathBuf::from("/mnt/share"));
        } else {
            panic!("Expected Status command");
        }
        assert!(cli.config.is_none());
    }

    #[test]
    fn parse_status_requires_dir() {
        assert!(Cli::try_parse_from(["sharelock", "status"]).is_err());
    }

    #[test]
    fn parse_probe() {
        let cli = Cli::try_parse_from(["sharelock", "probe", "--dir", "share"]).unwrap();
        assert!(matches!(cli.command, Command::Probe(_)));
    }

    #[test]
    fn parse_hold_defaults() {
        let cli = Cli::try_parse_from(["sharelock", "hold", "--dir", "share"]).unwrap();
        if let Command::Hold(args) = cli.command {
            assert_eq!(args.timeout_ms, None);
            assert!(!args.wait);
            assert_eq!(args.seconds, None);
        } else {
            panic!("Expected Hold command");
        }
    }

    #[test]
    fn parse_hold_full() {
        let cli = Cli::try_parse_from([
            "sharelock",
            "hold",
            "--dir",
            "share",
            "--timeout-ms",
            "1500",
            "--seconds",
            "30",
        ])
        .unwrap();
        if let Command::Hold(args) = cli.command {
            assert_eq!(args.timeout_ms, Some(1500));
            assert_eq!(args.seconds, Some(30));
        } else {
            panic!("Expected Hold command");
        }
    }

    #[test]
    fn parse_hold_rejects_timeout_with_wait() {
        let result = Cli::try_parse_from([
            "sharelock",
            "hold",
            "--dir",
            "share",
            "--timeout-ms",
            "10",
            "--wait",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_break() {
        let cli = Cli::try_parse_from(["sharelock", "break", "--dir", "share", "--yes"]).unwrap();
        if let Command::Break(args) = cli.command {
            assert!(args.yes);
        } else {
            panic!("Expected Break command");
        }
    }

    #[test]
    fn parse_global_config_after_subcommand() {
        let cli = Cli::try_parse_from([
            "sharelock",
            "status",
            "--dir",
            "share",
            "--config",
            "/etc/sharelock.yaml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/sharelock.yaml")));
    }
}
