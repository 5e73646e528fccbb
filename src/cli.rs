// src/cli.rs

//! CLI argument parsing using `clap` (derive feature).

use clap::{Parser, ValueEnum};

/// Command-line arguments for `opqueue`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "opqueue",
    version,
    about = "Run a plan of dependent, cancellable operations on a bounded queue.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the plan file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Opqueue.toml")]
    pub plan: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `OPQUEUE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse and validate the plan, print it, but run nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Give up waiting after this many milliseconds and cancel what is left.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["opqueue"]).unwrap();
        assert_eq!(args.plan, "Opqueue.toml");
        assert!(!args.dry_run);
        assert!(args.log_level.is_none());
        assert!(args.timeout_ms.is_none());
    }

    #[test]
    fn all_flags() {
        let args = CliArgs::try_parse_from([
            "opqueue",
            "--plan",
            "plans/demo.toml",
            "--log-level",
            "debug",
            "--dry-run",
            "--timeout-ms",
            "250",
        ])
        .unwrap();
        assert_eq!(args.plan, "plans/demo.toml");
        assert_eq!(args.log_level, Some(LogLevel::Debug));
        assert!(args.dry_run);
        assert_eq!(args.timeout_ms, Some(250));
    }
}
