// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `mcpshare`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mcpshare",
    version,
    about = "Serve the `share` tool: start, stop and list shared MCP servers.",
    long_about = "Reads one JSON request per line on stdin, e.g.\n\
                  {\"action\":\"start\",\"name\":\"fs\",\"port\":\"9000\"}\n\
                  and writes one JSON response per line on stdout."
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Mcpshare.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Executable used to share servers (overrides `[share].program`).
    #[arg(long, value_name = "NAME")]
    pub program: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MCPSHARE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and validate config, print it, but don't serve any requests.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
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
    fn parses_flags() {
        let args = CliArgs::try_parse_from([
            "mcpshare",
            "--config",
            "share.toml",
            "--program",
            "/opt/mcpm",
            "--log-level",
            "debug",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(args.config.as_deref(), Some("share.toml"));
        assert_eq!(args.program.as_deref(), Some("/opt/mcpm"));
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert!(args.dry_run);
    }

    #[test]
    fn everything_is_optional() {
        let args = CliArgs::try_parse_from(["mcpshare"]).unwrap();
        assert!(args.config.is_none());
        assert!(args.log_level.is_none());
        assert!(!args.dry_run);
    }
}
