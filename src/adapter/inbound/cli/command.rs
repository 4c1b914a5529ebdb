//! Command-line interface definitions.
//!
//! Defines the CLI structure for the liquidator using `clap`: `run` starts
//! the agent, `check config` validates a configuration file without
//! touching the network.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG: &str = "config.toml";

/// Autonomous liquidator for leveraged perpetuals positions
#[derive(Parser, Debug)]
#[command(name = "perp-liquidator")]
#[command(version)]
pub struct Cli {
    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the liquidator (foreground)
    Run(RunArgs),

    /// Run diagnostic checks
    #[command(subcommand)]
    Check(CheckCommand),
}

/// Subcommands for `perp-liquidator check`.
#[derive(Subcommand, Debug)]
pub enum CheckCommand {
    /// Validate the configuration file syntax and semantics.
    Config(ConfigPathArg),
}

/// Arguments for `perp-liquidator run`.
#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Override log level (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Simulate liquidations but never submit them.
    #[arg(long)]
    pub dry_run: bool,

    /// Use JSON log format instead of pretty-printed logs.
    #[arg(long)]
    pub json_logs: bool,

    /// Override the keypair file of the liquidator wallet.
    #[arg(long)]
    pub keypair: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ConfigPathArg {
    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults() {
        let cli = Cli::try_parse_from(["perp-liquidator", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG));
        assert!(!args.dry_run);
        assert!(!args.json_logs);
        assert!(args.log_level.is_none());
        assert!(args.keypair.is_none());
    }

    #[test]
    fn run_overrides() {
        let cli = Cli::try_parse_from([
            "perp-liquidator",
            "run",
            "--config",
            "devnet.toml",
            "--dry-run",
            "--log-level",
            "debug",
            "--json-logs",
            "--keypair",
            "/tmp/liquidator.json",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("devnet.toml"));
        assert!(args.dry_run);
        assert!(args.json_logs);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert_eq!(args.keypair.as_deref(), Some("/tmp/liquidator.json"));
    }

    #[test]
    fn check_config_accepts_global_flags() {
        let cli =
            Cli::try_parse_from(["perp-liquidator", "check", "config", "-c", "a.toml", "--json"])
                .unwrap();
        assert!(cli.json);
        let Commands::Check(CheckCommand::Config(arg)) = cli.command else {
            panic!("expected check config");
        };
        assert_eq!(arg.config, PathBuf::from("a.toml"));
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["perp-liquidator", "status"]).is_err());
    }
}
