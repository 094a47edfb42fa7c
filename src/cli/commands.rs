//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: drive a demo unit of work through one strategy
//! - modes: list the built-in strategies
//! - config: print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Deferral - put work off, deliberately
#[derive(Parser, Debug)]
#[command(name = "deferral")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a demo unit of work through a strategy
    Run(RunArgs),

    /// List the built-in strategies
    Modes,

    /// Print the effective configuration as YAML
    Config,
}

/// Arguments for `deferral run`
#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    /// Strategy mode (e.g. immediate, perpetual-defer) or registered key
    pub strategy: String,

    /// Pacing hint in milliseconds (0 = strategy default)
    #[arg(long, default_value_t = 0)]
    pub initial_delay_ms: u64,

    /// Cap on deferral cycles for this run
    #[arg(long)]
    pub max_cycles: Option<u32>,

    /// Force the work to run after this many milliseconds
    #[arg(long)]
    pub trigger_after_ms: Option<u64>,

    /// Abandon the run after this many milliseconds
    #[arg(long)]
    pub abandon_after_ms: Option<u64>,

    /// Cancel the run after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Skip real waiting (every delay returns immediately)
    #[arg(long)]
    pub instant: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_args() {
        let cli = Cli::try_parse_from(["deferral"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["deferral", "-v"]).unwrap();
        assert!(cli.is_verbose());
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["deferral", "-c", "/path/to/deferral.yml"]).unwrap();
        assert_eq!(cli.config.as_ref(), Some(&PathBuf::from("/path/to/deferral.yml")));
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["deferral", "run", "perpetual"]).unwrap();
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.strategy, "perpetual");
                assert_eq!(args.initial_delay_ms, 0);
                assert!(args.max_cycles.is_none());
                assert!(args.trigger_after_ms.is_none());
                assert!(!args.instant);
            }
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_run_all_options() {
        let cli = Cli::try_parse_from([
            "deferral",
            "run",
            "threshold-gated",
            "--initial-delay-ms",
            "20",
            "--max-cycles",
            "9",
            "--trigger-after-ms",
            "100",
            "--abandon-after-ms",
            "200",
            "--timeout-ms",
            "300",
            "--instant",
        ])
        .unwrap();
        let expected = RunArgs {
            strategy: "threshold-gated".to_string(),
            initial_delay_ms: 20,
            max_cycles: Some(9),
            trigger_after_ms: Some(100),
            abandon_after_ms: Some(200),
            timeout_ms: Some(300),
            instant: true,
        };
        assert!(matches!(cli.command, Some(Commands::Run(args)) if args == expected));
    }

    #[test]
    fn test_run_requires_strategy() {
        assert!(Cli::try_parse_from(["deferral", "run"]).is_err());
    }

    #[test]
    fn test_modes_and_config() {
        let cli = Cli::try_parse_from(["deferral", "modes"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Modes)));
        let cli = Cli::try_parse_from(["deferral", "-v", "config"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Config)));
        assert!(cli.verbose);
    }
}
