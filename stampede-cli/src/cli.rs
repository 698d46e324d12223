//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use stampede_config::{LogLevel, Preset};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Arrival-rate load generator for queue admission services", long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML or JSON)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a load run
    Run(RunArgs),

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct RunArgs {
    /// Built-in preset: entry-scale, circulation, e2e-circulation, validation-benchmark, smoke
    #[arg(long, value_name = "NAME")]
    pub preset: Option<Preset>,

    /// Queue service base URL
    #[arg(long, value_name = "URL")]
    pub queue_url: Option<String>,

    /// Booking service base URL
    #[arg(long, value_name = "URL")]
    pub core_url: Option<String>,

    /// Concert the clients queue for
    #[arg(long, value_name = "ID")]
    pub concert_id: Option<String>,

    /// Seed for session randomness
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Write the JSON summary to this path
    #[arg(long, value_name = "PATH")]
    pub summary_export: Option<PathBuf>,

    /// Disable coloured summary output
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Print a preset as YAML, or write it to a file
    Generate {
        /// Preset to generate
        #[arg(long, value_name = "NAME", default_value = "circulation")]
        preset: Preset,

        /// Output file path; stdout when omitted
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration a run would use
    Show {
        /// Preset used when no configuration file is given
        #[arg(long, value_name = "NAME")]
        preset: Option<Preset>,

        /// Output format: yaml, json
        #[arg(long, value_name = "FORMAT", default_value = "yaml")]
        format: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "stampede",
            "--log-level",
            "debug",
            "run",
            "--preset",
            "smoke",
            "--queue-url",
            "http://localhost:9000",
            "--seed",
            "7",
            "--summary-export",
            "out.json",
        ])
        .unwrap();

        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.preset, Some(Preset::Smoke));
        assert_eq!(args.queue_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.summary_export, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn test_unknown_preset_is_rejected() {
        let err = Cli::try_parse_from(["stampede", "run", "--preset", "soak"]).unwrap_err();
        assert!(err.to_string().contains("soak"));
    }

    #[test]
    fn test_config_generate_defaults_to_circulation() {
        let cli = Cli::try_parse_from(["stampede", "config", "generate"]).unwrap();
        match cli.command {
            Commands::Config {
                config_cmd: ConfigCommands::Generate { preset, output, force },
            } => {
                assert_eq!(preset, Preset::Circulation);
                assert!(output.is_none());
                assert!(!force);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["stampede", "config", "show", "--config", "run.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("run.yaml")));
    }
}
