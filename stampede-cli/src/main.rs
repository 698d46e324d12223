use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use stampede_config::{ConfigLoader, Preset, StampedeConfig};
use stampede_engine::LoadRun;
use stampede_logging::{init_logging, init_simple_tracing};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

mod cli;
mod summary;
use cli::{Cli, Commands, ConfigCommands, RunArgs};

/// Exit code for setup and configuration failures
const SETUP_FAILED_EXIT_CODE: u8 = 1;

/// Load configuration from file, preset or defaults, with environment overrides
fn load_config(config_path: Option<&Path>, preset: Option<Preset>) -> Result<StampedeConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => {
            info!("Loading configuration from: {:?}", path);
            loader
                .from_file(path)
                .with_context(|| format!("Failed to load configuration from {:?}", path))
        }
        None => {
            let preset = preset.unwrap_or_default();
            info!("Using built-in preset: {}", preset);
            loader
                .from_preset(preset)
                .with_context(|| format!("Failed to load preset {}", preset))
        }
    }
}

/// Apply command-line overrides on top of the loaded configuration
fn apply_run_overrides(config: &mut StampedeConfig, args: &RunArgs) -> Result<()> {
    if let Some(url) = &args.queue_url {
        config.target.queue_url = url.clone();
    }
    if let Some(url) = &args.core_url {
        config.target.core_url = url.clone();
    }
    if let Some(concert_id) = &args.concert_id {
        config.target.concert_id = concert_id.clone();
    }
    if let Some(seed) = args.seed {
        config.scenario.seed = Some(seed);
    }
    config
        .validate_all()
        .context("Invalid configuration after command-line overrides")
}

async fn handle_run(cli: &Cli, args: &RunArgs) -> Result<u8> {
    let mut config = load_config(cli.config.as_deref(), args.preset)?;
    apply_run_overrides(&mut config, args)?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging(&config.logging).context("Failed to initialise logging")?;
    if args.no_color || !config.logging.ansi {
        colored::control::set_override(false);
    }

    let run = LoadRun::from_config(config).context("Failed to prepare run")?;
    let config = run.config();
    info!(
        queue = %config.target.queue_url,
        mode = config.scenario.mode.as_str(),
        phases = config.phases.len(),
        "Starting load run"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let report = run.execute_until(shutdown).await.context("Run aborted during setup")?;

    print!("{}", summary::render_summary(&report));

    if let Some(path) = &args.summary_export {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write summary to {:?}", path))?;
        println!("📝 Summary written to {:?}", path);
    }

    Ok(report.exit_code() as u8)
}

/// Handle configuration validation
fn handle_config_validate(config_file: &Path) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!("Configuration file not found: {:?}", config_file));
    }

    match load_config(Some(config_file), None) {
        Ok(config) => {
            println!("✅ Configuration file is valid");
            println!(
                "   mode {}, {} phase(s), {} threshold metric(s)",
                config.scenario.mode,
                config.phases.len(),
                config.thresholds.len()
            );
            Ok(())
        }
        Err(e) => {
            println!("❌ Configuration validation failed: {:#}", e);
            error!("Configuration validation failed: {:#}", e);
            Err(e)
        }
    }
}

/// Handle configuration generation
fn handle_config_generate(preset: Preset, output: Option<&PathBuf>, force: bool) -> Result<()> {
    let yaml = serde_yaml::to_string(&preset.config()).context("Failed to serialize preset")?;

    let Some(output) = output else {
        print!("{}", yaml);
        return Ok(());
    };

    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    fs::write(output, yaml).context("Failed to write configuration file")?;

    println!("✅ {} configuration generated at: {:?}", preset, output);
    println!("📝 Edit the file to customize settings for your environment");
    println!("🔧 Validate with: stampede config validate --config-file {:?}", output);
    Ok(())
}

/// Handle configuration display
fn handle_config_show(config_file: Option<&Path>, preset: Option<Preset>, format: &str) -> Result<()> {
    let config = load_config(config_file, preset)?;

    match format.to_lowercase().as_str() {
        "yaml" | "yml" => {
            let yaml_output = serde_yaml::to_string(&config).context("Failed to serialize to YAML")?;
            println!("{}", yaml_output);
        }
        "json" => {
            let json_output = serde_json::to_string_pretty(&config).context("Failed to serialize to JSON")?;
            println!("{}", json_output);
        }
        _ => {
            return Err(anyhow::anyhow!(
                "Unknown output format: {}. Valid formats: yaml, json",
                format
            ));
        }
    }
    Ok(())
}

async fn dispatch(cli: &Cli) -> Result<u8> {
    match &cli.command {
        Commands::Run(args) => handle_run(cli, args).await,
        Commands::Config { config_cmd } => {
            let level = cli.log_level.map(|l| l.as_str()).unwrap_or("warn");
            init_simple_tracing(level);
            match config_cmd {
                ConfigCommands::Validate { config_file } => handle_config_validate(config_file)?,
                ConfigCommands::Generate { preset, output, force } => {
                    handle_config_generate(*preset, output.as_ref(), *force)?
                }
                ConfigCommands::Show { preset, format } => {
                    handle_config_show(cli.config.as_deref(), *preset, format)?
                }
            }
            Ok(0)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(&cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {:#}", "✗".bright_red().bold(), e);
            ExitCode::from(SETUP_FAILED_EXIT_CODE)
        }
    }
}
