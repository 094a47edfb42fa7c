use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod cli;

use cli::Cli;
use cli::commands::{Commands, RunArgs};
use deferral::config::EngineConfig;
use deferral::{
    CompletionHandle, DeferralMode, DeferralResult, InstantDelay, LoggingObserver, ScheduleRequest, SchedulerBuilder,
    TimingMiddleware, TracingMiddleware, unit_of_work,
};

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("deferral")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("deferral.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn run_application(cli: &Cli, config: &EngineConfig) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None | Some(Commands::Modes) => handle_modes_command(),
        Some(Commands::Config) => handle_config_command(config),
        Some(Commands::Run(args)) => handle_run_command(args, config, cli.is_verbose()),
    }
}

fn handle_modes_command() -> Result<()> {
    println!("{}", "Strategies:".cyan());
    for mode in DeferralMode::ALL {
        println!("  {:<22} (alias: {})", mode.as_str().green(), mode.alias());
    }
    Ok(())
}

fn handle_config_command(config: &EngineConfig) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}

fn handle_run_command(args: &RunArgs, config: &EngineConfig, verbose: bool) -> Result<()> {
    info!("Running strategy: {}", args.strategy);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;

    runtime.block_on(run_scheduled(args, config, verbose))
}

async fn run_scheduled(args: &RunArgs, config: &EngineConfig, verbose: bool) -> Result<()> {
    let mut builder = SchedulerBuilder::from_config(config)
        .with_middleware(TracingMiddleware)
        .with_middleware(TimingMiddleware)
        .with_observer(LoggingObserver);
    if let Some(excuses) = config.excuse_source().context("Invalid excuse configuration")? {
        builder = builder.with_excuses(excuses);
    }
    if args.instant {
        builder = builder.with_delay_policy(Arc::new(InstantDelay));
    }
    let scheduler = builder.build();

    let mut request = ScheduleRequest::named(&args.strategy)
        .with_initial_delay(Duration::from_millis(args.initial_delay_ms));
    if let Some(max_cycles) = args.max_cycles {
        request = request.with_max_cycles(max_cycles);
    }
    let cancel = request.cancel.clone();

    let work = unit_of_work(|| async {
        println!("{}", "Doing the work now".green());
        Ok(())
    });
    let handle = scheduler.schedule(request, work).context("Failed to schedule run")?;
    println!("{} {} ({})", "Scheduled:".cyan(), handle.correlation_id(), handle.mode());

    if let Some(ms) = args.trigger_after_ms {
        let handle = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            if handle.trigger_now() {
                println!("{}", "Forcing the work to run".yellow());
            }
        });
    }
    if let Some(ms) = args.abandon_after_ms {
        let handle = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            handle.abandon();
            println!("{}", "Abandoning the run".yellow());
        });
    }
    if let Some(ms) = args.timeout_ms {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            cancel.cancel();
        });
    }
    if verbose {
        spawn_progress_reporter(handle.clone());
    }

    let result = handle.completion().await.context("Run failed")?;
    print_result(&handle, &result)
}

fn spawn_progress_reporter(handle: CompletionHandle) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(500));
        while !handle.is_settled() {
            ticker.tick().await;
            let progress = handle.progress();
            println!(
                "  {} cycles={} excuses={} status={:?}",
                "progress".dimmed(),
                progress.cycles,
                progress.excuses,
                handle.status()
            );
        }
    });
}

fn print_result(handle: &CompletionHandle, result: &DeferralResult) -> Result<()> {
    let status = if result.executed {
        "EXECUTED".green()
    } else if result.abandoned {
        "ABANDONED".red()
    } else {
        "NOT EXECUTED".yellow()
    };
    println!("{} {:?}", status, handle.status());
    let json = serde_json::to_string_pretty(result).context("Failed to serialize result")?;
    println!("{}", json);
    Ok(())
}

fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = EngineConfig::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).context("Application failed")?;

    Ok(())
}
