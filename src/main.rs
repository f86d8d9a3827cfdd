//! mtaops - operation lifecycle controller for MTA deployments.
//!
//! Main entry point for the mtaops CLI.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mtaops_cleanup::{CleanerOutcome, CleanupScheduler};
use mtaops_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};
use mtaops_protocols::engine::{variables, Variables};
use mtaops_protocols::operation::{OperationFilter, OperationOrder, OperationState, ProcessType};

mod app;
mod cli;

use app::App;
use cli::{Cli, Commands, EngineSignal};

/// Initialize tracing with console output and, when a log directory is
/// configured, daily-rotated files.
fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = match &config.directory {
        Some(directory) => {
            let log_dir = ConfigLoader::expand_path(directory);
            std::fs::create_dir_all(&log_dir)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("mtaops")
                .filename_suffix("log")
                .max_log_files(config.max_files)
                .build(&log_dir)?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            // The writer flushes only while its guard lives.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(file_layer)
        .init();

    Ok(())
}

/// Reject invalid configuration; log warnings.
fn validate_config(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let warnings = ConfigValidator::validate(config)?.into_result()?;
    for warning in warnings {
        warn!("Config {}: {}", warning.path, warning.message);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ConfigLoader::load_or_default(&cli.config)?;
    init_tracing(&config.logging)?;
    validate_config(&config)?;

    let app = App::build(config).await?;
    let result = match cli.command {
        None | Some(Commands::Run) => run_scheduler(&app).await,
        Some(Commands::Cleanup { retention_days }) => run_cleanup_once(&app, retention_days).await,
        Some(Commands::Action {
            action,
            process_id,
            user,
        }) => run_action(&app, &action, &process_id, &user).await,
        Some(Commands::Launch {
            process_type,
            space,
            user,
            mta_id,
            namespace,
            vars,
        }) => {
            let vars = launch_variables(mta_id, namespace, vars);
            launch(&app, &process_type, &user, &space, vars).await
        }
        Some(Commands::Signal {
            process_id,
            signal,
            content_error,
        }) => apply_signal(&app, &process_id, signal, content_error).await,
        Some(Commands::Operations { state, limit }) => list_operations(&app, state.as_deref(), limit).await,
    };
    app.shutdown().await;
    result
}

/// Run the cleanup scheduler until Ctrl-C.
async fn run_scheduler(app: &App) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting mtaops v{}", env!("CARGO_PKG_VERSION"));
    if !app.config.cleanup.enabled {
        info!("Cleanup is disabled, waiting for Ctrl-C");
        tokio::signal::ctrl_c().await?;
        return Ok(());
    }

    let scheduler = Arc::new(CleanupScheduler::from_config(app.coordinator.clone(), &app.config.cleanup)?);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(scheduler.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down");
    let _ = shutdown_tx.send(true);
    handle.await?;
    Ok(())
}

async fn run_cleanup_once(app: &App, retention_days: Option<u32>) -> Result<(), Box<dyn std::error::Error>> {
    let retention = retention_days.unwrap_or(app.config.cleanup.retention_days);
    let scheduler = CleanupScheduler::new(app.coordinator.clone(), &app.config.cleanup.schedule, retention)?;
    let report = scheduler.run_cleanup(Utc::now()).await;

    for cleaner in &report.cleaners {
        match &cleaner.outcome {
            CleanerOutcome::Cleaned(count) => println!("{:<28} {}", cleaner.name, count),
            CleanerOutcome::Failed(message) => println!("{:<28} FAILED: {}", cleaner.name, message),
        }
    }
    println!("{:<28} {}", "total", report.total_cleaned());
    Ok(())
}

async fn run_action(app: &App, action: &str, process_id: &str, user: &str) -> Result<(), Box<dyn std::error::Error>> {
    app.dispatcher.execute(action, user, process_id).await?;
    println!("{} {}: ok", action, process_id);
    Ok(())
}

/// Build launch variables. Values that parse as JSON keep their type.
fn launch_variables(mta_id: Option<String>, namespace: Option<String>, vars: Vec<(String, String)>) -> Variables {
    let mut launch_vars: Variables = vars
        .into_iter()
        .map(|(key, raw)| {
            let value = serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw));
            (key, value)
        })
        .collect();
    if let Some(mta_id) = mta_id {
        launch_vars.insert(variables::MTA_ID.to_string(), mta_id.into());
    }
    if let Some(namespace) = namespace {
        launch_vars.insert(variables::NAMESPACE.to_string(), namespace.into());
    }
    launch_vars
}

async fn launch(
    app: &App,
    process_type: &str,
    user: &str,
    space_id: &str,
    vars: Variables,
) -> Result<(), Box<dyn std::error::Error>> {
    let process_type = ProcessType::from_str(&process_type.to_uppercase())?;
    let operation = app.launcher.launch(process_type, user, space_id, vars).await?;
    println!("{}", serde_json::to_string(&operation)?);
    Ok(())
}

async fn apply_signal(
    app: &App,
    process_id: &str,
    signal: EngineSignal,
    content_error: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match signal {
        EngineSignal::WaitPoint => app.signals.on_wait_point(process_id).await?,
        EngineSignal::Finished => app.signals.on_finished(process_id).await?,
        EngineSignal::Failed => app.signals.on_failed(process_id, content_error).await?,
    }
    println!("{} {:?}: ok", process_id, signal);
    Ok(())
}

async fn list_operations(app: &App, state: Option<&str>, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let mut filter = OperationFilter::new().order(OperationOrder::StartedAtDesc).limit(limit);
    if let Some(state) = state {
        filter = filter.states([OperationState::from_str(&state.to_uppercase())?]);
    }
    for operation in app.stores.operations.query(&filter).await? {
        println!("{}", serde_json::to_string(&operation)?);
    }
    Ok(())
}
